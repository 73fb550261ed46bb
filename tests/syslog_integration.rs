//! End-to-end parsing through the public API

use chrono::{DateTime, TimeZone, Utc};
use pretty_assertions::assert_eq;
use rstest::{fixture, rstest};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use syscim::config::Config;
use syscim::syslog::{DeviceClock, DeviceZone, ParseStatus};
use syscim::{MessageError, SyslogParser};

const SU_LINE: &str =
    "<164>Nov 22 20:39:23 metron su: pam_unix(su:session): session closed for user root";
const SSH_LINE: &str = "<162>Nov 22 20:39:23 metron sshd[7727]: Accepted publickey for centos \
                        from 172.24.4.1 port 43326 ssh2: RSA SHA256:4+Jr1PdfHwBkJ9jyaYMLLCfNdDzQKbzLDe+yt0NYn3s";
const HTTPD_LINE: &str = "<166>Nov 22 20:39:23 metron httpd: GET /index.html HTTP/1.1";

fn near_sample_day() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2017, 11, 23, 0, 0, 0).unwrap()
}

fn sample_parser() -> SyslogParser {
    SyslogParser::new(&Config::default())
        .expect("Failed to build parser")
        .with_clock(DeviceClock::pinned(DeviceZone::utc(), near_sample_day()))
}

#[fixture]
fn parser() -> SyslogParser {
    sample_parser()
}

fn parser_without_normalization() -> SyslogParser {
    let mut config = Config::default();
    config.normalization.apply_on_parse = false;
    SyslogParser::new(&config)
        .expect("Failed to build parser")
        .with_clock(DeviceClock::pinned(DeviceZone::utc(), near_sample_day()))
}

#[rstest]
fn test_su_session_closed(parser: SyslogParser) {
    let record = parser.parse(SU_LINE.as_bytes()).expect("Should parse");

    assert_eq!(record.original_string(), SU_LINE);
    assert_eq!(record.timestamp(), 1_511_383_163_000);
    assert_eq!(record.get("user_su"), Some(&Value::from("root")));
    assert_eq!(record.get("action"), Some(&Value::from("session closed")));
    assert_eq!(record.get("syslog_hostname"), Some(&Value::from("metron")));
}

#[rstest]
fn test_ssh_accepted_publickey(parser: SyslogParser) {
    let record = parser.parse(SSH_LINE.as_bytes()).expect("Should parse");

    assert_eq!(record.timestamp(), 1_511_383_163_000);
    assert_eq!(record.get("ip_src_addr"), Some(&Value::from("172.24.4.1")));
    assert_eq!(record.get("ip_src_port"), Some(&Value::from(43326)));
    assert_eq!(record.get("protocol"), Some(&Value::from("ssh2")));
    assert_eq!(record.get("syslog_pid"), Some(&Value::from(7727)));
    assert_eq!(record.get("syslog_grammar"), Some(&Value::from("SSH2")));
    assert_eq!(record.get("syslog_severity"), Some(&Value::from("critical")));
    assert_eq!(record.get("syslog_facility"), Some(&Value::from("local4")));

    // "user" is a taxonomy alias; the parser output is normalized
    assert_eq!(record.get("src_user"), Some(&Value::from("centos")));
    assert!(!record.contains("user"));
    assert!(!record.contains("src_ip"));
}

#[test]
fn test_raw_grammar_fields_without_normalization() {
    let record = parser_without_normalization()
        .parse(SSH_LINE.as_bytes())
        .expect("Should parse");

    assert_eq!(record.get("user"), Some(&Value::from("centos")));
    assert!(!record.contains("src_user"));
}

#[rstest]
fn test_unknown_program_keeps_envelope_only(parser: SyslogParser) {
    let record = parser.parse(HTTPD_LINE.as_bytes()).expect("Should not fail");

    let keys: BTreeSet<&str> = record.fields().keys().map(String::as_str).collect();
    let expected: BTreeSet<&str> = [
        "original_string",
        "timestamp",
        "syslog_severity",
        "syslog_facility",
        "syslog_hostname",
        "syslog_program",
        "parse_status",
    ]
    .into_iter()
    .collect();

    assert_eq!(keys, expected);
    assert_eq!(record.parse_status(), Some(ParseStatus::UnknownProgram));
}

#[rstest]
fn test_mark_line_is_fatal_for_the_message(parser: SyslogParser) {
    let err = parser.parse(b"-- MARK --").unwrap_err();

    assert_eq!(
        err,
        MessageError::EnvelopeNoMatch {
            raw_text: "-- MARK --".to_string()
        }
    );
    assert_eq!(err.raw_text(), "-- MARK --");
}

#[rstest]
fn test_invalid_user_claimed_by_first_grammar(parser: SyslogParser) {
    let line = "<38>Nov 22 20:40:01 metron sshd[8001]: Failed password for invalid user oracle \
                from 10.1.2.3 port 50022 ssh2";
    let record = parser.parse(line.as_bytes()).expect("Should parse");

    assert_eq!(record.get("syslog_grammar"), Some(&Value::from("SSH1")));
    assert_eq!(record.get("action"), Some(&Value::from("failed")));
    assert_eq!(record.get("ip_src_addr"), Some(&Value::from("10.1.2.3")));
}

#[rstest]
fn test_sudo_command_line(parser: SyslogParser) {
    let line = "<85>Nov 22 20:41:00 metron sudo:   centos : TTY=pts/0 ; PWD=/home/centos ; \
                USER=root ; COMMAND=/usr/bin/systemctl restart sshd";
    let record = parser.parse(line.as_bytes()).expect("Should parse");

    assert_eq!(record.get("syslog_grammar"), Some(&Value::from("SUDO2")));
    assert_eq!(record.get("user_sudo"), Some(&Value::from("centos")));
    assert_eq!(record.get("user_su"), Some(&Value::from("root")));
    assert_eq!(record.get("syslog_facility"), Some(&Value::from("authpriv")));
}

#[rstest]
fn test_known_program_without_match_is_not_fatal(parser: SyslogParser) {
    let line = "<38>Nov 22 20:39:23 metron sshd[1]: Server listening on :: port 22.";
    let record = parser.parse(line.as_bytes()).expect("Should not fail");

    assert_eq!(record.parse_status(), Some(ParseStatus::NoGrammarMatch));
    assert_eq!(record.get("syslog_program"), Some(&Value::from("sshd")));
}

#[rstest]
#[case::with_mark(&[SU_LINE, "-- MARK --", SSH_LINE], 2, 1)]
#[case::all_valid(&[SU_LINE, SSH_LINE, HTTPD_LINE], 3, 0)]
#[case::bad_priority(&["<192>Nov 22 20:39:23 metron su: hello", SU_LINE], 1, 1)]
#[case::empty(&[], 0, 0)]
fn test_batch_never_aborts(
    parser: SyslogParser,
    #[case] lines: &[&str],
    #[case] records: usize,
    #[case] failures: usize,
) {
    let outcome = parser.parse_batch(lines.iter().copied());

    assert_eq!(outcome.records.len(), records);
    assert_eq!(outcome.failures.len(), failures);
    assert_eq!(outcome.total(), lines.len());
}

#[rstest]
fn test_batch_failure_carries_raw_text(parser: SyslogParser) {
    let outcome = parser.parse_batch([SU_LINE, "-- MARK --", SSH_LINE]);

    assert_eq!(outcome.failures[0].raw_text(), "-- MARK --");
    assert_eq!(outcome.records[0].original_string(), SU_LINE);
    assert_eq!(outcome.records[1].original_string(), SSH_LINE);
}

#[test]
fn test_year_rollover_through_parser() {
    let clock = DeviceClock::pinned(
        DeviceZone::utc(),
        Utc.with_ymd_and_hms(2018, 1, 2, 9, 0, 0).unwrap(),
    );
    let parser = SyslogParser::new(&Config::default())
        .expect("Failed to build parser")
        .with_clock(clock);

    let record = parser
        .parse(b"<86>Dec 31 23:59:59 metron su: pam_unix(su:session): session opened for user root")
        .expect("Should parse");

    assert_eq!(record.timestamp(), 1_514_764_799_000);
}

#[rstest]
#[case::winter("<13>Jan 15 12:00:00 host app: x", 2018, 2, 1, 1_516_035_600_000)]
#[case::summer("<13>Jul 15 12:00:00 host app: x", 2018, 8, 1, 1_531_670_400_000)]
fn test_named_zone_follows_dst(
    #[case] line: &str,
    #[case] year: i32,
    #[case] month: u32,
    #[case] day: u32,
    #[case] expected: i64,
) {
    let mut config = Config::default();
    config.device.time_zone = Some("America/New_York".to_string());

    let zone: DeviceZone = "America/New_York".parse().unwrap();
    let now = Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap();
    let parser = SyslogParser::new(&config)
        .expect("Failed to build parser")
        .with_clock(DeviceClock::pinned(zone, now));

    let record = parser.parse(line.as_bytes()).expect("Should parse");
    assert_eq!(record.timestamp(), expected);
}

#[test]
fn test_dst_gap_time_shifts_forward() {
    let zone: DeviceZone = "America/New_York".parse().unwrap();
    let now = Utc.with_ymd_and_hms(2023, 8, 1, 0, 0, 0).unwrap();
    let parser = SyslogParser::new(&Config::default())
        .expect("Failed to build parser")
        .with_clock(DeviceClock::pinned(zone, now));

    let record = parser
        .parse(b"<13>Mar 12 02:30:00 host su: pam_unix(su:session): session opened for user root")
        .expect("Gap time should still resolve");

    // 2023-03-12T07:30:00Z, i.e. 03:30 EDT
    assert_eq!(record.timestamp(), 1_678_606_200_000);
}

#[test]
fn test_leap_day_read_in_following_year() {
    let now = Utc.with_ymd_and_hms(2025, 1, 10, 0, 0, 0).unwrap();
    let parser = SyslogParser::new(&Config::default())
        .expect("Failed to build parser")
        .with_clock(DeviceClock::pinned(DeviceZone::utc(), now));

    let record = parser
        .parse(b"<13>Feb 29 12:00:00 host su: x")
        .expect("Leap day should resolve to the previous year");

    assert_eq!(record.timestamp(), 1_709_208_000_000);
}

#[rstest]
#[case::minutes_with_offset("<13>2017-11-22T21:39+01:00 host app: x", 1_511_383_140_000)]
#[case::comma_fraction("<13>2017-11-22T20:39:23,123Z host app: x", 1_511_383_163_123)]
fn test_iso_timestamp_forms(parser: SyslogParser, #[case] line: &str, #[case] expected: i64) {
    let record = parser.parse(line.as_bytes()).expect("Should parse");
    assert_eq!(record.timestamp(), expected);
}

#[test]
fn test_fixed_offset_zone() {
    let zone: DeviceZone = "UTC-05:00".parse().unwrap();
    let now = Utc.with_ymd_and_hms(2017, 11, 23, 12, 0, 0).unwrap();
    let parser = SyslogParser::new(&Config::default())
        .expect("Failed to build parser")
        .with_clock(DeviceClock::pinned(zone, now));

    let record = parser.parse(SU_LINE.as_bytes()).expect("Should parse");
    assert_eq!(record.timestamp(), 1_511_401_163_000);
}

#[test]
fn test_invalid_zone_fails_at_startup() {
    let mut config = Config::default();
    config.device.time_zone = Some("Not/AZone".to_string());

    assert!(SyslogParser::new(&config).is_err());
}

#[test]
fn test_parser_shared_across_threads() {
    let parser = Arc::new(sample_parser());

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let parser = Arc::clone(&parser);
            std::thread::spawn(move || {
                parser
                    .parse(SU_LINE.as_bytes())
                    .expect("Should parse")
                    .timestamp()
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), 1_511_383_163_000);
    }
}
