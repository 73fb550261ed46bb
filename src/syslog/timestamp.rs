//! Timestamp resolution for syslog headers
//!
//! RFC 3164 headers carry `Mmm dd hh:mm:ss` with no year and no zone. The
//! year is taken from the device clock and corrected backwards when the
//! result would land in the future (a December line read just after New Year).

use crate::error::{Result, SyscimError};
use chrono::{
    DateTime, Datelike, FixedOffset, LocalResult, NaiveDate, NaiveDateTime, Offset, TimeDelta,
    TimeZone, Timelike, Utc,
};
use chrono_tz::Tz;
use std::fmt;
use std::str::FromStr;

/// How far ahead of "now" a resolved timestamp may be before it is moved back a year
pub const FUTURE_TOLERANCE_SECS: i64 = 24 * 60 * 60;

/// Reference leap year so that `Feb 29` survives fragment parsing
const FRAGMENT_PROBE_YEAR: i32 = 2000;

/// Year-less timestamp as found in an RFC 3164 header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimestampFragment {
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
    pub nanosecond: u32,
}

impl TimestampFragment {
    /// Parse `Nov 22 20:39:23`, `Nov  2 20:39:23.417` and similar
    pub fn parse(text: &str) -> std::result::Result<Self, chrono::ParseError> {
        let normalized = text
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .replace(',', ".");
        let probe = format!("{FRAGMENT_PROBE_YEAR} {normalized}");
        let parsed = NaiveDateTime::parse_from_str(&probe, "%Y %b %d %H:%M:%S%.f")?;

        Ok(Self {
            month: parsed.month(),
            day: parsed.day(),
            hour: parsed.hour(),
            minute: parsed.minute(),
            second: parsed.second(),
            nanosecond: parsed.nanosecond(),
        })
    }

    /// Local date-time for this fragment in `year`, if that date exists
    pub fn at_year(&self, year: i32) -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(year, self.month, self.day)?.and_hms_nano_opt(
            self.hour,
            self.minute,
            self.second,
            self.nanosecond,
        )
    }
}

impl fmt::Display for TimestampFragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}-{:02} {:02}:{:02}:{:02}",
            self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

/// Timestamp carried by an envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyslogTimestamp {
    /// RFC 3164 fragment; needs a year from the device clock
    Partial(TimestampFragment),
    /// ISO 8601 with an explicit offset
    Zoned(DateTime<FixedOffset>),
    /// ISO 8601 without an offset; interpreted in the device zone
    Local(NaiveDateTime),
}

impl SyslogTimestamp {
    pub fn parse(text: &str) -> std::result::Result<Self, chrono::ParseError> {
        let text = text.trim();
        if !text.starts_with(|c: char| c.is_ascii_digit()) {
            return TimestampFragment::parse(text).map(SyslogTimestamp::Partial);
        }

        let iso = text.replacen(' ', "T", 1).replace(',', ".");
        if let Ok(dt) = DateTime::parse_from_rfc3339(&iso) {
            return Ok(SyslogTimestamp::Zoned(dt));
        }
        for format in ["%Y-%m-%dT%H:%M:%S%.f%#z", "%Y-%m-%dT%H:%M%#z"] {
            if let Ok(dt) = DateTime::parse_from_str(&iso, format) {
                return Ok(SyslogTimestamp::Zoned(dt));
            }
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(&iso, "%Y-%m-%dT%H:%M:%S%.f") {
            return Ok(SyslogTimestamp::Local(naive));
        }
        NaiveDateTime::parse_from_str(&iso, "%Y-%m-%dT%H:%M").map(SyslogTimestamp::Local)
    }
}

impl fmt::Display for SyslogTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyslogTimestamp::Partial(fragment) => fragment.fmt(f),
            SyslogTimestamp::Zoned(dt) => write!(f, "{}", dt.to_rfc3339()),
            SyslogTimestamp::Local(naive) => write!(f, "{}", naive.format("%Y-%m-%dT%H:%M:%S%.f")),
        }
    }
}

/// Zone the device writes its local timestamps in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceZone {
    Named(Tz),
    Fixed(FixedOffset),
}

impl DeviceZone {
    pub fn utc() -> Self {
        DeviceZone::Fixed(Utc.fix())
    }

    /// Calendar year at `instant` as seen on the device
    pub fn year_at(&self, instant: DateTime<Utc>) -> i32 {
        match self {
            DeviceZone::Named(tz) => instant.with_timezone(tz).year(),
            DeviceZone::Fixed(offset) => instant.with_timezone(offset).year(),
        }
    }

    /// Map a device-local date-time to UTC
    ///
    /// Ambiguous local times (DST overlap) resolve to the earlier instant.
    /// Local times inside a DST gap are read with the offset in effect before
    /// the gap, which moves them forward by the gap length (`02:30` on a
    /// spring-forward night becomes `03:30` daylight time). `None` only when
    /// the result is outside chrono's range.
    pub fn localize(&self, naive: &NaiveDateTime) -> Option<DateTime<Utc>> {
        match self {
            DeviceZone::Named(tz) => match tz.from_local_datetime(naive) {
                LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => {
                    Some(dt.with_timezone(&Utc))
                }
                LocalResult::None => {
                    let before = tz
                        .offset_from_utc_datetime(&naive.checked_sub_signed(TimeDelta::days(1))?)
                        .fix();
                    tracing::debug!(
                        local = %naive,
                        zone = tz.name(),
                        "Local time in DST gap; shifting forward"
                    );
                    before
                        .from_local_datetime(naive)
                        .single()
                        .map(|dt| dt.with_timezone(&Utc))
                }
            },
            DeviceZone::Fixed(offset) => offset
                .from_local_datetime(naive)
                .single()
                .map(|dt| dt.with_timezone(&Utc)),
        }
    }
}

impl Default for DeviceZone {
    fn default() -> Self {
        Self::utc()
    }
}

impl fmt::Display for DeviceZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceZone::Named(tz) => write!(f, "{}", tz.name()),
            DeviceZone::Fixed(offset) => write!(f, "{offset}"),
        }
    }
}

impl FromStr for DeviceZone {
    type Err = SyscimError;

    /// Accepts `UTC`, `Z`, `GMT`, `UTC-05:00`, `GMT+2`, `+0530` or an IANA name
    fn from_str(s: &str) -> Result<Self> {
        let zone = s.trim();
        let invalid = |message: &str| SyscimError::InvalidTimeZone {
            zone: s.to_string(),
            message: message.to_string(),
        };

        if zone.is_empty() {
            return Err(invalid("empty zone identifier"));
        }
        if matches!(zone, "UTC" | "UT" | "GMT" | "Z") {
            return Ok(Self::utc());
        }

        for prefix in ["UTC", "GMT", "UT"] {
            if let Some(rest) = zone.strip_prefix(prefix) {
                if rest.starts_with(['+', '-']) {
                    return parse_offset(rest)
                        .map(DeviceZone::Fixed)
                        .ok_or_else(|| invalid("malformed UTC offset"));
                }
            }
        }
        if zone.starts_with(['+', '-']) {
            return parse_offset(zone)
                .map(DeviceZone::Fixed)
                .ok_or_else(|| invalid("malformed UTC offset"));
        }

        zone.parse::<Tz>()
            .map(DeviceZone::Named)
            .map_err(|e| invalid(&e.to_string()))
    }
}

/// `+05:00`, `-0500`, `+5`, `-5:30`
fn parse_offset(text: &str) -> Option<FixedOffset> {
    let (sign, rest) = match text.as_bytes().first()? {
        b'+' => (1, &text[1..]),
        b'-' => (-1, &text[1..]),
        _ => return None,
    };
    let (hours, minutes) = match rest.split_once(':') {
        Some(parts) => parts,
        None if rest.len() > 2 => rest.split_at(rest.len() - 2),
        None => (rest, "0"),
    };

    let all_digits = |s: &str| !s.is_empty() && s.len() <= 2 && s.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(hours) || !all_digits(minutes) {
        return None;
    }
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if hours > 18 || minutes > 59 {
        return None;
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// Device zone plus the "now" reference used for year inference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceClock {
    zone: DeviceZone,
    pinned_now: Option<DateTime<Utc>>,
}

impl DeviceClock {
    /// Clock reading the system time on every call
    pub fn system(zone: DeviceZone) -> Self {
        Self {
            zone,
            pinned_now: None,
        }
    }

    pub fn utc() -> Self {
        Self::system(DeviceZone::utc())
    }

    /// Clock frozen at `now`, for replaying archives and for tests
    pub fn pinned(zone: DeviceZone, now: DateTime<Utc>) -> Self {
        Self {
            zone,
            pinned_now: Some(now),
        }
    }

    /// Build from an optional zone setting; absence falls back to UTC
    pub fn from_zone_setting(setting: Option<&str>) -> Result<Self> {
        match setting {
            Some(zone) => Ok(Self::system(zone.parse()?)),
            None => {
                tracing::warn!("No device time zone provided; defaulting to UTC");
                Ok(Self::utc())
            }
        }
    }

    pub fn zone(&self) -> DeviceZone {
        self.zone
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.pinned_now.unwrap_or_else(Utc::now)
    }

    /// Resolve a year-less fragment, stepping back a year if it lands in the future
    ///
    /// A date that does not exist in the current year (`Feb 29`) also steps
    /// back. `None` only when the previous year has no such date either.
    pub fn resolve_fragment(&self, fragment: &TimestampFragment) -> Option<DateTime<Utc>> {
        let now = self.now();
        let year = self.zone.year_at(now);
        let limit = now + TimeDelta::seconds(FUTURE_TOLERANCE_SECS);

        match fragment.at_year(year).and_then(|naive| self.zone.localize(&naive)) {
            Some(candidate) if candidate <= limit => return Some(candidate),
            Some(_) => tracing::debug!(
                fragment = %fragment,
                year = year - 1,
                "Timestamp in the future; assuming previous year"
            ),
            None => tracing::debug!(
                fragment = %fragment,
                year = year - 1,
                "Date does not exist in the current year; assuming previous year"
            ),
        }

        self.zone.localize(&fragment.at_year(year - 1)?)
    }

    pub fn resolve(&self, timestamp: &SyslogTimestamp) -> Option<DateTime<Utc>> {
        match timestamp {
            SyslogTimestamp::Partial(fragment) => self.resolve_fragment(fragment),
            SyslogTimestamp::Zoned(dt) => Some(dt.with_timezone(&Utc)),
            SyslogTimestamp::Local(naive) => self.zone.localize(naive),
        }
    }

    /// Resolve straight to epoch milliseconds (UTC)
    pub fn resolve_millis(&self, timestamp: &SyslogTimestamp) -> Option<i64> {
        self.resolve(timestamp).map(|dt| dt.timestamp_millis())
    }
}

impl Default for DeviceClock {
    fn default() -> Self {
        Self::utc()
    }
}
