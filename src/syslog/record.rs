//! Output record produced for each parsed line

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Field name → value mapping shared by records, the normalizer and the validator
pub type FieldMap = serde_json::Map<String, Value>;

/// Record field names
pub mod fields {
    pub const ORIGINAL: &str = "original_string";
    pub const TIMESTAMP: &str = "timestamp";
    pub const SEVERITY: &str = "syslog_severity";
    pub const FACILITY: &str = "syslog_facility";
    pub const HOSTNAME: &str = "syslog_hostname";
    pub const PROGRAM: &str = "syslog_program";
    pub const PID: &str = "syslog_pid";
    pub const GRAMMAR: &str = "syslog_grammar";
    pub const PARSE_STATUS: &str = "parse_status";

    pub const SRC_ADDR: &str = "ip_src_addr";
    pub const SRC_PORT: &str = "ip_src_port";
    pub const PROTOCOL: &str = "protocol";
}

/// Grammar capture names that map onto standard record fields
pub const CAPTURE_RENAMES: &[(&str, &str)] = &[
    ("src_ip", fields::SRC_ADDR),
    ("port", fields::SRC_PORT),
    ("protocol_ssh", fields::PROTOCOL),
];

/// Why a record carries only envelope fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseStatus {
    /// No inner grammars exist for the program (informational)
    UnknownProgram,
    /// Inner grammars exist but none matched (warning)
    NoGrammarMatch,
}

impl ParseStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ParseStatus::UnknownProgram => "unknown_program",
            ParseStatus::NoGrammarMatch => "no_grammar_match",
        }
    }
}

/// One structured record per input line
///
/// Always carries the original line and the resolved timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutputRecord(FieldMap);

impl OutputRecord {
    pub fn new(original: &str, timestamp_millis: i64) -> Self {
        let mut map = FieldMap::new();
        map.insert(fields::ORIGINAL.to_string(), Value::from(original));
        map.insert(fields::TIMESTAMP.to_string(), Value::from(timestamp_millis));
        Self(map)
    }

    pub fn original_string(&self) -> &str {
        self.0
            .get(fields::ORIGINAL)
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn timestamp(&self) -> i64 {
        self.0
            .get(fields::TIMESTAMP)
            .and_then(Value::as_i64)
            .unwrap_or_default()
    }

    pub fn parse_status(&self) -> Option<ParseStatus> {
        match self.0.get(fields::PARSE_STATUS).and_then(Value::as_str) {
            Some("unknown_program") => Some(ParseStatus::UnknownProgram),
            Some("no_grammar_match") => Some(ParseStatus::NoGrammarMatch),
            _ => None,
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(field.into(), value.into());
    }

    pub fn fields(&self) -> &FieldMap {
        &self.0
    }

    pub fn into_fields(self) -> FieldMap {
        self.0
    }

    pub(crate) fn replace_fields(&mut self, fields: FieldMap) {
        self.0 = fields;
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
