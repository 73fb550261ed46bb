//! Outer syslog envelope: `<PRI>TIMESTAMP [HOST] [PROGRAM[PID]:] MESSAGE`

use crate::error::{MessageError, Result};
use crate::patterns::{FieldValue, Grammar, PatternLibrary};
use crate::syslog::timestamp::SyslogTimestamp;

/// Library definition applied to every raw line
pub const ENVELOPE_PATTERN: &str = "GENERAL_SYSLOG";

/// Parsed syslog header and body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Priority exactly as written; range checking happens in the decoder
    pub priority_raw: i64,
    pub timestamp: SyslogTimestamp,
    pub hostname: Option<String>,
    pub program: Option<String>,
    pub pid: Option<i64>,
    pub message: String,
}

/// Applies the envelope grammar to raw lines
#[derive(Debug, Clone)]
pub struct EnvelopeParser {
    grammar: Grammar,
}

impl EnvelopeParser {
    /// Compile the envelope grammar from `library`
    pub fn new(library: &PatternLibrary) -> Result<Self> {
        Ok(Self {
            grammar: library.compile(ENVELOPE_PATTERN)?,
        })
    }

    /// Split a single log line into its envelope parts
    pub fn parse(&self, line: &str) -> std::result::Result<Envelope, MessageError> {
        let no_match = || MessageError::EnvelopeNoMatch {
            raw_text: line.to_string(),
        };

        let mut fields = self.grammar.captures(line).ok_or_else(no_match)?;
        tracing::trace!(?fields, "Envelope captures");

        let priority_raw = match fields.remove("syslog_pri") {
            Some(FieldValue::Int(pri)) => pri,
            _ => return Err(no_match()),
        };

        let timestamp_text = match fields.remove("syslog_timestamp") {
            Some(FieldValue::Text(text)) => text,
            _ => return Err(no_match()),
        };
        let timestamp =
            SyslogTimestamp::parse(&timestamp_text).map_err(|_| MessageError::InvalidTimestamp {
                fragment: timestamp_text.clone(),
                raw_text: line.to_string(),
            })?;

        let text = |value: Option<FieldValue>| match value {
            Some(FieldValue::Text(s)) if !s.is_empty() => Some(s),
            _ => None,
        };
        let hostname = text(fields.remove("syslog_hostname"));
        let program = text(fields.remove("syslog_program"));
        let pid = fields.remove("syslog_pid").and_then(|v| v.as_i64());
        let message = text(fields.remove("syslog_message")).unwrap_or_default();

        Ok(Envelope {
            priority_raw,
            timestamp,
            hostname,
            program,
            pid,
            message,
        })
    }
}
