//! Syslog parsing pipeline
//!
//! This module provides:
//! - Envelope parsing (`<PRI>TIMESTAMP HOST PROGRAM[PID]: MESSAGE`)
//! - Priority decoding into closed severity/facility enums
//! - Year inference for RFC 3164 timestamps against a device clock
//! - Per-program inner grammars tried in declared order
//! - The `SyslogParser` context tying these together

pub mod envelope;
pub mod extractor;
pub mod grammars;
pub mod parser;
pub mod priority;
pub mod record;
pub mod timestamp;

pub use envelope::{Envelope, EnvelopeParser};
pub use extractor::{Extraction, MessageExtractor};
pub use parser::{BatchOutcome, SyslogParser};
pub use priority::{DecodedPriority, Facility, Severity};
pub use record::{FieldMap, OutputRecord, ParseStatus};
pub use timestamp::{DeviceClock, DeviceZone, SyslogTimestamp, TimestampFragment};
