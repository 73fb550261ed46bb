//! syscim - syslog to canonical field records
//!
//! Parses raw syslog lines from heterogeneous devices into structured records
//! and maps vendor-specific field names onto a shared taxonomy, so that every
//! device exposes the same field vocabulary to downstream analytics.

pub mod cli;
pub mod config;
pub mod error;
pub mod patterns;
pub mod syslog;
pub mod taxonomy;

pub use error::{MessageError, Result, SyscimError};
pub use syslog::{OutputRecord, SyslogParser};
pub use taxonomy::{FieldNormalizer, FieldValidator, Taxonomy};
