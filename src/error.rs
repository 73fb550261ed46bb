use std::path::PathBuf;
use thiserror::Error;

/// Main error type for syscim startup and configuration
///
/// Anything in here is fatal to building a parser. Failures scoped to a single
/// log line are reported through [`MessageError`] instead.
#[derive(Error, Debug)]
pub enum SyscimError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration validation errors
    #[error("Configuration validation failed: {errors:?}")]
    ConfigValidation { errors: Vec<ValidationError> },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Invalid configuration value
    #[error("Invalid configuration value at {path}: {message}")]
    InvalidConfigValue { path: String, message: String },

    /// Device time zone could not be understood
    #[error("Invalid device time zone '{zone}': {message}")]
    InvalidTimeZone { zone: String, message: String },

    /// Pattern definition errors (unknown reference, bad regex, cycles)
    #[error("Pattern error in '{name}': {message}")]
    Pattern { name: String, message: String },

    /// Taxonomy resource errors
    #[error("Taxonomy error: {0}")]
    Taxonomy(String),

    /// Alias registered under more than one canonical key
    #[error("Alias '{alias}' is claimed by both '{first}' and '{second}'")]
    TaxonomyConflict {
        alias: String,
        first: String,
        second: String,
    },

    /// IO errors
    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },

    /// TOML deserialization errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),

    /// JSON errors
    #[error("JSON error: {context}: {source}")]
    Json {
        source: serde_json::Error,
        context: String,
    },
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Path to the configuration key that failed validation
    pub path: String,
    /// Error message describing the validation failure
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Per-message failure. Fatal for the offending line only.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MessageError {
    /// Input bytes were not UTF-8
    #[error("Message is not valid UTF-8: '{raw_text}'")]
    NonUtf8 { raw_text: String },

    /// The syslog envelope grammar could not be applied
    #[error("Message '{raw_text}' does not match the syslog envelope")]
    EnvelopeNoMatch { raw_text: String },

    /// Priority outside 0..=191
    #[error("Priority {priority} is outside 0..=191 in message '{raw_text}'")]
    InvalidPriority { priority: i64, raw_text: String },

    /// Timestamp fragment could not be turned into an instant
    #[error("Cannot resolve timestamp '{fragment}' in message '{raw_text}'")]
    InvalidTimestamp { fragment: String, raw_text: String },
}

impl MessageError {
    /// Offending raw line, for diagnostics and quarantine
    pub fn raw_text(&self) -> &str {
        match self {
            MessageError::NonUtf8 { raw_text }
            | MessageError::EnvelopeNoMatch { raw_text }
            | MessageError::InvalidPriority { raw_text, .. }
            | MessageError::InvalidTimestamp { raw_text, .. } => raw_text,
        }
    }
}

/// Result type for syscim operations
pub type Result<T> = std::result::Result<T, SyscimError>;
