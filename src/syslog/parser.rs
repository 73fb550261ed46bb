//! Per-line pipeline: envelope → priority + timestamp → inner grammar → normalizer

use crate::config::Config;
use crate::error::{MessageError, Result};
use crate::patterns::PatternLibrary;
use crate::syslog::envelope::{Envelope, EnvelopeParser};
use crate::syslog::extractor::{Extraction, MessageExtractor};
use crate::syslog::priority::DecodedPriority;
use crate::syslog::record::{fields, OutputRecord, ParseStatus, CAPTURE_RENAMES};
use crate::syslog::timestamp::DeviceClock;
use crate::taxonomy::{FieldNormalizer, Taxonomy};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Records and per-message failures from one batch
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub records: Vec<OutputRecord>,
    pub failures: Vec<MessageError>,
}

impl BatchOutcome {
    pub fn total(&self) -> usize {
        self.records.len() + self.failures.len()
    }
}

/// Immutable processing context, built once and shared across workers
///
/// Parsing never mutates the context, so one instance can be wrapped in an
/// `Arc` and called from any number of threads.
#[derive(Debug, Clone)]
pub struct SyslogParser {
    envelope: EnvelopeParser,
    extractor: MessageExtractor,
    normalizer: Option<FieldNormalizer>,
    clock: DeviceClock,
}

impl SyslogParser {
    /// Build from configuration: bundled grammars, device clock and taxonomy
    pub fn new(config: &Config) -> Result<Self> {
        let library = PatternLibrary::bundled()?;
        let clock = DeviceClock::from_zone_setting(config.device.time_zone.as_deref())?;

        let normalizer = if config.normalization.apply_on_parse {
            let taxonomy = Arc::new(Taxonomy::load(&config.taxonomy.path)?);
            Some(
                FieldNormalizer::new(taxonomy)
                    .with_suppression(config.normalization.alias_suppression),
            )
        } else {
            None
        };

        Self::from_parts(&library, clock, normalizer)
    }

    /// Build from already-loaded parts
    pub fn from_parts(
        library: &PatternLibrary,
        clock: DeviceClock,
        normalizer: Option<FieldNormalizer>,
    ) -> Result<Self> {
        let envelope = EnvelopeParser::new(library)?;
        let extractor = MessageExtractor::new(library)?;

        info!(
            grammars = extractor.grammar_count(),
            zone = %clock.zone(),
            normalize = normalizer.is_some(),
            "Syslog parser initialized"
        );

        Ok(Self {
            envelope,
            extractor,
            normalizer,
            clock,
        })
    }

    /// Replace the device clock
    pub fn with_clock(mut self, clock: DeviceClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn clock(&self) -> &DeviceClock {
        &self.clock
    }

    pub fn normalizer(&self) -> Option<&FieldNormalizer> {
        self.normalizer.as_ref()
    }

    /// Parse one raw line
    pub fn parse(&self, raw: &[u8]) -> std::result::Result<OutputRecord, MessageError> {
        let line = std::str::from_utf8(raw).map_err(|_| MessageError::NonUtf8 {
            raw_text: String::from_utf8_lossy(raw).into_owned(),
        })?;
        self.parse_line(line)
    }

    pub fn parse_line(&self, line: &str) -> std::result::Result<OutputRecord, MessageError> {
        let line = line.trim_end_matches(['\r', '\n']);
        debug!(line, "Parsing syslog line");

        let envelope = self.envelope.parse(line)?;

        let priority = DecodedPriority::decode(envelope.priority_raw).map_err(|e| {
            MessageError::InvalidPriority {
                priority: e.0,
                raw_text: line.to_string(),
            }
        })?;

        let timestamp = self
            .clock
            .resolve_millis(&envelope.timestamp)
            .ok_or_else(|| MessageError::InvalidTimestamp {
                fragment: envelope.timestamp.to_string(),
                raw_text: line.to_string(),
            })?;

        let mut record = envelope_record(line, timestamp, priority, &envelope);

        match envelope.program.as_deref() {
            Some(program) => self.enrich(&mut record, program, &envelope.message),
            None => {
                info!("No program in envelope; skipping inner grammars");
                record.insert(fields::PARSE_STATUS, ParseStatus::UnknownProgram.as_str());
            }
        }

        if let Some(normalizer) = &self.normalizer {
            let normalized = normalizer.normalize(record.fields());
            record.replace_fields(normalized);
        }

        Ok(record)
    }

    /// Parse many lines; per-message failures are collected, never fatal
    pub fn parse_batch<I, L>(&self, lines: I) -> BatchOutcome
    where
        I: IntoIterator<Item = L>,
        L: AsRef<[u8]>,
    {
        let mut outcome = BatchOutcome::default();
        for line in lines {
            match self.parse(line.as_ref()) {
                Ok(record) => outcome.records.push(record),
                Err(e) => {
                    warn!(error = %e, "Skipping message");
                    outcome.failures.push(e);
                }
            }
        }
        outcome
    }

    fn enrich(&self, record: &mut OutputRecord, program: &str, message: &str) {
        match self.extractor.extract(program, message) {
            Extraction::Matched { grammar, fields: captures } => {
                record.insert(fields::GRAMMAR, grammar);
                for (name, value) in captures {
                    let target = CAPTURE_RENAMES
                        .iter()
                        .find(|(from, _)| *from == name)
                        .map_or(name.as_str(), |(_, to)| *to);
                    record.insert(target, Value::from(value));
                }
            }
            Extraction::UnknownProgram => {
                info!(program, "No inner grammars for program");
                record.insert(fields::PARSE_STATUS, ParseStatus::UnknownProgram.as_str());
            }
            Extraction::NoMatch { tried } => {
                warn!(program, tried, message, "No inner grammar matched");
                record.insert(fields::PARSE_STATUS, ParseStatus::NoGrammarMatch.as_str());
            }
        }
    }
}

fn envelope_record(
    line: &str,
    timestamp: i64,
    priority: DecodedPriority,
    envelope: &Envelope,
) -> OutputRecord {
    let mut record = OutputRecord::new(line, timestamp);
    record.insert(fields::SEVERITY, priority.severity.as_str());
    record.insert(fields::FACILITY, priority.facility.as_str());
    if let Some(host) = &envelope.hostname {
        record.insert(fields::HOSTNAME, host.as_str());
    }
    if let Some(program) = &envelope.program {
        record.insert(fields::PROGRAM, program.as_str());
    }
    if let Some(pid) = envelope.pid {
        record.insert(fields::PID, pid);
    }
    record
}
