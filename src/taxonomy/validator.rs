//! Field-name validation against the taxonomy

use super::Taxonomy;
use crate::syslog::FieldMap;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Result of validating a set of field names
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    /// Names that are neither canonical nor a registered alias (strict mode only)
    pub unknown: Vec<String>,
    /// Required canonical keys not present under any of their names
    pub missing: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.unknown.is_empty() && self.missing.is_empty()
    }
}

/// Checks field names against a taxonomy
///
/// Strict by default: any name the taxonomy does not know fails validation.
#[derive(Debug, Clone)]
pub struct FieldValidator {
    taxonomy: Arc<Taxonomy>,
    non_existent_ok: bool,
    required: Vec<String>,
}

impl FieldValidator {
    pub fn new(taxonomy: Arc<Taxonomy>) -> Self {
        Self {
            taxonomy,
            non_existent_ok: false,
            required: Vec::new(),
        }
    }

    /// Accept names the taxonomy does not know
    pub fn non_existent_ok(mut self, ok: bool) -> Self {
        self.non_existent_ok = ok;
        self
    }

    /// Canonical keys that must be present, directly or through an alias
    pub fn require<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn validate<'a, I>(&self, names: I) -> ValidationReport
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut unknown = BTreeSet::new();
        let mut present = BTreeSet::new();

        for name in names {
            match self.taxonomy.resolve(name) {
                Some(canonical) => {
                    present.insert(canonical.to_string());
                }
                None => {
                    if !self.non_existent_ok {
                        unknown.insert(name.to_string());
                    }
                }
            }
        }

        let missing = self
            .required
            .iter()
            .filter(|field| {
                let canonical = self.taxonomy.resolve(field).unwrap_or(field.as_str());
                !present.contains(canonical)
            })
            .cloned()
            .collect();

        ValidationReport {
            unknown: unknown.into_iter().collect(),
            missing,
        }
    }

    pub fn is_valid<'a, I>(&self, names: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.validate(names).is_valid()
    }

    /// Validate the keys of a field mapping
    pub fn validate_fields(&self, fields: &FieldMap) -> ValidationReport {
        self.validate(fields.keys().map(String::as_str))
    }

    pub fn is_valid_record(&self, fields: &FieldMap) -> bool {
        self.validate_fields(fields).is_valid()
    }
}
