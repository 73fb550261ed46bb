//! Named-pattern grammar library
//!
//! This module provides:
//! - Grok-style pattern definitions loaded from TOML (`[patterns] NAME = "..."`)
//! - Recursive expansion of `%{NAME}`, `%{NAME:field}` and `%{NAME:field:int}`
//!   references into a single pre-compiled regex
//! - Matching that yields the captured fields by name
//!
//! The syslog definitions used by the parser are bundled from `syslog.toml`.

use crate::error::{Result, SyscimError};
use ahash::HashMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::LazyLock;

const BUNDLED_SYSLOG_PATTERNS: &str = include_str!("syslog.toml");

static REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"%\{(?P<name>[A-Za-z0-9_]+)(?::(?P<field>[A-Za-z0-9_@.\-]+))?(?::(?P<kind>int|string))?\}")
        .expect("reference syntax regex is valid")
});

/// Pattern definitions file structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatternsFile {
    #[serde(default)]
    pub patterns: BTreeMap<String, String>,
}

/// Conversion applied to a captured field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Int,
}

/// Captured field value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Int(i64),
    Text(String),
}

impl FieldValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            FieldValue::Int(_) => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Int(n) => Some(*n),
            FieldValue::Text(_) => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Int(n) => write!(f, "{n}"),
            FieldValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<FieldValue> for serde_json::Value {
    fn from(value: FieldValue) -> Self {
        match value {
            FieldValue::Int(n) => serde_json::Value::from(n),
            FieldValue::Text(s) => serde_json::Value::String(s),
        }
    }
}

/// Fields captured by one grammar match, keyed by field name
pub type ExtractedFields = BTreeMap<String, FieldValue>;

#[derive(Debug, Clone)]
struct FieldSpec {
    field: String,
    kind: FieldKind,
}

/// A compiled grammar: one regex plus the field each capture group feeds
#[derive(Debug, Clone)]
pub struct Grammar {
    name: String,
    regex: Regex,
    fields: Vec<FieldSpec>,
}

impl Grammar {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Match `text`, returning the captured fields or `None` on no match
    ///
    /// Groups that did not take part in the match are left out. When several
    /// groups feed the same field (alternations), the first one that
    /// participated wins.
    pub fn captures(&self, text: &str) -> Option<ExtractedFields> {
        let caps = self.regex.captures(text)?;
        let mut fields = ExtractedFields::new();

        for (idx, spec) in self.fields.iter().enumerate() {
            if fields.contains_key(&spec.field) {
                continue;
            }
            let Some(m) = caps.name(&group_name(idx)) else {
                continue;
            };
            let value = match spec.kind {
                FieldKind::Int => m
                    .as_str()
                    .parse::<i64>()
                    .map(FieldValue::Int)
                    .unwrap_or_else(|_| FieldValue::Text(m.as_str().to_string())),
                FieldKind::Text => FieldValue::Text(m.as_str().to_string()),
            };
            fields.insert(spec.field.clone(), value);
        }

        Some(fields)
    }
}

fn group_name(idx: usize) -> String {
    format!("f{idx}")
}

/// Library of named pattern definitions
#[derive(Debug, Clone, Default)]
pub struct PatternLibrary {
    definitions: HashMap<String, String>,
}

impl PatternLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Library holding the bundled syslog definitions
    pub fn bundled() -> Result<Self> {
        Self::from_toml_str(BUNDLED_SYSLOG_PATTERNS)
    }

    /// Load definitions from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| SyscimError::Io {
            source: e,
            context: format!("Failed to read pattern definitions: {:?}", path),
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse definitions from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: PatternsFile = toml::from_str(content)?;
        let mut library = Self::new();
        for (name, pattern) in file.patterns {
            library.define(name, pattern);
        }
        Ok(library)
    }

    /// Add or replace a definition
    pub fn define(&mut self, name: impl Into<String>, pattern: impl Into<String>) {
        self.definitions.insert(name.into(), pattern.into());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Compile the definition called `name`
    pub fn compile(&self, name: &str) -> Result<Grammar> {
        if !self.contains(name) {
            return Err(SyscimError::Pattern {
                name: name.to_string(),
                message: "no such pattern".to_string(),
            });
        }
        self.compile_as(name, &format!("%{{{name}}}"))
    }

    /// Compile an ad-hoc expression that may reference library definitions
    pub fn compile_expression(&self, expression: &str) -> Result<Grammar> {
        self.compile_as(expression, expression)
    }

    fn compile_as(&self, name: &str, expression: &str) -> Result<Grammar> {
        let mut fields = Vec::new();
        let mut stack = Vec::new();
        let source = self.expand(expression, &mut stack, &mut fields)?;

        let regex = Regex::new(&source).map_err(|e| SyscimError::Pattern {
            name: name.to_string(),
            message: format!("invalid regex: {e}"),
        })?;

        tracing::trace!(pattern = name, regex = %source, "Compiled grammar");

        Ok(Grammar {
            name: name.to_string(),
            regex,
            fields,
        })
    }

    fn expand(
        &self,
        expression: &str,
        stack: &mut Vec<String>,
        fields: &mut Vec<FieldSpec>,
    ) -> Result<String> {
        let mut out = String::with_capacity(expression.len());
        let mut last = 0;

        for caps in REFERENCE.captures_iter(expression) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            let name = &caps["name"];
            out.push_str(&expression[last..whole.start()]);
            last = whole.end();

            if stack.iter().any(|s| s == name) {
                return Err(SyscimError::Pattern {
                    name: name.to_string(),
                    message: format!("recursive reference via {}", stack.join(" -> ")),
                });
            }
            let definition = self.definitions.get(name).ok_or_else(|| SyscimError::Pattern {
                name: stack.last().cloned().unwrap_or_else(|| name.to_string()),
                message: format!("unknown pattern reference %{{{name}}}"),
            })?;

            // Outer field takes its group index before any nested field.
            let slot = caps.name("field").map(|field| {
                let kind = match caps.name("kind").map(|k| k.as_str()) {
                    Some("int") => FieldKind::Int,
                    _ => FieldKind::Text,
                };
                fields.push(FieldSpec {
                    field: field.as_str().to_string(),
                    kind,
                });
                fields.len() - 1
            });

            stack.push(name.to_string());
            let inner = self.expand(definition, stack, fields)?;
            stack.pop();

            match slot {
                Some(idx) => {
                    out.push_str("(?P<");
                    out.push_str(&group_name(idx));
                    out.push('>');
                    out.push_str(&inner);
                    out.push(')');
                }
                None => {
                    out.push_str("(?:");
                    out.push_str(&inner);
                    out.push(')');
                }
            }
        }

        out.push_str(&expression[last..]);
        Ok(out)
    }
}
