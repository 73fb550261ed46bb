//! Per-program message extraction with ordered fallback

use crate::error::Result;
use crate::patterns::{ExtractedFields, FieldValue, Grammar, PatternLibrary};
use crate::syslog::grammars;
use ahash::{HashMap, HashMapExt};

/// Outcome of running the inner grammars against a message body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction<'a> {
    /// No grammars registered for the program
    UnknownProgram,
    /// Every candidate was tried and none matched
    NoMatch { tried: usize },
    /// First candidate (in declared order) that matched
    Matched {
        grammar: &'a str,
        fields: ExtractedFields,
    },
}

/// Compiled candidate grammars keyed by program name
#[derive(Debug, Clone)]
pub struct MessageExtractor {
    programs: HashMap<String, Vec<Grammar>>,
}

impl MessageExtractor {
    /// Compile every grammar named in the program table
    pub fn new(library: &PatternLibrary) -> Result<Self> {
        let mut programs = HashMap::new();
        for program in grammars::programs() {
            let compiled = grammars::candidates(program)
                .unwrap_or_default()
                .iter()
                .map(|name| library.compile(name))
                .collect::<Result<Vec<_>>>()?;
            programs.insert(program.to_string(), compiled);
        }
        Ok(Self { programs })
    }

    /// Extractor over an explicit program table, in the given order
    pub fn with_grammars<I>(table: I) -> Self
    where
        I: IntoIterator<Item = (String, Vec<Grammar>)>,
    {
        Self {
            programs: table.into_iter().collect(),
        }
    }

    pub fn grammar_count(&self) -> usize {
        self.programs.values().map(Vec::len).sum()
    }

    /// Try the candidates for `program` in order; first match wins
    pub fn extract(&self, program: &str, message: &str) -> Extraction<'_> {
        let Some(candidates) = self.programs.get(program) else {
            return Extraction::UnknownProgram;
        };

        let found = candidates
            .iter()
            .find_map(|grammar| grammar.captures(message).map(|fields| (grammar, fields)));

        match found {
            Some((grammar, mut fields)) => {
                lowercase_values(&mut fields);
                tracing::trace!(grammar = grammar.name(), ?fields, "Inner grammar matched");
                Extraction::Matched {
                    grammar: grammar.name(),
                    fields,
                }
            }
            None => Extraction::NoMatch {
                tried: candidates.len(),
            },
        }
    }
}

/// Fields whose values are case-folded for consistent downstream matching
fn folds_case(field: &str) -> bool {
    field == "action" || field.starts_with("protocol") || field.starts_with("user")
}

fn lowercase_values(fields: &mut ExtractedFields) {
    for (field, value) in fields.iter_mut() {
        if let FieldValue::Text(text) = value {
            if folds_case(field) {
                *text = text.to_lowercase();
            }
        }
    }
}
