//! Field taxonomy: canonical field names and their aliases
//!
//! This module provides:
//! - Loading of the canonical → aliases table (filesystem first, bundled copy as fallback)
//! - An inverted alias → canonical index built once at load time
//! - Field renaming (`FieldNormalizer`) and field-name validation (`FieldValidator`)
//!
//! A loaded `Taxonomy` is immutable; share it behind an `Arc`.

mod normalizer;
mod validator;

pub use normalizer::{AliasSuppression, FieldNormalizer};
pub use validator::{FieldValidator, ValidationReport};

use crate::error::{Result, SyscimError};
use ahash::{HashMap, HashMapExt};
use std::collections::BTreeMap;
use std::path::Path;

/// Default location probed on the filesystem before the bundled copy
pub const DEFAULT_TAXONOMY_PATH: &str = "taxonomy/taxonomy.json";

/// Resources compiled into the binary, by file name
const BUNDLED_RESOURCES: &[(&str, &str)] = &[("taxonomy.json", include_str!("taxonomy.json"))];

/// Bundled resource content for `name`, if one exists
pub fn bundled_resource(name: &str) -> Option<&'static str> {
    BUNDLED_RESOURCES
        .iter()
        .find(|(resource, _)| *resource == name)
        .map(|(_, content)| *content)
}

/// Alias → (canonical key, position in the canonical's alias list)
#[derive(Debug, Clone, Default)]
pub struct AliasIndex {
    entries: HashMap<String, (String, usize)>,
}

impl AliasIndex {
    fn build(canonical: &BTreeMap<String, Vec<String>>) -> Result<Self> {
        let mut entries: HashMap<String, (String, usize)> = HashMap::new();

        for (key, aliases) in canonical {
            for (rank, alias) in aliases.iter().enumerate() {
                if alias == key {
                    continue;
                }
                if canonical.contains_key(alias) {
                    return Err(SyscimError::Taxonomy(format!(
                        "alias '{alias}' of '{key}' is itself a canonical key"
                    )));
                }
                match entries.get(alias) {
                    Some((first, _)) if first != key => {
                        return Err(SyscimError::TaxonomyConflict {
                            alias: alias.clone(),
                            first: first.clone(),
                            second: key.clone(),
                        });
                    }
                    // Repeated within the same list: keep the earlier rank
                    Some(_) => {}
                    None => {
                        entries.insert(alias.clone(), (key.clone(), rank));
                    }
                }
            }
        }

        Ok(Self { entries })
    }

    /// Canonical key and alias rank for `alias`
    pub fn lookup(&self, alias: &str) -> Option<(&str, usize)> {
        self.entries
            .get(alias)
            .map(|(canonical, rank)| (canonical.as_str(), *rank))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Canonical field names with their ordered aliases
#[derive(Debug, Clone, Default)]
pub struct Taxonomy {
    canonical: BTreeMap<String, Vec<String>>,
    index: AliasIndex,
}

impl Taxonomy {
    /// Build from a canonical → aliases table, rejecting ambiguous aliases
    pub fn from_map(canonical: BTreeMap<String, Vec<String>>) -> Result<Self> {
        let index = AliasIndex::build(&canonical)?;
        Ok(Self { canonical, index })
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let canonical: BTreeMap<String, Vec<String>> =
            serde_json::from_str(json).map_err(|e| SyscimError::Json {
                source: e,
                context: "Failed to parse taxonomy".to_string(),
            })?;
        Self::from_map(canonical)
    }

    /// Read a taxonomy file, with no fallback
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| SyscimError::Io {
            source: e,
            context: format!("Failed to read taxonomy: {:?}", path),
        })?;
        Self::from_json_str(&content)
    }

    /// Bundled taxonomy shipped with the crate
    pub fn bundled() -> Result<Self> {
        let name = Path::new(DEFAULT_TAXONOMY_PATH)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        let content = bundled_resource(name)
            .ok_or_else(|| SyscimError::Taxonomy(format!("no bundled resource '{name}'")))?;
        Self::from_json_str(content)
    }

    /// Load `path` from the filesystem, else the bundled resource with the same file name
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let taxonomy = Self::from_path(path)?;
            tracing::info!(
                path = %path.display(),
                canonical = taxonomy.len(),
                aliases = taxonomy.index.len(),
                "Taxonomy loaded from filesystem"
            );
            return Ok(taxonomy);
        }

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        let content = bundled_resource(name).ok_or_else(|| {
            SyscimError::Taxonomy(format!(
                "not found at {:?} and no bundled resource named '{}'",
                path, name
            ))
        })?;

        let taxonomy = Self::from_json_str(content)?;
        tracing::info!(
            resource = name,
            canonical = taxonomy.len(),
            aliases = taxonomy.index.len(),
            "Taxonomy loaded from bundled resource"
        );
        Ok(taxonomy)
    }

    pub fn is_canonical(&self, field: &str) -> bool {
        self.canonical.contains_key(field)
    }

    pub fn is_alias(&self, field: &str) -> bool {
        self.index.lookup(field).is_some()
    }

    /// Canonical key or registered alias
    pub fn is_known(&self, field: &str) -> bool {
        self.is_canonical(field) || self.is_alias(field)
    }

    /// Canonical key for `field`, whether it is canonical already or an alias
    pub fn resolve<'a>(&'a self, field: &'a str) -> Option<&'a str> {
        if self.is_canonical(field) {
            return Some(field);
        }
        self.index.lookup(field).map(|(canonical, _)| canonical)
    }

    pub fn aliases(&self, canonical: &str) -> Option<&[String]> {
        self.canonical.get(canonical).map(Vec::as_slice)
    }

    pub fn canonical_keys(&self) -> impl Iterator<Item = &str> {
        self.canonical.keys().map(String::as_str)
    }

    pub fn index(&self) -> &AliasIndex {
        &self.index
    }

    /// Number of canonical keys
    pub fn len(&self) -> usize {
        self.canonical.len()
    }

    pub fn is_empty(&self) -> bool {
        self.canonical.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"{"src_ip": ["srcip", "src_ipaddr"], "dst_ip": ["dstip"]}"#;

    #[test]
    fn test_index_lookup() {
        let taxonomy = Taxonomy::from_json_str(SAMPLE).unwrap();

        assert!(taxonomy.is_canonical("src_ip"));
        assert_eq!(taxonomy.index().lookup("src_ipaddr"), Some(("src_ip", 1)));
        assert_eq!(taxonomy.resolve("dstip"), Some("dst_ip"));
        assert_eq!(taxonomy.resolve("dst_ip"), Some("dst_ip"));
        assert_eq!(taxonomy.resolve("dsti_ip"), None);
        assert_eq!(taxonomy.index().len(), 3);
    }

    #[test]
    fn test_alias_under_two_canonicals_rejected() {
        let err = Taxonomy::from_json_str(r#"{"a": ["x"], "b": ["x"]}"#).unwrap_err();
        match err {
            SyscimError::TaxonomyConflict {
                alias,
                first,
                second,
            } => {
                assert_eq!(alias, "x");
                assert_eq!(first, "a");
                assert_eq!(second, "b");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_alias_that_is_canonical_rejected() {
        assert!(Taxonomy::from_json_str(r#"{"a": ["b"], "b": []}"#).is_err());
    }

    #[test]
    fn test_self_listing_and_repeats_tolerated() {
        let taxonomy = Taxonomy::from_json_str(r#"{"a": ["a", "x", "x"]}"#).unwrap();
        assert_eq!(taxonomy.index().lookup("x"), Some(("a", 1)));
        assert!(!taxonomy.is_alias("a"));
    }

    #[test]
    fn test_load_prefers_filesystem() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("taxonomy.json");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let taxonomy = Taxonomy::load(&path).unwrap();
        assert_eq!(taxonomy.len(), 2);
    }

    #[test]
    fn test_load_falls_back_to_bundled() {
        let dir = tempfile::tempdir().unwrap();
        let taxonomy = Taxonomy::load(&dir.path().join("taxonomy.json")).unwrap();
        assert!(taxonomy.is_canonical("src_ip"));
        assert_eq!(taxonomy.resolve("srcip"), Some("src_ip"));
    }

    #[test]
    fn test_load_without_any_source_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Taxonomy::load(&dir.path().join("custom.json")).is_err());
    }

    #[test]
    fn test_malformed_json_fails() {
        assert!(matches!(
            Taxonomy::from_json_str("{not json"),
            Err(SyscimError::Json { .. })
        ));
    }
}
