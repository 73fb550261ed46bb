//! Rename aliased fields to their canonical names

use super::Taxonomy;
use crate::syslog::FieldMap;
use ahash::{HashMap, HashMapExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// What happens to an alias key once its canonical is present in the output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AliasSuppression {
    /// Alias key is removed from the output
    #[default]
    Delete,
    /// Alias key stays in the output with a null value
    Tombstone,
}

/// Applies a taxonomy to field mappings
///
/// Canonical keys pass through, known aliases are renamed to their canonical,
/// and unknown keys pass through untouched. When the canonical is already
/// present its value wins. When several aliases of one canonical are present,
/// the one listed earliest in the taxonomy wins.
#[derive(Debug, Clone)]
pub struct FieldNormalizer {
    taxonomy: Arc<Taxonomy>,
    suppression: AliasSuppression,
}

impl FieldNormalizer {
    pub fn new(taxonomy: Arc<Taxonomy>) -> Self {
        Self {
            taxonomy,
            suppression: AliasSuppression::default(),
        }
    }

    pub fn with_suppression(mut self, suppression: AliasSuppression) -> Self {
        self.suppression = suppression;
        self
    }

    pub fn taxonomy(&self) -> &Taxonomy {
        &self.taxonomy
    }

    pub fn suppression(&self) -> AliasSuppression {
        self.suppression
    }

    /// Produce the normalized mapping; the input is left untouched
    pub fn normalize(&self, input: &FieldMap) -> FieldMap {
        let mut output = FieldMap::new();
        // canonical → (rank, value) of the best alias seen so far
        let mut promoted: HashMap<&str, (usize, &Value)> = HashMap::new();
        let mut alias_keys: Vec<&str> = Vec::new();

        for (key, value) in input {
            if self.taxonomy.is_canonical(key) {
                output.insert(key.clone(), value.clone());
                continue;
            }

            let Some((canonical, rank)) = self.taxonomy.index().lookup(key) else {
                output.insert(key.clone(), value.clone());
                continue;
            };

            alias_keys.push(key);
            if input.contains_key(canonical) {
                continue;
            }
            let earlier = promoted
                .get(canonical)
                .map_or(true, |(best, _)| rank < *best);
            if earlier {
                promoted.insert(canonical, (rank, value));
            }
        }

        for (canonical, (_, value)) in promoted {
            output.insert(canonical.to_string(), value.clone());
        }

        if self.suppression == AliasSuppression::Tombstone {
            for alias in alias_keys {
                output.insert(alias.to_string(), Value::Null);
            }
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use serde_json::json;

    fn taxonomy() -> Arc<Taxonomy> {
        Arc::new(
            Taxonomy::from_json_str(
                r#"{
                    "src_ip": ["srcip", "src_ipaddr", "source_ip"],
                    "dst_ip": ["dstip"],
                    "src_port": ["sport"]
                }"#,
            )
            .unwrap(),
        )
    }

    fn map(value: Value) -> FieldMap {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    #[test]
    fn test_canonical_wins_over_alias() {
        let normalizer = FieldNormalizer::new(taxonomy());
        let input = map(json!({"src_ip": "foo", "srcip": "bar", "timestamp": 7}));

        let output = normalizer.normalize(&input);

        assert_eq!(output, map(json!({"src_ip": "foo", "timestamp": 7})));
    }

    #[test]
    fn test_alias_renamed_when_canonical_absent() {
        let normalizer = FieldNormalizer::new(taxonomy());
        let input = map(json!({"srcip": "bar", "timestamp": 7}));

        let output = normalizer.normalize(&input);

        assert_eq!(output, map(json!({"src_ip": "bar", "timestamp": 7})));
    }

    #[test]
    fn test_unknown_keys_pass_through() {
        let normalizer = FieldNormalizer::new(taxonomy());
        let input = map(json!({"user_su": "root", "action": "session opened"}));

        assert_eq!(normalizer.normalize(&input), input);
    }

    #[test]
    fn test_earliest_listed_alias_wins() {
        let normalizer = FieldNormalizer::new(taxonomy());
        let input = map(json!({"source_ip": "third", "src_ipaddr": "second"}));

        let output = normalizer.normalize(&input);

        assert_eq!(output, map(json!({"src_ip": "second"})));
    }

    #[test]
    fn test_tombstone_keeps_alias_as_null() {
        let normalizer =
            FieldNormalizer::new(taxonomy()).with_suppression(AliasSuppression::Tombstone);
        let input = map(json!({"src_ip": "foo", "srcip": "bar", "sport": 22}));

        let output = normalizer.normalize(&input);

        assert_eq!(
            output,
            map(json!({"src_ip": "foo", "srcip": null, "src_port": 22, "sport": null}))
        );
    }

    #[test]
    fn test_input_not_mutated() {
        let normalizer = FieldNormalizer::new(taxonomy());
        let input = map(json!({"srcip": "bar"}));
        let snapshot = input.clone();

        let _ = normalizer.normalize(&input);

        assert_eq!(input, snapshot);
    }

    #[test]
    fn test_suppression_from_config_string() {
        let parsed: AliasSuppression = serde_json::from_str("\"tombstone\"").unwrap();
        assert_eq!(parsed, AliasSuppression::Tombstone);
        assert_eq!(AliasSuppression::default(), AliasSuppression::Delete);
    }

    fn field_name() -> impl Strategy<Value = String> {
        prop::sample::select(vec![
            "src_ip",
            "srcip",
            "src_ipaddr",
            "source_ip",
            "dst_ip",
            "dstip",
            "sport",
            "src_port",
            "user_su",
            "timestamp",
        ])
        .prop_map(str::to_string)
    }

    proptest! {
        #[test]
        fn prop_normalize_is_idempotent(
            entries in prop::collection::btree_map(field_name(), any::<i32>(), 0..8),
            tombstone in any::<bool>(),
        ) {
            let suppression = if tombstone {
                AliasSuppression::Tombstone
            } else {
                AliasSuppression::Delete
            };
            let normalizer = FieldNormalizer::new(taxonomy()).with_suppression(suppression);
            let input: FieldMap = entries
                .into_iter()
                .map(|(k, v)| (k, Value::from(v)))
                .collect();

            let once = normalizer.normalize(&input);
            let twice = normalizer.normalize(&once);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn prop_no_alias_survives_delete_mode(
            entries in prop::collection::btree_map(field_name(), any::<i32>(), 0..8),
        ) {
            let taxonomy = taxonomy();
            let normalizer = FieldNormalizer::new(Arc::clone(&taxonomy));
            let input: FieldMap = entries
                .into_iter()
                .map(|(k, v)| (k, Value::from(v)))
                .collect();

            let output = normalizer.normalize(&input);
            prop_assert!(output.keys().all(|k| !taxonomy.is_alias(k)));
        }
    }
}
