//! The criteria store and its persisted JSON document.
//!
//! Document shape, keys in store order:
//!
//! ```json
//! {
//!   "accuracy": {
//!     "description": "Whether the final answer is right",
//!     "accepted_values": ["incorrect", "correct"]
//!   }
//! }
//! ```
//!
//! The document is user-editable. Loading only parses and validates it.

use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::{Criterion, CriterionError, EvalError};

/// Insertion-ordered mapping from criterion name to [`Criterion`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CriteriaStore {
    criteria: Vec<Criterion>,
}

impl CriteriaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store, rejecting repeated names
    pub fn from_criteria<I>(criteria: I) -> Result<Self, CriterionError>
    where
        I: IntoIterator<Item = Criterion>,
    {
        let mut store = Self::new();
        for criterion in criteria {
            store.insert(criterion)?;
        }
        Ok(store)
    }

    pub fn insert(&mut self, criterion: Criterion) -> Result<(), CriterionError> {
        if self.contains(criterion.name()) {
            return Err(CriterionError::DuplicateName {
                name: criterion.name().to_string(),
            });
        }
        self.criteria.push(criterion);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Criterion> {
        self.criteria.iter().find(|c| c.name() == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Criterion> {
        self.criteria.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.criteria.iter().map(Criterion::name)
    }

    pub fn len(&self) -> usize {
        self.criteria.len()
    }

    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }

    /// Ordinal of `value` within the named criterion's declared scale
    pub fn ordinal(&self, criterion: &str, value: &str) -> Option<usize> {
        self.get(criterion).and_then(|c| c.ordinal(value))
    }

    /// Render the store as a pretty-printed criteria document
    pub fn to_document(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Parse and validate a criteria document
    pub fn from_document(text: &str) -> Result<Self, EvalError> {
        serde_json::from_str(text).map_err(|e| EvalError::MalformedCriteriaDocument(e.to_string()))
    }
}

impl<'a> IntoIterator for &'a CriteriaStore {
    type Item = &'a Criterion;
    type IntoIter = std::slice::Iter<'a, Criterion>;

    fn into_iter(self) -> Self::IntoIter {
        self.criteria.iter()
    }
}

#[derive(Serialize)]
struct CriterionBody<'a> {
    description: &'a str,
    accepted_values: &'a [String],
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct CriterionRecord {
    description: String,
    accepted_values: Vec<String>,
}

impl Serialize for CriteriaStore {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.criteria.len()))?;
        for criterion in &self.criteria {
            map.serialize_entry(
                criterion.name(),
                &CriterionBody {
                    description: criterion.description(),
                    accepted_values: criterion.accepted_values(),
                },
            )?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for CriteriaStore {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(StoreVisitor)
    }
}

struct StoreVisitor;

impl<'de> Visitor<'de> for StoreVisitor {
    type Value = CriteriaStore;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map from criterion name to {description, accepted_values}")
    }

    fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        // Entries arrive in document order, which becomes store order
        let mut store = CriteriaStore::new();
        while let Some((name, record)) = access.next_entry::<String, CriterionRecord>()? {
            let criterion = Criterion::new(name, record.description, record.accepted_values)
                .map_err(de::Error::custom)?;
            store.insert(criterion).map_err(de::Error::custom)?;
        }
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn criterion(name: &str, values: &[&str]) -> Criterion {
        Criterion::new(
            name,
            format!("how {} the answer is", name),
            values.iter().map(|v| v.to_string()).collect(),
        )
        .unwrap()
    }

    fn sample_store() -> CriteriaStore {
        CriteriaStore::from_criteria([
            criterion("readability", &["poor", "fair", "good"]),
            criterion("accuracy", &["incorrect", "correct"]),
            criterion("efficiency", &["slow", "acceptable", "fast", "optimal"]),
        ])
        .unwrap()
    }

    #[test]
    fn test_document_round_trip_preserves_order() {
        let store = sample_store();
        let text = store.to_document().unwrap();
        let loaded = CriteriaStore::from_document(&text).unwrap();

        assert_eq!(loaded, store);
        let names: Vec<&str> = loaded.names().collect();
        assert_eq!(names, vec!["readability", "accuracy", "efficiency"]);
        assert_eq!(
            loaded.get("efficiency").unwrap().accepted_values(),
            &["slow", "acceptable", "fast", "optimal"]
        );
    }

    #[test]
    fn test_document_shape() {
        let store = CriteriaStore::from_criteria([criterion("accuracy", &["incorrect", "correct"])])
            .unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&store.to_document().unwrap()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "accuracy": {
                    "description": "how accuracy the answer is",
                    "accepted_values": ["incorrect", "correct"]
                }
            })
        );
    }

    #[test]
    fn test_missing_accepted_values_is_malformed() {
        let text = r#"{
            "accuracy": {"description": "right answer", "accepted_values": ["no", "yes"]},
            "clarity": {"description": "easy to follow"}
        }"#;
        let err = CriteriaStore::from_document(text).unwrap_err();
        match err {
            EvalError::MalformedCriteriaDocument(reason) => {
                assert!(reason.contains("accepted_values"), "{}", reason)
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_description_is_malformed() {
        let text = r#"{"accuracy": {"accepted_values": ["no", "yes"]}}"#;
        assert!(matches!(
            CriteriaStore::from_document(text),
            Err(EvalError::MalformedCriteriaDocument(_))
        ));
    }

    #[test]
    fn test_empty_or_duplicate_values_are_malformed() {
        for text in [
            r#"{"accuracy": {"description": "", "accepted_values": []}}"#,
            r#"{"accuracy": {"description": "", "accepted_values": ["yes", "yes"]}}"#,
            r#"{"accuracy": {"description": "", "accepted_values": ["incorrect ", "correct "]}}"#,
        ] {
            assert!(matches!(
                CriteriaStore::from_document(text),
                Err(EvalError::MalformedCriteriaDocument(_))
            ));
        }
    }

    #[test]
    fn test_non_mapping_documents_are_malformed() {
        for text in [
            "",
            "[]",
            "not json at all",
            r#"{"accuracy": "correct"}"#,
            r#"{"accuracy": {"description": "d", "accepted_values": ["a"], "weight": 2}}"#,
        ] {
            assert!(
                matches!(
                    CriteriaStore::from_document(text),
                    Err(EvalError::MalformedCriteriaDocument(_))
                ),
                "accepted: {text}"
            );
        }
    }

    #[test]
    fn test_repeated_names_are_rejected() {
        let text = r#"{
            "accuracy": {"description": "a", "accepted_values": ["no", "yes"]},
            "accuracy": {"description": "b", "accepted_values": ["no", "yes"]}
        }"#;
        assert!(matches!(
            CriteriaStore::from_document(text),
            Err(EvalError::MalformedCriteriaDocument(_))
        ));

        let mut store = sample_store();
        assert!(matches!(
            store.insert(criterion("accuracy", &["x"])),
            Err(CriterionError::DuplicateName { .. })
        ));
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_store_ordinal_lookup() {
        let store = sample_store();
        assert_eq!(store.ordinal("efficiency", "fast"), Some(2));
        assert_eq!(store.ordinal("efficiency", "blazing"), None);
        assert_eq!(store.ordinal("style", "good"), None);
    }
}
