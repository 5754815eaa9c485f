use agenteval_critic::{ScoredRecord, TestCase};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A test case with the id it is reported under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchItem {
    pub id: String,
    pub test_case: TestCase,
}

impl BatchItem {
    pub fn new(id: impl Into<String>, test_case: TestCase) -> Self {
        Self {
            id: id.into(),
            test_case,
        }
    }
}

/// Scored records keyed by test case id.
///
/// Serialized as a JSON object of id to `ScoredRecord`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScoredBatch {
    records: BTreeMap<String, ScoredRecord>,
}

impl ScoredBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record, returning the one it replaced
    pub fn insert(&mut self, id: impl Into<String>, record: ScoredRecord) -> Option<ScoredRecord> {
        self.records.insert(id.into(), record)
    }

    pub fn get(&self, id: &str) -> Option<&ScoredRecord> {
        self.records.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ScoredRecord)> {
        self.records.iter().map(|(id, record)| (id.as_str(), record))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

impl FromIterator<(String, ScoredRecord)> for ScoredBatch {
    fn from_iter<I: IntoIterator<Item = (String, ScoredRecord)>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}
