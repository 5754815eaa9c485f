use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Reasons a criterion cannot be constructed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CriterionError {
    #[error("criterion name is empty")]
    EmptyName,

    #[error("criterion `{name}` has no accepted values")]
    NoAcceptedValues { name: String },

    #[error("criterion `{name}` has an empty accepted value")]
    EmptyValue { name: String },

    #[error("criterion `{name}` has accepted value `{value}` with surrounding whitespace")]
    PaddedValue { name: String, value: String },

    #[error("criterion `{name}` lists `{value}` more than once")]
    DuplicateValue { name: String, value: String },

    #[error("criterion `{name}` is defined more than once")]
    DuplicateName { name: String },
}

/// A named evaluation dimension with an ordered, enumerated value domain.
///
/// The position of a label in `accepted_values` is its ordinal score, so the
/// first label is the lowest grade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Criterion {
    name: String,
    description: String,
    accepted_values: Vec<String>,
}

impl Criterion {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        accepted_values: Vec<String>,
    ) -> Result<Self, CriterionError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(CriterionError::EmptyName);
        }
        if accepted_values.is_empty() {
            return Err(CriterionError::NoAcceptedValues { name });
        }
        for (i, value) in accepted_values.iter().enumerate() {
            if value.trim().is_empty() {
                return Err(CriterionError::EmptyValue { name });
            }
            if value.trim() != value {
                return Err(CriterionError::PaddedValue {
                    name,
                    value: value.clone(),
                });
            }
            if accepted_values[..i].contains(value) {
                return Err(CriterionError::DuplicateValue {
                    name,
                    value: value.clone(),
                });
            }
        }

        Ok(Self {
            name,
            description: description.into(),
            accepted_values,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn accepted_values(&self) -> &[String] {
        &self.accepted_values
    }

    /// Ordinal position of `value` in the declared scale
    pub fn ordinal(&self, value: &str) -> Option<usize> {
        self.accepted_values.iter().position(|v| v == value)
    }

    pub fn accepts(&self, value: &str) -> bool {
        self.ordinal(value).is_some()
    }
}

/// The problem being evaluated plus one successful and one failed example.
///
/// Only `name` and `description` are used when scoring new transcripts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub name: String,
    pub description: String,
    pub successful_response: String,
    pub failed_response: String,
}

impl Task {
    /// Check that both example transcripts are present
    pub fn validate_for_synthesis(&self) -> Result<(), String> {
        if self.successful_response.trim().is_empty() {
            return Err("task has an empty successful_response".into());
        }
        if self.failed_response.trim().is_empty() {
            return Err("task has an empty failed_response".into());
        }
        Ok(())
    }
}

/// A transcript to score together with its known outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub instance: String,
    pub actual_success: bool,
}

/// Quantifier output for one test case
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoredRecord {
    /// Criterion name to the selected accepted value
    pub estimated_performance: BTreeMap<String, String>,
    /// Copied from the test case, never shown to the generation service
    pub actual_success: bool,
}
