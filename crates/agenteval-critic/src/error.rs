use agenteval_agent::GenerationError;
use thiserror::Error;

use crate::ScoreIssue;

#[derive(Error, Debug)]
pub enum EvalError {
    #[error("Criteria synthesis failed after {attempts} attempt(s): {reason}")]
    CriteriaSynthesisFailure { attempts: usize, reason: String },

    #[error("Quantification failed after {attempts} attempt(s): {}", join_issues(.issues))]
    QuantificationFailure {
        attempts: usize,
        issues: Vec<ScoreIssue>,
    },

    #[error("Malformed criteria document: {0}")]
    MalformedCriteriaDocument(String),

    #[error("Generation service error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Cancelled after {attempts} attempt(s)")]
    Cancelled { attempts: usize },
}

fn join_issues(issues: &[ScoreIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
