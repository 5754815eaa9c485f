use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::ScoredBatch;

/// Result of quantifying a batch of test cases
#[derive(Debug, Serialize)]
pub struct BatchOutcome {
    /// Records for every test case that was scored
    pub scored: ScoredBatch,
    /// Test case id to failure reason
    pub failures: BTreeMap<String, String>,
    /// Ids never started because the run was interrupted
    pub abandoned: Vec<String>,
    pub interrupted: bool,
    pub total_duration_secs: f64,
}

impl BatchOutcome {
    pub(crate) fn new(
        scored: ScoredBatch,
        failures: BTreeMap<String, String>,
        abandoned: Vec<String>,
        interrupted: bool,
        duration: Duration,
    ) -> Self {
        Self {
            scored,
            failures,
            abandoned,
            interrupted,
            total_duration_secs: duration.as_secs_f64(),
        }
    }

    /// Every test case was scored
    pub fn is_complete(&self) -> bool {
        !self.interrupted && self.failures.is_empty() && self.abandoned.is_empty()
    }

    pub fn exit_code(&self) -> i32 {
        if self.interrupted {
            130
        } else if self.failures.is_empty() {
            0
        } else {
            1
        }
    }
}
