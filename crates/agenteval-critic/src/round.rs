use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::EvalError;

/// Which protocol a round belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Synthesis,
    Quantification,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Synthesis => write!(f, "synthesis"),
            Stage::Quantification => write!(f, "quantification"),
        }
    }
}

/// Report for one rejected reply
#[derive(Debug, Clone, Serialize)]
pub struct RoundReport {
    pub stage: Stage,
    /// 1-based round number
    pub round: usize,
    pub max_rounds: usize,
    pub issues: Vec<String>,
}

/// Callback fired after each rejected round
pub type RoundCallback = Arc<dyn Fn(&RoundReport) + Send + Sync>;

/// Shared retry plumbing for the critic and the quantifier
#[derive(Clone, Default)]
pub(crate) struct RoundControl {
    pub(crate) on_round: Option<RoundCallback>,
    pub(crate) interrupt: Option<Arc<AtomicBool>>,
}

impl RoundControl {
    /// Fail with `Cancelled` once the interrupt flag is raised
    pub(crate) fn check_interrupt(&self, attempts: usize) -> Result<(), EvalError> {
        match &self.interrupt {
            Some(flag) if flag.load(Ordering::SeqCst) => Err(EvalError::Cancelled { attempts }),
            _ => Ok(()),
        }
    }

    pub(crate) fn report(&self, report: RoundReport) {
        if let Some(callback) = &self.on_round {
            callback(&report);
        }
    }
}

pub(crate) fn check_rounds(max_rounds: usize) -> Result<(), EvalError> {
    if max_rounds == 0 {
        return Err(EvalError::InvalidInput(
            "max_rounds must be at least 1".into(),
        ));
    }
    Ok(())
}
