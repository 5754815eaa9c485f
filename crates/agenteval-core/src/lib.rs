//! # agenteval-core
//!
//! Runs the evaluation protocol over a batch of test cases and reduces the
//! scored batch to per-criterion statistics.

mod batch;
mod error;
mod outcome;
mod runner;
mod stats;

pub use batch::{BatchItem, ScoredBatch};
pub use error::{AggregateError, RunError};
pub use outcome::BatchOutcome;
pub use runner::{EvalRunner, DEFAULT_MAX_CONCURRENCY, DEFAULT_MAX_ROUNDS};
pub use stats::{aggregate, AggregateReport, CriterionStats, GroupStats};
