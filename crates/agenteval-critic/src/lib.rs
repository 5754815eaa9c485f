//! # agenteval-critic
//!
//! The two-stage evaluation protocol.
//!
//! - [`Critic`] turns a [`Task`] with one successful and one failed example
//!   into a [`CriteriaStore`].
//! - [`Quantifier`] grades a [`TestCase`] against that store and returns a
//!   [`ScoredRecord`].
//!
//! Replies from the generation service are untrusted: both stages extract and
//! validate the structured payload and re-prompt with a corrective message,
//! up to `max_rounds` requests in total.

mod critic;
mod error;
pub mod extract;
mod model;
mod prompts;
mod quantifier;
mod round;
mod store;

pub use critic::{generate_criteria, Critic};
pub use error::EvalError;
pub use model::{Criterion, CriterionError, ScoredRecord, Task, TestCase};
pub use prompts::{CriticPrompts, QuantifierPrompts, MAX_TRANSCRIPT_LEN};
pub use quantifier::{quantify_criteria, Quantifier, ScoreIssue};
pub use round::{RoundCallback, RoundReport, Stage};
pub use store::CriteriaStore;
