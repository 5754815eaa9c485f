use agenteval_agent::{GenerationConfig, Generator, Message};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::extract::extract_json;
use crate::round::{check_rounds, RoundCallback, RoundControl, RoundReport, Stage};
use crate::{CriteriaStore, EvalError, QuantifierPrompts, ScoredRecord, Task, TestCase};

/// Why a scoring reply was rejected
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScoreIssue {
    /// No usable JSON object in the reply
    Unparseable { reason: String },
    /// A criterion from the store has no grade
    Missing { criterion: String },
    /// A graded key is not in the store
    Unknown { criterion: String },
    /// The grade is not one of the criterion's accepted values
    OutOfDomain { criterion: String, value: String },
    /// The grade is not text
    NotAString { criterion: String },
}

impl ScoreIssue {
    /// Criterion the issue refers to, if any
    pub fn criterion(&self) -> Option<&str> {
        match self {
            ScoreIssue::Unparseable { .. } => None,
            ScoreIssue::Missing { criterion }
            | ScoreIssue::Unknown { criterion }
            | ScoreIssue::OutOfDomain { criterion, .. }
            | ScoreIssue::NotAString { criterion } => Some(criterion),
        }
    }
}

impl fmt::Display for ScoreIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScoreIssue::Unparseable { reason } => {
                write!(f, "the reply could not be parsed: {}", reason)
            }
            ScoreIssue::Missing { criterion } => write!(f, "criterion `{}` has no grade", criterion),
            ScoreIssue::Unknown { criterion } => {
                write!(f, "`{}` is not one of the criteria", criterion)
            }
            ScoreIssue::OutOfDomain { criterion, value } => write!(
                f,
                "criterion `{}` was graded `{}`, which is not an accepted value",
                criterion, value
            ),
            ScoreIssue::NotAString { criterion } => write!(
                f,
                "criterion `{}` must be graded with one of its accepted values as a string",
                criterion
            ),
        }
    }
}

/// Scores one test case against an existing criteria store
pub struct Quantifier<'a> {
    generator: &'a dyn Generator,
    control: RoundControl,
}

impl<'a> Quantifier<'a> {
    pub fn new(generator: &'a dyn Generator) -> Self {
        Self {
            generator,
            control: RoundControl::default(),
        }
    }

    pub fn with_round_callback(mut self, callback: RoundCallback) -> Self {
        self.control.on_round = Some(callback);
        self
    }

    /// Stop at the next retry boundary once `flag` is raised
    pub fn with_interrupt(mut self, flag: Arc<AtomicBool>) -> Self {
        self.control.interrupt = Some(flag);
        self
    }

    /// Grade `test_case` on every criterion in `store`.
    ///
    /// The outcome label stays out of every request; it is only copied into
    /// the returned record. At most `max_rounds` requests are made.
    pub async fn quantify_criteria(
        &self,
        store: &CriteriaStore,
        task: &Task,
        test_case: &TestCase,
        config: &GenerationConfig,
        max_rounds: usize,
    ) -> Result<ScoredRecord, EvalError> {
        check_rounds(max_rounds)?;
        if store.is_empty() {
            return Err(EvalError::InvalidInput("criteria store is empty".into()));
        }
        if test_case.instance.trim().is_empty() {
            return Err(EvalError::InvalidInput("test case instance is empty".into()));
        }

        let mut history = vec![
            Message::system(QuantifierPrompts::system_message()),
            Message::user(QuantifierPrompts::build_scoring_prompt(
                store,
                task,
                &test_case.instance,
            )),
        ];
        let mut last_issues = Vec::new();

        for round in 1..=max_rounds {
            self.control.check_interrupt(round - 1)?;

            debug!(task = %task.name, round, max_rounds, "Requesting grades");
            let reply = self.generator.respond(&history, config).await?;

            match parse_scores(&reply.content, store) {
                Ok(estimated_performance) => {
                    info!(task = %task.name, round, "Test case quantified");
                    return Ok(ScoredRecord {
                        estimated_performance,
                        actual_success: test_case.actual_success,
                    });
                }
                Err(issues) => {
                    warn!(
                        task = %task.name,
                        round,
                        issues = issues.len(),
                        "Rejected grading reply"
                    );
                    self.control.report(RoundReport {
                        stage: Stage::Quantification,
                        round,
                        max_rounds,
                        issues: issues.iter().map(ToString::to_string).collect(),
                    });
                    history.push(reply);
                    history.push(Message::user(
                        QuantifierPrompts::build_scoring_repair_prompt(store, &issues),
                    ));
                    last_issues = issues;
                }
            }
        }

        Err(EvalError::QuantificationFailure {
            attempts: max_rounds,
            issues: last_issues,
        })
    }
}

/// Convenience wrapper around [`Quantifier::quantify_criteria`]
pub async fn quantify_criteria(
    generator: &dyn Generator,
    store: &CriteriaStore,
    task: &Task,
    test_case: &TestCase,
    config: &GenerationConfig,
    max_rounds: usize,
) -> Result<ScoredRecord, EvalError> {
    Quantifier::new(generator)
        .quantify_criteria(store, task, test_case, config, max_rounds)
        .await
}

/// Validate a grading reply against the store.
///
/// Each grade may be a bare label or `{"value": label, "justification": ...}`;
/// justifications are dropped. The result is exhaustive over the store and
/// every value is inside its criterion's domain, or every problem is listed.
pub(crate) fn parse_scores(
    reply: &str,
    store: &CriteriaStore,
) -> Result<BTreeMap<String, String>, Vec<ScoreIssue>> {
    let json = extract_json(reply, "scores").ok_or_else(|| {
        vec![ScoreIssue::Unparseable {
            reason: "no JSON object with grades was found".into(),
        }]
    })?;
    let grades: serde_json::Map<String, Value> = serde_json::from_str(json).map_err(|e| {
        vec![ScoreIssue::Unparseable {
            reason: e.to_string(),
        }]
    })?;

    let mut issues = Vec::new();
    let mut scores = BTreeMap::new();

    for (name, grade) in &grades {
        let Some(criterion) = store.get(name) else {
            issues.push(ScoreIssue::Unknown {
                criterion: name.clone(),
            });
            continue;
        };

        let value = match grade {
            Value::String(s) => Some(s.as_str()),
            Value::Object(fields) => fields.get("value").and_then(Value::as_str),
            _ => None,
        };

        match value.map(str::trim) {
            Some(v) if criterion.accepts(v) => {
                scores.insert(name.clone(), v.to_string());
            }
            Some(v) => issues.push(ScoreIssue::OutOfDomain {
                criterion: name.clone(),
                value: v.to_string(),
            }),
            None => issues.push(ScoreIssue::NotAString {
                criterion: name.clone(),
            }),
        }
    }

    for name in store.names() {
        if !grades.contains_key(name) {
            issues.push(ScoreIssue::Missing {
                criterion: name.to_string(),
            });
        }
    }

    if issues.is_empty() {
        Ok(scores)
    } else {
        Err(issues)
    }
}
