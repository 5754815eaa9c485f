use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use agenteval_agent::{GenerationConfig, Generator};
use agenteval_critic::{
    CriteriaStore, Critic, EvalError, Quantifier, RoundCallback, RoundReport, ScoredRecord, Task,
};
use agenteval_logging::{LogEvent, Logger};

use crate::error::RunError;
use crate::outcome::BatchOutcome;
use crate::{BatchItem, ScoredBatch};

pub const DEFAULT_MAX_ROUNDS: usize = 3;
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

/// How one spawned quantification ended
enum ItemResult {
    Scored(ScoredRecord),
    Failed(String),
    Abandoned,
}

/// Drives criteria synthesis and batch quantification against one generator
pub struct EvalRunner {
    generator: Arc<dyn Generator>,
    quantifier: Option<Arc<dyn Generator>>,
    logger: Arc<Logger>,
    max_rounds: usize,
    max_concurrency: usize,
    instructions: Option<String>,
    interrupted: Arc<AtomicBool>,
}

impl EvalRunner {
    pub fn new(generator: Arc<dyn Generator>, logger: Arc<Logger>) -> Self {
        Self {
            generator,
            quantifier: None,
            logger,
            max_rounds: DEFAULT_MAX_ROUNDS,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            instructions: None,
            interrupted: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    /// Upper bound on test cases quantified at once (at least 1)
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Grade test cases with a different generator than the one that
    /// synthesizes criteria
    pub fn with_quantifier_generator(mut self, generator: Arc<dyn Generator>) -> Self {
        self.quantifier = Some(generator);
        self
    }

    /// Extra guidance for the critic
    pub fn with_instructions(mut self, instructions: Option<String>) -> Self {
        self.instructions = instructions;
        self
    }

    /// Get a handle to signal interruption
    pub fn interrupt_handle(&self) -> Arc<AtomicBool> {
        self.interrupted.clone()
    }

    pub fn generator_name(&self) -> &str {
        self.generator.name()
    }

    fn round_logger(&self, item: Option<String>) -> RoundCallback {
        let logger = self.logger.clone();
        Arc::new(move |report: &RoundReport| {
            logger.log(&LogEvent::RoundRejected {
                item: item.clone(),
                stage: report.stage.to_string(),
                round: report.round,
                max_rounds: report.max_rounds,
                issues: report.issues.clone(),
            });
        })
    }

    /// Synthesize the criteria store for `task`.
    ///
    /// Must complete before any test case of the task is quantified.
    pub async fn synthesize(
        &self,
        task: &Task,
        config: &GenerationConfig,
    ) -> Result<CriteriaStore, RunError> {
        self.logger.log(&LogEvent::CriteriaStarted {
            task: task.name.clone(),
        });
        let start = Instant::now();

        let mut critic = Critic::new(self.generator.as_ref())
            .with_round_callback(self.round_logger(None))
            .with_interrupt(self.interrupted.clone());
        if let Some(ref instructions) = self.instructions {
            critic = critic.with_instructions(instructions.clone());
        }

        match critic.generate_criteria(task, config, self.max_rounds).await {
            Ok(store) => {
                self.logger.log(&LogEvent::CriteriaSynthesized {
                    criteria: store.names().map(String::from).collect(),
                    duration_secs: start.elapsed().as_secs_f64(),
                });
                Ok(store)
            }
            Err(EvalError::Cancelled { attempts }) => {
                info!(attempts, "Criteria synthesis interrupted");
                self.logger.log(&LogEvent::Interrupted {
                    completed: 0,
                    remaining: 1,
                });
                Err(RunError::Interrupted)
            }
            Err(e) => {
                self.logger.log(&LogEvent::CriteriaFailed {
                    error: e.to_string(),
                });
                Err(e.into())
            }
        }
    }

    /// Quantify every item against `store`.
    ///
    /// Items run concurrently up to the configured bound. A failed item is
    /// recorded in the outcome and never stops the others. Once interrupted,
    /// items that have not started are abandoned and running ones stop at
    /// their next retry boundary.
    pub async fn score_batch(
        &self,
        store: Arc<CriteriaStore>,
        task: Arc<Task>,
        items: Vec<BatchItem>,
        config: &GenerationConfig,
    ) -> BatchOutcome {
        let start = Instant::now();
        let total = items.len();
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let quantifier = self
            .quantifier
            .clone()
            .unwrap_or_else(|| Arc::clone(&self.generator));
        let mut seen = HashSet::new();
        let mut handles = Vec::with_capacity(total);

        debug!(total, max_concurrency = self.max_concurrency, "Scoring batch");

        for (index, item) in items.into_iter().enumerate() {
            if !seen.insert(item.id.clone()) {
                warn!(id = %item.id, "Skipping duplicate test case id");
                continue;
            }

            let generator = Arc::clone(&quantifier);
            let logger = Arc::clone(&self.logger);
            let store = Arc::clone(&store);
            let task = Arc::clone(&task);
            let semaphore = Arc::clone(&semaphore);
            let interrupted = Arc::clone(&self.interrupted);
            let on_round = self.round_logger(Some(item.id.clone()));
            let config = config.clone();
            let max_rounds = self.max_rounds;
            let id = item.id.clone();

            let handle = tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return ItemResult::Abandoned;
                };
                if interrupted.load(Ordering::SeqCst) {
                    return ItemResult::Abandoned;
                }

                logger.log(&LogEvent::QuantifyStarted {
                    item: item.id.clone(),
                    index,
                    total,
                });
                let item_start = Instant::now();

                let result = Quantifier::new(generator.as_ref())
                    .with_round_callback(on_round)
                    .with_interrupt(interrupted)
                    .quantify_criteria(&store, &task, &item.test_case, &config, max_rounds)
                    .await;

                match result {
                    Ok(record) => {
                        logger.log(&LogEvent::QuantifyCompleted {
                            item: item.id.clone(),
                            actual_success: record.actual_success,
                            duration_secs: item_start.elapsed().as_secs_f64(),
                        });
                        ItemResult::Scored(record)
                    }
                    Err(EvalError::Cancelled { .. }) => ItemResult::Abandoned,
                    Err(e) => {
                        logger.log(&LogEvent::QuantifyFailed {
                            item: item.id.clone(),
                            error: e.to_string(),
                        });
                        ItemResult::Failed(e.to_string())
                    }
                }
            });
            handles.push((id, handle));
        }

        let mut scored = ScoredBatch::new();
        let mut failures = BTreeMap::new();
        let mut abandoned = Vec::new();

        for (id, handle) in handles {
            match handle.await {
                Ok(ItemResult::Scored(record)) => {
                    scored.insert(id, record);
                }
                Ok(ItemResult::Failed(reason)) => {
                    failures.insert(id, reason);
                }
                Ok(ItemResult::Abandoned) => abandoned.push(id),
                Err(e) => {
                    warn!(id = %id, error = %e, "Quantification task panicked");
                    failures.insert(id, format!("quantification task failed: {}", e));
                }
            }
        }
        abandoned.sort();

        let interrupted = self.interrupted.load(Ordering::SeqCst);
        if interrupted {
            self.logger.log(&LogEvent::Interrupted {
                completed: scored.len() + failures.len(),
                remaining: abandoned.len(),
            });
        }

        self.logger.log(&LogEvent::BatchCompleted {
            scored: scored.len(),
            failed: failures.len(),
            duration_secs: start.elapsed().as_secs_f64(),
        });
        info!(
            scored = scored.len(),
            failed = failures.len(),
            abandoned = abandoned.len(),
            "Batch finished"
        );

        BatchOutcome::new(scored, failures, abandoned, interrupted, start.elapsed())
    }
}
