use agenteval_agent::{GenerationConfig, Generator, Message};
use serde::Deserialize;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::extract::extract_json;
use crate::round::{check_rounds, RoundCallback, RoundControl, RoundReport, Stage};
use crate::{CriteriaStore, Criterion, CriticPrompts, EvalError, Task};

/// Synthesizes a criteria store from a task's contrasting examples
pub struct Critic<'a> {
    generator: &'a dyn Generator,
    additional_instructions: Option<String>,
    control: RoundControl,
}

impl<'a> Critic<'a> {
    pub fn new(generator: &'a dyn Generator) -> Self {
        Self {
            generator,
            additional_instructions: None,
            control: RoundControl::default(),
        }
    }

    /// Extra guidance appended to the framing message
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.additional_instructions = Some(instructions.into());
        self
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

    /// Ask the generation service for criteria, re-prompting on unusable
    /// replies. At most `max_rounds` requests are made.
    pub async fn generate_criteria(
        &self,
        task: &Task,
        config: &GenerationConfig,
        max_rounds: usize,
    ) -> Result<CriteriaStore, EvalError> {
        check_rounds(max_rounds)?;
        task.validate_for_synthesis().map_err(EvalError::InvalidInput)?;

        let mut history = vec![
            Message::system(CriticPrompts::system_message()),
            Message::user(CriticPrompts::build_synthesis_prompt(
                task,
                self.additional_instructions.as_deref(),
            )),
        ];
        let mut last_reason = String::new();

        for round in 1..=max_rounds {
            self.control.check_interrupt(round - 1)?;

            debug!(task = %task.name, round, max_rounds, "Requesting criteria");
            let reply = self.generator.respond(&history, config).await?;

            match parse_criteria(&reply.content) {
                Ok(store) => {
                    info!(
                        task = %task.name,
                        round,
                        criteria = store.len(),
                        "Criteria synthesized"
                    );
                    return Ok(store);
                }
                Err(reason) => {
                    warn!(task = %task.name, round, reason = %reason, "Rejected criteria reply");
                    self.control.report(RoundReport {
                        stage: Stage::Synthesis,
                        round,
                        max_rounds,
                        issues: vec![reason.clone()],
                    });
                    history.push(reply);
                    history.push(Message::user(
                        CriticPrompts::build_synthesis_repair_prompt(&reason),
                    ));
                    last_reason = reason;
                }
            }
        }

        Err(EvalError::CriteriaSynthesisFailure {
            attempts: max_rounds,
            reason: last_reason,
        })
    }
}

/// Convenience wrapper around [`Critic::generate_criteria`]
pub async fn generate_criteria(
    generator: &dyn Generator,
    task: &Task,
    config: &GenerationConfig,
    max_rounds: usize,
) -> Result<CriteriaStore, EvalError> {
    Critic::new(generator)
        .generate_criteria(task, config, max_rounds)
        .await
}

#[derive(Deserialize)]
struct ProposedCriterion {
    name: String,
    #[serde(default)]
    description: String,
    accepted_values: Vec<String>,
}

/// Parse a critic reply into a validated, non-empty store.
///
/// Accepts the requested array of `{name, description, accepted_values}` or
/// the criteria document form.
pub(crate) fn parse_criteria(reply: &str) -> Result<CriteriaStore, String> {
    let json = extract_json(reply, "criteria")
        .ok_or_else(|| "no JSON criteria list was found in the reply".to_string())?;

    let store = if json.starts_with('[') {
        let proposed: Vec<ProposedCriterion> = serde_json::from_str(json)
            .map_err(|e| format!("the criteria list is not valid: {}", e))?;
        let criteria = proposed
            .into_iter()
            .map(|p| Criterion::new(p.name, p.description, p.accepted_values))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| e.to_string())?;
        CriteriaStore::from_criteria(criteria).map_err(|e| e.to_string())?
    } else {
        CriteriaStore::from_document(json).map_err(|e| e.to_string())?
    };

    if store.is_empty() {
        return Err("the criteria list is empty".into());
    }
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use agenteval_agent::{Role, ScriptedGenerator, ScriptedReply};
    use std::sync::atomic::Ordering;
    use std::sync::Mutex;

    const ACCURACY_REPLY: &str = r#"Comparing the two transcripts, the answer itself decides the outcome.

<criteria>
[{"name": "accuracy", "description": "Whether the final answer is right", "accepted_values": ["incorrect", "correct"]}]
</criteria>"#;

    fn task() -> Task {
        Task {
            name: "arithmetic".into(),
            description: "What is six times seven?".into(),
            successful_response: "Answer: 42 (correct)".into(),
            failed_response: "Answer: 41 (incorrect)".into(),
        }
    }

    #[test]
    fn test_parse_array_form() {
        let store = parse_criteria(ACCURACY_REPLY).unwrap();
        assert_eq!(store.len(), 1);
        let accuracy = store.get("accuracy").unwrap();
        assert_eq!(accuracy.accepted_values(), &["incorrect", "correct"]);
    }

    #[test]
    fn test_parse_document_form() {
        let reply = r#"```json
{"completeness": {"description": "All steps done", "accepted_values": ["none", "partial", "full"]}}
```"#;
        let store = parse_criteria(reply).unwrap();
        assert_eq!(store.ordinal("completeness", "full"), Some(2));
    }

    #[test]
    fn test_parse_rejects_empty_and_invalid_lists() {
        assert!(parse_criteria("<criteria>[]</criteria>").is_err());
        assert!(parse_criteria("I could not think of any criteria.").is_err());
        let duplicate_values = r#"<criteria>[{"name": "a", "description": "", "accepted_values": ["x", "x"]}]</criteria>"#;
        assert!(parse_criteria(duplicate_values).unwrap_err().contains("more than once"));
        let duplicate_names = r#"<criteria>[
            {"name": "a", "description": "", "accepted_values": ["x"]},
            {"name": "a", "description": "", "accepted_values": ["y"]}
        ]</criteria>"#;
        assert!(parse_criteria(duplicate_names).is_err());
        let missing_values = r#"<criteria>[{"name": "a", "description": "d"}]</criteria>"#;
        assert!(parse_criteria(missing_values).unwrap_err().contains("accepted_values"));
    }

    #[tokio::test]
    async fn test_generate_criteria_first_round() {
        let generator = ScriptedGenerator::new([ACCURACY_REPLY]);
        let store = generate_criteria(&generator, &task(), &GenerationConfig::default(), 3)
            .await
            .unwrap();

        let names: Vec<&str> = store.names().collect();
        assert_eq!(names, vec!["accuracy"]);
        assert_eq!(generator.call_count(), 1);

        let request = &generator.requests()[0];
        assert_eq!(request.len(), 2);
        assert_eq!(request[0].role, Role::System);
        assert!(request[1].content.contains("Answer: 42 (correct)"));
        assert!(request[1].content.contains("Answer: 41 (incorrect)"));
    }

    #[tokio::test]
    async fn test_generate_criteria_repairs_after_bad_reply() {
        let generator = ScriptedGenerator::new(["Sorry, here are my thoughts only.", ACCURACY_REPLY]);
        let reports = Arc::new(Mutex::new(Vec::new()));
        let sink = reports.clone();

        let store = Critic::new(&generator)
            .with_round_callback(Arc::new(move |r: &RoundReport| {
                sink.lock().unwrap().push(r.clone());
            }))
            .generate_criteria(&task(), &GenerationConfig::default(), 3)
            .await
            .unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(generator.call_count(), 2);

        let second = &generator.requests()[1];
        assert_eq!(second.len(), 4);
        assert_eq!(second[2].role, Role::Assistant);
        assert!(second[3].content.contains("could not be used"));

        let reports = reports.lock().unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].stage, Stage::Synthesis);
        assert_eq!(reports[0].round, 1);
    }

    #[tokio::test]
    async fn test_generate_criteria_gives_up_after_max_rounds() {
        let generator = ScriptedGenerator::repeating("no structure here");
        let err = generate_criteria(&generator, &task(), &GenerationConfig::default(), 4)
            .await
            .unwrap_err();

        assert!(matches!(err, EvalError::CriteriaSynthesisFailure { attempts: 4, .. }));
        assert_eq!(generator.call_count(), 4);
    }

    #[tokio::test]
    async fn test_transport_errors_propagate_unchanged() {
        let generator = ScriptedGenerator::new(Vec::<String>::new());
        generator.push(ScriptedReply::Fail("timeout talking to backend".into()));
        let err = generate_criteria(&generator, &task(), &GenerationConfig::default(), 3)
            .await
            .unwrap_err();
        assert!(matches!(err, EvalError::Generation(_)));
        assert_eq!(generator.call_count(), 1);
    }

    #[tokio::test]
    async fn test_rejects_invalid_inputs() {
        let generator = ScriptedGenerator::repeating(ACCURACY_REPLY);
        let config = GenerationConfig::default();

        let err = generate_criteria(&generator, &task(), &config, 0).await.unwrap_err();
        assert!(matches!(err, EvalError::InvalidInput(_)));

        let mut empty = task();
        empty.successful_response.clear();
        let err = generate_criteria(&generator, &empty, &config, 3).await.unwrap_err();
        assert!(matches!(err, EvalError::InvalidInput(_)));
        assert_eq!(generator.call_count(), 0);
    }

    #[tokio::test]
    async fn test_interrupt_stops_at_retry_boundary() {
        let generator = ScriptedGenerator::repeating("still nothing");
        let flag = Arc::new(AtomicBool::new(false));
        let raise = flag.clone();

        let err = Critic::new(&generator)
            .with_interrupt(flag)
            .with_round_callback(Arc::new(move |_: &RoundReport| {
                raise.store(true, Ordering::SeqCst);
            }))
            .generate_criteria(&task(), &GenerationConfig::default(), 5)
            .await
            .unwrap_err();

        assert!(matches!(err, EvalError::Cancelled { attempts: 1 }));
        assert_eq!(generator.call_count(), 1);
    }
}
