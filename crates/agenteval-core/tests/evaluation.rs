//! End-to-end evaluation runs against an offline generator.

use agenteval_agent::{GenerationConfig, GenerationError, Generator, Message};
use agenteval_core::{aggregate, BatchItem, EvalRunner, ScoredBatch};
use agenteval_critic::{CriteriaStore, CriticPrompts, EvalError, ScoredRecord, Task, TestCase};
use agenteval_logging::Logger;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

const CRITERIA_REPLY: &str = r#"The two transcripts differ only in the final number.

<criteria>
[{"name": "accuracy", "description": "Whether the stated answer is right", "accepted_values": ["incorrect", "correct"]}]
</criteria>"#;

/// Grades transcripts by looking for the right answer, the way a reviewer
/// following the synthesized checklist would.
#[derive(Default)]
struct AnswerChecker {
    prompts: Mutex<Vec<String>>,
}

impl AnswerChecker {
    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    fn calls_mentioning(&self, needle: &str) -> usize {
        self.prompts()
            .iter()
            .filter(|p| p.contains(needle))
            .count()
    }
}

#[async_trait]
impl Generator for AnswerChecker {
    fn name(&self) -> &str {
        "AnswerChecker"
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn respond(
        &self,
        history: &[Message],
        _config: &GenerationConfig,
    ) -> Result<Message, GenerationError> {
        let first_user = history
            .iter()
            .find(|m| m.role == agenteval_agent::Role::User)
            .ok_or(GenerationError::EmptyConversation)?;
        self.prompts.lock().unwrap().push(
            history
                .iter()
                .map(|m| m.content.as_str())
                .collect::<Vec<_>>()
                .join("\n"),
        );

        let is_critic = history
            .first()
            .map(|m| m.content == CriticPrompts::system_message())
            .unwrap_or(false);
        let reply = if is_critic {
            CRITERIA_REPLY.to_string()
        } else if first_user.content.contains("GARBLED") {
            "I would rather not grade this one.".to_string()
        } else if first_user.content.contains("42") {
            r#"<scores>{"accuracy": {"value": "correct", "justification": "states 42"}}</scores>"#
                .to_string()
        } else {
            r#"<scores>{"accuracy": {"value": "incorrect", "justification": "wrong number"}}</scores>"#
                .to_string()
        };
        Ok(Message::assistant(reply))
    }
}

fn task() -> Task {
    Task {
        name: "arithmetic".into(),
        description: "What is six times seven?".into(),
        successful_response: "Answer: 42 (correct)".into(),
        failed_response: "Answer: 41 (incorrect)".into(),
    }
}

fn case(instance: &str, actual_success: bool) -> TestCase {
    TestCase {
        instance: instance.into(),
        actual_success,
    }
}

fn runner(generator: Arc<AnswerChecker>) -> EvalRunner {
    EvalRunner::new(generator, Arc::new(Logger::quiet()))
        .with_max_rounds(3)
        .with_max_concurrency(2)
}

#[tokio::test]
async fn test_end_to_end_accuracy_scenario() {
    let generator = Arc::new(AnswerChecker::default());
    let runner = runner(generator.clone());
    let config = GenerationConfig::default();

    let store = runner.synthesize(&task(), &config).await.unwrap();
    let names: Vec<&str> = store.names().collect();
    assert_eq!(names, vec!["accuracy"]);
    assert_eq!(
        store.get("accuracy").unwrap().accepted_values(),
        &["incorrect", "correct"]
    );

    let store = Arc::new(store);
    let items = vec![
        BatchItem::new("solved", case("Answer: 42", true)),
        BatchItem::new("solved-verbose", case("After multiplying I get 42.", true)),
        BatchItem::new("missed", case("Answer: 41", false)),
    ];
    let outcome = runner
        .score_batch(store.clone(), Arc::new(task()), items, &config)
        .await;

    assert!(outcome.is_complete());
    assert_eq!(outcome.exit_code(), 0);
    assert_eq!(outcome.scored.len(), 3);

    let solved = outcome.scored.get("solved").unwrap();
    assert_eq!(solved.estimated_performance["accuracy"], "correct");
    assert!(solved.actual_success);
    assert_eq!(store.ordinal("accuracy", "correct"), Some(1));

    let report = aggregate(&store, &outcome.scored).unwrap();
    let accuracy = report.get("accuracy").unwrap();
    assert_eq!(accuracy.success.as_ref().unwrap().mean, 1.0);
    assert_eq!(accuracy.success.as_ref().unwrap().count, 2);
    assert_eq!(accuracy.failure.as_ref().unwrap().mean, 0.0);

    // One synthesis call plus one grading call per test case
    assert_eq!(generator.prompts().len(), 4);
}

#[tokio::test]
async fn test_outcome_labels_never_reach_the_generator() {
    let generator = Arc::new(AnswerChecker::default());
    let runner = runner(generator.clone());
    let config = GenerationConfig::default();
    let store = Arc::new(runner.synthesize(&task(), &config).await.unwrap());

    let items = vec![
        BatchItem::new("a", case("Answer: 42", true)),
        BatchItem::new("b", case("Answer: 40", false)),
    ];
    runner
        .score_batch(store, Arc::new(task()), items, &config)
        .await;

    for prompt in generator.prompts().iter().skip(1) {
        assert!(!prompt.contains("actual_success"));
        assert!(!prompt.contains("true"));
        assert!(!prompt.contains("false"));
        assert!(!prompt.contains("Answer: 41"));
    }
}

#[tokio::test]
async fn test_one_failing_case_does_not_abort_the_batch() {
    let generator = Arc::new(AnswerChecker::default());
    let runner = runner(generator.clone());
    let config = GenerationConfig::default();
    let store = Arc::new(runner.synthesize(&task(), &config).await.unwrap());

    let items = vec![
        BatchItem::new("good", case("Answer: 42", true)),
        BatchItem::new("garbled", case("GARBLED transcript", false)),
        BatchItem::new("bad", case("Answer: 7", false)),
    ];
    let outcome = runner
        .score_batch(store.clone(), Arc::new(task()), items, &config)
        .await;

    assert_eq!(outcome.exit_code(), 1);
    assert_eq!(outcome.scored.len(), 2);
    assert!(outcome.failures["garbled"].contains("3 attempt"));
    assert!(outcome.scored.get("garbled").is_none());
    assert_eq!(generator.calls_mentioning("GARBLED"), 3);

    // The partial batch still aggregates
    let report = aggregate(&store, &outcome.scored).unwrap();
    assert_eq!(report.records, 2);
}

#[test]
fn test_ordinals_depend_only_on_declared_order() {
    let store = CriteriaStore::from_document(
        r#"{"accuracy": {"description": "", "accepted_values": ["incorrect", "partial", "correct"]}}"#,
    )
    .unwrap();
    let record = |value: &str, actual_success| ScoredRecord {
        estimated_performance: BTreeMap::from([("accuracy".to_string(), value.to_string())]),
        actual_success,
    };

    // Same records, but the id order walks the values in opposite directions
    let forward: ScoredBatch = vec![
        ("a".to_string(), record("correct", true)),
        ("b".to_string(), record("partial", true)),
        ("c".to_string(), record("incorrect", false)),
    ]
    .into_iter()
    .collect();
    let backward: ScoredBatch = vec![
        ("a".to_string(), record("incorrect", false)),
        ("b".to_string(), record("partial", true)),
        ("c".to_string(), record("correct", true)),
    ]
    .into_iter()
    .collect();
    assert_ne!(forward, backward);

    let a = aggregate(&store, &forward).unwrap();
    let b = aggregate(&store, &backward).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.get("accuracy").unwrap().success.as_ref().unwrap().mean, 1.5);

    // Reversing the declared scale reverses the ordinals
    let reversed = CriteriaStore::from_document(
        r#"{"accuracy": {"description": "", "accepted_values": ["correct", "partial", "incorrect"]}}"#,
    )
    .unwrap();
    let c = aggregate(&reversed, &forward).unwrap();
    assert_eq!(c.get("accuracy").unwrap().success.as_ref().unwrap().mean, 0.5);
}

#[test]
fn test_documents_survive_a_trip_through_disk() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = CriteriaStore::from_document(
        r#"{
            "tone": {"description": "Register of the reply", "accepted_values": ["rude", "neutral", "polite"]},
            "accuracy": {"description": "", "accepted_values": ["incorrect", "correct"]}
        }"#,
    )
    .unwrap();

    let criteria_path = dir.path().join("criteria.json");
    std::fs::write(&criteria_path, store.to_document().unwrap()).unwrap();
    let loaded = CriteriaStore::from_document(&std::fs::read_to_string(&criteria_path).unwrap())
        .unwrap();
    assert_eq!(loaded, store);
    let names: Vec<&str> = loaded.names().collect();
    assert_eq!(names, vec!["tone", "accuracy"]);

    let mut batch = ScoredBatch::new();
    batch.insert(
        "case-1",
        ScoredRecord {
            estimated_performance: BTreeMap::from([
                ("tone".to_string(), "polite".to_string()),
                ("accuracy".to_string(), "correct".to_string()),
            ]),
            actual_success: true,
        },
    );
    let results_path = dir.path().join("results.json");
    std::fs::write(&results_path, batch.to_json().unwrap()).unwrap();
    let reloaded = ScoredBatch::from_json(&std::fs::read_to_string(&results_path).unwrap()).unwrap();
    assert_eq!(reloaded, batch);
    assert_eq!(
        aggregate(&loaded, &reloaded).unwrap().get("tone").unwrap().success.as_ref().unwrap().mean,
        2.0
    );
}

#[test]
fn test_malformed_criteria_documents_are_rejected() {
    let cases = [
        r#"{"accuracy": {"description": "no values"}}"#,
        r#"{"accuracy": {"description": "", "accepted_values": []}}"#,
        r#"{"accuracy": {"description": "", "accepted_values": ["a", "a"]}}"#,
        r#"["accuracy"]"#,
        "not json at all",
    ];
    for text in cases {
        let err = CriteriaStore::from_document(text).unwrap_err();
        assert!(
            matches!(err, EvalError::MalformedCriteriaDocument(_)),
            "{} gave {:?}",
            text,
            err
        );
    }
}
