use std::borrow::Cow;
use tracing::warn;

use crate::{CriteriaStore, ScoreIssue, Task};

/// Longest transcript embedded in a prompt, in bytes
pub const MAX_TRANSCRIPT_LEN: usize = 40_000;

/// Prompt templates for criteria synthesis
pub struct CriticPrompts;

impl CriticPrompts {
    pub fn system_message() -> &'static str {
        "You are a critic who designs evaluation checklists for the work of autonomous \
         problem-solving agents. You compare example transcripts and distil the qualities \
         that separate good work from poor work into a small set of named criteria."
    }

    /// Build the framing message holding the task and both examples
    pub fn build_synthesis_prompt(task: &Task, additional_instructions: Option<&str>) -> String {
        let mut prompt = format!(
            r#"## Task
Name: {name}
Description:
{description}

## Example A (this attempt succeeded)
```
{success}
```

## Example B (this attempt failed)
```
{failure}
```

---

## What to produce

Propose criteria that a reviewer could use to judge any attempt at this task, including attempts you have not seen. Contrast the two examples to discover which qualities matter, then describe each quality in general terms.

For every criterion give:
- `name`: a short snake_case identifier, unique in your list
- `description`: what is being judged, in one or two sentences
- `accepted_values`: the discrete grades a reviewer may assign, ordered from worst to best, with no duplicates

### Important Rules

- **Do not reveal the labels.** Never mention Example A, Example B, or which example succeeded or failed in any name or description, and do not justify a criterion by pointing at either example.
- **Stay general.** A criterion must make sense for a fresh attempt at the same task.
- **Order matters.** The first accepted value is the lowest grade and the last is the highest.
- Prefer three to seven criteria with two to five accepted values each."#,
            name = task.name,
            description = task.description,
            success = elide_middle(&task.successful_response, MAX_TRANSCRIPT_LEN),
            failure = elide_middle(&task.failed_response, MAX_TRANSCRIPT_LEN),
        );

        if let Some(extra) = additional_instructions.filter(|s| !s.trim().is_empty()) {
            prompt.push_str("\n\n### Additional Instructions\n\n");
            prompt.push_str(extra.trim());
        }

        prompt.push_str(CRITERIA_FORMAT);
        prompt
    }

    /// Follow-up asking for a corrected criteria list
    pub fn build_synthesis_repair_prompt(reason: &str) -> String {
        format!(
            "Your previous reply could not be used: {reason}\n\n\
             Reply again with the complete criteria list. Every criterion needs a unique \
             non-empty name, a description, and a non-empty list of distinct accepted values \
             ordered from worst to best.{format}",
            reason = reason,
            format = CRITERIA_FORMAT,
        )
    }
}

const CRITERIA_FORMAT: &str = r#"

## Required Response Format

End your reply with the criteria as a JSON array inside a criteria block:

<criteria>
[
  {"name": "criterion_name", "description": "What is judged", "accepted_values": ["worst", "middle", "best"]}
]
</criteria>"#;

/// Prompt templates for criteria quantification
pub struct QuantifierPrompts;

impl QuantifierPrompts {
    pub fn system_message() -> &'static str {
        "You are a careful reviewer. You grade one transcript of an agent's work against a \
         fixed checklist, choosing exactly one of the listed grades for every item."
    }

    /// Build the scoring request. Only the task framing, the criteria and the
    /// transcript are included.
    pub fn build_scoring_prompt(store: &CriteriaStore, task: &Task, instance: &str) -> String {
        format!(
            r#"## Task
Name: {name}
Description:
{description}

## Criteria
{criteria}
## Transcript to Grade
```
{instance}
```

---

## Instructions

- Grade the transcript on every criterion listed above, and on nothing else.
- For each criterion choose exactly one of its accepted values, spelled exactly as listed. Never invent a new grade.
- Add a one or two sentence justification for each grade.{format}"#,
            name = task.name,
            description = task.description,
            criteria = render_criteria(store),
            instance = elide_middle(instance, MAX_TRANSCRIPT_LEN),
            format = scores_format(store),
        )
    }

    /// Follow-up naming exactly which criteria were invalid and why
    pub fn build_scoring_repair_prompt(store: &CriteriaStore, issues: &[ScoreIssue]) -> String {
        let mut prompt = String::from("Your previous grades could not be accepted:\n\n");
        for issue in issues {
            prompt.push_str("- ");
            prompt.push_str(&issue.to_string());
            if let Some(criterion) = issue.criterion().and_then(|name| store.get(name)) {
                prompt.push_str(&format!(
                    " (accepted values: {})",
                    quoted_list(criterion.accepted_values())
                ));
            }
            prompt.push('\n');
        }
        prompt.push_str(
            "\nReply again with grades for every criterion, using only the accepted values.",
        );
        prompt.push_str(&scores_format(store));
        prompt
    }
}

fn render_criteria(store: &CriteriaStore) -> String {
    let mut out = String::new();
    for criterion in store {
        out.push_str(&format!(
            "\n### {}\n{}\nAccepted values (worst to best): {}\n",
            criterion.name(),
            criterion.description(),
            quoted_list(criterion.accepted_values())
        ));
    }
    out
}

fn scores_format(store: &CriteriaStore) -> String {
    let example = store
        .iter()
        .map(|c| {
            let value = c.accepted_values().first().map(String::as_str).unwrap_or("");
            format!(
                "  {}: {{\"value\": {}, \"justification\": \"...\"}}",
                serde_json::Value::from(c.name()),
                serde_json::Value::from(value)
            )
        })
        .collect::<Vec<_>>()
        .join(",\n");

    format!(
        "\n\n## Required Response Format\n\n\
         End your reply with a JSON object inside a scores block, one key per criterion:\n\n\
         <scores>\n{{\n{}\n}}\n</scores>",
        example
    )
}

fn quoted_list(values: &[String]) -> String {
    values
        .iter()
        .map(|v| format!("\"{}\"", v))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Keep the head and the tail of an over-long transcript, replacing the
/// middle with a marker that says how much was cut
fn elide_middle(output: &str, max_len: usize) -> Cow<'_, str> {
    if output.len() <= max_len {
        return Cow::Borrowed(output);
    }

    let mut head_end = max_len / 2;
    while !output.is_char_boundary(head_end) {
        head_end -= 1;
    }
    let mut tail_start = output.len() - (max_len - max_len / 2);
    while !output.is_char_boundary(tail_start) {
        tail_start += 1;
    }

    let omitted = tail_start - head_end;
    let kept = output.len() - omitted;
    warn!(
        original_len = output.len(),
        kept_len = kept,
        "Transcript too long for the prompt, eliding the middle"
    );

    Cow::Owned(format!(
        "{}\n[... {} bytes omitted ...]\n{}",
        &output[..head_end],
        omitted,
        &output[tail_start..]
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Criterion;

    fn task() -> Task {
        Task {
            name: "arithmetic".into(),
            description: "What is six times seven?".into(),
            successful_response: "Answer: 42 (correct)".into(),
            failed_response: "Answer: 41 (incorrect)".into(),
        }
    }

    fn store() -> CriteriaStore {
        CriteriaStore::from_criteria([Criterion::new(
            "accuracy",
            "Whether the final answer is right",
            vec!["incorrect".into(), "correct".into()],
        )
        .unwrap()])
        .unwrap()
    }

    #[test]
    fn test_synthesis_prompt_embeds_both_examples() {
        let prompt = CriticPrompts::build_synthesis_prompt(&task(), None);
        assert!(prompt.contains("What is six times seven?"));
        assert!(prompt.contains("Answer: 42 (correct)"));
        assert!(prompt.contains("Answer: 41 (incorrect)"));
        assert!(prompt.contains("<criteria>"));
        assert!(prompt.contains("Do not reveal the labels"));
        assert!(!prompt.contains("Additional Instructions"));
    }

    #[test]
    fn test_synthesis_prompt_appends_instructions() {
        let prompt =
            CriticPrompts::build_synthesis_prompt(&task(), Some("Focus on the reasoning steps."));
        assert!(prompt.contains("### Additional Instructions"));
        assert!(prompt.contains("Focus on the reasoning steps."));
    }

    #[test]
    fn test_scoring_prompt_excludes_examples() {
        let prompt = QuantifierPrompts::build_scoring_prompt(&store(), &task(), "Answer: 42");
        assert!(prompt.contains("Answer: 42"));
        assert!(prompt.contains("\"incorrect\", \"correct\""));
        assert!(!prompt.contains("Answer: 41"));
        assert!(!prompt.contains("(correct)"));
    }

    #[test]
    fn test_repair_prompt_lists_allowed_values() {
        let issues = vec![ScoreIssue::OutOfDomain {
            criterion: "accuracy".into(),
            value: "mostly right".into(),
        }];
        let prompt = QuantifierPrompts::build_scoring_repair_prompt(&store(), &issues);
        assert!(prompt.contains("mostly right"));
        assert!(prompt.contains("accepted values: \"incorrect\", \"correct\""));
    }

    #[test]
    fn test_elide_respects_char_boundaries() {
        let text = "é".repeat(10);
        assert_eq!(elide_middle(&text, 6), "é\n[... 16 bytes omitted ...]\né");
        assert_eq!(elide_middle(&text, 20), text.as_str());
    }

    fn long_transcript(last_line: &str) -> String {
        let mut text = String::from("Starting the task.\n");
        while text.len() < MAX_TRANSCRIPT_LEN + 5_000 {
            text.push_str("step: multiply, carry, check the partial product again\n");
        }
        text.push_str(last_line);
        text
    }

    #[test]
    fn test_long_instance_keeps_its_ending() {
        let instance = long_transcript("FINAL ANSWER: 42");
        let prompt = QuantifierPrompts::build_scoring_prompt(&store(), &task(), &instance);

        assert!(prompt.contains("Starting the task."));
        assert!(prompt.contains("FINAL ANSWER: 42"));
        assert!(prompt.contains("bytes omitted ...]"));
        assert!(prompt.len() < instance.len());
    }

    #[test]
    fn test_long_examples_keep_their_endings() {
        let mut task = task();
        task.successful_response = long_transcript("Answer: 42 (correct)");
        task.failed_response = long_transcript("Answer: 41 (incorrect)");
        let prompt = CriticPrompts::build_synthesis_prompt(&task, None);

        assert!(prompt.contains("Answer: 42 (correct)"));
        assert!(prompt.contains("Answer: 41 (incorrect)"));
        assert_eq!(prompt.matches("bytes omitted ...]").count(), 2);
    }
}
