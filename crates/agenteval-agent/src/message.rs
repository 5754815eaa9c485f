use serde::{Deserialize, Serialize};

/// Role of a conversation participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// A single role-tagged message in a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Flatten a conversation into one prompt for backends that only take a single
/// prompt argument.
///
/// A history holding one user message is passed through verbatim. Longer
/// histories are rendered as labelled sections so the backend sees earlier
/// replies and the corrective follow-ups.
pub fn render_transcript(history: &[Message]) -> String {
    if let [only] = history {
        if only.role == Role::User {
            return only.content.clone();
        }
    }

    let mut out = String::new();
    for message in history {
        let heading = match message.role {
            Role::System => "## Instructions",
            Role::User => "## User",
            Role::Assistant => "## Your previous reply",
        };
        out.push_str(heading);
        out.push_str("\n\n");
        out.push_str(message.content.trim_end());
        out.push_str("\n\n");
    }
    out.push_str("Reply to the last user message above.");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_user_message_passes_through() {
        let history = vec![Message::user("score this")];
        assert_eq!(render_transcript(&history), "score this");
    }

    #[test]
    fn test_multi_turn_history_keeps_order() {
        let history = vec![
            Message::system("be strict"),
            Message::user("first"),
            Message::assistant("reply"),
            Message::user("fix it"),
        ];
        let rendered = render_transcript(&history);

        let system = rendered.find("be strict").unwrap();
        let first = rendered.find("first").unwrap();
        let reply = rendered.find("## Your previous reply").unwrap();
        let fix = rendered.find("fix it").unwrap();
        assert!(system < first && first < reply && reply < fix);
    }
}
