//! Deterministic generator for offline runs and tests.
//!
//! Replies come from a queue (or one reply repeated forever) and every
//! conversation the generator was sent is recorded for later inspection.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::{GenerationConfig, GenerationError, Generator, Message};

/// One canned reply
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    /// Return this text as the assistant message
    Text(String),
    /// Fail the call as a transport error would
    Fail(String),
}

#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    replies: Mutex<VecDeque<ScriptedReply>>,
    repeat: Option<String>,
    requests: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedGenerator {
    /// Generator that plays back `replies` in order and fails once they run out
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(
                replies
                    .into_iter()
                    .map(|r| ScriptedReply::Text(r.into()))
                    .collect(),
            ),
            ..Default::default()
        }
    }

    /// Generator that answers every request with the same text
    pub fn repeating(reply: impl Into<String>) -> Self {
        Self {
            repeat: Some(reply.into()),
            ..Default::default()
        }
    }

    /// Queue an additional reply
    pub fn push(&self, reply: ScriptedReply) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(reply);
        }
    }

    /// Number of `respond` calls received so far
    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    /// Every conversation history sent so far, in call order
    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    fn name(&self) -> &str {
        "Scripted"
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn respond(
        &self,
        history: &[Message],
        _config: &GenerationConfig,
    ) -> Result<Message, GenerationError> {
        if history.is_empty() {
            return Err(GenerationError::EmptyConversation);
        }

        if let Ok(mut requests) = self.requests.lock() {
            requests.push(history.to_vec());
        }

        let next = self.replies.lock().ok().and_then(|mut r| r.pop_front());
        match (next, &self.repeat) {
            (Some(ScriptedReply::Text(text)), _) => Ok(Message::assistant(text)),
            (Some(ScriptedReply::Fail(reason)), _) => Err(GenerationError::ExecutionFailed(reason)),
            (None, Some(text)) => Ok(Message::assistant(text.clone())),
            (None, None) => Err(GenerationError::ExecutionFailed(
                "scripted replies exhausted".into(),
            )),
        }
    }
}
