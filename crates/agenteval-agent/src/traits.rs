use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::Message;

/// Errors that can occur while asking the generation service for a reply
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Failed to spawn generator process: {0}")]
    SpawnFailed(#[from] std::io::Error),

    #[error("Generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Generator not found at path: {0}")]
    NotFound(String),

    #[error("Generator configuration error: {0}")]
    ConfigError(String),

    #[error("Generation failed: {0}")]
    ExecutionFailed(String),

    #[error("Conversation history is empty")]
    EmptyConversation,
}

/// Configuration handed to the generation service on every call.
///
/// Critic and quantifier never look inside; they only pass it through.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// Working directory for process-backed generators
    pub working_dir: PathBuf,
    /// Optional timeout per reply (None = no limit)
    pub timeout: Option<Duration>,
    /// Additional environment variables
    pub env_vars: HashMap<String, String>,
    /// Model to use (if the backend supports it)
    pub model: Option<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            working_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            timeout: None,
            env_vars: HashMap::new(),
            model: None,
        }
    }
}

impl GenerationConfig {
    pub fn new(working_dir: PathBuf) -> Self {
        Self {
            working_dir,
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_model(mut self, model: String) -> Self {
        self.model = Some(model);
        self
    }

    pub fn with_env(mut self, key: String, value: String) -> Self {
        self.env_vars.insert(key, value);
        self
    }
}

/// Supported generator backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeneratorType {
    ClaudeCode,
    OpenCode,
}

impl std::fmt::Display for GeneratorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GeneratorType::ClaudeCode => write!(f, "claude-code"),
            GeneratorType::OpenCode => write!(f, "opencode"),
        }
    }
}

impl std::str::FromStr for GeneratorType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "claude" | "claude-code" | "claudecode" => Ok(GeneratorType::ClaudeCode),
            "opencode" | "open-code" => Ok(GeneratorType::OpenCode),
            _ => Err(format!("Unknown generator type: {}", s)),
        }
    }
}

/// The text-generation capability: given a conversation, produce the next message.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Human-readable name of the backend (e.g., "Claude Code")
    fn name(&self) -> &str;

    /// Produce the next assistant message for the given history
    async fn respond(
        &self,
        history: &[Message],
        config: &GenerationConfig,
    ) -> Result<Message, GenerationError>;

    /// Check if the backend can be reached
    async fn is_available(&self) -> bool;
}
