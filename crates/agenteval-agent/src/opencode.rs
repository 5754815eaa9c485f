use async_trait::async_trait;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::debug;

use crate::{
    render_transcript, GenerationConfig, GenerationError, Generator, Message, ProcessSpawner,
};

/// Generator backed by the OpenCode CLI
pub struct OpenCodeGenerator {
    binary_path: PathBuf,
}

impl OpenCodeGenerator {
    pub fn new() -> Self {
        Self {
            binary_path: PathBuf::from("opencode"),
        }
    }

    pub fn with_binary_path(path: PathBuf) -> Self {
        Self { binary_path: path }
    }
}

impl Default for OpenCodeGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Generator for OpenCodeGenerator {
    fn name(&self) -> &str {
        "OpenCode"
    }

    async fn is_available(&self) -> bool {
        Command::new(&self.binary_path)
            .arg("--version")
            .output()
            .await
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    async fn respond(
        &self,
        history: &[Message],
        config: &GenerationConfig,
    ) -> Result<Message, GenerationError> {
        if history.is_empty() {
            return Err(GenerationError::EmptyConversation);
        }
        let prompt = render_transcript(history);

        debug!(
            generator = self.name(),
            turns = history.len(),
            prompt_len = prompt.len(),
            "Requesting reply"
        );

        // OpenCode uses the "run" subcommand for non-interactive execution
        let mut args = vec!["run"];

        let model_arg;
        if let Some(ref model) = config.model {
            args.push("--model");
            model_arg = model.clone();
            args.push(&model_arg);
        }

        args.push("--prompt");
        args.push(&prompt);

        let output = ProcessSpawner::spawn(&self.binary_path, &args, config).await?;
        if !output.success() {
            return Err(GenerationError::ExecutionFailed(output.failure_summary()));
        }
        Ok(Message::assistant(output.stdout))
    }
}
