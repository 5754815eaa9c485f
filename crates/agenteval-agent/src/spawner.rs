use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, trace};

use crate::{GenerationConfig, GenerationError, ProcessOutput};

/// Utility for spawning generator CLI processes
pub struct ProcessSpawner;

impl ProcessSpawner {
    /// Spawn a process, capture its output and enforce the configured timeout
    pub async fn spawn(
        binary: &Path,
        args: &[&str],
        config: &GenerationConfig,
    ) -> Result<ProcessOutput, GenerationError> {
        let start = Instant::now();

        debug!(
            binary = %binary.display(),
            arg_count = args.len(),
            working_dir = %config.working_dir.display(),
            "Spawning generator process"
        );

        let mut cmd = Command::new(binary);
        cmd.args(args)
            .current_dir(&config.working_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(Stdio::null()) // Non-interactive
            .kill_on_drop(true);

        for (key, value) in &config.env_vars {
            cmd.env(key, value);
        }

        let child = cmd.spawn().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                GenerationError::NotFound(binary.display().to_string())
            }
            _ => GenerationError::SpawnFailed(e),
        })?;

        // Dropping the collector on timeout drops the child, which kills it
        let (stdout, stderr, status) = match config.timeout {
            Some(limit) => tokio::time::timeout(limit, Self::collect(child))
                .await
                .map_err(|_| GenerationError::Timeout(limit))??,
            None => Self::collect(child).await?,
        };

        let duration = start.elapsed();
        let exit_code = status.code().unwrap_or(-1);

        debug!(
            exit_code,
            duration_ms = duration.as_millis(),
            "Generator process completed"
        );

        Ok(ProcessOutput::new(stdout, stderr, exit_code, duration))
    }

    async fn collect(mut child: Child) -> Result<(String, String, ExitStatus), GenerationError> {
        let stdout_handle = child
            .stdout
            .take()
            .ok_or_else(|| GenerationError::ExecutionFailed("stdout not captured".into()))?;
        let stderr_handle = child
            .stderr
            .take()
            .ok_or_else(|| GenerationError::ExecutionFailed("stderr not captured".into()))?;

        let mut stdout_reader = BufReader::new(stdout_handle).lines();
        let mut stderr_reader = BufReader::new(stderr_handle).lines();

        let mut stdout = String::new();
        let mut stderr = String::new();
        let mut stderr_open = true;

        // Read both streams concurrently
        loop {
            tokio::select! {
                biased;

                result = stdout_reader.next_line() => {
                    match result {
                        Ok(Some(line)) => {
                            trace!(line = %line, "stdout");
                            push_line(&mut stdout, &line);
                        }
                        Ok(None) => {
                            // stdout closed, drain stderr
                            while stderr_open {
                                match stderr_reader.next_line().await {
                                    Ok(Some(line)) => {
                                        trace!(line = %line, "stderr");
                                        push_line(&mut stderr, &line);
                                    }
                                    _ => stderr_open = false,
                                }
                            }
                            break;
                        }
                        Err(e) => {
                            return Err(GenerationError::ExecutionFailed(format!(
                                "Failed to read stdout: {}",
                                e
                            )));
                        }
                    }
                }
                result = stderr_reader.next_line(), if stderr_open => {
                    match result {
                        Ok(Some(line)) => {
                            trace!(line = %line, "stderr");
                            push_line(&mut stderr, &line);
                        }
                        Ok(None) => stderr_open = false,
                        Err(e) => {
                            return Err(GenerationError::ExecutionFailed(format!(
                                "Failed to read stderr: {}",
                                e
                            )));
                        }
                    }
                }
            }
        }

        let status = child.wait().await?;
        Ok((stdout, stderr, status))
    }
}

fn push_line(buffer: &mut String, line: &str) {
    if !buffer.is_empty() {
        buffer.push('\n');
    }
    buffer.push_str(line);
}
