use std::time::Duration;

/// Output captured from a generator process
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub duration: Duration,
}

impl ProcessOutput {
    pub fn new(stdout: String, stderr: String, exit_code: i32, duration: Duration) -> Self {
        Self {
            stdout,
            stderr,
            exit_code,
            duration,
        }
    }

    /// Check if the process exited successfully
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Short description of a failed run for error messages
    pub fn failure_summary(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            format!("process exited with code {}", self.exit_code)
        } else {
            // Keep the tail; CLIs print the actual error last
            let start = stderr
                .char_indices()
                .rev()
                .nth(499)
                .map(|(i, _)| i)
                .unwrap_or(0);
            format!("process exited with code {}: {}", self.exit_code, &stderr[start..])
        }
    }
}
