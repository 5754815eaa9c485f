use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Structured log events for an evaluation run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LogEvent {
    EvaluationStarted {
        task: String,
        working_dir: PathBuf,
        generator: String,
    },
    CriteriaStarted {
        task: String,
    },
    /// A reply was rejected and a corrective prompt will follow
    RoundRejected {
        item: Option<String>,
        stage: String,
        round: usize,
        max_rounds: usize,
        issues: Vec<String>,
    },
    CriteriaSynthesized {
        criteria: Vec<String>,
        duration_secs: f64,
    },
    CriteriaFailed {
        error: String,
    },
    QuantifyStarted {
        item: String,
        index: usize,
        total: usize,
    },
    QuantifyCompleted {
        item: String,
        actual_success: bool,
        duration_secs: f64,
    },
    QuantifyFailed {
        item: String,
        error: String,
    },
    BatchCompleted {
        scored: usize,
        failed: usize,
        duration_secs: f64,
    },
    Interrupted {
        completed: usize,
        remaining: usize,
    },
}

impl LogEvent {
    /// Add a timestamp to serialize with the event
    fn with_timestamp(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        if let Some(obj) = value.as_object_mut() {
            obj.insert(
                "timestamp".to_string(),
                serde_json::Value::String(chrono::Utc::now().to_rfc3339()),
            );
        }
        value
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable format with colors and visual structure
    #[default]
    Pretty,
    /// JSON lines format for machine consumption
    Json,
    /// Compact single-line format
    Compact,
}

/// Logger for evaluation events - handles both console output and file logging
pub struct Logger {
    format: LogFormat,
    file_writer: Option<Mutex<File>>,
    quiet: bool,
}

impl Logger {
    pub fn new(format: LogFormat) -> Self {
        Self {
            format,
            file_writer: None,
            quiet: false,
        }
    }

    /// Logger that prints nothing (file output still applies)
    pub fn quiet() -> Self {
        Self {
            format: LogFormat::Compact,
            file_writer: None,
            quiet: true,
        }
    }

    /// Create a logger with file output in addition to console
    pub fn with_file(format: LogFormat, log_path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;

        Ok(Self {
            format,
            file_writer: Some(Mutex::new(file)),
            quiet: false,
        })
    }

    pub fn log(&self, event: &LogEvent) {
        // File output is always JSON
        if let Some(ref writer) = self.file_writer {
            if let Ok(mut file) = writer.lock() {
                let json = event.with_timestamp();
                let _ = writeln!(file, "{}", json);
            }
        }

        if self.quiet {
            return;
        }

        match self.format {
            LogFormat::Json => self.log_json(event),
            LogFormat::Pretty => self.log_pretty(event),
            LogFormat::Compact => self.log_compact(event),
        }
    }

    fn log_json(&self, event: &LogEvent) {
        if let Ok(json) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{}", json);
        }
    }

    fn log_pretty(&self, event: &LogEvent) {
        let mut stderr = std::io::stderr();
        match event {
            LogEvent::EvaluationStarted {
                task,
                working_dir,
                generator,
            } => {
                let _ = writeln!(stderr);
                let _ = writeln!(
                    stderr,
                    "{}",
                    "╭─────────────────────────────────────────────────────────────────────╮"
                        .bright_blue()
                );
                let _ = writeln!(
                    stderr,
                    "{}  {}{}",
                    "│".bright_blue(),
                    "agenteval".bold().bright_white(),
                    " ".repeat(58) + &"│".bright_blue().to_string()
                );
                let _ = writeln!(
                    stderr,
                    "{}  {} {}",
                    "│".bright_blue(),
                    "Task:".dimmed(),
                    Self::truncate_with_padding(task, 62, 68).dimmed()
                );
                let _ = writeln!(
                    stderr,
                    "{}  {} {}",
                    "│".bright_blue(),
                    "Generator:".dimmed(),
                    Self::truncate_with_padding(generator, 57, 63).dimmed()
                );
                let _ = writeln!(
                    stderr,
                    "{}  {} {}",
                    "│".bright_blue(),
                    "Dir:".dimmed(),
                    Self::truncate_with_padding(&working_dir.display().to_string(), 63, 69)
                        .dimmed()
                );
                let _ = writeln!(
                    stderr,
                    "{}",
                    "╰─────────────────────────────────────────────────────────────────────╯"
                        .bright_blue()
                );
                let _ = writeln!(stderr);
            }
            LogEvent::CriteriaStarted { .. } => {
                let _ = writeln!(
                    stderr,
                    "  {} {}",
                    "▶".bright_magenta(),
                    "CRITIC".bright_magenta().bold()
                );
            }
            LogEvent::RoundRejected {
                item,
                round,
                max_rounds,
                issues,
                ..
            } => {
                let label = match item {
                    Some(item) => format!("{} round {}/{}", item, round, max_rounds),
                    None => format!("round {}/{}", round, max_rounds),
                };
                let _ = writeln!(
                    stderr,
                    "    {} {} rejected",
                    "↻".bright_yellow(),
                    label.bright_yellow()
                );
                for issue in issues {
                    let _ = writeln!(stderr, "{} {}", "      │".dimmed(), issue.dimmed());
                }
            }
            LogEvent::CriteriaSynthesized {
                criteria,
                duration_secs,
            } => {
                let _ = writeln!(
                    stderr,
                    "    {} {} criteria ({:.1}s)",
                    "✓".bright_green(),
                    criteria.len(),
                    duration_secs
                );
                for name in criteria {
                    let _ = writeln!(stderr, "{} {}", "      •".dimmed(), name);
                }
                let _ = writeln!(stderr);
            }
            LogEvent::CriteriaFailed { error } => {
                let _ = writeln!(
                    stderr,
                    "    {} {}",
                    "✗".bright_red(),
                    error.bright_red()
                );
            }
            LogEvent::QuantifyStarted { item, index, total } => {
                if *index == 0 {
                    let _ = writeln!(
                        stderr,
                        "  {} {} ({} test cases)",
                        "▶".bright_cyan(),
                        "QUANTIFIER".bright_cyan().bold(),
                        total
                    );
                }
                let _ = writeln!(
                    stderr,
                    "    {} [{}/{}] {}",
                    "·".dimmed(),
                    index + 1,
                    total,
                    item
                );
            }
            LogEvent::QuantifyCompleted {
                item,
                duration_secs,
                ..
            } => {
                let _ = writeln!(
                    stderr,
                    "    {} {} ({:.1}s)",
                    "✓".bright_green(),
                    item,
                    duration_secs
                );
            }
            LogEvent::QuantifyFailed { item, error } => {
                let _ = writeln!(
                    stderr,
                    "    {} {}: {}",
                    "✗".bright_red(),
                    item,
                    error.bright_red()
                );
            }
            LogEvent::BatchCompleted { .. } => {
                // The final summary is printed by the CLI
            }
            LogEvent::Interrupted {
                completed,
                remaining,
            } => {
                let _ = writeln!(stderr);
                let _ = writeln!(
                    stderr,
                    "{} Interrupted: {} finished, {} abandoned",
                    "⚠".bright_yellow(),
                    completed,
                    remaining
                );
            }
        }
    }

    fn log_compact(&self, event: &LogEvent) {
        let mut stderr = std::io::stderr();
        let timestamp = chrono::Utc::now().format("%H:%M:%S");
        let msg = match event {
            LogEvent::EvaluationStarted { task, .. } => format!("[{}] eval:start {}", timestamp, task),
            LogEvent::CriteriaStarted { .. } => format!("[{}] critic:start", timestamp),
            LogEvent::RoundRejected {
                item,
                stage,
                round,
                issues,
                ..
            } => format!(
                "[{}] {}:retry:{} {} issue(s){}",
                timestamp,
                stage,
                round,
                issues.len(),
                item.as_ref().map(|i| format!(" {}", i)).unwrap_or_default()
            ),
            LogEvent::CriteriaSynthesized {
                criteria,
                duration_secs,
            } => format!(
                "[{}] critic:done {} {:.1}s",
                timestamp,
                criteria.len(),
                duration_secs
            ),
            LogEvent::CriteriaFailed { error } => format!("[{}] critic:error {}", timestamp, error),
            LogEvent::QuantifyStarted { item, index, total } => {
                format!("[{}] quantify:start {}/{} {}", timestamp, index + 1, total, item)
            }
            LogEvent::QuantifyCompleted {
                item,
                duration_secs,
                ..
            } => format!("[{}] quantify:done {} {:.1}s", timestamp, item, duration_secs),
            LogEvent::QuantifyFailed { item, error } => {
                format!("[{}] quantify:error {} {}", timestamp, item, error)
            }
            LogEvent::BatchCompleted {
                scored,
                failed,
                duration_secs,
            } => format!(
                "[{}] batch:done scored={} failed={} {:.1}s",
                timestamp, scored, failed, duration_secs
            ),
            LogEvent::Interrupted {
                completed,
                remaining,
            } => format!(
                "[{}] interrupted completed={} remaining={}",
                timestamp, completed, remaining
            ),
        };
        let _ = writeln!(stderr, "{}", msg);
    }

    /// Truncate a string and pad to exact width
    fn truncate_with_padding(s: &str, max_len: usize, total_width: usize) -> String {
        let truncated = if s.chars().count() > max_len {
            let head: String = s.chars().take(max_len - 3).collect();
            format!("{}...", head)
        } else {
            s.to_string()
        };

        let padding_needed = total_width.saturating_sub(truncated.chars().count() + 1); // +1 for trailing │
        format!("{}{}│", truncated, " ".repeat(padding_needed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_log_is_json_lines_with_timestamps() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("logs").join("run.jsonl");

        let logger = Logger::with_file(LogFormat::Compact, &path).unwrap();
        logger.log(&LogEvent::CriteriaStarted {
            task: "arithmetic".into(),
        });
        logger.log(&LogEvent::QuantifyFailed {
            item: "case-1".into(),
            error: "quantification failed".into(),
        });

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event"], "criteria_started");
        assert_eq!(lines[1]["event"], "quantify_failed");
        assert_eq!(lines[1]["item"], "case-1");
        assert!(lines[0]["timestamp"].is_string());
    }

    #[test]
    fn test_truncate_with_padding() {
        let padded = Logger::truncate_with_padding("short", 10, 12);
        assert_eq!(padded, "short      │");
        let cut = Logger::truncate_with_padding("a much longer string", 10, 12);
        assert_eq!(cut, "a much ... │");
    }
}
