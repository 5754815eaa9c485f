//! # agenteval-logging
//!
//! Logging for the agenteval criteria pipeline.
//!
//! ## Key Types
//!
//! - [`Logger`] - Structured event logging
//! - [`LogEvent`] - Log event types
//! - [`LogFormat`] - Output formats (Pretty, JSON, Compact)
//!
//! Library crates log through `tracing`; [`init_tracing`] installs the
//! subscriber, optionally with a daily-rolling JSON file.

mod events;

pub use events::{LogEvent, LogFormat, Logger};

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize tracing for the application.
///
/// `RUST_LOG` overrides `level`. When `log_dir` is given, JSON lines are also
/// written to `<log_dir>/agenteval.log.<date>`; keep the returned guard alive
/// until exit so buffered lines are flushed.
pub fn init_tracing(level: &str, format: LogFormat, log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "agenteval.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().json().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(file_layer)
                .with(
                    fmt::layer()
                        .json()
                        .with_target(false)
                        .with_writer(std::io::stderr),
                )
                .init();
        }
        LogFormat::Pretty | LogFormat::Compact => {
            tracing_subscriber::registry()
                .with(filter)
                .with(file_layer)
                .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
                .init();
        }
    }

    guard
}
