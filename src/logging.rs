//! Tracing setup for the sqlpilot binary.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

const LOG_FILE_PREFIX: &str = "sqlpilot.log";

pub struct LogConfig {
    /// Default level when `RUST_LOG` is not set
    pub level: String,
    /// Show `level` on stderr too; otherwise stderr only gets warnings
    pub verbose: bool,
    /// Daily log files go here when set
    pub file_dir: Option<PathBuf>,
}

/// Build the filter for `level`, scoped to this crate, unless `RUST_LOG` is set.
fn filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,sqlpilot={}", level)))
}

/// Initialize tracing with compact stderr output and an optional daily file.
///
/// Stderr stays at `warn` unless verbose so log lines do not interleave with
/// spinners and prompts.
///
/// The returned guard flushes the file writer on drop; hold it for the life
/// of the process.
pub fn init_logging(config: LogConfig) -> Result<Option<WorkerGuard>> {
    let console = tracing_subscriber::fmt::layer()
        .compact()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(if config.verbose {
            filter(&config.level)
        } else {
            filter("warn")
        });

    let Some(dir) = config.file_dir else {
        tracing_subscriber::registry().with(console).try_init()?;
        return Ok(None);
    };

    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;
    let appender = tracing_appender::rolling::daily(&dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(console)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(filter(&config.level)),
        )
        .try_init()?;

    Ok(Some(guard))
}
