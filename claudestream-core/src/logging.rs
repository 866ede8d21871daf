//! Logging for claudestream
//!
//! Everything goes to `$XDG_STATE_HOME/claudestream/claudestream.log`, rotated
//! daily. Stdout belongs to the transcript, so logs never go there; warnings
//! (decode failures, read errors) can optionally be mirrored to stderr.

use crate::config::{Config, LoggingConfig};
use crate::error::{Error, Result};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    filter::LevelFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

/// File name prefix of the rolling log
const LOG_FILE_PREFIX: &str = "claudestream.log";

/// Install the global subscriber.
///
/// The file filter comes from `RUST_LOG` if set, else `config.level`. A
/// subscriber installed earlier (tests, embedding apps) is left in place.
pub fn init(config: &LoggingConfig) -> Result<LoggingGuard> {
    let log_dir = Config::state_dir();
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .max_log_files(config.max_files.max(1))
        .build(&log_dir)
        .map_err(|e| Error::Config(format!("failed to open log file: {}", e)))?;
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_filter(filter);

    let stderr_layer = config.stderr.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .without_time()
            .with_filter(LevelFilter::WARN)
    });

    let _ = tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .try_init();

    tracing::info!(
        log_dir = %log_dir.display(),
        level = %config.level,
        stderr = config.stderr,
        "Logging initialized"
    );

    Ok(LoggingGuard { _guard: guard })
}

/// Keeps the background log writer alive; pending lines flush on drop.
pub struct LoggingGuard {
    _guard: tracing_appender::non_blocking::WorkerGuard,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_file_lives_in_state_dir() {
        assert!(Config::log_path().starts_with(Config::state_dir()));
        assert!(Config::log_path().ends_with(LOG_FILE_PREFIX));
    }
}
