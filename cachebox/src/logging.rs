//! Process-wide structured logging.
//!
//! [`init_logging`] installs a `tracing` subscriber once, at process start:
//!
//! ```text
//! registry
//!   ├── EnvFilter        RUST_LOG, else LoggingSettings::level
//!   ├── fmt → stderr     local timestamps, targets
//!   └── fmt → file       optional, daily rolling, non-blocking writer
//! ```
//!
//! Keep the returned [`LoggingGuard`] alive until shutdown; dropping it
//! flushes the file writer.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingSettings;

/// Errors that can occur while installing the subscriber.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("invalid log filter: {0}")]
    Filter(#[from] ParseError),

    #[error("failed to open log file: {0}")]
    File(#[from] InitError),

    #[error("a global subscriber is already installed")]
    AlreadyInitialized,
}

/// Keeps the background log writer alive.
#[must_use = "dropping the guard stops file logging"]
pub struct LoggingGuard {
    file_writer: Option<WorkerGuard>,
}

impl LoggingGuard {
    /// Whether log lines are also written to a file.
    pub fn writes_file(&self) -> bool {
        self.file_writer.is_some()
    }
}

/// Install the global subscriber.
///
/// # Errors
///
/// Fails if the filter does not parse, the log directory cannot be used, or
/// a subscriber is already installed.
pub fn init_logging(settings: &LoggingSettings) -> Result<LoggingGuard, LoggingError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&settings.level)?,
    };

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_timer(LocalTime::rfc_3339())
        .with_target(true);

    let (file_layer, file_writer) = match &settings.directory {
        Some(directory) => {
            let appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix(settings.file_name.as_str())
                .build(directory)?;
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_timer(LocalTime::rfc_3339())
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|_| LoggingError::AlreadyInitialized)?;

    Ok(LoggingGuard {
        file_writer,
    })
}
