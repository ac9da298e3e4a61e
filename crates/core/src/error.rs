//! Error types for settle

use thiserror::Error;

/// Errors surfaced synchronously by the debouncer and its configuration.
///
/// Failures raised by a wrapped action while it runs are not represented
/// here: they belong to whatever executes the scheduled task.
#[derive(Debug, Error)]
pub enum DebounceError {
    /// Rejected input, e.g. a negative delay or an unknown scheduler kind
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// No timer backend could be set up (missing runtime, thread spawn failure)
    #[error("scheduler unavailable: {0}")]
    Scheduler(String),

    /// Config file could not be read, parsed or validated
    #[error("config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, DebounceError>;
