//! Timer backends for the debouncer
//!
//! A [`Scheduler`] runs a boxed task once after a delay and can cancel it
//! before it runs. Two backends are provided:
//! - [`TokioScheduler`]: one tokio task per timer, cancelled by aborting it
//! - [`ThreadScheduler`]: a dedicated timer thread fed over a channel

mod runtime;
mod thread;

pub use runtime::{TokioScheduler, TokioTimer};
pub use thread::{ThreadScheduler, ThreadTimer};

use crate::error::DebounceError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

/// Deferred unit of work handed to a scheduler
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// One-shot delayed task execution with cancellation
pub trait Scheduler: Send + Sync + 'static {
    /// Handle identifying a scheduled task
    type Handle: Send + 'static;

    /// Run `task` once, `delay` from now
    fn schedule(&self, delay: Duration, task: Task) -> Self::Handle;

    /// Cancel a scheduled task
    ///
    /// Cancelling a task that already ran (or was already cancelled) is a
    /// no-op. Never fails.
    fn cancel(&self, handle: Self::Handle);

    /// Current time on the clock timers are measured against
    fn now(&self) -> Instant;
}

/// Which timer backend to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerKind {
    /// Timers on the tokio runtime
    #[default]
    Tokio,
    /// Timers on a dedicated OS thread
    Thread,
}

impl SchedulerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchedulerKind::Tokio => "tokio",
            SchedulerKind::Thread => "thread",
        }
    }
}

impl fmt::Display for SchedulerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SchedulerKind {
    type Err = DebounceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tokio" => Ok(SchedulerKind::Tokio),
            "thread" => Ok(SchedulerKind::Thread),
            other => Err(DebounceError::InvalidArgument(format!(
                "unknown scheduler '{}' (expected 'tokio' or 'thread')",
                other
            ))),
        }
    }
}
