//! Tokio-backed timers

use super::{Scheduler, Task};
use crate::error::{DebounceError, Result};
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Schedules each task as a tokio task that sleeps, then runs it
///
/// Works with tokio's paused clock, so tests can drive timelines exactly.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: Handle,
}

/// Scheduled tokio task
#[derive(Debug)]
pub struct TokioTimer(JoinHandle<()>);

impl TokioScheduler {
    /// Use an explicit runtime
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Use the runtime the caller is running on
    pub fn current() -> Result<Self> {
        let handle = Handle::try_current()
            .map_err(|e| DebounceError::Scheduler(format!("no tokio runtime: {}", e)))?;
        Ok(Self { handle })
    }
}

impl Scheduler for TokioScheduler {
    type Handle = TokioTimer;

    fn schedule(&self, delay: Duration, task: Task) -> TokioTimer {
        TokioTimer(self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            task();
        }))
    }

    fn cancel(&self, handle: TokioTimer) {
        // Aborting a finished task does nothing
        handle.0.abort();
    }

    fn now(&self) -> Instant {
        // Read the runtime's clock, which may be paused
        let _guard = self.handle.enter();
        tokio::time::Instant::now().into_std()
    }
}
