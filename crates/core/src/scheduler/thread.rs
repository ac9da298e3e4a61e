//! Dedicated timer thread
//!
//! Timers live in a deadline-ordered map owned by a single worker thread.
//! Callers talk to it over an unbounded crossbeam channel, so scheduling
//! and cancelling never block. Tasks run on the worker thread in deadline
//! order; ties run in scheduling order.

use super::{Scheduler, Task};
use crate::error::{DebounceError, Result};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, trace};

/// Timer thread name
const THREAD_NAME: &str = "settle-timer";

/// Stand-in deadline for delays too long to represent as an `Instant`
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// Scheduler running tasks on one background thread
///
/// Clones share the same thread. The thread is shut down and joined when the
/// last clone is dropped; timers still pending at that point are discarded.
#[derive(Clone)]
pub struct ThreadScheduler {
    shared: Arc<Shared>,
}

/// Identifier of a timer scheduled on a [`ThreadScheduler`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ThreadTimer {
    id: u64,
}

struct Shared {
    tx: Sender<Command>,
    next_id: AtomicU64,
    worker: Mutex<Option<JoinHandle<()>>>,
}

enum Command {
    Schedule { id: u64, deadline: Instant, task: Task },
    Cancel { id: u64 },
    Shutdown,
}

impl ThreadScheduler {
    /// Spawn the timer thread
    pub fn new() -> Result<Self> {
        let (tx, rx) = unbounded();

        let worker = thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || run_timer_loop(rx))
            .map_err(|e| DebounceError::Scheduler(format!("failed to spawn timer thread: {}", e)))?;

        debug!("Started {} thread", THREAD_NAME);

        Ok(Self {
            shared: Arc::new(Shared {
                tx,
                next_id: AtomicU64::new(1),
                worker: Mutex::new(Some(worker)),
            }),
        })
    }
}

impl std::fmt::Debug for ThreadScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadScheduler")
            .field("next_id", &self.shared.next_id.load(Ordering::Relaxed))
            .finish()
    }
}

impl Scheduler for ThreadScheduler {
    type Handle = ThreadTimer;

    fn schedule(&self, delay: Duration, task: Task) -> ThreadTimer {
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let now = Instant::now();
        let deadline = now.checked_add(delay).unwrap_or(now + FAR_FUTURE);

        // The worker only exits once every handle is gone, so this cannot fail
        // while `self` is alive.
        let _ = self.shared.tx.send(Command::Schedule { id, deadline, task });

        ThreadTimer { id }
    }

    fn cancel(&self, handle: ThreadTimer) {
        let _ = self.shared.tx.send(Command::Cancel { id: handle.id });
    }

    fn now(&self) -> Instant {
        Instant::now()
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let _ = self.tx.send(Command::Shutdown);

        if let Some(worker) = self.worker.lock().take() {
            // The last handle can be dropped by a task running on the timer
            // thread itself; joining there would deadlock.
            if worker.thread().id() == thread::current().id() {
                return;
            }
            if worker.join().is_err() {
                error!("{} thread terminated abnormally", THREAD_NAME);
            }
        }
    }
}

fn run_timer_loop(rx: Receiver<Command>) {
    let mut timers: BTreeMap<(Instant, u64), Task> = BTreeMap::new();
    let mut deadlines: HashMap<u64, Instant> = HashMap::new();

    loop {
        // Fire everything that is due
        let now = Instant::now();
        while let Some(entry) = timers.first_entry() {
            if entry.key().0 > now {
                break;
            }
            let ((_, id), task) = entry.remove_entry();
            deadlines.remove(&id);
            run_task(id, task);
        }

        let command = match timers.keys().next() {
            Some(&(deadline, _)) => match rx.recv_deadline(deadline) {
                Ok(command) => command,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            },
            None => match rx.recv() {
                Ok(command) => command,
                Err(_) => break,
            },
        };

        match command {
            Command::Schedule { id, deadline, task } => {
                trace!(timer = id, "timer scheduled");
                timers.insert((deadline, id), task);
                deadlines.insert(id, deadline);
            }
            Command::Cancel { id } => {
                if let Some(deadline) = deadlines.remove(&id) {
                    timers.remove(&(deadline, id));
                    trace!(timer = id, "timer cancelled");
                }
            }
            Command::Shutdown => break,
        }
    }

    if !timers.is_empty() {
        debug!("Discarding {} pending timers on shutdown", timers.len());
    }
}

/// Run one task, containing any panic so the remaining timers keep firing
fn run_task(id: u64, task: Task) {
    trace!(timer = id, "timer fired");

    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(task)) {
        error!(timer = id, "Scheduled task panicked: {}", panic_message(&*payload));
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}
