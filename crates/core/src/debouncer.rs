//! Trailing-edge debouncer
//!
//! Every call cancels the pending timer (if any) and schedules the action
//! again, `delay` from now, with the context and arguments of that call.
//! Only the last call of a burst ever reaches the action. A call that comes
//! `delay` or more after the pending one does not supersede it: the pending
//! call is due, so it runs first.
//!
//! State machine:
//! ```text
//! Idle --call--> Pending --call--> Pending (old timer cancelled)
//!                Pending --call past deadline--> Pending (due action runs first)
//!                Pending --timer/flush--> Idle (action runs)
//!                Pending --cancel/drop--> Idle (action dropped)
//! ```

use crate::error::{DebounceError, Result};
use crate::scheduler::{Scheduler, TokioScheduler};
use parking_lot::Mutex;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Delay used when none is given
pub const DEFAULT_DELAY: Duration = Duration::from_millis(300);

/// Arguments of one call together with the context it was made from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation<C, A> {
    /// Identity of the caller the action should run on behalf of
    pub context: C,
    /// Call arguments
    pub args: A,
}

/// Whether a call is waiting for its quiet period to elapse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceState {
    Idle,
    Pending,
}

/// Debounced wrapper around an action taking `(context, args)`
///
/// Cloning is cheap and clones share the same pending state. When the last
/// clone is dropped the outstanding timer is cancelled and the pending call
/// is discarded.
pub struct Debouncer<C, A, S = TokioScheduler>
where
    S: Scheduler,
{
    inner: Arc<Inner<C, A, S>>,
}

type Action<C, A> = Box<dyn Fn(C, A) + Send + Sync + 'static>;

struct Inner<C, A, S: Scheduler> {
    action: Action<C, A>,
    delay: Duration,
    scheduler: S,
    slot: Mutex<Slot<C, A, S::Handle>>,
}

struct Slot<C, A, H> {
    /// Bumped on every call; a timer only fires if it still matches
    generation: u64,
    pending: Option<PendingInvocation<C, A, H>>,
}

struct PendingInvocation<C, A, H> {
    invocation: Invocation<C, A>,
    timer: H,
    generation: u64,
    scheduled_at: Instant,
    /// `None` when the delay overflows the clock
    deadline: Option<Instant>,
}

impl<C, A, S> Debouncer<C, A, S>
where
    C: Send + 'static,
    A: Send + 'static,
    S: Scheduler,
{
    /// Wrap `action` so bursts of calls closer than `delay` collapse into one
    pub fn new<F>(action: F, delay: Duration, scheduler: S) -> Self
    where
        F: Fn(C, A) + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(Inner {
                action: Box::new(action),
                delay,
                scheduler,
                slot: Mutex::new(Slot {
                    generation: 0,
                    pending: None,
                }),
            }),
        }
    }

    /// Wrap `action` with [`DEFAULT_DELAY`]
    pub fn with_default_delay<F>(action: F, scheduler: S) -> Self
    where
        F: Fn(C, A) + Send + Sync + 'static,
    {
        Self::new(action, DEFAULT_DELAY, scheduler)
    }

    /// Wrap `action` with a delay given in signed milliseconds
    ///
    /// Negative delays are rejected with [`DebounceError::InvalidArgument`].
    pub fn from_millis<F>(action: F, delay_ms: i64, scheduler: S) -> Result<Self>
    where
        F: Fn(C, A) + Send + Sync + 'static,
    {
        Ok(Self::new(action, delay_from_millis(delay_ms)?, scheduler))
    }

    /// Invoke the debounced action
    ///
    /// Cancels any pending call and schedules the action to run `delay` from
    /// now with this call's context and arguments. Returns immediately unless
    /// the pending call's quiet period has already elapsed, in which case its
    /// action runs on the calling thread before this call is scheduled.
    pub fn call(&self, context: C, args: A) {
        let inner = &self.inner;

        if let Some(due) = self.take_due() {
            inner.scheduler.cancel(due.timer);
            debug!(
                generation = due.generation,
                "quiet period elapsed before timer ran, running action"
            );
            let Invocation { context, args } = due.invocation;
            (inner.action)(context, args);
        }

        let superseded = {
            let mut slot = inner.slot.lock();
            slot.generation = slot.generation.wrapping_add(1);
            let generation = slot.generation;

            let superseded = slot.pending.take();
            if let Some(old) = &superseded {
                trace!(generation = old.generation, "superseding pending call");
            }

            let weak = Arc::downgrade(&self.inner);
            let scheduled_at = inner.scheduler.now();
            let timer = inner
                .scheduler
                .schedule(inner.delay, Box::new(move || fire(weak, generation)));

            slot.pending = Some(PendingInvocation {
                invocation: Invocation { context, args },
                timer,
                generation,
                scheduled_at,
                deadline: scheduled_at.checked_add(inner.delay),
            });

            superseded
        };

        // Superseded arguments are dropped outside the lock
        if let Some(old) = superseded {
            inner.scheduler.cancel(old.timer);
        }
    }

    /// Take the pending call if its deadline has passed but its timer has not
    /// run yet
    ///
    /// With a zero delay every pending call is already at its deadline, so
    /// calls in the same tick still collapse.
    fn take_due(&self) -> Option<PendingInvocation<C, A, S::Handle>> {
        if self.inner.delay.is_zero() {
            return None;
        }

        let mut slot = self.inner.slot.lock();
        let deadline = slot.pending.as_ref()?.deadline?;
        if deadline <= self.inner.scheduler.now() {
            slot.pending.take()
        } else {
            None
        }
    }

    /// Discard the pending call without running it
    ///
    /// Returns `true` if a call was pending.
    pub fn cancel(&self) -> bool {
        let pending = self.inner.slot.lock().pending.take();

        match pending {
            Some(pending) => {
                debug!(generation = pending.generation, "pending call cancelled");
                self.inner.scheduler.cancel(pending.timer);
                true
            }
            None => false,
        }
    }

    /// Run the pending call now, on the calling thread
    ///
    /// The timer is cancelled, so the action runs once. Returns `true` if a
    /// call was pending.
    pub fn flush(&self) -> bool {
        let pending = self.inner.slot.lock().pending.take();

        match pending {
            Some(pending) => {
                self.inner.scheduler.cancel(pending.timer);
                debug!(generation = pending.generation, "flushing pending call");
                let Invocation { context, args } = pending.invocation;
                (self.inner.action)(context, args);
                true
            }
            None => false,
        }
    }

    pub fn state(&self) -> DebounceState {
        if self.is_pending() {
            DebounceState::Pending
        } else {
            DebounceState::Idle
        }
    }

    pub fn is_pending(&self) -> bool {
        self.inner.slot.lock().pending.is_some()
    }

    pub fn delay(&self) -> Duration {
        self.inner.delay
    }

    /// Turn the debouncer into a plain closure with the action's signature
    pub fn into_fn(self) -> impl Fn(C, A) + Clone + Send + Sync + 'static {
        move |context, args| self.call(context, args)
    }
}

impl<C, A> Debouncer<C, A, TokioScheduler>
where
    C: Send + 'static,
    A: Send + 'static,
{
    /// Debounce `action` on the current tokio runtime
    pub fn on_current_runtime<F>(action: F, delay: Duration) -> Result<Self>
    where
        F: Fn(C, A) + Send + Sync + 'static,
    {
        Ok(Self::new(action, delay, TokioScheduler::current()?))
    }
}

/// Debounce `action` on the current tokio runtime
///
/// Shorthand for [`Debouncer::on_current_runtime`].
pub fn debounce<C, A, F>(action: F, delay: Duration) -> Result<Debouncer<C, A, TokioScheduler>>
where
    C: Send + 'static,
    A: Send + 'static,
    F: Fn(C, A) + Send + Sync + 'static,
{
    Debouncer::on_current_runtime(action, delay)
}

/// Convert a signed millisecond delay, rejecting negative values
pub fn delay_from_millis(delay_ms: i64) -> Result<Duration> {
    u64::try_from(delay_ms)
        .map(Duration::from_millis)
        .map_err(|_| {
            DebounceError::InvalidArgument(format!(
                "delay must be non-negative, got {}ms",
                delay_ms
            ))
        })
}

/// Timer callback: run the pending call if it is still the one we were
/// scheduled for
fn fire<C, A, S: Scheduler>(inner: Weak<Inner<C, A, S>>, generation: u64) {
    let Some(inner) = inner.upgrade() else {
        trace!(generation, "debouncer dropped before timer fired");
        return;
    };

    let pending = {
        let mut slot = inner.slot.lock();
        match &slot.pending {
            Some(pending) if pending.generation == generation => slot.pending.take(),
            _ => None,
        }
    };

    if let Some(pending) = pending {
        debug!(
            generation,
            waited = ?inner.scheduler.now().saturating_duration_since(pending.scheduled_at),
            "quiet period elapsed, running action"
        );
        let Invocation { context, args } = pending.invocation;
        (inner.action)(context, args);
    }
}

impl<C, A, S: Scheduler> Drop for Inner<C, A, S> {
    fn drop(&mut self) {
        if let Some(pending) = self.slot.get_mut().pending.take() {
            trace!(generation = pending.generation, "cancelling timer of dropped debouncer");
            self.scheduler.cancel(pending.timer);
        }
    }
}

impl<C, A, S: Scheduler> Clone for Debouncer<C, A, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C, A, S: Scheduler> fmt::Debug for Debouncer<C, A, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = self.inner.slot.lock();
        f.debug_struct("Debouncer")
            .field("delay", &self.inner.delay)
            .field("generation", &slot.generation)
            .field("pending", &slot.pending.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::ThreadScheduler;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;
    use tokio::time::{sleep, Instant as TokioInstant};

    /// Records every action run as (elapsed since start, context, args)
    type Log<C, A> = Arc<Mutex<Vec<(Duration, C, A)>>>;

    fn recorder<C, A>(start: TokioInstant) -> (Log<C, A>, impl Fn(C, A) + Send + Sync + 'static)
    where
        C: Send + 'static,
        A: Send + 'static,
    {
        let log: Log<C, A> = Arc::new(Mutex::new(Vec::new()));
        let log_clone = Arc::clone(&log);
        let action = move |context, args| {
            log_clone.lock().push((start.elapsed(), context, args));
        };
        (log, action)
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_fires_once_with_last_args() {
        let start = TokioInstant::now();
        let (log, action) = recorder::<(), &str>(start);
        let debouncer = debounce(action, ms(300)).unwrap();

        debouncer.call((), "a");
        sleep(ms(100)).await;
        debouncer.call((), "b");
        sleep(ms(150)).await;
        debouncer.call((), "c");

        sleep(ms(1000)).await;

        let log = log.lock();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0], (ms(550), (), "c"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_spaced_calls_fire_independently() {
        let start = TokioInstant::now();
        let (log, action) = recorder::<(), &str>(start);
        let debouncer = debounce(action, ms(300)).unwrap();

        debouncer.call((), "x");
        sleep(ms(400)).await;
        debouncer.call((), "y");
        sleep(ms(1000)).await;

        assert_eq!(
            *log.lock(),
            vec![(ms(300), (), "x"), (ms(700), (), "y")]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_exactly_one_delay_later_does_not_supersede() {
        let start = TokioInstant::now();
        let (log, action) = recorder::<(), &str>(start);
        let debouncer = debounce(action, ms(300)).unwrap();

        debouncer.call((), "x");
        sleep(ms(300)).await;
        debouncer.call((), "y");
        sleep(ms(1000)).await;

        assert_eq!(
            *log.lock(),
            vec![(ms(300), (), "x"), (ms(600), (), "y")]
        );
    }

    #[test]
    fn test_call_at_deadline_runs_due_call_on_thread_scheduler() {
        let scheduler = ThreadScheduler::new().unwrap();
        let (tx, rx) = crossbeam_channel::unbounded::<&'static str>();
        let debouncer = Debouncer::new(move |_: (), s| tx.send(s).unwrap(), ms(300), scheduler);

        debouncer.call((), "x");
        std::thread::sleep(ms(300));
        debouncer.call((), "y");

        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), "x");
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), "y");
    }

    #[test]
    fn test_unrepresentable_delay_stays_pending() {
        let scheduler = ThreadScheduler::new().unwrap();
        let debouncer = Debouncer::new(|_: (), _: u32| {}, Duration::MAX, scheduler);

        debouncer.call((), 1);
        debouncer.call((), 2);
        assert!(debouncer.is_pending());
        assert!(debouncer.cancel());
    }

    #[tokio::test(start_paused = true)]
    async fn test_context_of_last_call_is_forwarded() {
        #[derive(Debug, Clone, PartialEq)]
        struct Field {
            name: &'static str,
        }

        let start = TokioInstant::now();
        let (log, action) = recorder::<Field, u32>(start);
        let debouncer = debounce(action, ms(50)).unwrap();

        debouncer.call(Field { name: "first" }, 1);
        debouncer.call(Field { name: "second" }, 2);
        debouncer.call(Field { name: "third" }, 3);
        sleep(ms(100)).await;

        let log = log.lock();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].1, Field { name: "third" });
        assert_eq!(log[0].2, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_state_transitions() {
        let (log, action) = recorder::<(), ()>(TokioInstant::now());
        let debouncer = debounce(action, ms(300)).unwrap();
        assert_eq!(debouncer.state(), DebounceState::Idle);

        debouncer.call((), ());
        assert_eq!(debouncer.state(), DebounceState::Pending);

        sleep(ms(200)).await;
        debouncer.call((), ());
        assert_eq!(debouncer.state(), DebounceState::Pending);

        sleep(ms(301)).await;
        assert_eq!(debouncer.state(), DebounceState::Idle);
        assert_eq!(log.lock().len(), 1);

        // A new call starts the cycle again
        debouncer.call((), ());
        assert!(debouncer.is_pending());
        sleep(ms(301)).await;
        assert_eq!(log.lock().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_discards_pending_call() {
        let (log, action) = recorder::<(), &str>(TokioInstant::now());
        let debouncer = debounce(action, ms(100)).unwrap();

        assert!(!debouncer.cancel());

        debouncer.call((), "dropped");
        assert!(debouncer.cancel());
        assert!(!debouncer.is_pending());

        sleep(ms(500)).await;
        assert!(log.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_runs_now_and_only_once() {
        let start = TokioInstant::now();
        let (log, action) = recorder::<(), &str>(start);
        let debouncer = debounce(action, ms(300)).unwrap();

        assert!(!debouncer.flush());

        debouncer.call((), "a");
        debouncer.call((), "b");
        sleep(ms(100)).await;
        assert!(debouncer.flush());
        assert_eq!(*log.lock(), vec![(ms(100), (), "b")]);

        sleep(ms(1000)).await;
        assert_eq!(log.lock().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_debouncer_cancels_timer() {
        let (log, action) = recorder::<(), &str>(TokioInstant::now());
        let debouncer = debounce(action, ms(100)).unwrap();
        let clone = debouncer.clone();

        debouncer.call((), "pending");
        drop(debouncer);
        assert!(clone.is_pending());
        drop(clone);

        sleep(ms(500)).await;
        assert!(log.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_delay_collapses_within_one_tick() {
        let (log, action) = recorder::<(), u32>(TokioInstant::now());
        let debouncer = debounce(action, Duration::ZERO).unwrap();

        // Same tick: only the last survives
        debouncer.call((), 1);
        debouncer.call((), 2);
        sleep(ms(1)).await;

        // Separate ticks: each fires
        debouncer.call((), 3);
        sleep(ms(1)).await;
        debouncer.call((), 4);
        sleep(ms(1)).await;

        let args: Vec<u32> = log.lock().iter().map(|(_, _, a)| *a).collect();
        assert_eq!(args, vec![2, 3, 4]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_into_fn_keeps_signature() {
        let (log, action) = recorder::<&str, String>(TokioInstant::now());
        let wrapped = debounce(action, ms(10)).unwrap().into_fn();

        let listener = wrapped.clone();
        listener("input", "he".to_string());
        wrapped("input", "hello".to_string());
        sleep(ms(50)).await;

        let log = log.lock();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].1, "input");
        assert_eq!(log[0].2, "hello");
    }

    #[tokio::test(start_paused = true)]
    async fn test_action_may_call_back_into_debouncer() {
        let count = Arc::new(Mutex::new(0u32));
        let slot: Arc<Mutex<Option<Debouncer<(), u32>>>> = Arc::new(Mutex::new(None));

        let count_clone = Arc::clone(&count);
        let slot_clone = Arc::clone(&slot);
        let debouncer = debounce(
            move |_: (), remaining: u32| {
                *count_clone.lock() += 1;
                if remaining > 0 {
                    if let Some(d) = slot_clone.lock().as_ref() {
                        d.call((), remaining - 1);
                    }
                }
            },
            ms(10),
        )
        .unwrap();
        *slot.lock() = Some(debouncer.clone());

        debouncer.call((), 2);
        sleep(ms(100)).await;
        assert_eq!(*count.lock(), 3);

        // Break the reference cycle
        slot.lock().take();
    }

    #[tokio::test(start_paused = true)]
    async fn test_random_schedules_fire_last_of_each_burst() {
        const DELAY: u64 = 300;

        for seed in 0..8u64 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let (log, action) = recorder::<(), usize>(TokioInstant::now());
            let debouncer = debounce(action, ms(DELAY)).unwrap();

            // Gaps land on the delay itself now and then
            let gaps: Vec<u64> = (0..40)
                .map(|_| match rng.gen_range(0..10) {
                    0..=5 => rng.gen_range(0..DELAY),
                    6 => DELAY,
                    _ => rng.gen_range(DELAY..DELAY * 2),
                })
                .collect();

            for (i, gap) in gaps.iter().enumerate() {
                debouncer.call((), i);
                if *gap > 0 {
                    sleep(ms(*gap)).await;
                }
            }
            sleep(ms(DELAY * 2)).await;

            // Call i survives when the following gap reaches the delay
            let expected: Vec<usize> = gaps
                .iter()
                .enumerate()
                .filter(|(i, gap)| *i == gaps.len() - 1 || **gap >= DELAY)
                .map(|(i, _)| i)
                .collect();
            let fired: Vec<usize> = log.lock().iter().map(|(_, _, i)| *i).collect();
            assert_eq!(fired, expected, "seed {}", seed);
        }
    }

    #[test]
    fn test_negative_delay_rejected() {
        let scheduler = ThreadScheduler::new().unwrap();
        let err = Debouncer::<(), (), _>::from_millis(|_, _| {}, -1, scheduler).unwrap_err();
        assert!(matches!(err, DebounceError::InvalidArgument(_)));

        assert_eq!(delay_from_millis(0).unwrap(), Duration::ZERO);
        assert_eq!(delay_from_millis(300).unwrap(), DEFAULT_DELAY);
    }

    #[test]
    fn test_debounce_requires_runtime() {
        let err = debounce(|_: (), _: ()| {}, DEFAULT_DELAY).unwrap_err();
        assert!(matches!(err, DebounceError::Scheduler(_)));
    }

    #[test]
    fn test_thread_scheduler_burst() {
        let scheduler = ThreadScheduler::new().unwrap();
        let (tx, rx) = crossbeam_channel::unbounded::<(&'static str, u32)>();
        let debouncer = Debouncer::new(
            move |caller, n| tx.send((caller, n)).unwrap(),
            ms(50),
            scheduler,
        );

        for n in 0..10 {
            debouncer.call("burst", n);
        }
        assert_eq!(debouncer.delay(), ms(50));

        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), ("burst", 9));
        assert!(rx.recv_timeout(ms(200)).is_err());
        assert!(!debouncer.is_pending());
    }
}
