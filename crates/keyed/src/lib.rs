//! Per-key debouncing for settle
//!
//! A [`KeyedDebouncer`] keeps one independent [`Debouncer`] per key (a path,
//! an input field, a session id), so bursts on one key never supersede calls
//! on another. Per-key debouncers are created on first use and can be purged
//! once idle.

use dashmap::DashMap;
use settle_core::{Debouncer, Result, Scheduler, TokioScheduler};
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

type KeyedAction<K, C, A> = Arc<dyn Fn(K, C, A) + Send + Sync + 'static>;

/// Debouncer applying the trailing-edge contract independently per key
pub struct KeyedDebouncer<K, C, A, S = TokioScheduler>
where
    K: Eq + Hash,
    S: Scheduler + Clone,
{
    action: KeyedAction<K, C, A>,
    delay: Duration,
    scheduler: S,
    slots: DashMap<K, Debouncer<C, A, S>>,
}

impl<K, C, A, S> KeyedDebouncer<K, C, A, S>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    C: Send + 'static,
    A: Send + 'static,
    S: Scheduler + Clone,
{
    /// Wrap `action`; it receives the key along with the context and args
    pub fn new<F>(action: F, delay: Duration, scheduler: S) -> Self
    where
        F: Fn(K, C, A) + Send + Sync + 'static,
    {
        Self {
            action: Arc::new(action),
            delay,
            scheduler,
            slots: DashMap::new(),
        }
    }

    /// Wrap `action` with a delay in signed milliseconds (negative is rejected)
    pub fn from_millis<F>(action: F, delay_ms: i64, scheduler: S) -> Result<Self>
    where
        F: Fn(K, C, A) + Send + Sync + 'static,
    {
        Ok(Self::new(action, settle_core::delay_from_millis(delay_ms)?, scheduler))
    }

    /// Debounced call for `key`
    pub fn call(&self, key: K, context: C, args: A) {
        // The entry stays locked while scheduling, so a concurrent
        // purge_idle cannot drop the debouncer between lookup and call.
        self.slots
            .entry(key.clone())
            .or_insert_with(|| self.debouncer_for(key))
            .call(context, args);
    }

    /// Discard the pending call for `key`
    pub fn cancel(&self, key: &K) -> bool {
        self.slots.get(key).map(|d| d.cancel()).unwrap_or(false)
    }

    /// Discard all pending calls, returning how many were pending
    pub fn cancel_all(&self) -> usize {
        let cancelled = self.slots.iter().filter(|entry| entry.value().cancel()).count();
        if cancelled > 0 {
            debug!("Cancelled {} pending keys", cancelled);
        }
        cancelled
    }

    /// Run the pending call for `key` now
    pub fn flush(&self, key: &K) -> bool {
        // Clone out so the action runs without holding the map shard
        let debouncer = self.slots.get(key).map(|entry| entry.value().clone());
        debouncer.map(|d| d.flush()).unwrap_or(false)
    }

    /// Run every pending call now, returning how many ran
    pub fn flush_all(&self) -> usize {
        let pending: Vec<Debouncer<C, A, S>> = self
            .slots
            .iter()
            .filter(|entry| entry.value().is_pending())
            .map(|entry| entry.value().clone())
            .collect();

        let flushed = pending.iter().filter(|d| d.flush()).count();
        if flushed > 0 {
            debug!("Flushed {} pending keys", flushed);
        }
        flushed
    }

    pub fn is_pending(&self, key: &K) -> bool {
        self.slots.get(key).map(|d| d.is_pending()).unwrap_or(false)
    }

    /// Number of keys with a pending call
    pub fn pending_count(&self) -> usize {
        self.slots.iter().filter(|entry| entry.value().is_pending()).count()
    }

    /// Number of tracked keys, idle or pending
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Drop per-key debouncers with nothing pending
    pub fn purge_idle(&self) -> usize {
        let before = self.slots.len();
        self.slots.retain(|_, debouncer| debouncer.is_pending());
        let purged = before.saturating_sub(self.slots.len());
        if purged > 0 {
            trace!("Purged {} idle keys", purged);
        }
        purged
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    fn debouncer_for(&self, key: K) -> Debouncer<C, A, S> {
        let action = Arc::clone(&self.action);
        Debouncer::new(
            move |context, args| action(key.clone(), context, args),
            self.delay,
            self.scheduler.clone(),
        )
    }
}
