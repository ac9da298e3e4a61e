//! Trailing-edge debouncing for settle
//!
//! This crate provides:
//! - [`Debouncer`]: collapses bursts of calls into one deferred call using
//!   the last call's context and arguments
//! - Pluggable timer backends (tokio tasks or a dedicated timer thread)
//! - TOML configuration with validation

pub mod config;
pub mod debouncer;
pub mod error;
pub mod scheduler;

pub use config::SettleConfig;
pub use debouncer::{
    debounce, delay_from_millis, DebounceState, Debouncer, Invocation, DEFAULT_DELAY,
};
pub use error::{DebounceError, Result};
pub use scheduler::{Scheduler, SchedulerKind, ThreadScheduler, TokioScheduler};
