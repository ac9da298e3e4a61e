//! Input events and their fired form

use serde::Serialize;
use std::time::Duration;

/// Where and when an input line was received
///
/// This is the call context handed to the debouncer: the action sees the
/// context of the line that survived the burst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EventContext {
    /// 1-based input line number
    pub line: u64,
    /// Milliseconds since the run started
    pub received_ms: u64,
}

/// An event whose quiet period elapsed (or that was flushed at EOF)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FiredEvent {
    pub line: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub payload: String,
    pub received_ms: u64,
    pub fired_ms: u64,
}

impl FiredEvent {
    pub fn new(context: EventContext, key: Option<String>, payload: String, fired: Duration) -> Self {
        Self {
            line: context.line,
            key,
            payload,
            received_ms: context.received_ms,
            fired_ms: as_millis(fired),
        }
    }

    /// One output line, without the trailing newline
    pub fn render(&self, json: bool) -> serde_json::Result<String> {
        if json {
            return serde_json::to_string(self);
        }

        Ok(match &self.key {
            Some(key) => format!("fired line={} key={} payload={}", self.line, key, self.payload),
            None => format!("fired line={} payload={}", self.line, self.payload),
        })
    }
}

/// Split `key<sep>payload`; without a separator the whole line is the key
pub fn split_keyed<'a>(line: &'a str, separator: &str) -> (&'a str, &'a str) {
    match line.split_once(separator) {
        Some((key, payload)) => (key.trim(), payload.trim_start()),
        None => (line.trim(), ""),
    }
}

pub fn as_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
