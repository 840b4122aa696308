//! Destinations for formatted log lines

use std::sync::{Arc, Mutex, PoisonError};
use tracing::Level;

/// Receives one formatted line per logged request
///
/// Sinks are shared by every request in flight and must tolerate
/// concurrent calls.
pub trait LogSink: Send + Sync {
    /// Write `line` at `level`
    fn log(&self, level: Level, line: &str);
}

/// Emits lines through `tracing` under the `reqline` target.
///
/// Used whenever no other sink is configured.
#[derive(Clone, Debug, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, level: Level, line: &str) {
        match level {
            Level::ERROR => tracing::error!(target: "reqline", "{}", line),
            Level::WARN => tracing::warn!(target: "reqline", "{}", line),
            Level::INFO => tracing::info!(target: "reqline", "{}", line),
            Level::DEBUG => tracing::debug!(target: "reqline", "{}", line),
            _ => tracing::trace!(target: "reqline", "{}", line),
        }
    }
}

/// Keeps lines in memory, mostly for tests
#[derive(Clone, Debug, Default)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<(Level, String)>>>,
}

impl MemorySink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Every line written so far
    pub fn lines(&self) -> Vec<String> {
        self.entries().into_iter().map(|(_, line)| line).collect()
    }

    /// Every line written so far, with its level
    pub fn entries(&self) -> Vec<(Level, String)> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The most recent line
    pub fn last(&self) -> Option<String> {
        self.lines().pop()
    }

    /// Whether nothing was written
    pub fn is_empty(&self) -> bool {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }

    /// Forget written lines
    pub fn clear(&self) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl LogSink for MemorySink {
    fn log(&self, level: Level, line: &str) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((level, line.to_string()));
    }
}
