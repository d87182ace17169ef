//! Rolling connection log.
//!
//! A short, capped history of connection transitions and frame-level
//! errors, kept so an operator (or the status endpoint) can see what
//! the link has been doing without trawling process logs.

use std::collections::VecDeque;

use serde::Serialize;

use easel_core::types::Timestamp;

/// Entries kept before the oldest is dropped.
pub const LOG_CAPACITY: usize = 50;

/// Severity of one log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Info,
    Error,
}

/// One recorded connection event.
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub at: Timestamp,
    pub level: LogLevel,
    pub message: String,
}

/// Capped FIFO of connection events, newest last.
#[derive(Debug, Default)]
pub struct ConnectionLog {
    entries: VecDeque<LogEntry>,
}

impl ConnectionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.push(LogLevel::Info, message.into());
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.push(LogLevel::Error, message.into());
    }

    fn push(&mut self, level: LogLevel, message: String) {
        if self.entries.len() == LOG_CAPACITY {
            self.entries.pop_front();
        }
        self.entries.push_back(LogEntry {
            at: chrono::Utc::now(),
            level,
            message,
        });
    }

    /// Copy of the current entries, oldest first.
    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_keep_insertion_order() {
        let mut log = ConnectionLog::new();
        log.info("connected");
        log.error("receive error");
        log.info("reconnecting");

        let entries = log.snapshot();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].message, "connected");
        assert_eq!(entries[0].level, LogLevel::Info);
        assert_eq!(entries[1].level, LogLevel::Error);
        assert_eq!(entries[2].message, "reconnecting");
    }

    #[test]
    fn capacity_drops_oldest_first() {
        let mut log = ConnectionLog::new();
        for i in 0..LOG_CAPACITY + 10 {
            log.info(format!("entry {i}"));
        }

        assert_eq!(log.len(), LOG_CAPACITY);
        let entries = log.snapshot();
        assert_eq!(entries[0].message, "entry 10");
        assert_eq!(entries.last().unwrap().message, format!("entry {}", LOG_CAPACITY + 9));
    }
}
