//! Bounded session journal.
//!
//! A ring buffer of the most recent log entries, exposed read-only to the
//! host/UI collaborator. Every terminal per-file outcome produces exactly
//! one entry with a stable category tag; the counters in
//! [`crate::models::Metrics`] remain the durable record of session health.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;
use strum::Display;

use crate::constants::JOURNAL_CAPACITY;

/// Stable category tag for an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum LogCategory {
    Info,
    Mutated,
    Skipped,
    Error,
    Cancelled,
}

/// One journal entry.
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub at: DateTime<Utc>,
    pub category: LogCategory,
    pub message: String,
}

/// Fixed-capacity ring buffer of log entries.
#[derive(Debug)]
pub struct Journal {
    entries: VecDeque<LogEntry>,
    capacity: usize,
}

impl Journal {
    pub fn new() -> Self {
        Self::with_capacity(JOURNAL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an entry, evicting the oldest when full.
    pub fn push(&mut self, category: LogCategory, message: impl Into<String>) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(LogEntry {
            at: Utc::now(),
            category,
            message: message.into(),
        });
    }

    /// Most-recent entries, oldest first.
    pub fn recent(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for Journal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_and_read_back() {
        let mut journal = Journal::new();
        journal.push(LogCategory::Mutated, "src/app.ts rewritten");
        journal.push(LogCategory::Error, "util.js failed");
        let messages: Vec<&str> = journal.recent().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["src/app.ts rewritten", "util.js failed"]);
    }

    #[test]
    fn capacity_is_bounded() {
        let mut journal = Journal::with_capacity(3);
        for i in 0..10 {
            journal.push(LogCategory::Info, format!("entry {i}"));
        }
        assert_eq!(journal.len(), 3);
        let first = journal.recent().next().unwrap();
        assert_eq!(first.message, "entry 7");
    }

    #[test]
    fn category_tags_render_uppercase() {
        assert_eq!(LogCategory::Skipped.to_string(), "SKIPPED");
        assert_eq!(LogCategory::Cancelled.to_string(), "CANCELLED");
    }
}
