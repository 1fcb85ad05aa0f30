//! Shared types used across all modules.
//!
//! This module defines the core data structures for repository references,
//! queue items, file snapshots, session state, and metrics. Other modules
//! import from here rather than reaching into each other's internals.

use serde::{Deserialize, Serialize};
use strum::Display;

use crate::classify::{FileKind, SpecialRole};

/// A structured (owner, name) repository reference.
///
/// Derived once from user input via [`RepoRef::parse`]; immutable for the
/// session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    /// Parse a human-entered repository identifier.
    ///
    /// Accepts `owner/name`, a full `https://github.com/owner/name` URL
    /// (one trailing slash tolerated), or a scheme-less `github.com/owner/name`.
    /// Returns `None` on malformed input — this is a validation result,
    /// not a fault, so callers can surface it without an error chain.
    pub fn parse(identifier: &str) -> Option<Self> {
        let mut rest = identifier.trim();

        for scheme in ["https://", "http://"] {
            if let Some(stripped) = rest.strip_prefix(scheme) {
                rest = stripped;
            }
        }
        for host in ["www.github.com/", "github.com/"] {
            if let Some(stripped) = rest.strip_prefix(host) {
                rest = stripped;
            }
        }
        // One trailing slash is a common paste artifact.
        rest = rest.strip_suffix('/').unwrap_or(rest);

        let mut segments = rest.split('/');
        let owner = segments.next()?;
        let name = segments.next()?;
        if owner.is_empty() || name.is_empty() || segments.next().is_some() {
            return None;
        }

        Some(Self {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }
}

impl std::fmt::Display for RepoRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// One entry from the recursive repository tree listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub path: String,
    /// Host-side object type (`blob` for files).
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub size: Option<u64>,
}

impl TreeEntry {
    pub fn is_file(&self) -> bool {
        self.kind == "blob"
    }
}

/// A freshly fetched file with the version token required for the
/// subsequent conditional write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSnapshot {
    pub path: String,
    pub content: String,
    /// Opaque host-provided token (SHA); must match the version read or
    /// the write fails with a conflict.
    pub version_token: String,
}

/// One queued file path plus its derived classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueItem {
    pub path: String,
    pub kind: FileKind,
    pub special: SpecialRole,
}

/// Operational status of the processing session.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum SessionState {
    /// Nothing discovered, or manually reset.
    Idle,
    /// Building the work queue from the repository tree.
    Indexing,
    /// One queue item is in flight.
    #[strum(to_string = "processing {0}")]
    Processing(String),
    /// Armed and waiting for the next timer tick.
    Standby,
    /// Queue exhausted naturally; distinct from a user-initiated stop.
    Finished,
}

/// Terminal outcome of processing one queue item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Outcome {
    Mutated,
    Skipped,
    Error,
    Cancelled,
}

/// Session counters, accumulated for the lifetime of one
/// discover→exhaust session and reset on a fresh discover.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Metrics {
    /// Files whose content changed and was committed.
    pub mutations: u64,
    /// Model inference steps that completed.
    pub steps: u64,
    /// Files that failed after retries.
    pub errors: u64,
    /// Recomputed from cursor / queue length, not accumulated.
    pub progress_percent: u8,
}

impl Metrics {
    /// Recompute the progress percentage from cursor position.
    pub fn set_progress(&mut self, cursor: usize, queue_len: usize) {
        self.progress_percent = if queue_len == 0 {
            0
        } else {
            ((cursor * 100) / queue_len).min(100) as u8
        };
    }
}
