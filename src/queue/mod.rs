//! Work queue and cursor.
//!
//! Builds the ordered list of candidate paths from a tree listing and
//! owns the monotonic cursor into it. The queue is immutable after
//! construction until the next discover; insertion order encodes
//! priority — instruction files first, then the project-context file,
//! then everything else in listing order (a stable partition, not a
//! full sort).

use crate::classify::{self, SpecialRole};
use crate::constants::MAX_FILE_BYTES;
use crate::models::{QueueItem, TreeEntry};

/// Ordered queue of items plus the cursor position.
#[derive(Debug, Default)]
pub struct WorkQueue {
    items: Vec<QueueItem>,
    cursor: usize,
}

impl WorkQueue {
    /// Build a queue from tree candidates.
    ///
    /// Drops non-file entries, skip-listed paths, files over
    /// [`MAX_FILE_BYTES`], and files outside the recognised extension
    /// sets (special files are kept regardless of extension). The cursor
    /// starts at zero.
    pub fn build(candidates: &[TreeEntry]) -> Self {
        let mut instructions = Vec::new();
        let mut context = Vec::new();
        let mut rest = Vec::new();

        for entry in candidates {
            if !entry.is_file() {
                continue;
            }
            if entry.size.unwrap_or(0) > MAX_FILE_BYTES {
                continue;
            }
            let classification = classify::classify(&entry.path);
            if classification.skip {
                continue;
            }
            if classification.special == SpecialRole::None
                && !classify::has_known_extension(&entry.path)
            {
                continue;
            }

            let item = QueueItem {
                path: entry.path.clone(),
                kind: classification.kind,
                special: classification.special,
            };
            match classification.special {
                SpecialRole::Instructions => instructions.push(item),
                SpecialRole::Context => context.push(item),
                SpecialRole::None => rest.push(item),
            }
        }

        let mut items = instructions;
        items.append(&mut context);
        items.append(&mut rest);

        Self { items, cursor: 0 }
    }

    /// Item under the cursor, or `None` when exhausted.
    pub fn current(&self) -> Option<&QueueItem> {
        self.items.get(self.cursor)
    }

    /// Advance the cursor by exactly one. Saturates at the queue length;
    /// must not be called while a processing operation is in flight.
    pub fn advance(&mut self) {
        if self.cursor < self.items.len() {
            self.cursor += 1;
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.items.len()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Restore a persisted cursor, clamped to the queue length so a
    /// stale value from a shrunken repository cannot break the
    /// `cursor ≤ len` invariant.
    pub fn set_cursor(&mut self, cursor: usize) {
        self.cursor = cursor.min(self.items.len());
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::FileKind;

    fn blob(path: &str, size: u64) -> TreeEntry {
        TreeEntry {
            path: path.to_string(),
            kind: "blob".to_string(),
            size: Some(size),
        }
    }

    #[test]
    fn specials_sort_first_rest_keeps_order() {
        let candidates = vec![
            blob("a.js", 10),
            blob("README.md", 10),
            blob(".sovereign-instructions.md", 10),
            blob("b.py", 10),
        ];
        let queue = WorkQueue::build(&candidates);
        let paths: Vec<&str> = queue.items.iter().map(|i| i.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![".sovereign-instructions.md", "README.md", "a.js", "b.py"]
        );
    }

    #[test]
    fn skip_listed_and_oversize_dropped() {
        let candidates = vec![
            blob("node_modules/x/y.js", 10),
            blob("big.js", MAX_FILE_BYTES + 1),
            blob("ok.js", MAX_FILE_BYTES),
        ];
        let queue = WorkQueue::build(&candidates);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.current().unwrap().path, "ok.js");
    }

    #[test]
    fn unrecognised_extensions_dropped() {
        let candidates = vec![blob("logo.png", 10), blob("app.ts", 10)];
        let queue = WorkQueue::build(&candidates);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.current().unwrap().kind, FileKind::Code);
    }

    #[test]
    fn directories_dropped() {
        let candidates = vec![TreeEntry {
            path: "src".to_string(),
            kind: "tree".to_string(),
            size: None,
        }];
        assert!(WorkQueue::build(&candidates).is_empty());
    }

    #[test]
    fn cursor_walk_to_exhaustion() {
        let queue_entries = vec![blob("a.js", 1), blob("b.js", 1)];
        let mut queue = WorkQueue::build(&queue_entries);
        assert!(!queue.is_exhausted());
        assert_eq!(queue.current().unwrap().path, "a.js");

        queue.advance();
        assert_eq!(queue.current().unwrap().path, "b.js");
        assert_eq!(queue.cursor(), 1);

        queue.advance();
        assert!(queue.is_exhausted());
        assert!(queue.current().is_none());

        // Saturates; the invariant cursor ≤ len holds.
        queue.advance();
        assert_eq!(queue.cursor(), 2);
    }

    #[test]
    fn restore_cursor_clamps() {
        let mut queue = WorkQueue::build(&[blob("a.js", 1)]);
        queue.set_cursor(10);
        assert_eq!(queue.cursor(), 1);
        assert!(queue.is_exhausted());
    }

    #[test]
    fn empty_queue_is_exhausted() {
        let queue = WorkQueue::default();
        assert!(queue.is_exhausted());
        assert!(queue.current().is_none());
    }
}
