//! Persistent session state store.
//!
//! A small filesystem-backed key-value store under
//! `~/.config/sovereign/state.json`. Holds only the resumable bits of a
//! session: the queue cursor, the selected model id, and the target
//! repository identifier. Survives process restart.

use std::collections::BTreeMap;
use std::path::PathBuf;

/// Well-known keys.
pub const KEY_CURSOR: &str = "cursor";
pub const KEY_MODEL: &str = "model";
pub const KEY_REPO: &str = "repo";

/// Filesystem-backed key-value store.
///
/// Reads and writes are best-effort: a missing or unreadable state file
/// behaves like an empty store, and write failures are silently dropped
/// so persistence problems never fail a processing cycle.
pub struct StateStore {
    state_path: Option<PathBuf>,
}

impl StateStore {
    /// Create a store using the default state location.
    pub fn new() -> Self {
        let state_path = dirs::config_dir()
            .map(|d| d.join(crate::constants::CONFIG_DIR).join("state.json"));
        Self { state_path }
    }

    /// Create a store rooted at a specific directory (useful for testing).
    pub fn new_with_dir(dir: PathBuf) -> Self {
        Self {
            state_path: Some(dir.join("state.json")),
        }
    }

    /// Get a value by key.
    pub fn get(&self, key: &str) -> Option<String> {
        self.read_map().remove(key)
    }

    /// Get a value parsed as an integer cursor.
    pub fn get_cursor(&self) -> Option<usize> {
        self.get(KEY_CURSOR)?.parse().ok()
    }

    /// Set a value by key, persisting immediately.
    pub fn set(&self, key: &str, value: &str) {
        let mut map = self.read_map();
        map.insert(key.to_string(), value.to_string());
        self.write_map(&map);
    }

    /// Remove a key, persisting immediately.
    pub fn remove(&self, key: &str) {
        let mut map = self.read_map();
        if map.remove(key).is_some() {
            self.write_map(&map);
        }
    }

    fn read_map(&self) -> BTreeMap<String, String> {
        let Some(ref path) = self.state_path else {
            return BTreeMap::new();
        };
        std::fs::read_to_string(path)
            .ok()
            .and_then(|content| serde_json::from_str(&content).ok())
            .unwrap_or_default()
    }

    fn write_map(&self, map: &BTreeMap<String, String>) {
        let Some(ref path) = self.state_path else {
            return;
        };
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        if let Ok(content) = serde_json::to_string_pretty(map) {
            let _ = std::fs::write(path, content);
        }
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new_with_dir(dir.path().to_path_buf());
        store.set(KEY_REPO, "owner/repo");
        assert_eq!(store.get(KEY_REPO).as_deref(), Some("owner/repo"));
    }

    #[test]
    fn missing_key_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new_with_dir(dir.path().to_path_buf());
        assert!(store.get("absent").is_none());
    }

    #[test]
    fn cursor_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new_with_dir(dir.path().to_path_buf());
        store.set(KEY_CURSOR, "7");
        assert_eq!(store.get_cursor(), Some(7));
    }

    #[test]
    fn malformed_cursor_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new_with_dir(dir.path().to_path_buf());
        store.set(KEY_CURSOR, "not-a-number");
        assert_eq!(store.get_cursor(), None);
    }

    #[test]
    fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = StateStore::new_with_dir(dir.path().to_path_buf());
            store.set(KEY_MODEL, "gemini-2.0-flash");
        }
        let reopened = StateStore::new_with_dir(dir.path().to_path_buf());
        assert_eq!(reopened.get(KEY_MODEL).as_deref(), Some("gemini-2.0-flash"));
    }

    #[test]
    fn remove_deletes_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new_with_dir(dir.path().to_path_buf());
        store.set(KEY_CURSOR, "3");
        store.remove(KEY_CURSOR);
        assert!(store.get(KEY_CURSOR).is_none());
    }

    #[test]
    fn corrupt_state_file_behaves_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("state.json"), "{ not json").unwrap();
        let store = StateStore::new_with_dir(dir.path().to_path_buf());
        assert!(store.get(KEY_REPO).is_none());
        // And writes still work afterwards.
        store.set(KEY_REPO, "a/b");
        assert_eq!(store.get(KEY_REPO).as_deref(), Some("a/b"));
    }
}
