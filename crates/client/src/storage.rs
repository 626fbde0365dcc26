//! Persistent key-value storage.
//!
//! The token store and the flash-notification envelope both sit on top of a
//! [`KeyValueStore`]:
//! - [`FileStore`]: JSON files in a directory, by default the platform config
//!   directory:
//!   - Linux: `~/.config/petadmin/`
//!   - macOS: `~/Library/Application Support/petadmin/`
//!   - Windows: `%APPDATA%\petadmin\`
//! - [`MemoryStore`]: process-lifetime storage, used by tests and embedders.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Serialize};

/// A string key-value surface.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    /// Returns `true` if the value was stored.
    fn set(&self, key: &str, value: &str) -> bool;

    fn remove(&self, key: &str);
}

/// Serialize and store a value. Returns `true` on success.
pub fn save<T: Serialize>(store: &dyn KeyValueStore, key: &str, value: &T) -> bool {
    match serde_json::to_string(value) {
        Ok(json) => store.set(key, &json),
        Err(_) => false,
    }
}

/// Load and deserialize a value. `None` if missing or unreadable.
pub fn load<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
    let json = store.get(key)?;
    serde_json::from_str(&json).ok()
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> bool {
        self.values.lock().insert(key.to_string(), value.to_string());
        true
    }

    fn remove(&self, key: &str) {
        self.values.lock().remove(key);
    }
}

/// One file per key under a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store under the platform config directory, `None` if there is none.
    pub fn in_config_dir() -> Option<Self> {
        let config_dir = dirs::config_dir()?;
        Some(Self::new(config_dir.join("petadmin")))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_path(&self, key: &str) -> PathBuf {
        // Keys become file names.
        let safe_key = key.replace(['/', '\\', ':', '*', '?', '"', '<', '>', '|'], "_");
        self.dir.join(format!("{safe_key}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        std::fs::read_to_string(self.file_path(key)).ok()
    }

    fn set(&self, key: &str, value: &str) -> bool {
        if !self.dir.exists() && std::fs::create_dir_all(&self.dir).is_err() {
            tracing::warn!(dir = %self.dir.display(), "cannot create storage directory");
            return false;
        }
        std::fs::write(self.file_path(key), value).is_ok()
    }

    fn remove(&self, key: &str) {
        let _ = std::fs::remove_file(self.file_path(key));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_round_trip() {
        let store = MemoryStore::new();
        assert!(save(&store, "user", &vec![1, 2, 3]));
        assert_eq!(load::<Vec<i32>>(&store, "user"), Some(vec![1, 2, 3]));
        store.remove("user");
        assert_eq!(store.get("user"), None);
    }

    #[test]
    fn file_store_sanitizes_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("nested"));
        assert!(store.set("a/b:c", "42"));
        assert!(dir.path().join("nested").join("a_b_c.json").exists());
        assert_eq!(store.get("a/b:c").as_deref(), Some("42"));
        store.remove("a/b:c");
        assert_eq!(store.get("a/b:c"), None);
    }

    #[test]
    fn load_ignores_garbage() {
        let store = MemoryStore::new();
        store.set("user", "{not json");
        assert_eq!(load::<Vec<i32>>(&store, "user"), None);
    }
}
