//! JSON-file storage backend.

use crate::{SecureStore, StorageError, StorageResult};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::warn;

/// File-backed store holding all keys in one JSON object.
///
/// The whole map is rewritten on every mutation; reads are served from the
/// in-memory copy loaded at construction. An unreadable or corrupt file is
/// treated as empty, never as a fatal error.
pub struct FileStore {
    path: PathBuf,
    data: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Create a store backed by the given file, loading existing contents.
    pub fn new(path: PathBuf) -> Self {
        let data = Self::load(&path);
        Self {
            path,
            data: Mutex::new(data),
        }
    }

    fn load(path: &PathBuf) -> BTreeMap<String, String> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(_) => return BTreeMap::new(),
        };

        match serde_json::from_str(&content) {
            Ok(map) => map,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Store file is corrupt, starting empty");
                BTreeMap::new()
            }
        }
    }

    fn flush(&self, data: &BTreeMap<String, String>) -> StorageResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(data)
            .map_err(|e| StorageError::Encoding(e.to_string()))?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

impl SecureStore for FileStore {
    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut data = self.data.lock().unwrap();
        data.insert(key.to_string(), value.to_string());
        self.flush(&data)
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let data = self.data.lock().unwrap();
        Ok(data.get(key).cloned())
    }

    fn remove(&self, key: &str) -> StorageResult<bool> {
        let mut data = self.data.lock().unwrap();
        let existed = data.remove(key).is_some();
        if existed {
            self.flush(&data)?;
        }
        Ok(existed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_set_get_remove() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().join("session.json"));

        store.set("alpha", "1").unwrap();
        store.set("beta", "2").unwrap();
        assert_eq!(store.get("alpha").unwrap(), Some("1".to_string()));

        assert!(store.remove("alpha").unwrap());
        assert!(!store.remove("alpha").unwrap());
        assert_eq!(store.get("alpha").unwrap(), None);
        assert_eq!(store.get("beta").unwrap(), Some("2".to_string()));
    }

    #[test]
    fn test_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");

        {
            let store = FileStore::new(path.clone());
            store.set("token", "bearer-xyz").unwrap();
        }

        let reopened = FileStore::new(path);
        assert_eq!(reopened.get("token").unwrap(), Some("bearer-xyz".to_string()));
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().join("nope.json"));
        assert_eq!(store.get("anything").unwrap(), None);
    }

    #[test]
    fn test_corrupt_file_is_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "{not valid json").unwrap();

        let store = FileStore::new(path);
        assert_eq!(store.get("anything").unwrap(), None);

        // Store remains writable after recovering from corruption
        store.set("key", "value").unwrap();
        assert_eq!(store.get("key").unwrap(), Some("value".to_string()));
    }

    #[test]
    fn test_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("session.json");

        let store = FileStore::new(path.clone());
        store.set("key", "value").unwrap();

        assert!(path.exists());
    }
}
