//! Durable key/value storage for the Worklane client.
//!
//! This crate provides:
//! - The `SecureStore` trait the session engine persists through
//! - A JSON-file backend (`FileStore`) for cross-restart durability
//! - The `SessionVault` typed API over the raw store
//!
//! There are no transactional guarantees across keys. Callers must tolerate
//! partial states (token present, user absent) and treat them as "needs
//! re-validation".

mod file;
mod keys;
mod traits;
mod vault;

pub use file::FileStore;
pub use keys::StoreKeys;
pub use traits::SecureStore;
pub use vault::SessionVault;

use std::path::PathBuf;
use thiserror::Error;

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Encoding/decoding error
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Create the default file-backed store at the given path.
pub fn create_store(path: PathBuf) -> StorageResult<Box<dyn SecureStore>> {
    Ok(Box::new(FileStore::new(path)))
}

/// Create a SessionVault over the default file-backed store.
pub fn create_vault(path: PathBuf) -> StorageResult<SessionVault> {
    let store = create_store(path)?;
    Ok(SessionVault::new(store))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// In-memory store for testing
    pub struct MemoryStore {
        data: std::sync::Mutex<std::collections::HashMap<String, String>>,
    }

    impl MemoryStore {
        pub fn new() -> Self {
            Self {
                data: std::sync::Mutex::new(std::collections::HashMap::new()),
            }
        }
    }

    impl SecureStore for MemoryStore {
        fn set(&self, key: &str, value: &str) -> StorageResult<()> {
            let mut data = self.data.lock().unwrap();
            data.insert(key.to_string(), value.to_string());
            Ok(())
        }

        fn get(&self, key: &str) -> StorageResult<Option<String>> {
            let data = self.data.lock().unwrap();
            Ok(data.get(key).cloned())
        }

        fn remove(&self, key: &str) -> StorageResult<bool> {
            let mut data = self.data.lock().unwrap();
            Ok(data.remove(key).is_some())
        }
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryStore::new();

        store.set("test_key", "test_value").unwrap();
        assert_eq!(store.get("test_key").unwrap(), Some("test_value".to_string()));

        assert!(store.has("test_key").unwrap());
        assert!(!store.has("nonexistent").unwrap());

        assert!(store.remove("test_key").unwrap());
        assert!(!store.remove("test_key").unwrap());
        assert_eq!(store.get("test_key").unwrap(), None);
    }

    #[test]
    fn test_vault_over_memory_store() {
        let vault = SessionVault::new(Box::new(MemoryStore::new()));

        vault.set_token("bearer-abc").unwrap();
        assert_eq!(vault.get_token().unwrap(), Some("bearer-abc".to_string()));

        vault.clear_all().unwrap();
        assert_eq!(vault.get_token().unwrap(), None);
    }
}
