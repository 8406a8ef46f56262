//! High-level API over the raw store.

use crate::{SecureStore, StorageError, StorageResult, StoreKeys};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

/// Typed access to the session engine's persisted state.
///
/// JSON records that fail to parse are treated as absent: the corrupt key is
/// dropped and `None` returned, so a bad write can never wedge the engine.
pub struct SessionVault {
    store: Box<dyn SecureStore>,
}

impl SessionVault {
    /// Create a new vault over the given storage backend
    pub fn new(store: Box<dyn SecureStore>) -> Self {
        Self { store }
    }

    // ==========================================
    // Credential
    // ==========================================

    /// Store the bearer credential
    pub fn set_token(&self, token: &str) -> StorageResult<()> {
        self.store.set(StoreKeys::SESSION_TOKEN, token)
    }

    /// Retrieve the bearer credential
    pub fn get_token(&self) -> StorageResult<Option<String>> {
        self.store.get(StoreKeys::SESSION_TOKEN)
    }

    /// Delete the bearer credential
    pub fn clear_token(&self) -> StorageResult<bool> {
        self.store.remove(StoreKeys::SESSION_TOKEN)
    }

    /// Check if a credential exists
    pub fn has_token(&self) -> StorageResult<bool> {
        self.store.has(StoreKeys::SESSION_TOKEN)
    }

    // ==========================================
    // JSON records
    // ==========================================

    /// Store a JSON record under the given key
    pub fn set_record<T: Serialize>(&self, key: &str, value: &T) -> StorageResult<()> {
        let json =
            serde_json::to_string(value).map_err(|e| StorageError::Encoding(e.to_string()))?;
        self.store.set(key, &json)
    }

    /// Retrieve a JSON record. A corrupt record is dropped and read as absent.
    pub fn get_record<T: DeserializeOwned>(&self, key: &str) -> StorageResult<Option<T>> {
        let json = match self.store.get(key)? {
            Some(json) => json,
            None => return Ok(None),
        };

        match serde_json::from_str(&json) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(key = %key, error = %e, "Dropping corrupt persisted record");
                let _ = self.store.remove(key);
                Ok(None)
            }
        }
    }

    /// Delete a JSON record
    pub fn clear_record(&self, key: &str) -> StorageResult<bool> {
        self.store.remove(key)
    }

    /// Check whether a record exists (without parsing it)
    pub fn has_record(&self, key: &str) -> StorageResult<bool> {
        self.store.has(key)
    }

    // ==========================================
    // Clear All
    // ==========================================

    /// Clear every session key, best-effort
    pub fn clear_all(&self) -> StorageResult<()> {
        let _ = self.store.remove(StoreKeys::SESSION_TOKEN);
        let _ = self.store.remove(StoreKeys::USER_SNAPSHOT);
        let _ = self.store.remove(StoreKeys::VERIFICATION_PROGRESS);
        Ok(())
    }
}
