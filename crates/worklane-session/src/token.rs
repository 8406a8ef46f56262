//! Bearer credential manager.

use crate::{AuthError, AuthResult};
use std::sync::{Arc, Mutex};
use tracing::debug;
use worklane_storage::SessionVault;

/// Holds the session's bearer credential.
///
/// A dumb holder: it has no opinion on why a credential might be invalid.
/// Validity is established by the engine attempting an authenticated call
/// with it. The in-memory value is the source of truth for outbound calls;
/// the vault mirror exists only for durability across restarts.
pub struct TokenManager {
    vault: Arc<SessionVault>,
    current: Mutex<Option<String>>,
}

impl TokenManager {
    /// Create a manager holding no credential.
    pub fn new(vault: Arc<SessionVault>) -> Self {
        Self {
            vault,
            current: Mutex::new(None),
        }
    }

    /// Load the persisted credential into memory, returning it if present.
    pub fn restore(&self) -> AuthResult<Option<String>> {
        let token = self.vault.get_token()?;
        *self.current.lock().unwrap() = token.clone();
        Ok(token)
    }

    /// Set the credential, mirroring it to the vault.
    pub fn set(&self, token: &str) -> AuthResult<()> {
        self.vault.set_token(token)?;
        *self.current.lock().unwrap() = Some(token.to_string());
        debug!("Session credential set");
        Ok(())
    }

    /// Clear the credential from memory and the vault.
    ///
    /// Does not trigger navigation or any other side effect.
    pub fn clear(&self) -> AuthResult<()> {
        self.vault.clear_token()?;
        *self.current.lock().unwrap() = None;
        debug!("Session credential cleared");
        Ok(())
    }

    /// The current credential, if any.
    pub fn current(&self) -> Option<String> {
        self.current.lock().unwrap().clone()
    }

    /// The current credential, failing fast when absent.
    ///
    /// Authenticated calls go through this so a missing credential errors
    /// immediately instead of issuing an unauthenticated request.
    pub fn bearer(&self) -> AuthResult<String> {
        self.current().ok_or(AuthError::NotLoggedIn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::memory_vault;

    #[test]
    fn test_starts_empty() {
        let tokens = TokenManager::new(memory_vault());
        assert_eq!(tokens.current(), None);
        assert!(matches!(tokens.bearer(), Err(AuthError::NotLoggedIn)));
    }

    #[test]
    fn test_set_and_clear() {
        let vault = memory_vault();
        let tokens = TokenManager::new(Arc::clone(&vault));

        tokens.set("bearer-abc").unwrap();
        assert_eq!(tokens.current(), Some("bearer-abc".to_string()));
        assert_eq!(tokens.bearer().unwrap(), "bearer-abc");
        // Mirrored to the vault
        assert_eq!(vault.get_token().unwrap(), Some("bearer-abc".to_string()));

        tokens.clear().unwrap();
        assert_eq!(tokens.current(), None);
        assert_eq!(vault.get_token().unwrap(), None);
    }

    #[test]
    fn test_restore_from_vault() {
        let vault = memory_vault();
        vault.set_token("persisted-token").unwrap();

        let tokens = TokenManager::new(Arc::clone(&vault));
        // Not visible before restore
        assert_eq!(tokens.current(), None);

        let restored = tokens.restore().unwrap();
        assert_eq!(restored, Some("persisted-token".to_string()));
        assert_eq!(tokens.current(), Some("persisted-token".to_string()));
    }

    #[test]
    fn test_restore_with_empty_vault() {
        let tokens = TokenManager::new(memory_vault());
        assert_eq!(tokens.restore().unwrap(), None);
        assert_eq!(tokens.current(), None);
    }

    #[test]
    fn test_set_overwrites() {
        let tokens = TokenManager::new(memory_vault());
        tokens.set("first").unwrap();
        tokens.set("second").unwrap();
        assert_eq!(tokens.current(), Some("second".to_string()));
    }
}
