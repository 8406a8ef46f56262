//! Session engine error types.

use thiserror::Error;

/// Session engine error type.
#[derive(Error, Debug)]
pub enum AuthError {
    /// Invalid identifier or password
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// The server rejected the bearer credential on an authenticated call
    #[error("Session credential rejected by the server")]
    TokenRejected,

    /// No credential is held
    #[error("Not logged in")]
    NotLoggedIn,

    /// OAuth handshake error carried from the provider
    #[error("OAuth error: {0}")]
    OAuth(String),

    /// An OAuth handshake cannot be cancelled while its credential is being resolved
    #[error("OAuth handshake is resolving and cannot be cancelled")]
    HandshakeBusy,

    /// The OAuth handshake was already disposed
    #[error("OAuth handshake is closed")]
    HandshakeClosed,

    /// Invalid state transition in a session FSM
    #[error("Invalid session state transition: {0}")]
    InvalidStateTransition(String),

    /// Non-auth API failure
    #[error("API error (HTTP {status}): {detail}")]
    Api { status: u16, detail: String },

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] worklane_storage::StorageError),

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parse error
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Operation timed out
    #[error("Operation timed out")]
    Timeout,

    /// Network unavailable (transient, can retry)
    #[error("Network unavailable")]
    NetworkUnavailable,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl AuthError {
    /// Returns true if this error is transient and the operation can be retried.
    ///
    /// Transient errors include network unavailability, connection timeouts,
    /// and 5xx server responses. A rejected credential is never transient.
    pub fn is_transient(&self) -> bool {
        match self {
            AuthError::NetworkUnavailable => true,
            AuthError::Timeout => true,
            AuthError::Http(e) => {
                if e.is_connect() || e.is_timeout() {
                    return true;
                }
                if let Some(status) = e.status() {
                    return status.is_server_error();
                }
                false
            }
            AuthError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Result type alias using AuthError.
pub type AuthResult<T> = Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_transient_network_unavailable() {
        assert!(AuthError::NetworkUnavailable.is_transient());
    }

    #[test]
    fn test_is_transient_timeout() {
        assert!(AuthError::Timeout.is_transient());
    }

    #[test]
    fn test_is_transient_server_error() {
        let err = AuthError::Api {
            status: 503,
            detail: "unavailable".to_string(),
        };
        assert!(err.is_transient());
    }

    #[test]
    fn test_is_not_transient_client_error() {
        let err = AuthError::Api {
            status: 422,
            detail: "validation".to_string(),
        };
        assert!(!err.is_transient());
    }

    #[test]
    fn test_is_not_transient_invalid_credentials() {
        assert!(!AuthError::InvalidCredentials("bad password".to_string()).is_transient());
    }

    #[test]
    fn test_is_not_transient_token_rejected() {
        assert!(!AuthError::TokenRejected.is_transient());
    }

    #[test]
    fn test_is_not_transient_not_logged_in() {
        assert!(!AuthError::NotLoggedIn.is_transient());
    }

    #[test]
    fn test_is_not_transient_handshake_busy() {
        assert!(!AuthError::HandshakeBusy.is_transient());
    }
}
