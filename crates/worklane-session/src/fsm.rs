//! Session lifecycle state machine using rust-fsm.
//!
//! The engine's lifecycle is an explicit finite state machine rather than a
//! set of booleans derived from storage checks.
//!
//! ## State Diagram
//!
//! ```text
//! ┌───────────────┐
//! │ Uninitialized │ (initial)
//! └───────┬───────┘
//!         │ Bootstrap
//!         ▼
//! ┌───────────────┐  ServerVerified / SnapshotRestored   ┌──────────┐
//! │   Restoring   │ ───────────────────────────────────► │ LoggedIn │
//! └───────┬───────┘                                      └────┬─────┘
//!         │ NoSession / ServerRejected                        │
//!         ▼                                                   │ TokenRejected /
//! ┌───────────────┐  LoginAttempt   ┌───────────┐             │ LogoutRequested
//! │   LoggedOut   │ ──────────────► │ LoggingIn │             ▼
//! └───────────────┘                 └─────┬─────┘      ┌─────────────┐
//!         ▲                               │            │ TearingDown │
//!         │ LoginFailed                   │            └──────┬──────┘
//!         ├───────────────────────────────┘                   │
//!         │ TeardownComplete          LoginSuccess → LoggedIn │
//!         └───────────────────────────────────────────────────┘
//! ```

use rust_fsm::*;
use serde::{Deserialize, Serialize};

// Declarative FSM definition. Generates a `session_machine` module with
// State/Input enums and the StateMachine type alias.
state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub session_machine(Uninitialized)

    Uninitialized => {
        Bootstrap => Restoring
    },
    Restoring => {
        // Server confirmed the stored credential
        ServerVerified => LoggedIn,
        // Transient startup failure, last-known snapshot restored optimistically
        SnapshotRestored => LoggedIn,
        // Nothing persisted
        NoSession => LoggedOut,
        // Server rejected the stored credential
        ServerRejected => LoggedOut
    },
    LoggedOut => {
        LoginAttempt => LoggingIn
    },
    LoggingIn => {
        LoginSuccess => LoggedIn,
        LoginFailed => LoggedOut
    },
    LoggedIn => {
        // 401-class response on any authenticated call
        TokenRejected => TearingDown,
        LogoutRequested => TearingDown
    },
    TearingDown => {
        TeardownComplete => LoggedOut
    }
}

// Re-export the generated types with clearer names
pub use session_machine::Input as SessionMachineInput;
pub use session_machine::State as SessionMachineState;
pub use session_machine::StateMachine as SessionMachine;

/// Session lifecycle phase for external consumption.
///
/// A simplified view of the FSM state for UI and status reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// Engine has not started bootstrapping yet.
    Uninitialized,
    /// Startup validation of persisted state is in progress.
    Restoring,
    /// No active session.
    LoggedOut,
    /// A login exchange is in flight.
    LoggingIn,
    /// An authenticated session is active.
    LoggedIn,
    /// Session state is being torn down.
    TearingDown,
}

impl SessionPhase {
    /// Returns true when an authenticated session is active.
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionPhase::LoggedIn)
    }

    /// Returns true once startup validation has finished.
    ///
    /// Callers (route guards in particular) must not treat any answer as
    /// final before this is true.
    pub fn is_initialized(&self) -> bool {
        !matches!(self, SessionPhase::Uninitialized | SessionPhase::Restoring)
    }

    /// Returns true for in-progress states.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SessionPhase::Restoring | SessionPhase::LoggingIn | SessionPhase::TearingDown
        )
    }
}

impl From<&SessionMachineState> for SessionPhase {
    fn from(state: &SessionMachineState) -> Self {
        match state {
            SessionMachineState::Uninitialized => SessionPhase::Uninitialized,
            SessionMachineState::Restoring => SessionPhase::Restoring,
            SessionMachineState::LoggedOut => SessionPhase::LoggedOut,
            SessionMachineState::LoggingIn => SessionPhase::LoggingIn,
            SessionMachineState::LoggedIn => SessionPhase::LoggedIn,
            SessionMachineState::TearingDown => SessionPhase::TearingDown,
        }
    }
}

/// Payload for session phase change notifications.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionChangedPayload {
    /// Current session phase.
    pub phase: SessionPhase,
    /// User ID if a user is held.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// Callback type for session phase change notifications.
pub type SessionCallback = Box<dyn Fn(SessionChangedPayload) + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_is_uninitialized() {
        let machine = SessionMachine::new();
        assert_eq!(*machine.state(), SessionMachineState::Uninitialized);
    }

    #[test]
    fn test_bootstrap_no_session() {
        let mut machine = SessionMachine::new();

        machine.consume(&SessionMachineInput::Bootstrap).unwrap();
        assert_eq!(*machine.state(), SessionMachineState::Restoring);

        machine.consume(&SessionMachineInput::NoSession).unwrap();
        assert_eq!(*machine.state(), SessionMachineState::LoggedOut);
    }

    #[test]
    fn test_bootstrap_server_verified() {
        let mut machine = SessionMachine::new();

        machine.consume(&SessionMachineInput::Bootstrap).unwrap();
        machine
            .consume(&SessionMachineInput::ServerVerified)
            .unwrap();
        assert_eq!(*machine.state(), SessionMachineState::LoggedIn);
    }

    #[test]
    fn test_bootstrap_snapshot_fallback() {
        let mut machine = SessionMachine::new();

        machine.consume(&SessionMachineInput::Bootstrap).unwrap();
        machine
            .consume(&SessionMachineInput::SnapshotRestored)
            .unwrap();
        assert_eq!(*machine.state(), SessionMachineState::LoggedIn);
    }

    #[test]
    fn test_bootstrap_server_rejected() {
        let mut machine = SessionMachine::new();

        machine.consume(&SessionMachineInput::Bootstrap).unwrap();
        machine
            .consume(&SessionMachineInput::ServerRejected)
            .unwrap();
        assert_eq!(*machine.state(), SessionMachineState::LoggedOut);
    }

    #[test]
    fn test_login_flow() {
        let mut machine = SessionMachine::new();
        machine.consume(&SessionMachineInput::Bootstrap).unwrap();
        machine.consume(&SessionMachineInput::NoSession).unwrap();

        machine.consume(&SessionMachineInput::LoginAttempt).unwrap();
        assert_eq!(*machine.state(), SessionMachineState::LoggingIn);

        machine.consume(&SessionMachineInput::LoginSuccess).unwrap();
        assert_eq!(*machine.state(), SessionMachineState::LoggedIn);
    }

    #[test]
    fn test_login_failure_returns_to_logged_out() {
        let mut machine = SessionMachine::new();
        machine.consume(&SessionMachineInput::Bootstrap).unwrap();
        machine.consume(&SessionMachineInput::NoSession).unwrap();

        machine.consume(&SessionMachineInput::LoginAttempt).unwrap();
        machine.consume(&SessionMachineInput::LoginFailed).unwrap();
        assert_eq!(*machine.state(), SessionMachineState::LoggedOut);
    }

    #[test]
    fn test_logout_flow() {
        let mut machine = SessionMachine::new();
        machine.consume(&SessionMachineInput::Bootstrap).unwrap();
        machine.consume(&SessionMachineInput::NoSession).unwrap();
        machine.consume(&SessionMachineInput::LoginAttempt).unwrap();
        machine.consume(&SessionMachineInput::LoginSuccess).unwrap();

        machine
            .consume(&SessionMachineInput::LogoutRequested)
            .unwrap();
        assert_eq!(*machine.state(), SessionMachineState::TearingDown);

        machine
            .consume(&SessionMachineInput::TeardownComplete)
            .unwrap();
        assert_eq!(*machine.state(), SessionMachineState::LoggedOut);
    }

    #[test]
    fn test_token_rejected_triggers_teardown() {
        let mut machine = SessionMachine::new();
        machine.consume(&SessionMachineInput::Bootstrap).unwrap();
        machine
            .consume(&SessionMachineInput::ServerVerified)
            .unwrap();

        machine
            .consume(&SessionMachineInput::TokenRejected)
            .unwrap();
        assert_eq!(*machine.state(), SessionMachineState::TearingDown);
    }

    #[test]
    fn test_cannot_login_before_bootstrap() {
        let mut machine = SessionMachine::new();
        assert!(machine.consume(&SessionMachineInput::LoginAttempt).is_err());
    }

    #[test]
    fn test_invalid_transition_returns_error() {
        let mut machine = SessionMachine::new();
        machine.consume(&SessionMachineInput::Bootstrap).unwrap();
        machine.consume(&SessionMachineInput::NoSession).unwrap();

        // Can't claim LoginSuccess without an attempt
        assert!(machine.consume(&SessionMachineInput::LoginSuccess).is_err());
        // Can't logout while logged out
        assert!(machine
            .consume(&SessionMachineInput::LogoutRequested)
            .is_err());
    }

    #[test]
    fn test_phase_conversion() {
        assert_eq!(
            SessionPhase::from(&SessionMachineState::Uninitialized),
            SessionPhase::Uninitialized
        );
        assert_eq!(
            SessionPhase::from(&SessionMachineState::Restoring),
            SessionPhase::Restoring
        );
        assert_eq!(
            SessionPhase::from(&SessionMachineState::LoggedOut),
            SessionPhase::LoggedOut
        );
        assert_eq!(
            SessionPhase::from(&SessionMachineState::LoggingIn),
            SessionPhase::LoggingIn
        );
        assert_eq!(
            SessionPhase::from(&SessionMachineState::LoggedIn),
            SessionPhase::LoggedIn
        );
        assert_eq!(
            SessionPhase::from(&SessionMachineState::TearingDown),
            SessionPhase::TearingDown
        );
    }

    #[test]
    fn test_phase_is_authenticated() {
        assert!(SessionPhase::LoggedIn.is_authenticated());
        assert!(!SessionPhase::Uninitialized.is_authenticated());
        assert!(!SessionPhase::Restoring.is_authenticated());
        assert!(!SessionPhase::LoggedOut.is_authenticated());
        assert!(!SessionPhase::LoggingIn.is_authenticated());
        assert!(!SessionPhase::TearingDown.is_authenticated());
    }

    #[test]
    fn test_phase_is_initialized() {
        assert!(!SessionPhase::Uninitialized.is_initialized());
        assert!(!SessionPhase::Restoring.is_initialized());
        assert!(SessionPhase::LoggedOut.is_initialized());
        assert!(SessionPhase::LoggingIn.is_initialized());
        assert!(SessionPhase::LoggedIn.is_initialized());
        assert!(SessionPhase::TearingDown.is_initialized());
    }
}
