//! Session and progressive-verification engine for the Worklane client.
//!
//! This crate provides:
//! - Bearer credential lifecycle management backed by durable storage
//! - Normalization of the server's user payload into a canonical model
//! - The multi-step onboarding/KYC flow with persisted, resumable progress
//! - The pure next-step resolver gating onboarding navigation
//! - OAuth handshake coordination (callback listener + explicit FSM)
//! - The session engine facade composing all of the above
//! - Explicit FSM-based session lifecycle state

mod api;
mod engine;
mod error;
mod fsm;
mod guard;
mod oauth;
mod onboarding;
mod resolver;
mod token;
mod user;

pub use api::{IdentityClient, LoginResponse, RegisterRequest};
pub use engine::{LoginOutcome, SessionEngine, SessionSnapshot};
pub use error::{AuthError, AuthResult};
pub use fsm::session_machine;
pub use fsm::{
    SessionCallback, SessionChangedPayload, SessionMachine, SessionMachineInput,
    SessionMachineState, SessionPhase,
};
pub use guard::{evaluate_guard, GuardDecision};
pub use oauth::handshake_machine;
pub use oauth::{
    CallbackListener, HandshakeMessage, HandshakePayload, HandshakeState, OAuthCoordinator,
    ProviderWindow, DEFAULT_CALLBACK_PORT, DEFAULT_CALLBACK_TIMEOUT_SECS,
};
pub use onboarding::{StepId, VerificationFlow, VerificationProgress};
pub use resolver::{resolve, RequiredStep};
pub use token::TokenManager;
pub use user::{normalize, KycStatus, RawUser, Role, User, VerificationStatus};
