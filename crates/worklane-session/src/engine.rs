//! Session engine: the facade composing the token manager, normalizer,
//! verification flow, resolver, and identity client.
//!
//! The engine is the only writer of the persisted `session_token`,
//! `user_snapshot` and `verification_progress` keys. Every public method
//! resolves or fails with a typed [`AuthError`]; nothing unwinds across an
//! await boundary.

use crate::api::{IdentityClient, RegisterRequest};
use crate::error::{AuthError, AuthResult};
use crate::fsm::{
    SessionCallback, SessionChangedPayload, SessionMachine, SessionMachineInput, SessionPhase,
};
use crate::oauth::{HandshakeMessage, HandshakePayload, OAuthCoordinator};
use crate::onboarding::{StepId, VerificationFlow};
use crate::resolver::{resolve, RequiredStep};
use crate::token::TokenManager;
use crate::user::{normalize, KycStatus, Role, User};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};
use worklane_core::Config;
use worklane_storage::{SessionVault, StoreKeys};

/// Notice shown once after a forced teardown.
const SESSION_EXPIRED_NOTICE: &str = "Your session has expired. Please sign in again.";

/// Result of a successful login.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: User,
    /// Where the caller should navigate next.
    pub next_step: RequiredStep,
}

/// Point-in-time view of the session for status reporting.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub initialized: bool,
    pub authenticated: bool,
    pub phase: SessionPhase,
    pub user: Option<User>,
    pub next_step: RequiredStep,
}

/// The client-resident session authority.
pub struct SessionEngine {
    vault: Arc<SessionVault>,
    client: IdentityClient,
    tokens: TokenManager,
    flow: VerificationFlow,
    fsm: Mutex<SessionMachine>,
    current_user: Mutex<Option<User>>,
    notice: Mutex<Option<String>>,
    state_callback: Mutex<Option<SessionCallback>>,
    refresh_interval: Duration,
}

impl SessionEngine {
    /// Create an engine over the given vault.
    ///
    /// The engine starts `Uninitialized`; call [`bootstrap`](Self::bootstrap)
    /// before anything else.
    pub fn new(config: &Config, vault: Arc<SessionVault>) -> Self {
        Self {
            client: IdentityClient::new(&config.api_url, &config.client_key),
            tokens: TokenManager::new(Arc::clone(&vault)),
            flow: VerificationFlow::new(Arc::clone(&vault)),
            vault,
            fsm: Mutex::new(SessionMachine::new()),
            current_user: Mutex::new(None),
            notice: Mutex::new(None),
            state_callback: Mutex::new(None),
            refresh_interval: Duration::from_secs(config.refresh_interval_secs),
        }
    }

    /// Set a callback notified of session phase changes.
    pub fn set_state_callback(&self, callback: SessionCallback) {
        *self.state_callback.lock().unwrap() = Some(callback);
    }

    /// The current session phase.
    pub fn phase(&self) -> SessionPhase {
        SessionPhase::from(self.fsm.lock().unwrap().state())
    }

    /// The current canonical user, if held.
    pub fn current_user(&self) -> Option<User> {
        self.current_user.lock().unwrap().clone()
    }

    /// The current credential, if held.
    pub fn current_token(&self) -> Option<String> {
        self.tokens.current()
    }

    /// The verification flow, for onboarding callers.
    pub fn verification(&self) -> &VerificationFlow {
        &self.flow
    }

    /// The next step the current user must complete.
    pub fn required_step(&self) -> RequiredStep {
        resolve(self.current_user().as_ref())
    }

    /// Take the one-time teardown notice, if one is pending.
    pub fn take_notice(&self) -> Option<String> {
        self.notice.lock().unwrap().take()
    }

    /// Point-in-time status snapshot.
    pub fn snapshot(&self) -> SessionSnapshot {
        let phase = self.phase();
        let user = self.current_user();
        SessionSnapshot {
            initialized: phase.is_initialized(),
            authenticated: phase.is_authenticated(),
            phase,
            next_step: resolve(user.as_ref()),
            user,
        }
    }

    /// Transition the FSM and notify the callback when the phase changed.
    fn transition(&self, input: &SessionMachineInput) -> AuthResult<SessionPhase> {
        let mut fsm = self.fsm.lock().unwrap();
        let old_phase = SessionPhase::from(fsm.state());

        fsm.consume(input).map_err(|_| {
            AuthError::InvalidStateTransition(format!(
                "Cannot apply {:?} in state {:?}",
                input,
                fsm.state()
            ))
        })?;

        let new_phase = SessionPhase::from(fsm.state());
        drop(fsm);

        if old_phase != new_phase {
            debug!(old = ?old_phase, new = ?new_phase, "Session phase transition");
            self.notify_phase_change(new_phase);
        }

        Ok(new_phase)
    }

    fn notify_phase_change(&self, phase: SessionPhase) {
        let cb = self.state_callback.lock().unwrap();
        if let Some(callback) = cb.as_ref() {
            let user_id = self
                .current_user
                .lock()
                .unwrap()
                .as_ref()
                .map(|u| u.id.clone());
            callback(SessionChangedPayload { phase, user_id });
        }
    }

    fn remember_user(&self, user: &User) -> AuthResult<()> {
        self.vault.set_record(StoreKeys::USER_SNAPSHOT, user)?;
        *self.current_user.lock().unwrap() = Some(user.clone());
        Ok(())
    }

    /// Clear everything after the server rejected the credential, leaving a
    /// one-time notice for the UI. Best-effort.
    fn force_teardown(&self) {
        let _ = self.transition(&SessionMachineInput::TokenRejected);
        let _ = self.tokens.clear();
        let _ = self.vault.clear_all();
        *self.current_user.lock().unwrap() = None;
        *self.notice.lock().unwrap() = Some(SESSION_EXPIRED_NOTICE.to_string());
        let _ = self.transition(&SessionMachineInput::TeardownComplete);
        warn!("Session torn down after credential rejection");
    }

    /// Startup validation of persisted state.
    ///
    /// With no stored credential the engine comes up logged out. With one,
    /// the credential is placed in the token manager first and then
    /// validated against `/users/me`:
    /// - success refreshes and persists the canonical user;
    /// - a 401 tears the session down;
    /// - a transient failure falls back to the last persisted snapshot
    ///   optimistically, trading a small staleness risk for availability.
    ///   With nothing to restore the engine reports logged out but leaves
    ///   the credential in place for a later revalidation.
    pub async fn bootstrap(&self) -> AuthResult<SessionPhase> {
        self.transition(&SessionMachineInput::Bootstrap)?;

        let token = match self.tokens.restore()? {
            Some(token) => token,
            None => {
                info!("No stored session found");
                return self.transition(&SessionMachineInput::NoSession);
            }
        };

        match self.client.me(&token).await {
            Ok(raw) => {
                let user = normalize(raw);
                self.remember_user(&user)?;
                info!(user_id = %user.id, "Stored session validated with server");
                self.transition(&SessionMachineInput::ServerVerified)
            }
            Err(AuthError::TokenRejected) => {
                warn!("Stored credential rejected by server, clearing session");
                let _ = self.tokens.clear();
                let _ = self.vault.clear_all();
                *self.notice.lock().unwrap() = Some(SESSION_EXPIRED_NOTICE.to_string());
                self.transition(&SessionMachineInput::ServerRejected)
            }
            Err(e) => {
                let snapshot: Option<User> = self.vault.get_record(StoreKeys::USER_SNAPSHOT)?;
                match snapshot {
                    Some(user) => {
                        warn!(error = %e, user_id = %user.id, "Startup validation failed, restoring last snapshot");
                        *self.current_user.lock().unwrap() = Some(user);
                        self.transition(&SessionMachineInput::SnapshotRestored)
                    }
                    None => {
                        // Credential stays persisted for a later attempt
                        warn!(error = %e, "Startup validation failed with nothing to restore");
                        self.transition(&SessionMachineInput::NoSession)
                    }
                }
            }
        }
    }

    /// Shared completion tail for every credential exchange: set the token
    /// first, then fetch, normalize and persist the canonical user.
    async fn complete_login(&self, token: &str) -> AuthResult<LoginOutcome> {
        self.tokens.set(token)?;

        let raw = match self.client.me(token).await {
            Ok(raw) => raw,
            Err(e) => {
                // The exchange produced an unusable credential; undo
                let _ = self.tokens.clear();
                self.transition(&SessionMachineInput::LoginFailed)?;
                return Err(e);
            }
        };

        let user = normalize(raw);
        self.remember_user(&user)?;
        self.transition(&SessionMachineInput::LoginSuccess)?;

        let next_step = resolve(Some(&user));
        info!(user_id = %user.id, next_step = %next_step, "Login complete");

        Ok(LoginOutcome { user, next_step })
    }

    /// Login with an identifier and password.
    pub async fn login_with_password(
        &self,
        identifier: &str,
        password: &str,
    ) -> AuthResult<LoginOutcome> {
        self.transition(&SessionMachineInput::LoginAttempt)?;

        let response = match self.client.login(identifier, password).await {
            Ok(response) => response,
            Err(e) => {
                self.transition(&SessionMachineInput::LoginFailed)?;
                return Err(e);
            }
        };

        self.complete_login(&response.token).await
    }

    /// Login with a credential obtained out of band (OAuth completion).
    pub async fn login_with_token(&self, token: &str) -> AuthResult<LoginOutcome> {
        self.transition(&SessionMachineInput::LoginAttempt)?;
        self.complete_login(token).await
    }

    /// Register a new account and log in with the returned credential.
    pub async fn register(&self, request: &RegisterRequest) -> AuthResult<LoginOutcome> {
        self.transition(&SessionMachineInput::LoginAttempt)?;

        let response = match self.client.register(request).await {
            Ok(response) => response,
            Err(e) => {
                self.transition(&SessionMachineInput::LoginFailed)?;
                return Err(e);
            }
        };

        self.complete_login(&response.token).await
    }

    /// Complete an OAuth handshake by delivering its message.
    ///
    /// Returns `Ok(None)` when the message came from a foreign origin and
    /// was discarded.
    pub async fn complete_oauth(
        &self,
        coordinator: &OAuthCoordinator,
        message: HandshakeMessage,
    ) -> AuthResult<Option<LoginOutcome>> {
        let payload = match coordinator.deliver(message)? {
            Some(payload) => payload,
            None => return Ok(None),
        };

        match payload {
            HandshakePayload::Token(token) => match self.login_with_token(&token).await {
                Ok(outcome) => {
                    coordinator.resolve()?;
                    Ok(Some(outcome))
                }
                Err(e) => {
                    let _ = coordinator.reject(&e.to_string());
                    Err(e)
                }
            },
            HandshakePayload::Error(reason) => Err(AuthError::OAuth(reason)),
        }
    }

    /// Clear token, user and verification progress. Best-effort: never
    /// fails, even when individual clears do.
    pub fn logout(&self) {
        let _ = self.transition(&SessionMachineInput::LogoutRequested);
        let _ = self.tokens.clear();
        let _ = self.vault.clear_all();
        *self.current_user.lock().unwrap() = None;
        let _ = self.transition(&SessionMachineInput::TeardownComplete);
        info!("Logged out");
    }

    /// Re-fetch and re-normalize the canonical user.
    ///
    /// On a 401 the whole session is torn down. On any other failure the
    /// last good snapshot is left untouched and the error is surfaced to
    /// the caller only.
    pub async fn refresh_user(&self) -> AuthResult<User> {
        let token = self.tokens.bearer()?;

        let raw = match self.client.me(&token).await {
            Ok(raw) => raw,
            Err(AuthError::TokenRejected) => {
                self.force_teardown();
                return Err(AuthError::TokenRejected);
            }
            Err(e) => return Err(e),
        };

        let user = normalize(raw);
        self.remember_user(&user)?;

        // A fully verified user has no use for lingering onboarding progress
        if verification_complete(&user) && self.flow.is_active()? {
            debug!(user_id = %user.id, "Verification complete, discarding onboarding progress");
            self.flow.skip()?;
        }

        Ok(user)
    }

    /// Change the user's role and re-normalize.
    ///
    /// Records the role step as completed when an onboarding flow is
    /// active.
    pub async fn update_role(&self, role: Role) -> AuthResult<User> {
        let token = self.tokens.bearer()?;

        let raw = match self.client.update_role(&token, role).await {
            Ok(raw) => raw,
            Err(AuthError::TokenRejected) => {
                self.force_teardown();
                return Err(AuthError::TokenRejected);
            }
            Err(e) => return Err(e),
        };

        let user = normalize(raw);
        self.remember_user(&user)?;

        if self.flow.is_active()? {
            let mut data = serde_json::Map::new();
            data.insert("role".to_string(), serde_json::json!(role));
            self.flow.complete_step(StepId::Role, Some(data))?;
        }

        info!(user_id = %user.id, role = ?user.role, "Role updated");
        Ok(user)
    }

    /// Confirm an email address with a verification token, then refresh the
    /// user best-effort when logged in so the flag flip is observed.
    pub async fn verify_email(&self, verify_token: &str) -> AuthResult<()> {
        self.client.verify_email(verify_token).await?;

        if self.phase().is_authenticated() {
            if let Err(e) = self.refresh_user().await {
                warn!(error = %e, "User refresh after email verification failed");
            }
        }
        Ok(())
    }

    /// Ask the server to resend the verification email.
    pub async fn resend_verification(&self) -> AuthResult<()> {
        let token = self.tokens.bearer()?;
        match self.client.resend_verification(&token).await {
            Ok(()) => Ok(()),
            Err(AuthError::TokenRejected) => {
                self.force_teardown();
                Err(AuthError::TokenRejected)
            }
            Err(e) => Err(e),
        }
    }

    /// Request a password-reset email.
    pub async fn request_password_reset(&self, email: &str) -> AuthResult<()> {
        self.client.forgot_password(email).await
    }

    /// Set a new password with a reset token.
    pub async fn reset_password(&self, reset_token: &str, password: &str) -> AuthResult<()> {
        self.client.reset_password(reset_token, password).await
    }

    /// Spawn the background refresh catching asynchronous server-side
    /// status changes (e.g. a verifier approving KYC).
    ///
    /// Failures never overwrite the held user; transient ones are only
    /// logged. Ticks while not authenticated are skipped.
    pub fn spawn_auto_refresh(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(engine.refresh_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if !engine.phase().is_authenticated() {
                    continue;
                }
                match engine.refresh_user().await {
                    Ok(user) => {
                        debug!(user_id = %user.id, "Background user refresh succeeded")
                    }
                    Err(e) if e.is_transient() => {
                        warn!(error = %e, "Background refresh failed, keeping last snapshot")
                    }
                    Err(e) => warn!(error = %e, "Background refresh failed"),
                }
            }
        })
    }
}

/// Whether a user has finished everything verification-gated.
fn verification_complete(user: &User) -> bool {
    user.kyc == KycStatus::Verified
        && matches!(
            resolve(Some(user)),
            RequiredStep::Dashboard | RequiredStep::EmployerDashboard
        )
}
