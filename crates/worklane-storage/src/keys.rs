//! Storage key constants.

/// Storage keys used by the session engine
pub struct StoreKeys;

impl StoreKeys {
    /// Bearer credential for the current session
    pub const SESSION_TOKEN: &'static str = "session_token";

    /// Last-known canonical user (JSON)
    pub const USER_SNAPSHOT: &'static str = "user_snapshot";

    /// Onboarding/KYC progress (JSON)
    pub const VERIFICATION_PROGRESS: &'static str = "verification_progress";
}
