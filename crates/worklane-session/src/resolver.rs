//! Next-step resolver: the onboarding gating policy.
//!
//! [`resolve`] is the single source of truth for where a user must go next.
//! No other component re-derives this policy; duplicating it is how the UI
//! and the engine end up disagreeing.

use crate::user::{KycStatus, Role, User};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The action a user must complete next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequiredStep {
    Login,
    VerifyEmail,
    Kyc,
    Dashboard,
    SelectRole,
    WorkerProfileSetup,
    EmployerDashboard,
}

impl RequiredStep {
    /// The route a UI should navigate to for this step.
    pub fn route(&self) -> &'static str {
        match self {
            RequiredStep::Login => "login",
            RequiredStep::VerifyEmail => "verify-email",
            RequiredStep::Kyc => "kyc",
            RequiredStep::Dashboard => "dashboard",
            RequiredStep::SelectRole => "select-role",
            RequiredStep::WorkerProfileSetup => "worker-profile-setup",
            RequiredStep::EmployerDashboard => "employer-dashboard",
        }
    }
}

impl fmt::Display for RequiredStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.route())
    }
}

/// Compute the next required step for a user.
///
/// Pure and deterministic. First match wins; the rule order is the
/// contract:
/// 1. No user: `Login`.
/// 2. Email unverified: `VerifyEmail`, regardless of anything else.
/// 3. KYC not started: `Kyc`.
/// 4. KYC under review: `Dashboard`; pending review never blocks browsing.
/// 5. KYC verified without a role: `SelectRole`.
/// 6. Worker without a completed profile: `WorkerProfileSetup`.
/// 7. Otherwise: `Dashboard`.
pub fn resolve(user: Option<&User>) -> RequiredStep {
    let user = match user {
        Some(user) => user,
        None => return RequiredStep::Login,
    };

    if !user.email_verified {
        return RequiredStep::VerifyEmail;
    }
    if user.kyc == KycStatus::Unverified {
        return RequiredStep::Kyc;
    }
    if user.kyc == KycStatus::Pending {
        return RequiredStep::Dashboard;
    }
    if user.kyc == KycStatus::Verified && user.role == Role::Unassigned {
        return RequiredStep::SelectRole;
    }
    if user.role == Role::Worker && !user.profile_completed {
        return RequiredStep::WorkerProfileSetup;
    }

    RequiredStep::Dashboard
}
