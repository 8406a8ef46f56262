//! Canonical user model and payload normalization.
//!
//! The server's user representation is loosely structured: field names
//! drift between snake_case and camelCase, optional fields come and go,
//! and new fields appear without notice. Everything downstream of this
//! module sees only the canonical [`User`], in which every boolean and
//! numeric field has an explicit value and derived flags are always
//! consistent.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identity-verification status derived from review state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum KycStatus {
    #[default]
    Unverified,
    Pending,
    Verified,
    Rejected,
}

/// Document review pipeline state as reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    /// No documents submitted yet (also the stand-in for absent/unknown).
    #[default]
    NotSubmitted,
    Pending,
    Submitted,
    Approved,
    Rejected,
}

impl VerificationStatus {
    fn parse(value: &str) -> Self {
        match value {
            "not_submitted" => VerificationStatus::NotSubmitted,
            "pending" => VerificationStatus::Pending,
            "submitted" => VerificationStatus::Submitted,
            "approved" => VerificationStatus::Approved,
            "rejected" => VerificationStatus::Rejected,
            _ => VerificationStatus::NotSubmitted,
        }
    }
}

/// Marketplace role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Unassigned,
    Worker,
    Employer,
    Admin,
    Moderator,
    Verifier,
    CustomerCare,
    Vendor,
}

impl Role {
    fn parse(value: &str) -> Self {
        match value {
            "worker" => Role::Worker,
            "employer" => Role::Employer,
            "admin" => Role::Admin,
            "moderator" => Role::Moderator,
            "verifier" => Role::Verifier,
            "customer_care" => Role::CustomerCare,
            "vendor" => Role::Vendor,
            _ => Role::Unassigned,
        }
    }
}

/// Raw user payload as the server sends it: an untyped field map.
///
/// [`normalize`] is the explicit mapping from this to the canonical
/// [`User`]; keeping the payload untyped here means a missing, null or
/// renamed server field can never fail a fetch, only fall back to a
/// default.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct RawUser {
    pub fields: Map<String, Value>,
}

/// Canonical, fully-defaulted user.
///
/// Constructed only by [`normalize`]; replaced only by the session engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub username: String,
    pub email_verified: bool,
    /// Derived from `(verification_status, document_verified)`, never set
    /// independently.
    pub kyc: KycStatus,
    pub verification_status: VerificationStatus,
    pub document_verified: bool,
    pub role: Role,
    /// Derived from the presence of a non-empty wallet address.
    pub wallet_created: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wallet_address: Option<String>,
    pub bank_account_linked: bool,
    pub profile_completed: bool,
    pub trust_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    /// Unknown server fields, preserved verbatim and never interpreted.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl KycStatus {
    /// Derive the KYC status from the review pipeline state.
    pub fn derive(status: VerificationStatus, document_verified: bool) -> Self {
        if status == VerificationStatus::Approved || document_verified {
            KycStatus::Verified
        } else if matches!(
            status,
            VerificationStatus::Pending | VerificationStatus::Submitted
        ) {
            KycStatus::Pending
        } else if status == VerificationStatus::Rejected {
            KycStatus::Rejected
        } else {
            KycStatus::Unverified
        }
    }
}

/// Remove the first present key of `names`, returning its value.
fn take(fields: &mut Map<String, Value>, names: &[&str]) -> Option<Value> {
    for name in names {
        if let Some(value) = fields.remove(*name) {
            if !value.is_null() {
                return Some(value);
            }
        }
    }
    None
}

fn take_string(fields: &mut Map<String, Value>, names: &[&str]) -> String {
    take(fields, names)
        .and_then(|v| v.as_str().map(String::from))
        .unwrap_or_default()
}

fn take_opt_string(fields: &mut Map<String, Value>, names: &[&str]) -> Option<String> {
    take(fields, names).and_then(|v| v.as_str().map(String::from))
}

fn take_bool(fields: &mut Map<String, Value>, names: &[&str]) -> bool {
    take(fields, names)
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
}

fn take_f64(fields: &mut Map<String, Value>, names: &[&str]) -> f64 {
    take(fields, names).and_then(|v| v.as_f64()).unwrap_or(0.0)
}

/// Map a raw server payload into the canonical user.
///
/// Pure: same input always yields the same output, no side effects. Every
/// optional numeric/boolean gets an explicit default so no consumer ever
/// needs a presence check.
pub fn normalize(raw: RawUser) -> User {
    let mut fields = raw.fields;

    let id = take_string(&mut fields, &["id"]);
    let name = take_string(&mut fields, &["name", "full_name", "fullName"]);
    let email = take_string(&mut fields, &["email"]);
    let username = take_string(&mut fields, &["username", "userName"]);
    let email_verified = take_bool(
        &mut fields,
        &["email_verified", "emailVerified", "is_email_verified"],
    );
    let verification_status = take_opt_string(
        &mut fields,
        &["verification_status", "verificationStatus"],
    )
    .map(|s| VerificationStatus::parse(&s))
    .unwrap_or_default();
    let document_verified = take_bool(
        &mut fields,
        &["document_verified", "documentVerified", "is_document_verified"],
    );
    let role = take_opt_string(&mut fields, &["role"])
        .map(|s| Role::parse(&s))
        .unwrap_or_default();
    let wallet_address = take_opt_string(&mut fields, &["wallet_address", "walletAddress"]);
    let bank_account_linked = take_bool(
        &mut fields,
        &["bank_account_linked", "bankAccountLinked", "has_bank_account"],
    );
    let profile_completed = take_bool(
        &mut fields,
        &["profile_completed", "profileCompleted", "is_profile_complete"],
    );
    let trust_score = take_f64(&mut fields, &["trust_score", "trustScore"]);
    let avatar_url = take_opt_string(&mut fields, &["avatar_url", "avatarUrl", "avatar"]);

    // Server-sent derived flags are never trusted; drop them so they don't
    // masquerade as extension fields either.
    let _ = take(&mut fields, &["kyc", "kyc_verified", "kycVerified"]);
    let _ = take(&mut fields, &["wallet_created", "walletCreated"]);

    let wallet_created = wallet_address.as_deref().is_some_and(|addr| !addr.is_empty());

    User {
        id,
        name,
        email,
        username,
        email_verified,
        kyc: KycStatus::derive(verification_status, document_verified),
        verification_status,
        document_verified,
        role,
        wallet_created,
        wallet_address,
        bank_account_linked,
        profile_completed,
        trust_score,
        avatar_url,
        extra: fields,
    }
}
