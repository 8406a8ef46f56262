//! Identity API client.
//!
//! Thin typed surface over the remote identity service. Every authenticated
//! call carries the bearer credential; any 401 response maps uniformly to
//! [`AuthError::TokenRejected`] regardless of endpoint. No local timeout is
//! imposed: a stalled call fails through the transport's own timeout and
//! surfaces as a transient error.

use crate::error::{AuthError, AuthResult};
use crate::user::{RawUser, Role};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Header carrying the publishable client key.
const CLIENT_KEY_HEADER: &str = "x-client-key";

fn summarize_response_body(body: &str) -> String {
    let mut hasher = DefaultHasher::new();
    body.hash(&mut hasher);
    format!("len={},digest={:016x}", body.len(), hasher.finish())
}

/// Client for the remote identity API.
#[derive(Clone)]
pub struct IdentityClient {
    http_client: reqwest::Client,
    api_url: String,
    client_key: String,
}

/// Response of a credential exchange (login or registration).
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    /// Bearer credential for the new session.
    pub token: String,
    /// User payload, when the endpoint includes one.
    #[serde(default)]
    pub user: Option<RawUser>,
}

/// Request body for account registration.
#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub username: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referral_code: Option<String>,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    identifier: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct RoleRequest {
    role: Role,
}

#[derive(Debug, Serialize)]
struct ForgotPasswordRequest<'a> {
    email: &'a str,
}

#[derive(Debug, Serialize)]
struct ResetPasswordRequest<'a> {
    token: &'a str,
    password: &'a str,
}

impl IdentityClient {
    /// Create a new client.
    ///
    /// # Arguments
    /// * `api_url` - The identity API base URL (e.g., `https://api.worklane.app`)
    /// * `client_key` - The publishable client key
    pub fn new(api_url: impl Into<String>, client_key: impl Into<String>) -> Self {
        let api_url: String = api_url.into();
        Self {
            http_client: reqwest::Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            client_key: client_key.into(),
        }
    }

    /// Build the full URL for an endpoint path.
    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }

    /// Map a non-success response to an error, uniformly treating 401 as a
    /// rejected credential.
    async fn failure(&self, endpoint: &str, response: reqwest::Response) -> AuthError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let body_summary = summarize_response_body(&body);
        tracing::warn!(endpoint = %endpoint, status = %status, body_summary = %body_summary, "Identity API call failed");

        if status == StatusCode::UNAUTHORIZED {
            AuthError::TokenRejected
        } else {
            AuthError::Api {
                status: status.as_u16(),
                detail: body,
            }
        }
    }

    /// Exchange an identifier and password for a session credential.
    pub async fn login(&self, identifier: &str, password: &str) -> AuthResult<LoginResponse> {
        let url = self.endpoint("/auth/login");
        tracing::debug!(url = %url, identifier = %identifier, "Attempting password login");

        let response = self
            .http_client
            .post(&url)
            .header(CLIENT_KEY_HEADER, &self.client_key)
            .json(&LoginRequest {
                identifier,
                password,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let body_summary = summarize_response_body(&body);
            tracing::warn!(status = %status, body_summary = %body_summary, "Login rejected");
            return Err(AuthError::InvalidCredentials(format!("HTTP {}", status)));
        }

        Ok(response.json().await?)
    }

    /// Register a new account, returning a session credential.
    pub async fn register(&self, request: &RegisterRequest) -> AuthResult<LoginResponse> {
        let url = self.endpoint("/auth/register");
        tracing::debug!(url = %url, email = %request.email, "Registering account");

        let response = self
            .http_client
            .post(&url)
            .header(CLIENT_KEY_HEADER, &self.client_key)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(self.failure("/auth/register", response).await);
        }

        Ok(response.json().await?)
    }

    /// Fetch the canonical user for the given credential.
    pub async fn me(&self, access_token: &str) -> AuthResult<RawUser> {
        let url = self.endpoint("/users/me");

        let response = self
            .http_client
            .get(&url)
            .header(CLIENT_KEY_HEADER, &self.client_key)
            .header("Authorization", format!("Bearer {}", access_token))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(self.failure("/users/me", response).await);
        }

        Ok(response.json().await?)
    }

    /// Confirm an email address with the verification token from the email link.
    pub async fn verify_email(&self, verify_token: &str) -> AuthResult<()> {
        let url = self.endpoint("/auth/verify");

        let response = self
            .http_client
            .get(&url)
            .header(CLIENT_KEY_HEADER, &self.client_key)
            .query(&[("token", verify_token)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(self.failure("/auth/verify", response).await);
        }

        Ok(())
    }

    /// Ask the server to resend the verification email.
    pub async fn resend_verification(&self, access_token: &str) -> AuthResult<()> {
        let url = self.endpoint("/auth/resend-verification");

        let response = self
            .http_client
            .post(&url)
            .header(CLIENT_KEY_HEADER, &self.client_key)
            .header("Authorization", format!("Bearer {}", access_token))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(self.failure("/auth/resend-verification", response).await);
        }

        Ok(())
    }

    /// Change the user's role, returning the updated user payload.
    pub async fn update_role(&self, access_token: &str, role: Role) -> AuthResult<RawUser> {
        let url = self.endpoint("/users/role");
        tracing::debug!(url = %url, role = ?role, "Updating role");

        let response = self
            .http_client
            .put(&url)
            .header(CLIENT_KEY_HEADER, &self.client_key)
            .header("Authorization", format!("Bearer {}", access_token))
            .json(&RoleRequest { role })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(self.failure("/users/role", response).await);
        }

        Ok(response.json().await?)
    }

    /// Request a password-reset email.
    pub async fn forgot_password(&self, email: &str) -> AuthResult<()> {
        let url = self.endpoint("/auth/forgot-password");

        let response = self
            .http_client
            .post(&url)
            .header(CLIENT_KEY_HEADER, &self.client_key)
            .json(&ForgotPasswordRequest { email })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(self.failure("/auth/forgot-password", response).await);
        }

        Ok(())
    }

    /// Set a new password with the reset token from the email link.
    pub async fn reset_password(&self, reset_token: &str, password: &str) -> AuthResult<()> {
        let url = self.endpoint("/auth/reset-password");

        let response = self
            .http_client
            .post(&url)
            .header(CLIENT_KEY_HEADER, &self.client_key)
            .json(&ResetPasswordRequest {
                token: reset_token,
                password,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(self.failure("/auth/reset-password", response).await);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = IdentityClient::new("https://api.test.worklane.app", "wl_pk_test");
        assert_eq!(client.api_url, "https://api.test.worklane.app");
        assert_eq!(client.client_key, "wl_pk_test");
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let client = IdentityClient::new("https://api.test.worklane.app/", "key");
        assert_eq!(
            client.endpoint("/auth/login"),
            "https://api.test.worklane.app/auth/login"
        );
    }

    #[test]
    fn test_endpoint_building() {
        let client = IdentityClient::new("https://api.test.worklane.app", "key");
        assert_eq!(
            client.endpoint("/users/me"),
            "https://api.test.worklane.app/users/me"
        );
        assert_eq!(
            client.endpoint("/auth/resend-verification"),
            "https://api.test.worklane.app/auth/resend-verification"
        );
    }

    #[test]
    fn test_register_request_serialization() {
        let request = RegisterRequest {
            name: "Ada Field".to_string(),
            email: "ada@example.com".to_string(),
            username: "ada".to_string(),
            password: "hunter2!".to_string(),
            referral_code: None,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["email"], "ada@example.com");
        // Absent referral code is omitted, not null
        assert!(json.get("referral_code").is_none());
    }

    #[test]
    fn test_role_request_serialization() {
        let json = serde_json::to_string(&RoleRequest { role: Role::Worker }).unwrap();
        assert_eq!(json, r#"{"role":"worker"}"#);
    }

    #[test]
    fn test_login_response_without_user() {
        let response: LoginResponse =
            serde_json::from_str(r#"{"token": "bearer-abc"}"#).unwrap();
        assert_eq!(response.token, "bearer-abc");
        assert!(response.user.is_none());
    }

    #[test]
    fn test_login_response_with_user() {
        let response: LoginResponse = serde_json::from_str(
            r#"{"token": "bearer-abc", "user": {"id": "u-1", "email": "a@b.c"}}"#,
        )
        .unwrap();
        let user = crate::user::normalize(response.user.unwrap());
        assert_eq!(user.id, "u-1");
    }

    #[test]
    fn test_body_summary_hides_content() {
        let summary = summarize_response_body("secret token material");
        assert!(summary.starts_with("len=21,digest="));
        assert!(!summary.contains("secret"));
    }
}
