//! Account maintenance commands.

use crate::output::{self, OutputFormat};
use anyhow::Result;
use std::sync::Arc;
use worklane_session::SessionEngine;

/// Confirm an email address with a verification token.
pub async fn verify_email(
    engine: &Arc<SessionEngine>,
    token: &str,
    format: &OutputFormat,
) -> Result<()> {
    match engine.verify_email(token).await {
        Ok(()) => output::print_success("Email verified", format),
        Err(e) => output::print_error(&format!("Verification failed: {}", e), format),
    }
    Ok(())
}

/// Resend the verification email.
pub async fn resend_verification(
    engine: &Arc<SessionEngine>,
    format: &OutputFormat,
) -> Result<()> {
    match engine.resend_verification().await {
        Ok(()) => output::print_success("Verification email sent", format),
        Err(e) => output::print_error(&format!("Could not resend: {}", e), format),
    }
    Ok(())
}

/// Request a password-reset email.
pub async fn forgot_password(
    engine: &Arc<SessionEngine>,
    email: &str,
    format: &OutputFormat,
) -> Result<()> {
    match engine.request_password_reset(email).await {
        Ok(()) => output::print_success("Password reset email sent", format),
        Err(e) => output::print_error(&format!("Request failed: {}", e), format),
    }
    Ok(())
}

/// Set a new password with a reset token.
pub async fn reset_password(
    engine: &Arc<SessionEngine>,
    token: &str,
    format: &OutputFormat,
) -> Result<()> {
    let password = rpassword::prompt_password("New password: ")?;
    if password.is_empty() {
        output::print_error("A password is required", format);
        return Ok(());
    }

    match engine.reset_password(token, &password).await {
        Ok(()) => output::print_success("Password updated, you can now log in", format),
        Err(e) => output::print_error(&format!("Reset failed: {}", e), format),
    }
    Ok(())
}
