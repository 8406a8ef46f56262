//! Authentication commands.

use crate::output::{self, OutputFormat};
use anyhow::Result;
use std::io::{self, Write};
use std::sync::Arc;
use worklane_core::Config;
use worklane_session::{
    CallbackListener, OAuthCoordinator, RegisterRequest, Role, SessionEngine,
};

fn prompt(label: &str) -> Result<String> {
    print!("{}: ", label);
    io::stdout().flush()?;
    let mut value = String::new();
    io::stdin().read_line(&mut value)?;
    Ok(value.trim().to_string())
}

/// Login with an identifier and password, or via an OAuth provider.
pub async fn login(
    engine: &Arc<SessionEngine>,
    config: &Config,
    provider: Option<&str>,
    format: &OutputFormat,
) -> Result<()> {
    if engine.phase().is_authenticated() {
        let who = engine
            .current_user()
            .map(|u| if u.email.is_empty() { u.id } else { u.email })
            .unwrap_or_else(|| "unknown".to_string());
        output::print_success(&format!("Already logged in as {}", who), format);
        return Ok(());
    }

    let outcome = match provider {
        Some(provider) => login_with_provider(engine, config, provider, format).await?,
        None => {
            let identifier = prompt("Email or username")?;
            if identifier.is_empty() {
                output::print_error("An email or username is required", format);
                return Ok(());
            }

            let password = rpassword::prompt_password("Password: ")?;
            if password.is_empty() {
                output::print_error("A password is required", format);
                return Ok(());
            }

            println!("Logging in...");
            match engine.login_with_password(&identifier, &password).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    output::print_error(&format!("Login failed: {}", e), format);
                    return Ok(());
                }
            }
        }
    };

    output::print_success(
        &format!(
            "Logged in as {} (next: {})",
            outcome.user.email, outcome.next_step
        ),
        format,
    );
    Ok(())
}

async fn login_with_provider(
    engine: &Arc<SessionEngine>,
    config: &Config,
    provider: &str,
    format: &OutputFormat,
) -> Result<worklane_session::LoginOutcome> {
    let listener = CallbackListener::with_defaults();
    let coordinator = OAuthCoordinator::new(listener.origin());

    let provider_url = listener.provider_url(&config.web_app_url, provider);
    println!("Opening browser for {} sign-in...", provider);
    println!("If it does not open, visit:\n  {}", provider_url);
    if let Err(e) = open::that(&provider_url) {
        output::print_error(&format!("Could not open the browser: {}", e), format);
    }

    let message = listener.wait_for_message().await?;
    match engine.complete_oauth(&coordinator, message).await? {
        Some(outcome) => Ok(outcome),
        None => anyhow::bail!("sign-in message came from an unexpected origin"),
    }
}

/// Logout and clear the session.
pub fn logout(engine: &Arc<SessionEngine>, format: &OutputFormat) {
    engine.logout();
    output::print_success("Logged out", format);
}

/// Show session status.
pub fn status(engine: &Arc<SessionEngine>, format: &OutputFormat) {
    let snapshot = engine.snapshot();

    match format {
        OutputFormat::Text => {
            output::print_row(
                "Session",
                if snapshot.authenticated {
                    "logged in"
                } else {
                    "logged out"
                },
            );
            if let Some(user) = &snapshot.user {
                output::print_row("User", &user.id);
                if !user.email.is_empty() {
                    output::print_row("Email", &user.email);
                }
                output::print_row("KYC", &format!("{:?}", user.kyc));
            }
            output::print_row("Next", snapshot.next_step.route());
        }
        OutputFormat::Json => output::print_json(&snapshot),
    }
}

/// Refresh and show the current user.
pub async fn whoami(engine: &Arc<SessionEngine>, format: &OutputFormat) -> Result<()> {
    match engine.refresh_user().await {
        Ok(user) => match format {
            OutputFormat::Text => {
                output::print_row("User", &user.id);
                output::print_row("Name", &user.name);
                output::print_row("Email", &user.email);
                output::print_row("Role", &format!("{:?}", user.role));
                output::print_row("KYC", &format!("{:?}", user.kyc));
                output::print_row("Trust", &user.trust_score.to_string());
            }
            OutputFormat::Json => output::print_json(&user),
        },
        Err(e) => output::print_error(&format!("Could not refresh user: {}", e), format),
    }
    Ok(())
}

/// Show the next required onboarding step.
pub fn next_step(engine: &Arc<SessionEngine>, format: &OutputFormat) {
    let step = engine.required_step();
    match format {
        OutputFormat::Text => println!("{}", step),
        OutputFormat::Json => output::print_json(&step),
    }
}

/// Register a new account.
pub async fn register(engine: &Arc<SessionEngine>, format: &OutputFormat) -> Result<()> {
    let name = prompt("Full name")?;
    let email = prompt("Email")?;
    let username = prompt("Username")?;
    let password = rpassword::prompt_password("Password: ")?;

    if email.is_empty() || username.is_empty() || password.is_empty() {
        output::print_error("Email, username and password are required", format);
        return Ok(());
    }

    let request = RegisterRequest {
        name,
        email,
        username,
        password,
        referral_code: None,
    };

    match engine.register(&request).await {
        Ok(outcome) => {
            output::print_success(
                &format!(
                    "Registered {} (next: {})",
                    outcome.user.email, outcome.next_step
                ),
                format,
            );
        }
        Err(e) => output::print_error(&format!("Registration failed: {}", e), format),
    }
    Ok(())
}

/// Choose a marketplace role.
pub async fn set_role(
    engine: &Arc<SessionEngine>,
    role: &str,
    format: &OutputFormat,
) -> Result<()> {
    let role = match role.to_lowercase().as_str() {
        "worker" => Role::Worker,
        "employer" => Role::Employer,
        other => {
            output::print_error(
                &format!("Unknown role '{}' (expected worker or employer)", other),
                format,
            );
            return Ok(());
        }
    };

    match engine.update_role(role).await {
        Ok(user) => {
            output::print_success(&format!("Role set to {:?}", user.role), format);
        }
        Err(e) => output::print_error(&format!("Role change failed: {}", e), format),
    }
    Ok(())
}
