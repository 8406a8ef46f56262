//! Worklane CLI - drive the Worklane session engine from a terminal.

mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::debug;
use worklane_core::{init_logging, Config, Paths};
use worklane_session::SessionEngine;

/// Worklane CLI - session, onboarding and account management.
#[derive(Parser)]
#[command(name = "worklane")]
#[command(about = "Worklane CLI for session and onboarding management")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text", global = true)]
    format: output::OutputFormat,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Login with an identifier and password, or via an OAuth provider
    Login {
        /// OAuth provider (github, google, linkedin) instead of a password
        #[arg(long)]
        provider: Option<String>,
    },

    /// Logout and clear the session
    Logout,

    /// Check session status
    Status,

    /// Refresh and show the current user
    Whoami,

    /// Show the next required onboarding step
    Next,

    /// Register a new account
    Register,

    /// Choose a marketplace role
    Role {
        /// Role to take (worker or employer)
        role: String,
    },

    /// Manage onboarding progress
    Onboarding {
        #[command(subcommand)]
        command: OnboardingCommands,
    },

    /// Confirm an email address with a verification token
    Verify {
        /// Token from the verification email
        token: String,
    },

    /// Resend the verification email
    Resend,

    /// Password recovery
    Password {
        #[command(subcommand)]
        command: PasswordCommands,
    },
}

#[derive(Subcommand)]
enum OnboardingCommands {
    /// Begin onboarding from the first step
    Start,
    /// Mark a step as completed
    Complete {
        /// Step name (terms, document, facial, role, wallet, bank, profile)
        step: String,
        /// JSON object with the step's payload
        #[arg(long)]
        data: Option<String>,
    },
    /// Discard onboarding progress
    Skip,
    /// Show current progress
    Show,
}

#[derive(Subcommand)]
enum PasswordCommands {
    /// Request a password-reset email
    Forgot {
        /// Account email
        email: String,
    },
    /// Set a new password with a reset token
    Reset {
        /// Token from the reset email
        token: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level);

    let paths = Paths::new()?;
    let config = Config::load(&paths)?;
    debug!(api_url = %config.api_url, "Configuration loaded");

    let vault = Arc::new(worklane_storage::create_vault(paths.session_file())?);
    let engine = Arc::new(SessionEngine::new(&config, vault));

    engine.bootstrap().await?;
    if let Some(notice) = engine.take_notice() {
        output::print_error(&notice, &cli.format);
    }

    match cli.command {
        Commands::Login { provider } => {
            commands::auth::login(&engine, &config, provider.as_deref(), &cli.format).await?
        }
        Commands::Logout => commands::auth::logout(&engine, &cli.format),
        Commands::Status => commands::auth::status(&engine, &cli.format),
        Commands::Whoami => commands::auth::whoami(&engine, &cli.format).await?,
        Commands::Next => commands::auth::next_step(&engine, &cli.format),
        Commands::Register => commands::auth::register(&engine, &cli.format).await?,
        Commands::Role { role } => commands::auth::set_role(&engine, &role, &cli.format).await?,
        Commands::Onboarding { command } => match command {
            OnboardingCommands::Start => commands::onboarding::start(&engine, &cli.format)?,
            OnboardingCommands::Complete { step, data } => {
                commands::onboarding::complete(&engine, &step, data.as_deref(), &cli.format)?
            }
            OnboardingCommands::Skip => commands::onboarding::skip(&engine, &cli.format)?,
            OnboardingCommands::Show => commands::onboarding::show(&engine, &cli.format)?,
        },
        Commands::Verify { token } => {
            commands::account::verify_email(&engine, &token, &cli.format).await?
        }
        Commands::Resend => commands::account::resend_verification(&engine, &cli.format).await?,
        Commands::Password { command } => match command {
            PasswordCommands::Forgot { email } => {
                commands::account::forgot_password(&engine, &email, &cli.format).await?
            }
            PasswordCommands::Reset { token } => {
                commands::account::reset_password(&engine, &token, &cli.format).await?
            }
        },
    }

    Ok(())
}
