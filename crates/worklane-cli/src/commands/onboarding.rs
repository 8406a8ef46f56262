//! Onboarding commands.

use crate::output::{self, OutputFormat};
use anyhow::Result;
use std::sync::Arc;
use worklane_session::{SessionEngine, StepId};

fn parse_step(step: &str) -> Option<StepId> {
    match step.to_lowercase().as_str() {
        "terms" => Some(StepId::Terms),
        "document" => Some(StepId::Document),
        "facial" => Some(StepId::Facial),
        "role" => Some(StepId::Role),
        "wallet" => Some(StepId::Wallet),
        "bank" => Some(StepId::Bank),
        "profile" => Some(StepId::Profile),
        _ => None,
    }
}

/// Begin onboarding from the first step.
pub fn start(engine: &Arc<SessionEngine>, format: &OutputFormat) -> Result<()> {
    let progress = engine.verification().start()?;
    output::print_success(
        &format!("Onboarding started at step {:?}", progress.current_step),
        format,
    );
    Ok(())
}

/// Mark a step as completed, with an optional JSON payload.
pub fn complete(
    engine: &Arc<SessionEngine>,
    step: &str,
    data: Option<&str>,
    format: &OutputFormat,
) -> Result<()> {
    let Some(step) = parse_step(step) else {
        output::print_error(&format!("Unknown step '{}'", step), format);
        return Ok(());
    };

    let data = match data {
        Some(raw) => match serde_json::from_str(raw) {
            Ok(serde_json::Value::Object(map)) => Some(map),
            Ok(_) => {
                output::print_error("--data must be a JSON object", format);
                return Ok(());
            }
            Err(e) => {
                output::print_error(&format!("Invalid --data JSON: {}", e), format);
                return Ok(());
            }
        },
        None => None,
    };

    let progress = engine.verification().complete_step(step, data)?;
    output::print_success(
        &format!(
            "Completed {:?}, now at {:?}",
            step, progress.current_step
        ),
        format,
    );
    Ok(())
}

/// Discard onboarding progress.
pub fn skip(engine: &Arc<SessionEngine>, format: &OutputFormat) -> Result<()> {
    engine.verification().skip()?;
    output::print_success("Onboarding progress discarded", format);
    Ok(())
}

/// Show current progress.
pub fn show(engine: &Arc<SessionEngine>, format: &OutputFormat) -> Result<()> {
    let progress = engine.verification().current_progress()?;

    match format {
        OutputFormat::Text => {
            output::print_row("Current", &format!("{:?}", progress.current_step));
            let completed: Vec<String> = progress
                .completed_steps
                .iter()
                .map(|s| format!("{:?}", s))
                .collect();
            output::print_row(
                "Completed",
                if completed.is_empty() {
                    "none".to_string()
                } else {
                    completed.join(", ")
                }
                .as_str(),
            );
            output::print_row("Started", &progress.started_at.to_rfc3339());
        }
        OutputFormat::Json => output::print_json(&progress),
    }
    Ok(())
}
