//! Multi-step onboarding/KYC flow with persisted, resumable progress.

use crate::AuthResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};
use worklane_storage::{SessionVault, StoreKeys};

/// One stage of the account-completion sequence, in completion order.
///
/// `Complete` is terminal and absorbing.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum StepId {
    Terms,
    Document,
    Facial,
    Role,
    Wallet,
    Bank,
    Profile,
    Complete,
}

impl StepId {
    /// All steps in completion order.
    pub const ORDERED: [StepId; 8] = [
        StepId::Terms,
        StepId::Document,
        StepId::Facial,
        StepId::Role,
        StepId::Wallet,
        StepId::Bank,
        StepId::Profile,
        StepId::Complete,
    ];

    /// The step following this one. `Complete` absorbs.
    pub fn next(self) -> StepId {
        match self {
            StepId::Terms => StepId::Document,
            StepId::Document => StepId::Facial,
            StepId::Facial => StepId::Role,
            StepId::Role => StepId::Wallet,
            StepId::Wallet => StepId::Bank,
            StepId::Bank => StepId::Profile,
            StepId::Profile => StepId::Complete,
            StepId::Complete => StepId::Complete,
        }
    }

    /// Whether this is the terminal step.
    pub fn is_terminal(self) -> bool {
        self == StepId::Complete
    }
}

/// Persisted onboarding progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationProgress {
    /// The step the user should be working on.
    pub current_step: StepId,
    /// Steps already completed. Insertion order is irrelevant.
    pub completed_steps: BTreeSet<StepId>,
    /// Accumulated step payloads, merged across completions.
    pub data: Map<String, Value>,
    /// When onboarding began.
    pub started_at: DateTime<Utc>,
}

impl VerificationProgress {
    /// Fresh progress at the first step.
    pub fn new() -> Self {
        Self {
            current_step: StepId::Terms,
            completed_steps: BTreeSet::new(),
            data: Map::new(),
            started_at: Utc::now(),
        }
    }

    /// Whether the terminal step has been reached.
    pub fn is_complete(&self) -> bool {
        self.current_step.is_terminal()
    }
}

impl Default for VerificationProgress {
    fn default() -> Self {
        Self::new()
    }
}

/// Drives the onboarding sequence against persisted progress.
///
/// Completing `Document` or `Facial` does not locally mark the user
/// verified; approval is observed only when the KYC status flips on a
/// subsequent user refresh.
pub struct VerificationFlow {
    vault: Arc<SessionVault>,
}

impl VerificationFlow {
    /// Create a flow persisting through the given vault.
    pub fn new(vault: Arc<SessionVault>) -> Self {
        Self { vault }
    }

    /// Begin onboarding: fresh progress at `Terms`, persisted.
    pub fn start(&self) -> AuthResult<VerificationProgress> {
        let progress = VerificationProgress::new();
        self.persist(&progress)?;
        info!("Onboarding started");
        Ok(progress)
    }

    /// Complete a step: merge its payload, record it, advance, persist.
    ///
    /// Monotonic: steps are only ever added to the completed set.
    pub fn complete_step(
        &self,
        step: StepId,
        data: Option<Map<String, Value>>,
    ) -> AuthResult<VerificationProgress> {
        let mut progress = self.current_progress()?;

        if let Some(data) = data {
            for (key, value) in data {
                progress.data.insert(key, value);
            }
        }
        progress.completed_steps.insert(step);
        progress.current_step = step.next();

        self.persist(&progress)?;
        debug!(step = ?step, current = ?progress.current_step, "Onboarding step completed");
        Ok(progress)
    }

    /// The persisted progress, or a fresh default when none exists.
    pub fn current_progress(&self) -> AuthResult<VerificationProgress> {
        let progress = self
            .vault
            .get_record::<VerificationProgress>(StoreKeys::VERIFICATION_PROGRESS)?
            .unwrap_or_default();
        Ok(progress)
    }

    /// Whether progress is persisted at all.
    pub fn is_active(&self) -> AuthResult<bool> {
        Ok(self.vault.has_record(StoreKeys::VERIFICATION_PROGRESS)?)
    }

    /// Delete persisted progress. Does not touch the user.
    pub fn skip(&self) -> AuthResult<()> {
        self.vault.clear_record(StoreKeys::VERIFICATION_PROGRESS)?;
        info!("Onboarding progress discarded");
        Ok(())
    }

    fn persist(&self, progress: &VerificationProgress) -> AuthResult<()> {
        self.vault
            .set_record(StoreKeys::VERIFICATION_PROGRESS, progress)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::memory_vault;

    #[test]
    fn test_step_order_is_linear() {
        for window in StepId::ORDERED.windows(2) {
            assert_eq!(window[0].next(), window[1]);
        }
    }

    #[test]
    fn test_complete_is_absorbing() {
        assert_eq!(StepId::Complete.next(), StepId::Complete);
        assert!(StepId::Complete.is_terminal());
        assert!(!StepId::Profile.is_terminal());
    }

    #[test]
    fn test_current_progress_never_absent() {
        let flow = VerificationFlow::new(memory_vault());
        let progress = flow.current_progress().unwrap();

        assert_eq!(progress.current_step, StepId::Terms);
        assert!(progress.completed_steps.is_empty());
        // Reading a default does not implicitly begin onboarding
        assert!(!flow.is_active().unwrap());
    }

    #[test]
    fn test_start_persists_fresh_progress() {
        let flow = VerificationFlow::new(memory_vault());
        flow.start().unwrap();

        assert!(flow.is_active().unwrap());
        assert_eq!(flow.current_progress().unwrap().current_step, StepId::Terms);
    }

    #[test]
    fn test_complete_step_advances_and_records() {
        let flow = VerificationFlow::new(memory_vault());
        flow.start().unwrap();

        let progress = flow.complete_step(StepId::Terms, None).unwrap();
        assert_eq!(progress.current_step, StepId::Document);
        assert!(progress.completed_steps.contains(&StepId::Terms));

        let progress = flow.complete_step(StepId::Document, None).unwrap();
        assert_eq!(progress.current_step, StepId::Facial);
        assert!(progress.completed_steps.contains(&StepId::Terms));
        assert!(progress.completed_steps.contains(&StepId::Document));
    }

    #[test]
    fn test_complete_step_is_monotonic() {
        let flow = VerificationFlow::new(memory_vault());
        flow.start().unwrap();

        let mut seen = BTreeSet::new();
        for step in [StepId::Terms, StepId::Document, StepId::Facial, StepId::Role] {
            let before = flow.current_progress().unwrap().completed_steps;
            let after = flow.complete_step(step, None).unwrap().completed_steps;
            assert!(before.is_subset(&after));
            seen.insert(step);
            assert_eq!(after, seen);
        }
    }

    #[test]
    fn test_complete_step_merges_data() {
        let flow = VerificationFlow::new(memory_vault());
        flow.start().unwrap();

        let mut first = Map::new();
        first.insert("terms_version".to_string(), "2024-05".into());
        flow.complete_step(StepId::Terms, Some(first)).unwrap();

        let mut second = Map::new();
        second.insert("document_kind".to_string(), "passport".into());
        let progress = flow.complete_step(StepId::Document, Some(second)).unwrap();

        assert_eq!(progress.data.get("terms_version").unwrap(), "2024-05");
        assert_eq!(progress.data.get("document_kind").unwrap(), "passport");
    }

    #[test]
    fn test_last_step_reaches_complete() {
        let flow = VerificationFlow::new(memory_vault());
        flow.start().unwrap();

        let progress = flow.complete_step(StepId::Profile, None).unwrap();
        assert_eq!(progress.current_step, StepId::Complete);
        assert!(progress.is_complete());
    }

    #[test]
    fn test_progress_survives_reload() {
        let vault = memory_vault();
        {
            let flow = VerificationFlow::new(Arc::clone(&vault));
            flow.start().unwrap();
            flow.complete_step(StepId::Terms, None).unwrap();
        }

        // A new flow over the same vault sees the persisted progress
        let flow = VerificationFlow::new(vault);
        let progress = flow.current_progress().unwrap();
        assert_eq!(progress.current_step, StepId::Document);
        assert!(progress.completed_steps.contains(&StepId::Terms));
    }

    #[test]
    fn test_skip_deletes_progress_only() {
        let flow = VerificationFlow::new(memory_vault());
        flow.start().unwrap();
        flow.complete_step(StepId::Terms, None).unwrap();

        flow.skip().unwrap();

        assert!(!flow.is_active().unwrap());
        // Reads fall back to a fresh default
        assert_eq!(flow.current_progress().unwrap().current_step, StepId::Terms);
    }

    #[test]
    fn test_progress_serialization_roundtrip() {
        let flow = VerificationFlow::new(memory_vault());
        flow.start().unwrap();
        let mut data = Map::new();
        data.insert("terms_version".to_string(), "2024-05".into());
        let written = flow.complete_step(StepId::Terms, Some(data)).unwrap();

        let read = flow.current_progress().unwrap();
        assert_eq!(read, written);
    }
}
