//! Moderation gate for Mentor.
//!
//! Screens learner text through the provider's safety classifier and turns
//! violations into warnings and bans. The same two-strike rule applies
//! before an account exists (device scope) and after (account scope).

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::ModerationConfig;
use crate::error::{FailOpen, MentorError, Result};
use crate::provider::{ContentFacade, SafetyVerdict};
use crate::storage::{KeyValueStore, RecordStore};

/// Where a violation is counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// The local installation, before any account exists.
    Device,
    /// A specific user account.
    Account,
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scope::Device => write!(f, "device"),
            Scope::Account => write!(f, "account"),
        }
    }
}

/// Result of recording one violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationOutcome {
    pub scope: Scope,
    /// Warning count after this violation.
    pub warnings: u32,
    /// Whether the scope is now banned.
    pub should_ban: bool,
}

/// Classifier front end plus the strike policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModerationGate {
    threshold: u32,
}

impl Default for ModerationGate {
    fn default() -> Self {
        Self::new(ModerationConfig::default().ban_threshold)
    }
}

impl ModerationGate {
    /// A gate that bans at `threshold` warnings (at least 1).
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
        }
    }

    pub fn from_config(config: &ModerationConfig) -> Self {
        Self::new(config.ban_threshold)
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Classify text.
    ///
    /// Fails open: if the classifier cannot be reached or answers garbage,
    /// the text is treated as safe so outages never block learners.
    pub fn check_safety(&self, facade: &ContentFacade, text: &str) -> SafetyVerdict {
        facade
            .check_safety(text)
            .fail_open_with("Safety check failed", SafetyVerdict::safe())
    }

    /// Count one more violation on top of `prior_warnings`.
    pub fn record_violation(&self, scope: Scope, prior_warnings: u32) -> ViolationOutcome {
        let warnings = prior_warnings.saturating_add(1);
        ViolationOutcome {
            scope,
            warnings,
            should_ban: warnings >= self.threshold,
        }
    }

    /// Record a device-scope violation and ban the device at the threshold.
    ///
    /// The ban flag is written before the warning count, so a failed write
    /// never leaves the count at the threshold on an unbanned device.
    pub fn apply_device_violation<S: KeyValueStore>(
        &self,
        records: &RecordStore<S>,
    ) -> Result<ViolationOutcome> {
        let prior = records.get_device_warnings()?;
        let outcome = self.record_violation(Scope::Device, prior);

        if outcome.should_ban {
            records.ban_device()?;
        }
        records.increment_device_warnings()?;
        log_outcome(&outcome, None);
        Ok(outcome)
    }

    /// Record an account-scope violation against the stored warning count.
    pub fn apply_account_violation<S: KeyValueStore>(
        &self,
        records: &mut RecordStore<S>,
        user_id: &str,
    ) -> Result<ViolationOutcome> {
        let prior = records
            .get_user(user_id)
            .map(|u| u.warning_count)
            .ok_or_else(|| MentorError::user_not_found(user_id))?;
        let outcome = self.record_violation(Scope::Account, prior);

        records
            .update_user_safety(user_id, outcome.should_ban, outcome.warnings)?
            .ok_or_else(|| MentorError::user_not_found(user_id))?;
        log_outcome(&outcome, Some(user_id));
        Ok(outcome)
    }
}

fn log_outcome(outcome: &ViolationOutcome, user_id: Option<&str>) {
    let subject = user_id.unwrap_or("this device");
    if outcome.should_ban {
        info!("Banning {} ({} scope, {} warnings)", subject, outcome.scope, outcome.warnings);
    } else {
        warn!("Violation by {} ({} scope, warning {})", subject, outcome.scope, outcome.warnings);
    }
}
