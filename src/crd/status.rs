//! # SchemaMigration Status
//!
//! Status types for tracking reconciliation state and conditions.

use crate::constants::{CONDITION_READY, REASON_APPLIED};
use serde::{Deserialize, Serialize};

/// Status of the SchemaMigration resource
///
/// `observed_hash`, `last_applied` and `last_applied_version` describe the last
/// input that was processed successfully. They are left alone when a pass fails,
/// so a stale hash stays visible until the cause is fixed.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SchemaMigrationStatus {
    /// Conditions represent the latest available observations
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Fingerprint of the most recently applied input
    #[serde(default)]
    pub observed_hash: String,
    /// Unix timestamp (seconds) of the most recent successful apply
    #[serde(default)]
    pub last_applied: i64,
    /// Version of the most recently applied migration
    #[serde(default)]
    pub last_applied_version: String,
    /// Generation of the spec the status was computed from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

/// Condition represents a condition of a resource
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition
    pub r#type: String,
    /// Status of the condition (True, False, Unknown)
    pub status: String,
    /// Last transition time
    #[serde(default)]
    pub last_transition_time: Option<String>,
    /// Reason for the condition
    #[serde(default)]
    pub reason: Option<String>,
    /// Message describing the condition
    #[serde(default)]
    pub message: Option<String>,
}

/// Outcome of a successful pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedState {
    pub observed_hash: String,
    pub last_applied: i64,
    pub last_applied_version: String,
}

impl SchemaMigrationStatus {
    /// The Ready condition, if recorded
    #[must_use]
    pub fn ready_condition(&self) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.r#type == CONDITION_READY)
    }

    /// Whether the Ready condition is True
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready_condition().is_some_and(|c| c.status == "True")
    }

    /// Whether `hash` differs from the last processed fingerprint
    #[must_use]
    pub fn is_hash_modified(&self, hash: &str) -> bool {
        self.observed_hash != hash
    }

    /// Mark the resource not ready, leaving the observed fields untouched
    pub fn set_not_ready(&mut self, reason: &str, message: &str) {
        self.set_condition(CONDITION_READY, "False", reason, message);
    }

    /// Mark the resource ready and record what was applied
    pub fn set_ready(&mut self, applied: AppliedState) {
        let message = format!("Version {} applied", applied.last_applied_version);
        self.observed_hash = applied.observed_hash;
        self.last_applied = applied.last_applied;
        self.last_applied_version = applied.last_applied_version;
        self.set_condition(CONDITION_READY, "True", REASON_APPLIED, &message);
    }

    /// Insert or update a condition.
    ///
    /// The transition time only moves when the status value flips, so an
    /// unchanged outcome leaves the status byte-for-byte identical.
    pub fn set_condition(&mut self, type_: &str, status: &str, reason: &str, message: &str) {
        if let Some(existing) = self.conditions.iter_mut().find(|c| c.r#type == type_) {
            if existing.status != status {
                existing.status = status.to_string();
                existing.last_transition_time = Some(chrono::Utc::now().to_rfc3339());
            }
            existing.reason = Some(reason.to_string());
            existing.message = Some(message.to_string());
            return;
        }
        self.conditions.push(Condition {
            r#type: type_.to_string(),
            status: status.to_string(),
            last_transition_time: Some(chrono::Utc::now().to_rfc3339()),
            reason: Some(reason.to_string()),
            message: Some(message.to_string()),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn applied(hash: &str, version: &str) -> AppliedState {
        AppliedState {
            observed_hash: hash.to_string(),
            last_applied: 1_700_000_000,
            last_applied_version: version.to_string(),
        }
    }

    #[test]
    fn test_new_status_is_not_ready() {
        let status = SchemaMigrationStatus::default();
        assert!(!status.is_ready());
        assert!(status.ready_condition().is_none());
    }

    #[test]
    fn test_set_ready_records_applied_state() {
        let mut status = SchemaMigrationStatus::default();
        status.set_ready(applied("abc", "20240101"));

        assert!(status.is_ready());
        assert_eq!(status.observed_hash, "abc");
        assert_eq!(status.last_applied_version, "20240101");
        let ready = status.ready_condition().unwrap();
        assert_eq!(ready.reason.as_deref(), Some("Applied"));
        assert_eq!(ready.message.as_deref(), Some("Version 20240101 applied"));
    }

    #[test]
    fn test_set_not_ready_keeps_observed_fields() {
        let mut status = SchemaMigrationStatus::default();
        status.set_ready(applied("abc", "1"));
        status.set_not_ready("TransientErr", "secret not found");

        assert!(!status.is_ready());
        assert_eq!(status.observed_hash, "abc");
        assert_eq!(status.last_applied_version, "1");
        assert_eq!(status.conditions.len(), 1);
    }

    #[test]
    fn test_transition_time_only_moves_on_status_flip() {
        let mut status = SchemaMigrationStatus::default();
        status.set_not_ready("Reconciling", "Reconciling");
        let first = status.ready_condition().unwrap().last_transition_time.clone();

        status.set_not_ready("TransientErr", "still failing");
        let second = status.ready_condition().unwrap().last_transition_time.clone();
        assert_eq!(first, second);
        assert_eq!(
            status.ready_condition().unwrap().reason.as_deref(),
            Some("TransientErr")
        );
    }

    #[test]
    fn test_repeated_ready_is_identical() {
        let mut status = SchemaMigrationStatus::default();
        status.set_ready(applied("abc", "1"));
        let snapshot = status.clone();
        status.set_ready(applied("abc", "1"));
        assert_eq!(status, snapshot);
    }

    #[test]
    fn test_is_hash_modified() {
        let mut status = SchemaMigrationStatus::default();
        assert!(status.is_hash_modified("abc"));
        status.set_ready(applied("abc", "1"));
        assert!(!status.is_hash_modified("abc"));
        assert!(status.is_hash_modified("def"));
    }
}
