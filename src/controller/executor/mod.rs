//! # Migration Executor
//!
//! Narrow interface to the external migration engine: report what is pending,
//! and apply it. Reports mirror the engine's JSON output (PascalCase keys).

mod cli;
mod render;

pub use cli::CliExecutor;
pub use render::render;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

/// External migration engine
#[async_trait]
pub trait MigrationExecutor: Send + Sync {
    /// Report applied and pending migrations for `env`
    async fn status(&self, env: &str, config: &str) -> anyhow::Result<StatusReport>;

    /// Apply all pending migrations for `env`
    ///
    /// A failed migration is reported through [`ApplyReport::error`]; `Err` is
    /// reserved for failing to run the engine at all.
    async fn apply(&self, env: &str, config: &str) -> anyhow::Result<ApplyReport>;
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StatusReport {
    /// Version of the most recently applied migration
    #[serde(default, deserialize_with = "null_as_default")]
    pub current: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub applied: Vec<AppliedRevision>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub pending: Vec<PendingFile>,
}

impl StatusReport {
    /// Execution time of the last applied revision, as unix seconds (0 if none)
    #[must_use]
    pub fn last_executed_at(&self) -> i64 {
        self.applied
            .last()
            .and_then(|revision| revision.executed_at)
            .map_or(0, |t| t.timestamp())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AppliedRevision {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub executed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PendingFile {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ApplyReport {
    /// Version the database was migrated to
    #[serde(default, deserialize_with = "null_as_default")]
    pub target: String,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
    /// Non-empty when a migration failed
    #[serde(default, deserialize_with = "null_as_default")]
    pub error: String,
    /// Files applied during this run
    #[serde(default, deserialize_with = "null_as_default")]
    pub applied: Vec<PendingFile>,
}

impl ApplyReport {
    /// End of the run as unix seconds (0 if unknown)
    #[must_use]
    pub fn end_timestamp(&self) -> i64 {
        self.end.map_or(0, |t| t.timestamp())
    }
}
