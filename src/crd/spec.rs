//! # SchemaMigration Spec
//!
//! Main CRD specification type.

use serde::{Deserialize, Serialize};

/// SchemaMigration Custom Resource Definition
///
/// Declares the migration state a single database should be driven to.
///
/// # Example
///
/// ```yaml
/// apiVersion: db.schemamigration.io/v1alpha1
/// kind: SchemaMigration
/// metadata:
///   name: orders-db
///   namespace: default
/// spec:
///   urlFrom:
///     secretKeyRef:
///       name: orders-db-credentials
///       key: url
///   dir:
///     configMapRef:
///       name: orders-migrations
/// ```
#[derive(
    kube::CustomResource, Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema,
)]
#[kube(
    kind = "SchemaMigration",
    group = "db.schemamigration.io",
    version = "v1alpha1",
    namespaced,
    status = "crate::crd::SchemaMigrationStatus",
    shortname = "smig",
    printcolumn = r#"{"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}, {"name":"Reason", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].reason"}, {"name":"Version", "type":"string", "jsonPath":".status.lastAppliedVersion"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct SchemaMigrationSpec {
    /// URL of the target database
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// URL read from a secret key in the resource namespace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_from: Option<crate::crd::UrlFrom>,
    /// Structured connection credentials, used instead of `url` / `urlFrom`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<crate::crd::Credentials>,
    /// Where the migration files come from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<crate::crd::MigrationDir>,
    /// Cloud connection used for remote migration directories
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud: Option<crate::crd::Cloud>,
    /// Environment name handed to the executor
    /// Default: "kubernetes"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env_name: Option<String>,
    /// Schema holding the executor's revision table
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revisions_schema: Option<String>,
}
