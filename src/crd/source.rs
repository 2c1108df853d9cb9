//! # Migration Source
//!
//! Migration directory and cloud configuration types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Where the migration files are read from
///
/// Exactly one of `local`, `configMapRef` or `remote` may be set.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MigrationDir {
    /// Inline migration files: file name -> file content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local: Option<BTreeMap<String, String>>,
    /// ConfigMap in the resource namespace whose data holds the migration files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_map_ref: Option<LocalObjectReference>,
    /// Directory hosted by the migration cloud, addressed by name and tag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<RemoteDir>,
}

/// Name of an object in the same namespace
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
pub struct LocalObjectReference {
    pub name: String,
}

/// Remote migration directory descriptor
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Deserialize, Serialize, schemars::JsonSchema)]
pub struct RemoteDir {
    pub name: String,
    #[serde(default)]
    pub tag: String,
}

/// Cloud connection settings
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Cloud {
    /// Cloud API endpoint
    #[serde(default)]
    pub url: String,
    /// Cloud project the migrations are reported under
    #[serde(default)]
    pub project: String,
    /// Token used to authenticate against the cloud
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_from: Option<TokenFrom>,
}

impl Cloud {
    /// Secret holding the cloud token, if one is referenced
    #[must_use]
    pub fn token_secret(&self) -> Option<&crate::crd::SecretKeySelector> {
        self.token_from
            .as_ref()
            .and_then(|t| t.secret_key_ref.as_ref())
    }
}

/// Reference to a key holding the cloud token
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenFrom {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_key_ref: Option<crate::crd::SecretKeySelector>,
}
