//! # Resolved Input
//!
//! The fully dereferenced form of a `SchemaMigrationSpec`, valid for one pass.

use crate::controller::resolver::MaterializedDir;
use crate::crd::RemoteDir;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Concrete parameters for one reconciliation pass
///
/// Owns the materialized migration directory (if any). The connection URL and
/// cloud token are wiped when the value is dropped.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct ResolvedInput {
    /// Environment name handed to the executor
    #[zeroize(skip)]
    pub env_name: String,
    /// Database connection URL
    pub url: String,
    /// Materialized local migration directory
    #[zeroize(skip)]
    pub migration_dir: Option<MaterializedDir>,
    /// Cloud parameters, present when a cloud token is configured
    pub cloud: Option<CloudInput>,
    /// Schema holding the executor's revision table
    #[zeroize(skip)]
    pub revisions_schema: Option<String>,
}

/// Resolved cloud parameters
#[derive(Clone, Default, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct CloudInput {
    pub token: String,
    #[zeroize(skip)]
    pub url: String,
    #[zeroize(skip)]
    pub project: String,
    #[zeroize(skip)]
    pub remote_dir: Option<RemoteDir>,
}

// Connection URL and token stay out of logs
impl std::fmt::Debug for ResolvedInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedInput")
            .field("env_name", &self.env_name)
            .field("migration_dir", &self.migration_dir)
            .field("cloud", &self.cloud)
            .field("revisions_schema", &self.revisions_schema)
            .finish_non_exhaustive()
    }
}

impl std::fmt::Debug for CloudInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudInput")
            .field("url", &self.url)
            .field("project", &self.project)
            .field("remote_dir", &self.remote_dir)
            .finish_non_exhaustive()
    }
}

impl ResolvedInput {
    /// Input with only a connection URL
    #[must_use]
    pub fn with_url(env_name: &str, url: &str) -> Self {
        Self {
            env_name: env_name.to_string(),
            url: url.to_string(),
            migration_dir: None,
            cloud: None,
            revisions_schema: None,
        }
    }

    /// `file://` URL of the materialized migration directory
    #[must_use]
    pub fn migration_dir_url(&self) -> Option<String> {
        self.migration_dir
            .as_ref()
            .map(|dir| format!("file://{}", dir.path().display()))
    }
}
