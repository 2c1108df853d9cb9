//! # Input Resolver
//!
//! Dereferences every indirect reference of a `SchemaMigration` and produces a
//! [`ResolvedInput`] for one pass.
//!
//! - Connection: `url` verbatim, `urlFrom` through the accessor, or
//!   `credentials` composed into a URL
//! - Migration files: inline `dir.local` or `dir.configMapRef` data written to a
//!   private temporary directory; `dir.remote` carried through as a descriptor
//! - Cloud token resolved through the accessor when referenced

mod accessor;
mod credentials;
mod materialize;

pub use accessor::{AccessError, KeyValueAccessor, KubeAccessor, ResourceKind};
pub use credentials::credentials_url;
pub use materialize::{validate_file_name, MaterializedDir};

use crate::config::ControllerConfig;
use crate::controller::input::{CloudInput, ResolvedInput};
use crate::controller::reconciler::error::ReconcileError;
use crate::controller::reconciler::utils::bounded;
use crate::controller::reconciler::validation::{validate, ConnectionSource, DirSource};
use crate::crd::{SchemaMigration, SecretKeySelector};
use kube::ResourceExt;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Settings the resolver needs from the controller configuration
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    /// Parent of materialized migration directories
    pub tmp_root: PathBuf,
    /// Upper bound for each accessor call
    pub call_timeout: Duration,
    /// Used when the resource leaves `envName` empty
    pub default_env_name: String,
}

impl ResolveOptions {
    #[must_use]
    pub fn from_config(config: &ControllerConfig) -> Self {
        Self {
            tmp_root: config.migration_tmp_dir.clone(),
            call_timeout: config.external_call_timeout(),
            default_env_name: config.default_env_name.clone(),
        }
    }
}

/// Resolve a resource into concrete input for one pass
///
/// # Errors
///
/// Configuration errors for an invalid spec, transient errors for missing or
/// unreadable referenced objects, timeouts and local I/O failures. When an
/// error occurs after the migration directory was created, the directory is
/// removed before returning.
pub async fn resolve(
    resource: &SchemaMigration,
    accessor: &dyn KeyValueAccessor,
    options: &ResolveOptions,
) -> Result<ResolvedInput, ReconcileError> {
    let namespace = resource.namespace().unwrap_or_default();
    let spec = &resource.spec;
    let validated = validate(spec)?;

    let env_name = spec
        .env_name
        .clone()
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| options.default_env_name.clone());

    let url = match validated.connection {
        ConnectionSource::Url(url) => url.to_string(),
        ConnectionSource::UrlFrom(selector) => {
            read_secret_key(accessor, &namespace, selector, options.call_timeout).await?
        }
        ConnectionSource::Credentials(credentials) => {
            let password = match credentials.password_secret() {
                Some(selector) => {
                    read_secret_key(accessor, &namespace, selector, options.call_timeout).await?
                }
                None => credentials.password.clone(),
            };
            credentials_url(credentials, &password).map_err(ReconcileError::Configuration)?
        }
    };

    let mut cloud = None;
    if let Some(spec_cloud) = spec.cloud.as_ref() {
        if let Some(selector) = spec_cloud.token_secret() {
            let token =
                read_secret_key(accessor, &namespace, selector, options.call_timeout).await?;
            cloud = Some(CloudInput {
                token,
                url: spec_cloud.url.clone(),
                project: spec_cloud.project.clone(),
                remote_dir: None,
            });
        }
    }

    let mut input = ResolvedInput {
        env_name,
        url,
        migration_dir: None,
        cloud,
        revisions_schema: spec.revisions_schema.clone().filter(|s| !s.is_empty()),
    };

    match validated.dir {
        None => {}
        Some(DirSource::Local(files)) => {
            input.migration_dir = Some(materialize(&options.tmp_root, files)?);
        }
        Some(DirSource::ConfigMap(name)) => {
            let files = bounded(
                "reading migration config map",
                options.call_timeout,
                accessor.get_all(&namespace, ResourceKind::ConfigMap, name),
            )
            .await?;
            for file_name in files.keys() {
                validate_file_name(file_name).map_err(ReconcileError::Configuration)?;
            }
            input.migration_dir = Some(materialize(&options.tmp_root, &files)?);
        }
        Some(DirSource::Remote(remote)) => {
            // validate() guarantees a cloud token, so cloud is populated here
            if let Some(cloud) = input.cloud.as_mut() {
                cloud.remote_dir = Some(remote.clone());
            }
        }
    }

    debug!(
        "Resolved {}/{} (env: {}, local dir: {}, cloud: {})",
        namespace,
        resource.name_any(),
        input.env_name,
        input.migration_dir.is_some(),
        input.cloud.is_some()
    );
    Ok(input)
}

async fn read_secret_key(
    accessor: &dyn KeyValueAccessor,
    namespace: &str,
    selector: &SecretKeySelector,
    timeout: Duration,
) -> Result<String, ReconcileError> {
    bounded(
        "reading secret",
        timeout,
        accessor.get(namespace, ResourceKind::Secret, &selector.name, &selector.key),
    )
    .await
}

fn materialize(
    root: &Path,
    files: &BTreeMap<String, String>,
) -> Result<MaterializedDir, ReconcileError> {
    MaterializedDir::create(root, files)
        .map_err(|e| ReconcileError::io("materializing migration directory", e))
}
