//! # Validation
//!
//! Turns the optional fields of a `SchemaMigrationSpec` into exactly one
//! connection source and at most one directory source.

use crate::controller::reconciler::error::ReconcileError;
use crate::controller::resolver::validate_file_name;
use crate::controller::watcher::ResourceKey;
use crate::crd::{Credentials, RemoteDir, SchemaMigrationSpec, SecretKeySelector};
use std::collections::BTreeMap;

/// Where the database URL comes from
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConnectionSource<'a> {
    Url(&'a str),
    UrlFrom(&'a SecretKeySelector),
    Credentials(&'a Credentials),
}

/// Where the migration files come from
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DirSource<'a> {
    Local(&'a BTreeMap<String, String>),
    ConfigMap(&'a str),
    Remote(&'a RemoteDir),
}

/// Validated view of a spec
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidatedSpec<'a> {
    pub connection: ConnectionSource<'a>,
    pub dir: Option<DirSource<'a>>,
}

/// Validate a spec and select its sources
///
/// # Errors
///
/// Returns [`ReconcileError::Configuration`] when mutually exclusive fields are
/// combined, no connection is configured, a local file name is unsafe, or a
/// remote directory has no cloud token to address it with.
pub fn validate(spec: &SchemaMigrationSpec) -> Result<ValidatedSpec<'_>, ReconcileError> {
    let connection = connection_source(spec)?;
    let dir = dir_source(spec)?;

    if let Some(DirSource::Remote(_)) = dir {
        if spec.cloud.as_ref().and_then(|c| c.token_secret()).is_none() {
            return Err(ReconcileError::configuration(
                "dir.remote requires cloud.tokenFrom.secretKeyRef",
            ));
        }
    }

    Ok(ValidatedSpec { connection, dir })
}

fn connection_source(spec: &SchemaMigrationSpec) -> Result<ConnectionSource<'_>, ReconcileError> {
    let mut sources = Vec::with_capacity(1);
    if let Some(url) = spec.url.as_deref().filter(|u| !u.is_empty()) {
        sources.push(ConnectionSource::Url(url));
    }
    if let Some(selector) = spec
        .url_from
        .as_ref()
        .and_then(|u| u.secret_key_ref.as_ref())
    {
        sources.push(ConnectionSource::UrlFrom(selector));
    }
    if let Some(credentials) = spec.credentials.as_ref().filter(|c| !c.host.is_empty()) {
        if !credentials.password.is_empty() && credentials.password_secret().is_some() {
            return Err(ReconcileError::configuration(
                "credentials.password and credentials.passwordFrom are mutually exclusive",
            ));
        }
        sources.push(ConnectionSource::Credentials(credentials));
    }

    match sources.as_slice() {
        [] => Err(ReconcileError::configuration(
            "no database connection configured: set one of url, urlFrom or credentials",
        )),
        [source] => Ok(*source),
        _ => Err(ReconcileError::configuration(
            "url, urlFrom and credentials are mutually exclusive",
        )),
    }
}

fn dir_source(spec: &SchemaMigrationSpec) -> Result<Option<DirSource<'_>>, ReconcileError> {
    let Some(dir) = spec.dir.as_ref() else {
        return Ok(None);
    };

    let mut sources = Vec::with_capacity(1);
    if let Some(local) = dir.local.as_ref() {
        for name in local.keys() {
            validate_file_name(name).map_err(ReconcileError::Configuration)?;
        }
        sources.push(DirSource::Local(local));
    }
    if let Some(reference) = dir.config_map_ref.as_ref() {
        sources.push(DirSource::ConfigMap(reference.name.as_str()));
    }
    if let Some(remote) = dir.remote.as_ref() {
        sources.push(DirSource::Remote(remote));
    }

    match sources.as_slice() {
        [] => Ok(None),
        [source] => Ok(Some(*source)),
        _ => Err(ReconcileError::configuration(
            "dir.local, dir.configMapRef and dir.remote are mutually exclusive",
        )),
    }
}

/// Objects referenced by a spec, split by kind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct References {
    pub secrets: Vec<ResourceKey>,
    pub config_maps: Vec<ResourceKey>,
}

/// Every Secret and ConfigMap a spec points at, whether or not the spec is valid
///
/// Registered even for invalid specs so that fixing a referenced object
/// re-triggers the resource.
#[must_use]
pub fn references(namespace: &str, spec: &SchemaMigrationSpec) -> References {
    let mut refs = References::default();

    let secret_selectors = [
        spec.url_from
            .as_ref()
            .and_then(|u| u.secret_key_ref.as_ref()),
        spec.credentials
            .as_ref()
            .and_then(Credentials::password_secret),
        spec.cloud.as_ref().and_then(|c| c.token_secret()),
    ];
    for selector in secret_selectors.into_iter().flatten() {
        refs.secrets
            .push(ResourceKey::new(namespace, selector.name.as_str()));
    }

    if let Some(reference) = spec.dir.as_ref().and_then(|d| d.config_map_ref.as_ref()) {
        refs.config_maps
            .push(ResourceKey::new(namespace, reference.name.as_str()));
    }

    refs
}
