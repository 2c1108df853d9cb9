//! # Key-Value Accessor
//!
//! Read access to Secrets and ConfigMaps in the resource namespace.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use kube::{Api, Client};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// Kind of object a reference points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResourceKind {
    Secret,
    ConfigMap,
}

impl ResourceKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Secret => "Secret",
            ResourceKind::ConfigMap => "ConfigMap",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum AccessError {
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        kind: ResourceKind,
        namespace: String,
        name: String,
    },
    #[error("key {key:?} not found in {kind} {namespace}/{name}")]
    KeyNotFound {
        kind: ResourceKind,
        namespace: String,
        name: String,
        key: String,
    },
    #[error("value of key {key:?} in {kind} {namespace}/{name} is not valid UTF-8: {source}")]
    InvalidUtf8 {
        kind: ResourceKind,
        namespace: String,
        name: String,
        key: String,
        #[source]
        source: std::str::Utf8Error,
    },
    #[error("failed to read {kind} {namespace}/{name}: {message}")]
    Api {
        kind: ResourceKind,
        namespace: String,
        name: String,
        message: String,
    },
}

/// Reads string values out of Secrets and ConfigMaps
#[async_trait]
pub trait KeyValueAccessor: Send + Sync {
    /// All entries of the object
    async fn get_all(
        &self,
        namespace: &str,
        kind: ResourceKind,
        name: &str,
    ) -> Result<BTreeMap<String, String>, AccessError>;

    /// A single entry of the object
    async fn get(
        &self,
        namespace: &str,
        kind: ResourceKind,
        name: &str,
        key: &str,
    ) -> Result<String, AccessError> {
        let mut data = self.get_all(namespace, kind, name).await?;
        data.remove(key).ok_or_else(|| AccessError::KeyNotFound {
            kind,
            namespace: namespace.to_string(),
            name: name.to_string(),
            key: key.to_string(),
        })
    }
}

/// Accessor backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeAccessor {
    client: Client,
}

impl fmt::Debug for KubeAccessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KubeAccessor").finish_non_exhaustive()
    }
}

impl KubeAccessor {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn api_error(kind: ResourceKind, namespace: &str, name: &str, err: &kube::Error) -> AccessError {
    AccessError::Api {
        kind,
        namespace: namespace.to_string(),
        name: name.to_string(),
        message: err.to_string(),
    }
}

fn not_found(kind: ResourceKind, namespace: &str, name: &str) -> AccessError {
    AccessError::NotFound {
        kind,
        namespace: namespace.to_string(),
        name: name.to_string(),
    }
}

/// Decode a Secret's data into strings
fn secret_entries(
    secret: Secret,
    namespace: &str,
    name: &str,
) -> Result<BTreeMap<String, String>, AccessError> {
    let mut entries = BTreeMap::new();
    for (key, value) in secret.data.unwrap_or_default() {
        let value = String::from_utf8(value.0).map_err(|e| AccessError::InvalidUtf8 {
            kind: ResourceKind::Secret,
            namespace: namespace.to_string(),
            name: name.to_string(),
            key: key.clone(),
            source: e.utf8_error(),
        })?;
        entries.insert(key, value);
    }
    // stringData is write-only on the server, but honour it for objects built locally
    entries.extend(secret.string_data.unwrap_or_default());
    Ok(entries)
}

#[async_trait]
impl KeyValueAccessor for KubeAccessor {
    async fn get_all(
        &self,
        namespace: &str,
        kind: ResourceKind,
        name: &str,
    ) -> Result<BTreeMap<String, String>, AccessError> {
        debug!("Reading {} {}/{}", kind, namespace, name);
        match kind {
            ResourceKind::Secret => {
                let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
                let secret = api
                    .get_opt(name)
                    .await
                    .map_err(|e| api_error(kind, namespace, name, &e))?
                    .ok_or_else(|| not_found(kind, namespace, name))?;

                secret_entries(secret, namespace, name)
            }
            ResourceKind::ConfigMap => {
                let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
                let config_map = api
                    .get_opt(name)
                    .await
                    .map_err(|e| api_error(kind, namespace, name, &e))?
                    .ok_or_else(|| not_found(kind, namespace, name))?;
                Ok(config_map.data.unwrap_or_default())
            }
        }
    }
}
