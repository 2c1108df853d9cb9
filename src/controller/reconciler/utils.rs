//! # Utilities
//!
//! Helpers shared by the resolver and the reconcile pass.

use crate::controller::reconciler::error::ReconcileError;
use kube::ResourceExt;
use std::future::Future;
use std::time::Duration;

/// Run one external call, turning an elapsed `timeout` into a transient error
///
/// # Errors
///
/// Returns the call's own error, or [`ReconcileError::Timeout`].
pub async fn bounded<T, E, F>(
    operation: &'static str,
    timeout: Duration,
    call: F,
) -> Result<T, ReconcileError>
where
    F: Future<Output = Result<T, E>>,
    ReconcileError: From<E>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result.map_err(ReconcileError::from),
        Err(_elapsed) => Err(ReconcileError::Timeout { operation, timeout }),
    }
}

/// `namespace/name` of a resource, used in logs and backoff bookkeeping
pub fn resource_key<K: ResourceExt>(resource: &K) -> String {
    format!(
        "{}/{}",
        resource.namespace().unwrap_or_default(),
        resource.name_any()
    )
}
