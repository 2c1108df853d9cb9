//! # Reconciliation Logic
//!
//! Entry point called by the kube-runtime controller for each `SchemaMigration`.

use crate::controller::reconciler::engine::PassResult;
use crate::controller::reconciler::status::update_status;
use crate::controller::reconciler::types::{Reconciler, ReconcilerError};
use crate::controller::reconciler::utils::resource_key;
use crate::crd::SchemaMigration;
use crate::observability;
use anyhow::Context;
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Main reconciliation function
///
/// Runs one engine pass, persists the resulting status and maps the outcome
/// to the next requeue. Transient failures are returned as errors so that
/// `error_policy()` applies the per-resource backoff.
#[allow(
    clippy::missing_errors_doc,
    reason = "Errors are handled by the error policy"
)]
pub async fn reconcile(
    resource: Arc<SchemaMigration>,
    ctx: Arc<Reconciler>,
) -> Result<Action, ReconcilerError> {
    let key = resource_key(resource.as_ref());
    info!("🔄 Reconciling SchemaMigration: {}", key);

    let outcome = ctx.engine.reconcile(&resource).await;

    update_status(&ctx.client, &resource, &outcome.status)
        .await
        .with_context(|| format!("Failed to update status of {key}"))?;

    let resync = ctx.config.resync_interval();
    match outcome.result {
        PassResult::Ready => {
            ctx.reset_backoff(&key);
            info!(
                "✅ {} is ready at version {}",
                key, outcome.status.last_applied_version
            );
            Ok(Action::requeue(resync))
        }
        PassResult::Requeue => {
            observability::increment_requeues(PassResult::Requeue.reason());
            debug!("Requeueing {} immediately", key);
            Ok(Action::requeue(Duration::ZERO))
        }
        PassResult::Failed(err) if err.class().is_terminal() => {
            // Retrying cannot help until the spec or the database changes;
            // spec edits and dependency changes trigger a new pass anyway.
            ctx.reset_backoff(&key);
            warn!(
                "❌ {} failed terminally ({}), next check in {}s",
                key,
                err.reason(),
                resync.as_secs()
            );
            Ok(Action::requeue(resync))
        }
        PassResult::Failed(err) => Err(ReconcilerError::Pass(err)),
    }
}
