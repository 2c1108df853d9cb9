//! # Reconcile Engine
//!
//! One pass over a `SchemaMigration`:
//!
//! 1. A resource without conditions is marked `Reconciling` and requeued.
//! 2. The spec is resolved and fingerprinted.
//! 3. A Ready resource whose fingerprint moved is marked `Reconciling` and requeued.
//! 4. The executor reports pending migrations; if any, they are applied.
//! 5. The outcome is written to the Ready condition.
//!
//! Whatever happens, every pass ends in [`ReconcileEngine::finish`]: the
//! migration directory is released, dependency edges are re-registered and at
//! most one event is published.
//!
//! The engine never touches the status subresource. It returns the computed
//! status and leaves persisting it to the caller.

use crate::constants::{MESSAGE_DATA_CHANGED, REASON_APPLIED, REASON_RECONCILING};
use crate::controller::executor::{render, MigrationExecutor};
use crate::controller::fingerprint::fingerprint;
use crate::controller::input::ResolvedInput;
use crate::controller::reconciler::error::ReconcileError;
use crate::controller::reconciler::events::{EventSink, MigrationEvent};
use crate::controller::reconciler::utils::bounded;
use crate::controller::reconciler::validation::references;
use crate::controller::resolver::{resolve, KeyValueAccessor, ResolveOptions};
use crate::controller::watcher::{DependencyWatcher, ResourceKey};
use crate::crd::{AppliedState, SchemaMigration, SchemaMigrationStatus};
use crate::observability::metrics;
use kube::ResourceExt;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};

/// How a pass ended
#[derive(Debug)]
pub enum PassResult {
    /// Everything declared is applied
    Ready,
    /// Progress was recorded; run again right away
    Requeue,
    /// The pass failed; the status already carries the reason
    Failed(ReconcileError),
}

impl PassResult {
    /// Condition reason for metrics and logs
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            PassResult::Ready => REASON_APPLIED,
            PassResult::Requeue => REASON_RECONCILING,
            PassResult::Failed(err) => err.reason(),
        }
    }
}

/// Status to persist, and how the pass ended
#[derive(Debug)]
pub struct PassOutcome {
    pub status: SchemaMigrationStatus,
    pub result: PassResult,
}

/// Reconciliation state machine with its collaborators
pub struct ReconcileEngine {
    accessor: Arc<dyn KeyValueAccessor>,
    executor: Arc<dyn MigrationExecutor>,
    events: Arc<dyn EventSink>,
    secret_watcher: Arc<DependencyWatcher<ResourceKey>>,
    config_map_watcher: Arc<DependencyWatcher<ResourceKey>>,
    options: ResolveOptions,
}

impl std::fmt::Debug for ReconcileEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconcileEngine")
            .field("secret_edges", &self.secret_watcher.edge_count())
            .field("config_map_edges", &self.config_map_watcher.edge_count())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl ReconcileEngine {
    #[must_use]
    pub fn new(
        accessor: Arc<dyn KeyValueAccessor>,
        executor: Arc<dyn MigrationExecutor>,
        events: Arc<dyn EventSink>,
        options: ResolveOptions,
    ) -> Self {
        Self {
            accessor,
            executor,
            events,
            secret_watcher: Arc::new(DependencyWatcher::new()),
            config_map_watcher: Arc::new(DependencyWatcher::new()),
            options,
        }
    }

    /// Dependents of each Secret
    #[must_use]
    pub fn secret_watcher(&self) -> &Arc<DependencyWatcher<ResourceKey>> {
        &self.secret_watcher
    }

    /// Dependents of each ConfigMap
    #[must_use]
    pub fn config_map_watcher(&self) -> &Arc<DependencyWatcher<ResourceKey>> {
        &self.config_map_watcher
    }

    /// Remove all dependency edges of a deleted resource
    pub fn forget(&self, dependent: &ResourceKey) {
        self.secret_watcher.forget(dependent);
        self.config_map_watcher.forget(dependent);
        self.record_edge_counts();
    }

    /// Run one pass
    pub async fn reconcile(&self, resource: &SchemaMigration) -> PassOutcome {
        let span = info_span!(
            "reconcile",
            resource.name = %resource.name_any(),
            resource.namespace = %resource.namespace().unwrap_or_default(),
            resource.generation = resource.metadata.generation.unwrap_or(0),
        );
        let start = Instant::now();
        metrics::increment_reconciliations();

        let outcome = self.run_pass(resource).instrument(span).await;

        metrics::observe_reconciliation_duration(start.elapsed().as_secs_f64());
        if let PassResult::Failed(err) = &outcome.result {
            metrics::increment_reconciliation_errors(err.reason());
        }
        outcome
    }

    async fn run_pass(&self, resource: &SchemaMigration) -> PassOutcome {
        let mut status = resource.status.clone().unwrap_or_default();
        status.observed_generation = resource.metadata.generation;

        if status.conditions.is_empty() {
            debug!("First pass, initializing Ready condition");
            status.set_not_ready(REASON_RECONCILING, REASON_RECONCILING);
            let result = PassResult::Requeue;
            self.finish(resource, None, &result, &status).await;
            return PassOutcome { status, result };
        }

        let mut resolved = None;
        let result = match self.evaluate(resource, &mut status, &mut resolved).await {
            Ok(result) => result,
            Err(err) => {
                warn!("Pass failed ({}): {}", err.reason(), err.message());
                status.set_not_ready(err.reason(), &err.message());
                PassResult::Failed(err)
            }
        };
        self.finish(resource, resolved, &result, &status).await;
        PassOutcome { status, result }
    }

    async fn evaluate(
        &self,
        resource: &SchemaMigration,
        status: &mut SchemaMigrationStatus,
        resolved: &mut Option<ResolvedInput>,
    ) -> Result<PassResult, ReconcileError> {
        let input = resolved.insert(resolve(resource, self.accessor.as_ref(), &self.options).await?);
        let fp = fingerprint(input).map_err(|e| ReconcileError::io("computing fingerprint", e))?;

        if status.is_ready() && status.is_hash_modified(fp.as_str()) {
            info!("Migration input changed, re-applying");
            status.set_not_ready(REASON_RECONCILING, MESSAGE_DATA_CHANGED);
            return Ok(PassResult::Requeue);
        }

        let config = render(input, &fp);
        let report = self
            .call("migrate status", self.executor.status(&input.env_name, &config))
            .await?;

        let applied = if report.pending.is_empty() {
            debug!("No pending migrations (current version: {:?})", report.current);
            AppliedState {
                observed_hash: fp.to_string(),
                last_applied: report.last_executed_at(),
                last_applied_version: report.current,
            }
        } else {
            info!("Applying {} pending migration(s)", report.pending.len());
            let report = self
                .call("migrate apply", self.executor.apply(&input.env_name, &config))
                .await?;
            if !report.error.trim().is_empty() {
                return Err(ReconcileError::Migration(report.error.trim().to_string()));
            }
            metrics::increment_migrations_applied(report.applied.len());
            info!("Migrated to version {}", report.target);
            AppliedState {
                observed_hash: fp.to_string(),
                last_applied: report.end_timestamp(),
                last_applied_version: report.target,
            }
        };

        status.set_ready(applied);
        Ok(PassResult::Ready)
    }

    async fn call<T, F>(&self, operation: &'static str, call: F) -> Result<T, ReconcileError>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        let start = Instant::now();
        let result = bounded(operation, self.options.call_timeout, async {
            call.await
                .map_err(|source| ReconcileError::Executor { operation, source })
        })
        .await;
        metrics::observe_executor_call_duration(operation, start.elapsed().as_secs_f64());
        result
    }

    /// Always-run end of a pass
    async fn finish(
        &self,
        resource: &SchemaMigration,
        resolved: Option<ResolvedInput>,
        result: &PassResult,
        status: &SchemaMigrationStatus,
    ) {
        if let Some(mut input) = resolved {
            if let Some(dir) = input.migration_dir.take() {
                let path = dir.path().display().to_string();
                if let Err(e) = dir.release() {
                    warn!("Failed to remove migration directory {}: {}", path, e);
                }
            }
        }

        self.register_watches(resource);

        match result {
            PassResult::Ready => {
                self.events
                    .publish(
                        resource,
                        MigrationEvent::applied(&status.last_applied_version),
                    )
                    .await;
            }
            PassResult::Failed(err) => {
                self.events
                    .publish(resource, MigrationEvent::failed(err))
                    .await;
            }
            PassResult::Requeue => {}
        }
    }

    fn register_watches(&self, resource: &SchemaMigration) {
        let namespace = resource.namespace().unwrap_or_default();
        let dependent = ResourceKey::new(namespace.as_str(), resource.name_any());
        let refs = references(&namespace, &resource.spec);

        self.secret_watcher.set_dependencies(&dependent, refs.secrets);
        self.config_map_watcher
            .set_dependencies(&dependent, refs.config_maps);
        self.record_edge_counts();
    }

    fn record_edge_counts(&self) {
        metrics::set_dependency_edges("secret", self.secret_watcher.edge_count());
        metrics::set_dependency_edges("configmap", self.config_map_watcher.edge_count());
    }
}
