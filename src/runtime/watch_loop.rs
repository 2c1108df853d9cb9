//! # Watch Loop
//!
//! Controller watch loop that monitors `SchemaMigration` resources, plus the
//! Secrets and ConfigMaps they reference, and triggers reconciliation when
//! changes are detected.
//!
//! `SchemaMigration` events only start a pass when the generation changes, so
//! the controller's own status patches never trigger it. Requeues, dependency
//! changes and the resync interval still do.

use crate::config::SharedControllerConfig;
use crate::controller::reconciler::{reconcile, Reconciler};
use crate::controller::server::ServerState;
use crate::controller::watcher::{DependencyWatcher, ResourceKey};
use crate::crd::SchemaMigration;
use crate::runtime::error_policy::{handle_reconciliation_error, handle_watch_stream_error};
use futures::{FutureExt, Stream, StreamExt};
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use kube::api::Api;
use kube::ResourceExt;
use kube_runtime::reflector::{self, ObjectRef, Store};
use kube_runtime::{predicates, watcher, Controller, WatchStreamExt};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Map a changed Secret or ConfigMap to the resources that depend on it
///
/// Until the `SchemaMigration` cache has completed its initial list nothing is
/// requeued or forgotten; the initial list reconciles every resource anyway.
/// Afterwards, dependents missing from the cache were deleted and are passed to
/// `forget` instead of being requeued.
pub fn dependents_of<K: ResourceExt>(
    object: &K,
    watcher: &DependencyWatcher<ResourceKey>,
    store: &Store<SchemaMigration>,
    forget: impl Fn(&ResourceKey),
) -> Vec<ObjectRef<SchemaMigration>> {
    let external = ResourceKey::new(object.namespace().unwrap_or_default(), object.name_any());
    if !matches!(store.wait_until_ready().now_or_never(), Some(Ok(()))) {
        debug!("{} changed before the resource cache is ready, ignoring", external);
        return Vec::new();
    }

    let mut refs = Vec::new();
    for dependent in watcher.on_external_change(&external) {
        let obj_ref = ObjectRef::new(&dependent.name).within(&dependent.namespace);
        if store.get(&obj_ref).is_some() {
            debug!("{} changed, requeueing {}", external, dependent);
            refs.push(obj_ref);
        } else {
            debug!("Dependent {} no longer exists, forgetting it", dependent);
            forget(&dependent);
        }
    }
    refs
}

/// Keep only `SchemaMigration` events whose generation has not been seen yet
fn generation_changes(
    events: impl Stream<Item = Result<SchemaMigration, watcher::Error>> + Send + 'static,
) -> impl Stream<Item = Result<SchemaMigration, watcher::Error>> + Send + 'static {
    events.predicate_filter(predicates::generation)
}

/// Drop the dependency edges and backoff state of a deleted resource
fn forget_dependent(reconciler: &Reconciler, dependent: &ResourceKey) {
    reconciler.engine.forget(dependent);
    reconciler.forget(&dependent.to_string());
}

/// Run the controller watch loop
///
/// Handles graceful shutdown and restarts the watch after stream errors.
///
/// # Errors
///
/// Currently never fails; the signature leaves room for fatal watch errors.
pub async fn run_watch_loop(
    migrations: Api<SchemaMigration>,
    reconciler: Arc<Reconciler>,
    server_state: Arc<ServerState>,
    controller_config: SharedControllerConfig,
) -> Result<(), anyhow::Error> {
    info!("Starting controller watch loop...");

    let backoff_start_ms = controller_config.backoff_min_secs.saturating_mul(1000);
    let max_backoff_ms = controller_config.backoff_max_secs.saturating_mul(1000);
    let backoff_duration_ms = Arc::new(AtomicU64::new(backoff_start_ms));

    // Mark not ready on SIGTERM/SIGINT so probes fail while in-flight passes finish
    let shutdown_server_state = server_state.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("Received shutdown signal (SIGINT/SIGTERM), initiating graceful shutdown...");
        shutdown_server_state.is_ready.store(false, Ordering::Relaxed);
        info!("Marked server as not ready, waiting for in-flight reconciliations to complete...");
    });

    loop {
        if !server_state.is_ready.load(Ordering::Relaxed) {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        let client = reconciler.client.clone();
        let (reader, writer) = reflector::store();
        let migration_events = generation_changes(
            watcher(migrations.clone(), watcher::Config::default().any_semantic())
                .reflect(writer)
                .applied_objects(),
        );
        let controller = Controller::for_stream(migration_events, reader);
        let store = controller.store();

        let secret_store = store.clone();
        let secret_watcher = reconciler.engine.secret_watcher().clone();
        let secret_reconciler = reconciler.clone();
        let config_map_store = store;
        let config_map_watcher = reconciler.engine.config_map_watcher().clone();
        let config_map_reconciler = reconciler.clone();

        let backoff_clone = backoff_duration_ms.clone();
        let watch_restart_delay = controller_config.watch_restart_delay_secs;
        let controller_future = controller
            .watches(
                Api::<Secret>::all(client.clone()),
                watcher::Config::default(),
                move |secret| {
                    dependents_of(&secret, &secret_watcher, &secret_store, |dependent| {
                        forget_dependent(&secret_reconciler, dependent);
                    })
                },
            )
            .watches(
                Api::<ConfigMap>::all(client),
                watcher::Config::default(),
                move |config_map| {
                    dependents_of(
                        &config_map,
                        &config_map_watcher,
                        &config_map_store,
                        |dependent| forget_dependent(&config_map_reconciler, dependent),
                    )
                },
            )
            .with_config(
                kube_runtime::controller::Config::default()
                    .concurrency(controller_config.max_concurrent_reconciliations),
            )
            .shutdown_on_signal()
            .run(
                reconcile,
                |obj, error, ctx| handle_reconciliation_error(obj, error, ctx),
                reconciler.clone(),
            )
            .filter_map(move |x| {
                let backoff = backoff_clone.clone();
                async move {
                    match &x {
                        Ok(_) => {
                            backoff.store(backoff_start_ms, Ordering::Relaxed);
                            debug!("watch.event.success");
                            Some(x)
                        }
                        Err(e) => {
                            let error_string = format!("{e:?}");
                            handle_watch_stream_error(
                                &error_string,
                                &backoff,
                                max_backoff_ms,
                                watch_restart_delay,
                            )
                            .await
                            .map(|()| x)
                        }
                    }
                }
            })
            .for_each(|_| futures::future::ready(()));

        controller_future.await;

        if !server_state.is_ready.load(Ordering::Relaxed) {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        let delay_secs = controller_config.watch_restart_delay_after_end_secs;
        warn!(
            "Controller watch stream ended, restarting in {} seconds...",
            delay_secs
        );
        tokio::time::sleep(std::time::Duration::from_secs(delay_secs)).await;
    }

    info!("Controller stopped gracefully");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{SchemaMigrationSpec, SchemaMigrationStatus};
    use kube_runtime::reflector::store::Writer;
    use std::sync::Mutex;

    fn migration(name: &str) -> SchemaMigration {
        let mut resource = SchemaMigration::new(name, SchemaMigrationSpec::default());
        resource.metadata.namespace = Some("default".to_string());
        resource
    }

    fn at_generation(name: &str, generation: i64, reason: &str) -> SchemaMigration {
        let mut resource = migration(name);
        resource.metadata.generation = Some(generation);
        let mut status = SchemaMigrationStatus::default();
        status.set_not_ready(reason, reason);
        resource.status = Some(status);
        resource
    }

    #[tokio::test]
    async fn test_status_updates_do_not_trigger_passes() {
        let events = futures::stream::iter(vec![
            Ok(at_generation("orders", 1, "Reconciling")),
            // status patches leave the generation unchanged
            Ok(at_generation("orders", 1, "TransientErr")),
            Ok(at_generation("orders", 1, "TransientErr attempt 2")),
            Ok(at_generation("billing", 1, "Reconciling")),
            Ok(at_generation("orders", 2, "TransientErr attempt 2")),
        ]);

        let passed: Vec<(String, Option<i64>)> = generation_changes(events)
            .map(|event| {
                let resource = event.unwrap();
                (resource.name_any(), resource.metadata.generation)
            })
            .collect()
            .await;

        assert_eq!(
            passed,
            vec![
                ("orders".to_string(), Some(1)),
                ("billing".to_string(), Some(1)),
                ("orders".to_string(), Some(2)),
            ]
        );
    }

    fn secret(name: &str) -> Secret {
        let mut secret = Secret::default();
        secret.metadata.name = Some(name.to_string());
        secret.metadata.namespace = Some("default".to_string());
        secret
    }

    fn watcher_with_edges() -> DependencyWatcher<ResourceKey> {
        let watcher = DependencyWatcher::new();
        let external = ResourceKey::new("default", "db-credentials");
        watcher.watch(&external, &ResourceKey::new("default", "orders"));
        watcher.watch(&external, &ResourceKey::new("default", "billing"));
        watcher
    }

    #[test]
    fn test_dependents_ignored_until_store_is_ready() {
        let watcher = watcher_with_edges();
        let mut writer = Writer::<SchemaMigration>::default();
        let store = writer.as_reader();
        writer.apply_watcher_event(&watcher::Event::Init);
        writer.apply_watcher_event(&watcher::Event::InitApply(migration("orders")));
        let forgotten = Mutex::new(Vec::new());

        let refs = dependents_of(&secret("db-credentials"), &watcher, &store, |dependent| {
            forgotten.lock().unwrap().push(dependent.clone());
        });

        assert!(refs.is_empty());
        assert!(forgotten.lock().unwrap().is_empty());
        assert_eq!(watcher.edge_count(), 2);
    }

    #[test]
    fn test_dependents_requeued_or_forgotten_once_ready() {
        let watcher = watcher_with_edges();
        let mut writer = Writer::<SchemaMigration>::default();
        let store = writer.as_reader();
        writer.apply_watcher_event(&watcher::Event::Init);
        writer.apply_watcher_event(&watcher::Event::InitApply(migration("orders")));
        writer.apply_watcher_event(&watcher::Event::InitDone);
        let forgotten = Mutex::new(Vec::new());

        let refs = dependents_of(&secret("db-credentials"), &watcher, &store, |dependent| {
            forgotten.lock().unwrap().push(dependent.clone());
        });

        assert_eq!(refs, vec![ObjectRef::new("orders").within("default")]);
        assert_eq!(
            *forgotten.lock().unwrap(),
            vec![ResourceKey::new("default", "billing")]
        );
    }

    #[test]
    fn test_unknown_object_has_no_dependents() {
        let watcher = watcher_with_edges();
        let mut writer = Writer::<SchemaMigration>::default();
        let store = writer.as_reader();
        writer.apply_watcher_event(&watcher::Event::Init);
        writer.apply_watcher_event(&watcher::Event::InitDone);

        let refs = dependents_of(&secret("unrelated"), &watcher, &store, |_| {
            panic!("nothing to forget");
        });

        assert!(refs.is_empty());
    }
}
