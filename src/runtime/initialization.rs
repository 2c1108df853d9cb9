//! # Initialization
//!
//! Controller initialization logic including rustls setup, tracing, metrics,
//! server startup, and Kubernetes client setup.

use crate::config::{ControllerConfig, SharedControllerConfig};
use crate::controller::executor::CliExecutor;
use crate::controller::reconciler::{KubeEventSink, ReconcileEngine, Reconciler};
use crate::controller::resolver::{KubeAccessor, ResolveOptions};
use crate::controller::server::{start_server, ServerState};
use crate::crd::SchemaMigration;
use crate::observability;
use anyhow::{Context, Result};
use kube::{api::Api, api::ListParams, Client, ResourceExt};
use std::collections::BTreeMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Initialization result containing all necessary components for the controller
pub struct InitializationResult {
    /// Kubernetes client
    pub client: Client,
    /// API for SchemaMigration resources across all namespaces
    pub migrations: Api<SchemaMigration>,
    /// Reconciler context
    pub reconciler: Arc<Reconciler>,
    /// Server state for health checks
    pub server_state: Arc<ServerState>,
    /// Controller configuration
    pub controller_config: SharedControllerConfig,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field(
                "server_ready",
                &self.server_state.is_ready.load(Ordering::Relaxed),
            )
            .finish_non_exhaustive()
    }
}

/// Initialize the controller runtime
///
/// This function handles:
/// - rustls crypto provider setup
/// - Tracing subscriber setup
/// - Metrics registration
/// - HTTP server startup
/// - Kubernetes client creation
/// - Executor, engine and reconciler setup
///
/// # Errors
///
/// Fails if the HTTP server does not come up, the Kubernetes client cannot be
/// created or the migration CLI cannot be located.
pub async fn initialize() -> Result<InitializationResult> {
    // Must run before anything touches rustls
    rustls::crypto::ring::default_provider()
        .install_default()
        .unwrap_or_else(|_| panic!("Failed to install rustls crypto provider"));

    let controller_config: SharedControllerConfig = Arc::new(ControllerConfig::from_env());
    init_tracing(&controller_config);

    info!(
        "Starting Schema Migration Controller v{}",
        env!("CARGO_PKG_VERSION")
    );

    if controller_config.enable_metrics {
        observability::metrics::register_metrics()?;
    }

    let server_state = Arc::new(ServerState::default());

    // Start HTTP server for metrics and probes and wait for it to bind
    let server_state_clone = server_state.clone();
    let server_port = controller_config.metrics_port;
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(server_port, server_state_clone).await {
            error!("HTTP server error: {}", e);
        }
    });
    wait_for_server_ready(&server_state, &server_handle, &controller_config).await?;

    let client = Client::try_default().await?;

    // Watch all namespaces
    let migrations: Api<SchemaMigration> = Api::all(client.clone());

    let executor = CliExecutor::new(
        &controller_config.executor_binary,
        &controller_config.migration_tmp_dir,
    )
    .context("Failed to set up migration executor")?;
    let engine = Arc::new(ReconcileEngine::new(
        Arc::new(KubeAccessor::new(client.clone())),
        Arc::new(executor),
        Arc::new(KubeEventSink::new(client.clone())),
        ResolveOptions::from_config(&controller_config),
    ));
    let reconciler = Arc::new(Reconciler::new(
        client.clone(),
        engine,
        controller_config.clone(),
    ));

    summarize_existing_resources(&migrations).await;

    server_state.is_ready.store(true, Ordering::Relaxed);
    info!("Controller initialized, starting watch loop...");

    Ok(InitializationResult {
        client,
        migrations,
        reconciler,
        server_state,
        controller_config,
    })
}

/// Set up the global tracing subscriber
///
/// `RUST_LOG` wins over `LOG_LEVEL`. `LOG_FORMAT=text` switches from JSON to
/// human readable output.
fn init_tracing(config: &ControllerConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "schema_migration_controller={}",
            config.log_level.to_lowercase()
        )
        .into()
    });

    let result = if config.log_format.eq_ignore_ascii_case("text") {
        tracing_subscriber::fmt().with_env_filter(filter).try_init()
    } else {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .try_init()
    };
    if let Err(e) = result {
        warn!("Tracing subscriber init returned error (may already be initialized): {}", e);
    }
}

/// Wait for the HTTP server to bind
async fn wait_for_server_ready(
    server_state: &Arc<ServerState>,
    server_handle: &tokio::task::JoinHandle<()>,
    config: &ControllerConfig,
) -> Result<()> {
    let startup_timeout = std::time::Duration::from_secs(config.server_startup_timeout_secs);
    let poll_interval = std::time::Duration::from_millis(config.server_poll_interval_ms);
    let start_time = std::time::Instant::now();

    loop {
        if server_handle.is_finished() {
            return Err(anyhow::anyhow!("HTTP server failed to start"));
        }

        if server_state.is_listening.load(Ordering::Relaxed) {
            info!("HTTP server is ready and accepting connections");
            break;
        }

        if start_time.elapsed() > startup_timeout {
            return Err(anyhow::anyhow!(
                "HTTP server failed to become ready within {} seconds",
                startup_timeout.as_secs()
            ));
        }

        tokio::time::sleep(poll_interval).await;
    }

    Ok(())
}

/// Log existing SchemaMigration resources per namespace
///
/// The controller reconciles every listed resource once the watch starts, so
/// this only checks that the CRD is installed and gives operators a summary.
async fn summarize_existing_resources(migrations: &Api<SchemaMigration>) {
    let span = tracing::span!(
        tracing::Level::INFO,
        "controller.startup.summarize_existing",
        operation = "summarize_existing_resources"
    );
    let _guard = span.enter();

    match migrations.list(&ListParams::default()).await {
        Ok(list) => {
            let mut by_namespace: BTreeMap<String, Vec<String>> = BTreeMap::new();
            for item in &list.items {
                by_namespace
                    .entry(item.namespace().unwrap_or_default())
                    .or_default()
                    .push(item.name_any());
            }

            info!("Schema Migration Controller - Startup Resource Summary");
            info!("Total Resources: {}", list.items.len());
            info!("Namespaces: {}", by_namespace.len());
            for (namespace, mut names) in by_namespace {
                names.sort();
                let shown = if names.len() <= 3 {
                    names.join(", ")
                } else {
                    format!("{}, ... ({} total)", names[..3].join(", "), names.len())
                };
                info!("Namespace: {} - Resources ({}): {}", namespace, names.len(), shown);
            }
        }
        Err(e) => {
            error!("CRD is not queryable; {:?}. Is the CRD installed?", e);
            error!("Installation: cargo run --bin crdgen | kubectl apply -f -");
            warn!("Continuing despite CRD queryability check failure - controller will retry");
        }
    }
}
