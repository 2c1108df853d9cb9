//! # Schema Migration Controller
//!
//! A Kubernetes controller that keeps database schemas at the version declared
//! in `SchemaMigration` resources.
//!
//! ## Overview
//!
//! For every `SchemaMigration` the controller:
//!
//! 1. **Resolves input** - Reads the database URL, credentials and cloud token from Secrets
//!    and the migration files from the resource or a ConfigMap
//! 2. **Detects changes** - Fingerprints the resolved input and compares it with the last applied one
//! 3. **Applies migrations** - Runs the migration CLI to find and apply pending migrations
//! 4. **Reports** - Writes the Ready condition and emits Kubernetes events
//!
//! Changes to referenced Secrets and ConfigMaps trigger a new pass for every
//! resource that depends on them.
//!
//! ## Features
//!
//! - **Multi-namespace**: Watches `SchemaMigration` resources across all namespaces
//! - **Prometheus metrics**: Exposes metrics for monitoring and observability
//! - **Health probes**: HTTP endpoints for liveness and readiness checks

use anyhow::Result;
use schema_migration_controller::runtime::{initialization, watch_loop};

#[tokio::main]
async fn main() -> Result<()> {
    let init = initialization::initialize().await?;

    watch_loop::run_watch_loop(
        init.migrations,
        init.reconciler,
        init.server_state,
        init.controller_config,
    )
    .await
}
