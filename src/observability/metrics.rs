//! # Metrics
//!
//! Prometheus metrics for monitoring the controller.
//!
//! ## Metrics Exposed
//!
//! - `schema_migration_reconciliations_total` - Total number of reconciliation passes
//! - `schema_migration_reconciliation_errors_total` - Reconciliation errors by reason
//! - `schema_migration_reconciliation_duration_seconds` - Duration of reconciliation passes
//! - `schema_migration_migrations_applied_total` - Migration files applied by the executor
//! - `schema_migration_executor_call_duration_seconds` - Duration of executor calls by command
//! - `schema_migration_dependency_edges` - Watched dependency edges by object kind
//! - `schema_migration_requeues_total` - Requeues by reason

use anyhow::Result;
use prometheus::{Histogram, HistogramVec, IntCounter, IntCounterVec, IntGaugeVec, Registry};
use std::sync::LazyLock;

// Metrics
pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "schema_migration_reconciliations_total",
        "Total number of reconciliation passes",
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "schema_migration_reconciliation_errors_total",
            "Total number of reconciliation errors by condition reason",
        ),
        &["reason"],
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "schema_migration_reconciliation_duration_seconds",
            "Duration of reconciliation passes in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 300.0]),
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static MIGRATIONS_APPLIED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "schema_migration_migrations_applied_total",
        "Total number of migration files applied",
    )
    .expect("Failed to create MIGRATIONS_APPLIED_TOTAL metric - this should never happen")
});

static EXECUTOR_CALL_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "schema_migration_executor_call_duration_seconds",
            "Duration of migration executor calls in seconds by command",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 300.0]),
        &["command"],
    )
    .expect("Failed to create EXECUTOR_CALL_DURATION metric - this should never happen")
});

static DEPENDENCY_EDGES: LazyLock<IntGaugeVec> = LazyLock::new(|| {
    IntGaugeVec::new(
        prometheus::Opts::new(
            "schema_migration_dependency_edges",
            "Current number of watched dependency edges by object kind",
        ),
        &["kind"],
    )
    .expect("Failed to create DEPENDENCY_EDGES metric - this should never happen")
});

static REQUEUES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "schema_migration_requeues_total",
            "Total number of requeues by reason",
        ),
        &["reason"],
    )
    .expect("Failed to create REQUEUES_TOTAL metric - this should never happen")
});

#[allow(
    clippy::missing_errors_doc,
    reason = "Registration only fails when a metric is registered twice"
)]
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(MIGRATIONS_APPLIED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(EXECUTOR_CALL_DURATION.clone()))?;
    REGISTRY.register(Box::new(DEPENDENCY_EDGES.clone()))?;
    REGISTRY.register(Box::new(REQUEUES_TOTAL.clone()))?;

    Ok(())
}

pub fn increment_reconciliations() {
    RECONCILIATIONS_TOTAL.inc();
}

pub fn increment_reconciliation_errors(reason: &str) {
    RECONCILIATION_ERRORS_TOTAL.with_label_values(&[reason]).inc();
}

pub fn observe_reconciliation_duration(duration: f64) {
    RECONCILIATION_DURATION.observe(duration);
}

pub fn increment_migrations_applied(count: usize) {
    MIGRATIONS_APPLIED_TOTAL.inc_by(u64::try_from(count).unwrap_or(u64::MAX));
}

pub fn observe_executor_call_duration(command: &str, duration: f64) {
    EXECUTOR_CALL_DURATION
        .with_label_values(&[command])
        .observe(duration);
}

pub fn set_dependency_edges(kind: &str, count: usize) {
    DEPENDENCY_EDGES
        .with_label_values(&[kind])
        .set(i64::try_from(count).unwrap_or(i64::MAX));
}

pub fn increment_requeues(reason: &str) {
    REQUEUES_TOTAL.with_label_values(&[reason]).inc();
}
