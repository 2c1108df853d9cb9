//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// Name used as field manager for status patches and as event reporter
pub const CONTROLLER_NAME: &str = "schema-migration-controller";

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 5000;

/// Default HTTP server startup timeout (how long to wait for server to be ready)
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;

/// Default HTTP server readiness poll interval
pub const DEFAULT_SERVER_POLL_INTERVAL_MS: u64 = 50;

/// Default Fibonacci backoff floor for transient reconciliation errors (seconds)
pub const DEFAULT_BACKOFF_MIN_SECS: u64 = 5;

/// Default Fibonacci backoff ceiling for transient reconciliation errors (seconds)
pub const DEFAULT_BACKOFF_MAX_SECS: u64 = 300;

/// Default periodic re-check interval after a terminal outcome (seconds)
pub const DEFAULT_RESYNC_INTERVAL_SECS: u64 = 600;

/// Default upper bound for any single secret/config-map fetch or executor call (seconds)
pub const DEFAULT_EXTERNAL_CALL_TIMEOUT_SECS: u64 = 300;

/// Default delay before restarting watch stream after unknown errors (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_SECS: u64 = 5;

/// Default delay before restarting watch stream after it ends (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_AFTER_END_SECS: u64 = 1;

/// Default maximum number of resources reconciled at the same time
pub const DEFAULT_MAX_CONCURRENT_RECONCILIATIONS: u16 = 10;

/// Migration CLI invoked by the default executor
pub const DEFAULT_EXECUTOR_BINARY: &str = "atlas";

/// Environment name used when the resource does not set `envName`
pub const DEFAULT_ENV_NAME: &str = "kubernetes";

/// Prefix of materialized migration directories
pub const MIGRATION_DIR_PREFIX: &str = "migrations-";

/// Checksum file excluded from the migration directory checksum
pub const CHECKSUM_FILE_NAME: &str = "atlas.sum";

/// Condition type maintained on every resource
pub const CONDITION_READY: &str = "Ready";

/// Condition reason while a pass is in progress
pub const REASON_RECONCILING: &str = "Reconciling";

/// Condition reason after a successful pass
pub const REASON_APPLIED: &str = "Applied";

/// Condition reason for invalid resource configuration
pub const REASON_CONFIGURATION_ERROR: &str = "ConfigurationError";

/// Condition reason for failures expected to resolve on retry
pub const REASON_TRANSIENT_ERROR: &str = "TransientErr";

/// Condition reason when the executor reports a failed migration
pub const REASON_MIGRATION_ERROR: &str = "MigrationError";

/// Condition message when the resolved input no longer matches the applied one
pub const MESSAGE_DATA_CHANGED: &str = "Current migration data has changed";
