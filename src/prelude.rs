//! # Prelude
//!
//! Re-exports commonly used types and traits for convenience.
//!
//! ## Usage
//!
//! ```rust
//! use schema_migration_controller::prelude::*;
//! ```
//!
//! This brings into scope:
//! - All CRD types (SchemaMigration, Credentials, MigrationDir, etc.)
//! - The seams a pass runs against (KeyValueAccessor, MigrationExecutor, EventSink)
//! - Reconciler types (ReconcileEngine, Reconciler, ReconcilerError, etc.)
//! - Config types (ControllerConfig, SharedControllerConfig)

// CRD types - most commonly used
pub use crate::crd::*;

// Seams - implemented by the Kubernetes/CLI adapters and by test doubles
pub use crate::controller::executor::MigrationExecutor;
pub use crate::controller::reconciler::EventSink;
pub use crate::controller::resolver::KeyValueAccessor;

// Reconciler types - core controller functionality
pub use crate::controller::reconciler::{
    reconcile, BackoffState, PassOutcome, PassResult, ReconcileEngine, ReconcileError,
    Reconciler, ReconcilerError,
};

// Config types - for configuration management
pub use crate::config::{ControllerConfig, SharedControllerConfig};
