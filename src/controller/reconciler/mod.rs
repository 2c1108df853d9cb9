//! # Reconciler
//!
//! Core reconciliation logic for `SchemaMigration` resources.
//!
//! The reconciler:
//! - Resolves connection details and migration files from the resource and
//!   the Secrets/ConfigMaps it references
//! - Fingerprints the resolved input to detect changes
//! - Asks the migration executor what is pending and applies it
//! - Records the outcome in the Ready condition and as an event
//! - Tracks which Secrets and ConfigMaps each resource depends on
//!
//! ## Reconciliation Flow
//!
//! 1. Initialize the Ready condition on first sight
//! 2. Validate and resolve the spec
//! 3. Compare the fingerprint with the last applied one
//! 4. `migrate status`, then `migrate apply` when something is pending
//! 5. Update status, dependencies and events

pub mod engine;
pub mod error;
pub mod events;
pub mod reconcile;
pub mod status;
pub mod types;
pub mod utils;
pub mod validation;

// Re-export public API
pub use engine::{PassOutcome, PassResult, ReconcileEngine};
pub use error::{ErrorClass, ReconcileError};
pub use events::{EventKind, EventSink, KubeEventSink, MigrationEvent};
pub use reconcile::reconcile;
pub use status::update_status;
pub use types::{BackoffState, Reconciler, ReconcilerError};
pub use validation::{references, validate, References};
