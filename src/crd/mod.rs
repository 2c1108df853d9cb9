//! # Custom Resource Definitions
//!
//! CRD types for the Schema Migration Controller.
//!
//! ## Module Structure
//!
//! - `spec.rs` - Main CRD specification
//! - `credentials.rs` - Secret references and structured database credentials
//! - `source.rs` - Migration directory and cloud configuration
//! - `status.rs` - Status types for tracking reconciliation state

mod credentials;
mod source;
mod spec;
mod status;

// Re-export all public types
pub use credentials::{Credentials, PasswordFrom, SecretKeySelector, UrlFrom};
pub use source::{Cloud, LocalObjectReference, MigrationDir, RemoteDir, TokenFrom};
pub use spec::{SchemaMigration, SchemaMigrationSpec};
pub use status::{AppliedState, Condition, SchemaMigrationStatus};
