//! Schema Migration Controller Library
//!
//! This library provides the core functionality for the Schema Migration Controller.
//! Unit tests live next to the code; scenario tests drive the reconcile engine
//! through test doubles under `tests/`.
//!
//! ## Quick Start
//!
//! ```rust
//! use schema_migration_controller::prelude::*;
//! ```
//!
//! This brings commonly used types and traits into scope. For more specific imports,
//! use the individual modules.

pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod observability;
pub mod prelude;
pub mod runtime;
