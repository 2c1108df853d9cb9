//! # Configuration
//!
//! Controller configuration loaded once at startup from environment variables.

mod controller;

pub use controller::ControllerConfig;

/// Configuration shared between the watch loop, reconciler and HTTP server
pub type SharedControllerConfig = std::sync::Arc<ControllerConfig>;
