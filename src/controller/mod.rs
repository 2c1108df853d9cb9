//! # Controller
//!
//! Core controller modules for the Schema Migration Controller.
//!
//! - `backoff`: Fibonacci backoff mechanism for retries
//! - `executor`: Migration CLI invocation and config rendering
//! - `fingerprint`: Change detection over the resolved input
//! - `input`: Resolved, secret-bearing input of one pass
//! - `reconciler`: Core reconciliation logic
//! - `resolver`: Turns a resource spec into resolved input
//! - `server`: HTTP server for metrics and health checks
//! - `watcher`: Secret/ConfigMap dependency tracking

pub mod backoff;
pub mod executor;
pub mod fingerprint;
pub mod input;
pub mod reconciler;
pub mod resolver;
pub mod server;
pub mod watcher;
