//! # CRD Generator
//!
//! Generates the `SchemaMigration` CustomResourceDefinition YAML from the Rust types.
//!
//! ## Usage
//!
//! ```bash
//! # Generate CRD YAML
//! cargo run --bin crdgen > config/crd/schemamigration.yaml
//!
//! # Generate and apply directly
//! cargo run --bin crdgen | kubectl apply -f -
//! ```

use kube::core::CustomResourceExt;
use schema_migration_controller::crd::SchemaMigration;

fn main() -> anyhow::Result<()> {
    print!("{}", serde_yaml::to_string(&SchemaMigration::crd())?);
    Ok(())
}
