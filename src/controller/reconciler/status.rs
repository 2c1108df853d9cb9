//! # Status Updates
//!
//! Persists the status computed by a pass. Patches are skipped when nothing
//! changed, so an idle resource does not generate watch events of its own.

use crate::constants::CONTROLLER_NAME;
use crate::crd::{SchemaMigration, SchemaMigrationStatus};
use kube::api::{Patch, PatchParams};
use kube::{Api, Client, ResourceExt};
use tracing::debug;

/// Whether `status` differs from what the resource currently carries
#[must_use]
pub fn status_changed(resource: &SchemaMigration, status: &SchemaMigrationStatus) -> bool {
    resource.status.as_ref() != Some(status)
}

/// Write `status` to the status subresource if it changed
///
/// Returns `true` when a patch was sent.
///
/// # Errors
///
/// Returns the API error from the patch request.
pub async fn update_status(
    client: &Client,
    resource: &SchemaMigration,
    status: &SchemaMigrationStatus,
) -> Result<bool, kube::Error> {
    let name = resource.name_any();
    let namespace = resource.namespace().unwrap_or_default();

    if !status_changed(resource, status) {
        debug!("Skipping status update for {}/{} - unchanged", namespace, name);
        return Ok(false);
    }

    let api: Api<SchemaMigration> = Api::namespaced(client.clone(), &namespace);
    let patch = serde_json::json!({
        "status": status
    });
    api.patch_status(
        &name,
        &PatchParams::apply(CONTROLLER_NAME),
        &Patch::Merge(patch),
    )
    .await?;
    debug!("Updated status for {}/{}", namespace, name);
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::SchemaMigrationSpec;

    #[test]
    fn test_status_changed() {
        let mut resource = SchemaMigration::new("orders", SchemaMigrationSpec::default());
        let mut status = SchemaMigrationStatus::default();
        status.set_not_ready("Reconciling", "Reconciling");

        assert!(status_changed(&resource, &status));
        resource.status = Some(status.clone());
        assert!(!status_changed(&resource, &status));

        status.set_not_ready("TransientErr", "secret not found");
        assert!(status_changed(&resource, &status));
    }
}
