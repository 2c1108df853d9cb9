//! # Events
//!
//! Kubernetes events emitted once per completed pass.

use crate::constants::{CONTROLLER_NAME, REASON_APPLIED};
use crate::controller::reconciler::error::ReconcileError;
use crate::crd::SchemaMigration;
use async_trait::async_trait;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::{Client, Resource};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Normal,
    Warning,
}

/// Event about one `SchemaMigration`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationEvent {
    pub kind: EventKind,
    pub reason: String,
    pub message: String,
}

impl MigrationEvent {
    #[must_use]
    pub fn applied(version: &str) -> Self {
        Self {
            kind: EventKind::Normal,
            reason: REASON_APPLIED.to_string(),
            message: format!("Version {version} applied"),
        }
    }

    #[must_use]
    pub fn failed(err: &ReconcileError) -> Self {
        Self {
            kind: EventKind::Warning,
            reason: err.reason().to_string(),
            message: err.message(),
        }
    }
}

/// Destination for migration events
///
/// Publishing is best effort: failures are logged, never returned.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, resource: &SchemaMigration, event: MigrationEvent);
}

/// Publishes `events.k8s.io` events through the kube-runtime recorder
#[derive(Clone)]
pub struct KubeEventSink {
    recorder: Recorder,
}

impl std::fmt::Debug for KubeEventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeEventSink").finish_non_exhaustive()
    }
}

impl KubeEventSink {
    #[must_use]
    pub fn new(client: Client) -> Self {
        let reporter = Reporter {
            controller: CONTROLLER_NAME.to_string(),
            instance: std::env::var("POD_NAME").ok(),
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait]
impl EventSink for KubeEventSink {
    async fn publish(&self, resource: &SchemaMigration, event: MigrationEvent) {
        let reference = resource.object_ref(&());
        let kube_event = Event {
            type_: match event.kind {
                EventKind::Normal => EventType::Normal,
                EventKind::Warning => EventType::Warning,
            },
            reason: event.reason,
            note: Some(event.message),
            action: "Reconcile".to_string(),
            secondary: None,
        };
        if let Err(e) = self.recorder.publish(&kube_event, &reference).await {
            warn!(
                "Failed to publish event for {}/{}: {}",
                reference.namespace.as_deref().unwrap_or_default(),
                reference.name.as_deref().unwrap_or_default(),
                e
            );
        }
    }
}
