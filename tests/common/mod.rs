//! Common test utilities for reconcile scenario tests
//!
//! Provides in-memory doubles for the three seams a pass runs against:
//! Secret/ConfigMap access, the migration executor and the event sink.

#![allow(dead_code, reason = "Not every test binary uses every helper")]

use async_trait::async_trait;
use schema_migration_controller::controller::executor::{
    ApplyReport, MigrationExecutor, StatusReport,
};
use schema_migration_controller::controller::reconciler::{
    EventSink, MigrationEvent, PassResult, ReconcileEngine,
};
use schema_migration_controller::controller::resolver::{
    AccessError, KeyValueAccessor, ResolveOptions, ResourceKind,
};
use schema_migration_controller::crd::{SchemaMigration, SchemaMigrationSpec};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

type ObjectKey = (ResourceKind, String, String);

/// Secrets and ConfigMaps held in memory
#[derive(Default)]
pub struct MemoryAccessor {
    objects: Mutex<BTreeMap<ObjectKey, BTreeMap<String, String>>>,
}

impl MemoryAccessor {
    pub fn put(&self, kind: ResourceKind, namespace: &str, name: &str, data: &[(&str, &str)]) {
        let data = data
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        self.objects
            .lock()
            .unwrap()
            .insert((kind, namespace.to_string(), name.to_string()), data);
    }

    pub fn remove(&self, kind: ResourceKind, namespace: &str, name: &str) {
        self.objects
            .lock()
            .unwrap()
            .remove(&(kind, namespace.to_string(), name.to_string()));
    }
}

#[async_trait]
impl KeyValueAccessor for MemoryAccessor {
    async fn get_all(
        &self,
        namespace: &str,
        kind: ResourceKind,
        name: &str,
    ) -> Result<BTreeMap<String, String>, AccessError> {
        self.objects
            .lock()
            .unwrap()
            .get(&(kind, namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| AccessError::NotFound {
                kind,
                namespace: namespace.to_string(),
                name: name.to_string(),
            })
    }
}

/// Executor returning scripted reports and recording every call
#[derive(Default)]
pub struct ScriptedExecutor {
    pub status_report: Mutex<StatusReport>,
    pub apply_report: Mutex<ApplyReport>,
    /// Rendered configs passed to `status`, in call order
    pub status_configs: Mutex<Vec<String>>,
    /// Rendered configs passed to `apply`, in call order
    pub apply_configs: Mutex<Vec<String>>,
    /// Whether the materialized directory existed while `apply` ran
    pub dir_present_during_apply: Mutex<Vec<bool>>,
}

impl ScriptedExecutor {
    pub fn set_status(&self, report: StatusReport) {
        *self.status_report.lock().unwrap() = report;
    }

    pub fn set_apply(&self, report: ApplyReport) {
        *self.apply_report.lock().unwrap() = report;
    }

    pub fn status_calls(&self) -> usize {
        self.status_configs.lock().unwrap().len()
    }

    pub fn apply_calls(&self) -> usize {
        self.apply_configs.lock().unwrap().len()
    }
}

#[async_trait]
impl MigrationExecutor for ScriptedExecutor {
    async fn status(&self, _env: &str, config: &str) -> anyhow::Result<StatusReport> {
        self.status_configs.lock().unwrap().push(config.to_string());
        Ok(self.status_report.lock().unwrap().clone())
    }

    async fn apply(&self, _env: &str, config: &str) -> anyhow::Result<ApplyReport> {
        let present = local_dir(config).is_some_and(|dir| std::path::Path::new(&dir).is_dir());
        self.dir_present_during_apply.lock().unwrap().push(present);
        self.apply_configs.lock().unwrap().push(config.to_string());
        Ok(self.apply_report.lock().unwrap().clone())
    }
}

/// Executor that never answers
pub struct HangingExecutor;

#[async_trait]
impl MigrationExecutor for HangingExecutor {
    async fn status(&self, _env: &str, _config: &str) -> anyhow::Result<StatusReport> {
        std::future::pending().await
    }

    async fn apply(&self, _env: &str, _config: &str) -> anyhow::Result<ApplyReport> {
        std::future::pending().await
    }
}

/// Event sink keeping every published event
#[derive(Default)]
pub struct RecordingSink {
    pub events: Mutex<Vec<MigrationEvent>>,
}

impl RecordingSink {
    pub fn take(&self) -> Vec<MigrationEvent> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn publish(&self, _resource: &SchemaMigration, event: MigrationEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Extract the `file://` migration directory from a rendered config
pub fn local_dir(config: &str) -> Option<String> {
    let start = config.find("\"file://")? + "\"file://".len();
    let end = config[start..].find('"')? + start;
    Some(config[start..end].to_string())
}

/// Engine wired to in-memory doubles, with its own temp root
pub struct Harness {
    pub accessor: Arc<MemoryAccessor>,
    pub executor: Arc<ScriptedExecutor>,
    pub events: Arc<RecordingSink>,
    pub engine: ReconcileEngine,
    pub tmp: TempDir,
}

impl Harness {
    pub fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let accessor = Arc::new(MemoryAccessor::default());
        let executor = Arc::new(ScriptedExecutor::default());
        let events = Arc::new(RecordingSink::default());
        let engine = ReconcileEngine::new(
            accessor.clone(),
            executor.clone(),
            events.clone(),
            options(&tmp),
        );
        Self {
            accessor,
            executor,
            events,
            engine,
            tmp,
        }
    }

    /// Run one pass and persist the resulting status on `resource`
    pub async fn pass(&self, resource: &mut SchemaMigration) -> PassResult {
        let outcome = self.engine.reconcile(resource).await;
        resource.status = Some(outcome.status);
        outcome.result
    }

    /// Directories left behind under the temp root
    pub fn leftover_dirs(&self) -> usize {
        std::fs::read_dir(self.tmp.path()).unwrap().count()
    }
}

pub fn options(tmp: &TempDir) -> ResolveOptions {
    ResolveOptions {
        tmp_root: tmp.path().to_path_buf(),
        call_timeout: Duration::from_secs(5),
        default_env_name: "kubernetes".to_string(),
    }
}

/// A resource named `name` in namespace `default` at generation 1
pub fn migration(name: &str, spec: SchemaMigrationSpec) -> SchemaMigration {
    let mut resource = SchemaMigration::new(name, spec);
    resource.metadata.namespace = Some("default".to_string());
    resource.metadata.generation = Some(1);
    resource
}

pub fn url_spec(url: &str) -> SchemaMigrationSpec {
    SchemaMigrationSpec {
        url: Some(url.to_string()),
        ..SchemaMigrationSpec::default()
    }
}

pub fn ready_reason(resource: &SchemaMigration) -> (String, String) {
    let condition = resource
        .status
        .as_ref()
        .and_then(|s| s.ready_condition())
        .cloned()
        .unwrap();
    (condition.status, condition.reason.unwrap_or_default())
}
