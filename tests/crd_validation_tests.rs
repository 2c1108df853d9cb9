//! # CRD Validation Tests
//!
//! Tests for the `SchemaMigration` CRD to catch schema drift early.
//! These tests validate that sample resources deserialize into the expected
//! types and that the generated CRD carries the expected metadata.

use kube::core::CustomResourceExt;
use schema_migration_controller::crd::SchemaMigration;

#[test]
fn test_url_from_with_inline_dir() {
    let yaml = r#"
apiVersion: db.schemamigration.io/v1alpha1
kind: SchemaMigration
metadata:
  name: orders
  namespace: shop
spec:
  urlFrom:
    secretKeyRef:
      name: orders-db
      key: url
  envName: production
  revisionsSchema: atlas_schema_revisions
  dir:
    local:
      20240101000000_init.sql: |
        CREATE TABLE orders (id bigint PRIMARY KEY);
      atlas.sum: |
        h1:abc=
"#;

    let resource: SchemaMigration = serde_yaml::from_str(yaml).unwrap();
    let spec = &resource.spec;

    let selector = spec.url_from.as_ref().unwrap().secret_key_ref.as_ref().unwrap();
    assert_eq!(selector.name, "orders-db");
    assert_eq!(selector.key, "url");
    assert_eq!(spec.env_name.as_deref(), Some("production"));
    assert_eq!(spec.revisions_schema.as_deref(), Some("atlas_schema_revisions"));
    let files = spec.dir.as_ref().unwrap().local.as_ref().unwrap();
    assert_eq!(files.len(), 2);
    assert!(files.contains_key("20240101000000_init.sql"));
    assert!(resource.status.is_none());
}

#[test]
fn test_credentials_with_config_map_dir() {
    let yaml = r#"
apiVersion: db.schemamigration.io/v1alpha1
kind: SchemaMigration
metadata:
  name: billing
spec:
  credentials:
    scheme: mysql
    user: root
    passwordFrom:
      secretKeyRef:
        name: billing-db
        key: password
    host: mysql.billing.svc
    port: 3306
    database: billing
    parameters:
      parseTime: "true"
  dir:
    configMapRef:
      name: billing-migrations
"#;

    let resource: SchemaMigration = serde_yaml::from_str(yaml).unwrap();
    let credentials = resource.spec.credentials.as_ref().unwrap();

    assert_eq!(credentials.scheme, "mysql");
    assert_eq!(credentials.port, 3306);
    assert!(credentials.password.is_empty());
    assert_eq!(credentials.password_secret().unwrap().name, "billing-db");
    assert_eq!(credentials.parameters.get("parseTime").map(String::as_str), Some("true"));
    assert_eq!(
        resource.spec.dir.as_ref().unwrap().config_map_ref.as_ref().unwrap().name,
        "billing-migrations"
    );
}

#[test]
fn test_remote_dir_with_cloud() {
    let yaml = r#"
apiVersion: db.schemamigration.io/v1alpha1
kind: SchemaMigration
metadata:
  name: inventory
spec:
  url: postgres://inventory@db:5432/inventory
  cloud:
    project: inventory
    tokenFrom:
      secretKeyRef:
        name: cloud-token
        key: token
  dir:
    remote:
      name: inventory
      tag: v1.2.0
"#;

    let resource: SchemaMigration = serde_yaml::from_str(yaml).unwrap();
    let cloud = resource.spec.cloud.as_ref().unwrap();
    let remote = resource.spec.dir.as_ref().unwrap().remote.as_ref().unwrap();

    assert_eq!(cloud.project, "inventory");
    assert!(cloud.url.is_empty());
    assert_eq!(cloud.token_secret().unwrap().key, "token");
    assert_eq!(remote.name, "inventory");
    assert_eq!(remote.tag, "v1.2.0");
}

#[test]
fn test_status_round_trips_through_json() {
    let yaml = r#"
apiVersion: db.schemamigration.io/v1alpha1
kind: SchemaMigration
metadata:
  name: orders
spec:
  url: postgres://db/orders
status:
  conditions:
    - type: Ready
      status: "True"
      reason: Applied
      message: Version 2 applied
      lastTransitionTime: "2024-01-02T03:04:05+00:00"
  observedHash: 3f2a
  lastApplied: 1704164645
  lastAppliedVersion: "2"
  observedGeneration: 4
"#;

    let resource: SchemaMigration = serde_yaml::from_str(yaml).unwrap();
    let status = resource.status.as_ref().unwrap();
    assert!(status.is_ready());
    assert_eq!(status.last_applied, 1_704_164_645);
    assert_eq!(status.observed_generation, Some(4));

    let json = serde_json::to_value(status).unwrap();
    assert_eq!(json["lastAppliedVersion"], "2");
    assert_eq!(json["observedHash"], "3f2a");
    assert_eq!(json["conditions"][0]["type"], "Ready");
}

#[test]
fn test_generated_crd() {
    let crd = SchemaMigration::crd();

    assert_eq!(crd.spec.group, "db.schemamigration.io");
    assert_eq!(crd.spec.names.kind, "SchemaMigration");
    assert_eq!(crd.spec.names.plural, "schemamigrations");
    assert_eq!(crd.spec.scope, "Namespaced");
    assert_eq!(
        crd.spec.names.short_names.as_deref(),
        Some(&["smig".to_string()][..])
    );

    let version = &crd.spec.versions[0];
    assert_eq!(version.name, "v1alpha1");
    assert!(version
        .subresources
        .as_ref()
        .and_then(|s| s.status.as_ref())
        .is_some());

    let yaml = serde_yaml::to_string(&crd).unwrap();
    assert!(yaml.contains("urlFrom"));
    assert!(yaml.contains("configMapRef"));
    assert!(yaml.contains("lastAppliedVersion"));
}
