//! # CLI Executor
//!
//! Runs the migration CLI as a child process:
//!
//! ```text
//! <bin> migrate status|apply --env <env> --config file://<rendered.hcl> --format '{{ json . }}'
//! ```
//!
//! The child is killed when the call future is dropped, so a timeout or a
//! cancelled pass never leaves a migration process running.

use crate::controller::executor::{ApplyReport, MigrationExecutor, StatusReport};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;
use tracing::{debug, info_span, warn, Instrument};

const JSON_FORMAT: &str = "{{ json . }}";

/// [`MigrationExecutor`] backed by the migration CLI
#[derive(Debug, Clone)]
pub struct CliExecutor {
    binary: PathBuf,
    work_dir: PathBuf,
}

impl CliExecutor {
    /// Locate `binary` on `PATH` (or use it as a path)
    ///
    /// Rendered config files are written under `work_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error when the binary cannot be found.
    pub fn new(binary: &str, work_dir: &Path) -> Result<Self> {
        let binary = which::which(binary)
            .with_context(|| format!("migration CLI {binary:?} not found in PATH"))?;
        debug!("Using migration CLI at: {:?}", binary);
        Ok(Self {
            binary,
            work_dir: work_dir.to_path_buf(),
        })
    }

    #[must_use]
    pub fn binary(&self) -> &Path {
        &self.binary
    }

    async fn run<T: DeserializeOwned>(
        &self,
        subcommand: &'static str,
        env: &str,
        config: &str,
    ) -> Result<T> {
        let mut config_file = tempfile::Builder::new()
            .prefix("schema-migration-")
            .suffix(".hcl")
            .tempfile_in(&self.work_dir)
            .context("Failed to create executor config file")?;
        config_file
            .write_all(config.as_bytes())
            .context("Failed to write executor config file")?;
        config_file
            .flush()
            .context("Failed to flush executor config file")?;
        let config_url = format!("file://{}", config_file.path().display());

        let start = Instant::now();
        let output = Command::new(&self.binary)
            .args(["migrate", subcommand, "--env", env, "--config"])
            .arg(&config_url)
            .args(["--format", JSON_FORMAT])
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .instrument(info_span!("executor.run", command = subcommand, env = env))
            .await
            .with_context(|| format!("Failed to execute migrate {subcommand}"))?;
        debug!(
            "migrate {} exited with {} after {}ms",
            subcommand,
            output.status,
            start.elapsed().as_millis()
        );

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        // A failed apply still prints its JSON report, with the failure in `Error`.
        match serde_json::from_str::<T>(stdout.trim()) {
            Ok(report) => {
                if !output.status.success() {
                    warn!("migrate {} exited with {}", subcommand, output.status);
                }
                Ok(report)
            }
            Err(parse_err) if output.status.success() => Err(parse_err)
                .with_context(|| format!("Failed to parse migrate {subcommand} output: {stdout}")),
            Err(_) => {
                let detail = if stderr.trim().is_empty() {
                    stdout.trim()
                } else {
                    stderr.trim()
                };
                Err(anyhow::anyhow!(
                    "migrate {subcommand} exited with {}: {detail}",
                    output.status
                ))
            }
        }
    }
}

#[async_trait]
impl MigrationExecutor for CliExecutor {
    async fn status(&self, env: &str, config: &str) -> Result<StatusReport> {
        self.run("status", env, config).await
    }

    async fn apply(&self, env: &str, config: &str) -> Result<ApplyReport> {
        self.run("apply", env, config).await
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    /// Write a fake CLI that prints `stdout` and exits with `code`
    fn fake_cli(dir: &Path, stdout: &str, code: i32) -> PathBuf {
        let path = dir.join("fake-atlas");
        let script = format!("#!/bin/sh\ncat <<'EOF'\n{stdout}\nEOF\nexit {code}\n");
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[tokio::test]
    async fn test_status_parses_json() {
        let dir = tempfile::tempdir().unwrap();
        let bin = fake_cli(
            dir.path(),
            r#"{"Current":"3","Pending":null,"Applied":[{"Version":"3"}]}"#,
            0,
        );
        let executor = CliExecutor::new(bin.to_str().unwrap(), dir.path()).unwrap();

        let report = executor.status("kubernetes", "env {}").await.unwrap();
        assert_eq!(report.current, "3");
        assert!(report.pending.is_empty());
    }

    #[tokio::test]
    async fn test_failed_apply_still_returns_report() {
        let dir = tempfile::tempdir().unwrap();
        let bin = fake_cli(dir.path(), r#"{"Target":"2","Error":"syntax error"}"#, 1);
        let executor = CliExecutor::new(bin.to_str().unwrap(), dir.path()).unwrap();

        let report = executor.apply("kubernetes", "env {}").await.unwrap();
        assert_eq!(report.error, "syntax error");
    }

    #[tokio::test]
    async fn test_non_json_failure_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let bin = fake_cli(dir.path(), "Error: dial tcp: connection refused", 1);
        let executor = CliExecutor::new(bin.to_str().unwrap(), dir.path()).unwrap();

        let err = executor.status("kubernetes", "env {}").await.unwrap_err();
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_missing_binary() {
        let dir = tempfile::tempdir().unwrap();
        assert!(CliExecutor::new("definitely-not-a-real-migration-cli", dir.path()).is_err());
    }
}
