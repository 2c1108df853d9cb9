//! # Materialized Migration Directory
//!
//! Writes migration file content into a private temporary directory that lives
//! for one reconciliation pass.

use crate::constants::MIGRATION_DIR_PREFIX;
use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;
use tempfile::TempDir;
use tracing::debug;

/// Temporary directory holding migration files
///
/// [`release`](Self::release) removes it and reports failures. If the value is
/// dropped instead (cancelled pass, early error) the directory is still
/// removed, silently.
#[derive(Debug)]
pub struct MaterializedDir {
    dir: TempDir,
}

impl MaterializedDir {
    /// Create a fresh directory under `root` and write one file per entry
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for an unsafe file name, or any I/O error from
    /// creating the directory or writing the files. A partially written
    /// directory is removed before returning.
    pub fn create(root: &Path, files: &BTreeMap<String, String>) -> io::Result<Self> {
        for name in files.keys() {
            validate_file_name(name)
                .map_err(|reason| io::Error::new(io::ErrorKind::InvalidInput, reason))?;
        }

        let dir = tempfile::Builder::new()
            .prefix(MIGRATION_DIR_PREFIX)
            .tempdir_in(root)?;
        restrict_dir(dir.path())?;

        for (name, content) in files {
            let mut file = create_private_file(&dir.path().join(name))?;
            file.write_all(content.as_bytes())?;
            file.sync_all()?;
        }

        debug!(
            "Materialized {} migration file(s) into {}",
            files.len(),
            dir.path().display()
        );
        Ok(Self { dir })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Remove the directory and everything in it
    ///
    /// # Errors
    ///
    /// Returns the I/O error raised while deleting.
    pub fn release(self) -> io::Result<()> {
        let path = self.dir.path().to_path_buf();
        self.dir.close()?;
        debug!("Released migration directory {}", path.display());
        Ok(())
    }
}

/// Check that a migration file name is one plain path component
///
/// # Errors
///
/// Returns a human-readable reason when the name is rejected.
pub fn validate_file_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("migration file name must not be empty".to_string());
    }
    if name == "." || name == ".." {
        return Err(format!("migration file name {name:?} is not allowed"));
    }
    if name.contains('/') || name.contains('\\') || name.contains('\0') {
        return Err(format!(
            "migration file name {name:?} must not contain path separators"
        ));
    }
    Ok(())
}

#[cfg(unix)]
fn restrict_dir(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
}

#[cfg(not(unix))]
fn restrict_dir(_path: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(unix)]
fn create_private_file(path: &Path) -> io::Result<std::fs::File> {
    use std::os::unix::fs::OpenOptionsExt;
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn create_private_file(path: &Path) -> io::Result<std::fs::File> {
    OpenOptions::new().write(true).create_new(true).open(path)
}
