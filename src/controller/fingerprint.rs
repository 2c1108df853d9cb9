//! # Fingerprint
//!
//! Content digest over a [`ResolvedInput`], used to detect that the declared
//! migration input changed since the last successful pass. Not a security
//! boundary.
//!
//! Feed order: connection URL; then, when cloud parameters exist, token, cloud
//! URL and project. A remote directory (name, tag) ends the digest because its
//! content is not visible locally. Otherwise the local migration directory
//! checksum is fed last.

use crate::constants::CHECKSUM_FILE_NAME;
use crate::controller::input::ResolvedInput;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use sha2::{Digest, Sha256};
use std::fmt;
use std::io;
use std::path::Path;
use walkdir::WalkDir;

/// Hex-encoded SHA-256 digest of the resolved input
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<str> for Fingerprint {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

/// Compute the fingerprint of a resolved input
///
/// # Errors
///
/// Returns an I/O error if the materialized migration directory cannot be read.
pub fn fingerprint(input: &ResolvedInput) -> io::Result<Fingerprint> {
    let mut hasher = Sha256::new();
    hasher.update(input.url.as_bytes());

    if let Some(cloud) = &input.cloud {
        hasher.update(cloud.token.as_bytes());
        hasher.update(cloud.url.as_bytes());
        hasher.update(cloud.project.as_bytes());
        if let Some(remote) = &cloud.remote_dir {
            hasher.update(remote.name.as_bytes());
            hasher.update(remote.tag.as_bytes());
            return Ok(Fingerprint(format!("{:x}", hasher.finalize())));
        }
    }

    if let Some(dir) = &input.migration_dir {
        let checksum = dir_checksum(dir.path())?;
        hasher.update(checksum.sum().as_bytes());
    }

    Ok(Fingerprint(format!("{:x}", hasher.finalize())))
}

/// Checksum of a migration directory in `atlas.sum` layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirChecksum {
    /// Base64 digest over all files, in order
    pub total: String,
    /// (file name, base64 digest) sorted by file name
    pub files: Vec<(String, String)>,
}

impl DirChecksum {
    /// Render as `h1:<total>` followed by one `<name> h1:<digest>` line per file
    #[must_use]
    pub fn sum(&self) -> String {
        let mut out = format!("h1:{}\n", self.total);
        for (name, digest) in &self.files {
            out.push_str(name);
            out.push_str(" h1:");
            out.push_str(digest);
            out.push('\n');
        }
        out
    }
}

/// Compute a deterministic checksum over the regular files directly inside `path`
///
/// Files are visited in file-name order so the result does not depend on the
/// order in which they were written. `atlas.sum` is skipped.
///
/// # Errors
///
/// Returns an I/O error if the directory or one of its files cannot be read.
pub fn dir_checksum(path: &Path) -> io::Result<DirChecksum> {
    let mut total = Sha256::new();
    let mut files = Vec::new();

    for entry in WalkDir::new(path)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name == CHECKSUM_FILE_NAME {
            continue;
        }
        let content = std::fs::read(entry.path())?;

        total.update(name.as_bytes());
        total.update(&content);

        let mut file_hasher = Sha256::new();
        file_hasher.update(name.as_bytes());
        file_hasher.update(&content);
        files.push((name, BASE64.encode(file_hasher.finalize())));
    }

    Ok(DirChecksum {
        total: BASE64.encode(total.finalize()),
        files,
    })
}
