//! `manifest.json` generation.
//!
//! The manifest maps every asset file name in the staging directory to the
//! SHA-1 digest of its contents. Its serialized bytes are the payload the
//! detached signature covers, so serialization must be stable: keys are kept
//! in a [`BTreeMap`] and written with fixed pretty-printing.

use super::digest::digest_file;
use crate::{Error, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

/// File name of the manifest inside the pass.
pub const MANIFEST_FILE: &str = "manifest.json";

/// File name of the detached signature inside the pass.
pub const SIGNATURE_FILE: &str = "signature";

/// Mapping from asset file name to lowercase hex SHA-1 digest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Manifest {
    entries: BTreeMap<String, String>,
}

impl Manifest {
    /// Create an empty manifest.
    pub fn new() -> Self {
        Self::default()
    }

    /// Hash every regular file directly under `dir`.
    ///
    /// Subdirectories and any existing `manifest.json` or `signature` are
    /// skipped, so rebuilding over a previously built directory yields the
    /// same manifest.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the directory or a file cannot be read, and
    /// [`Error::Staging`] if a file name is not valid UTF-8.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let mut manifest = Self::new();

        for entry in WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(false)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| {
                Error::Io(std::io::Error::other(format!(
                    "Failed to list {}: {}",
                    dir.display(),
                    e
                )))
            })?;

            if !entry.file_type().is_file() {
                debug!(path = %entry.path().display(), "skipping non-file entry");
                continue;
            }

            let name = entry.file_name().to_str().ok_or_else(|| {
                Error::Staging(format!(
                    "File name is not valid UTF-8: {}",
                    entry.path().display()
                ))
            })?;

            if is_reserved(name) {
                continue;
            }

            let digest = digest_file(entry.path())?;
            debug!(file = name, sha1 = %digest, "hashed asset");
            manifest.insert(name, digest);
        }

        Ok(manifest)
    }

    /// Record a digest for `name`, replacing any previous one.
    pub fn insert(&mut self, name: impl Into<String>, digest: impl Into<String>) {
        self.entries.insert(name.into(), digest.into());
    }

    /// Digest recorded for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the manifest has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(name, digest)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// File names covered by the manifest, in name order.
    pub fn filenames(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Serialize to the canonical JSON form.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(&self.entries)?)
    }

    /// Parse a serialized manifest.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let entries: BTreeMap<String, String> = serde_json::from_slice(data)?;
        Ok(Self { entries })
    }

    /// Write `manifest.json` into `dir` and return the exact bytes written.
    ///
    /// The returned bytes must be what gets signed; re-serializing later is
    /// stable but reading back what was written avoids any doubt.
    pub fn write_to(&self, dir: impl AsRef<Path>) -> Result<Vec<u8>> {
        let bytes = self.to_bytes()?;
        fs::write(dir.as_ref().join(MANIFEST_FILE), &bytes)?;
        Ok(bytes)
    }
}

/// Names the manifest never lists: itself and the signature over it.
pub fn is_reserved(name: &str) -> bool {
    name == MANIFEST_FILE || name == SIGNATURE_FILE
}
