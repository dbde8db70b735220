//! Build-scoped staging area.
//!
//! Assets are copied out of the source directory into a fresh temporary
//! directory before anything is hashed, so the manifest, the signature and
//! the archive all see the same immutable snapshot. The directory is removed
//! when the [`StagingArea`] is dropped, whichever stage the build stopped at.

use super::manifest::is_reserved;
use crate::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

/// Allow-list of asset file extensions.
///
/// Only regular, non-hidden files whose extension is on the list are staged.
/// Matching is case-insensitive. Anything else is skipped and logged at debug
/// level so an omitted asset is never silent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetFilter {
    extensions: Vec<String>,
}

impl AssetFilter {
    /// Extensions staged when nothing else is configured.
    pub const DEFAULT_EXTENSIONS: &'static [&'static str] = &["png", "json"];

    /// Build a filter from a list of extensions (with or without a leading dot).
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extensions = extensions
            .into_iter()
            .map(|e| e.as_ref().trim_start_matches('.').to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        Self { extensions }
    }

    /// Add one extension to the allow-list.
    pub fn allow(mut self, extension: impl AsRef<str>) -> Self {
        let ext = extension.as_ref().trim_start_matches('.').to_ascii_lowercase();
        if !ext.is_empty() && !self.extensions.contains(&ext) {
            self.extensions.push(ext);
        }
        self
    }

    /// Allowed extensions, lowercase, without dots.
    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// Whether the filter allows nothing.
    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    /// Whether a file called `name` should be staged.
    pub fn accepts(&self, name: &str) -> bool {
        if name.starts_with('.') || is_reserved(name) {
            return false;
        }
        match Path::new(name).extension().and_then(|e| e.to_str()) {
            Some(ext) => self
                .extensions
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(ext)),
            None => false,
        }
    }
}

impl Default for AssetFilter {
    fn default() -> Self {
        Self::new(Self::DEFAULT_EXTENSIONS)
    }
}

/// Temporary directory holding one build's assets.
#[derive(Debug)]
pub struct StagingArea {
    dir: TempDir,
}

impl StagingArea {
    /// Create an empty staging directory, under `root` if given.
    pub fn create(root: Option<&Path>) -> Result<Self> {
        let builder_result = match root {
            Some(root) => {
                fs::create_dir_all(root)?;
                tempfile::Builder::new().prefix("pkpass-").tempdir_in(root)
            }
            None => tempfile::Builder::new().prefix("pkpass-").tempdir(),
        };

        let dir = builder_result.map_err(|e| {
            Error::Io(std::io::Error::other(format!(
                "Failed to create staging directory: {}",
                e
            )))
        })?;

        debug!(path = %dir.path().display(), "created staging area");
        Ok(Self { dir })
    }

    /// Path of the staging directory.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Copy every asset in `assets_dir` accepted by `filter`.
    ///
    /// Returns the staged file names, sorted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Staging`] if `assets_dir` is not a directory, holds no
    /// accepted asset, or contains a name that is not valid UTF-8, and
    /// [`Error::Io`] if a copy fails.
    pub fn stage_assets(&self, assets_dir: &Path, filter: &AssetFilter) -> Result<Vec<String>> {
        if !assets_dir.is_dir() {
            return Err(Error::Staging(format!(
                "Assets directory not found: {}",
                assets_dir.display()
            )));
        }

        let mut staged = Vec::new();

        for entry in fs::read_dir(assets_dir)? {
            let entry = entry?;
            let path = entry.path();

            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                return Err(Error::Staging(format!(
                    "File name is not valid UTF-8: {}",
                    path.display()
                )));
            };

            // Follows symlinks: a linked asset is staged as its target's bytes.
            if !path.is_file() {
                debug!(file = %name, "skipping non-file entry");
                continue;
            }

            if !filter.accepts(&name) {
                debug!(file = %name, "skipping file outside the asset allow-list");
                continue;
            }

            fs::copy(&path, self.path().join(&name))?;
            debug!(file = %name, "staged asset");
            staged.push(name);
        }

        if staged.is_empty() {
            return Err(Error::Staging(format!(
                "No assets matching {:?} in {}",
                filter.extensions(),
                assets_dir.display()
            )));
        }

        staged.sort();
        Ok(staged)
    }

    /// Write `data` as `name` inside the staging directory.
    pub fn write_file(&self, name: &str, data: &[u8]) -> Result<PathBuf> {
        let path = self.path().join(name);
        fs::write(&path, data)?;
        Ok(path)
    }

    /// Remove the staging directory now, reporting any failure.
    ///
    /// Dropping the area also removes it, but ignores errors.
    pub fn close(self) -> Result<()> {
        self.dir.close()?;
        Ok(())
    }
}
