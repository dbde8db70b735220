//! `.pkpass` archive creation.
//!
//! Packs the staging directory into a ZIP archive with every file at the
//! archive root. Member names are the bare file names; the staging
//! directory's own path never appears, wherever it lives on disk.
//!
//! # Examples
//!
//! ```no_run
//! use pkpass::archive::{create_pkpass, CompressionLevel};
//!
//! let members = create_pkpass("staging", "QuestCard.pkpass", CompressionLevel::DEFAULT)?;
//! assert!(members.iter().all(|name| !name.contains('/')));
//! # Ok::<(), pkpass::Error>(())
//! ```

use crate::{Error, Result};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// ZIP compression level for archive creation.
///
/// Use the provided constants for common use cases, or [`CompressionLevel::new`]
/// for custom levels.
///
/// # Examples
///
/// ```
/// use pkpass::archive::CompressionLevel;
///
/// let fast = CompressionLevel::NONE;      // Stored
/// let balanced = CompressionLevel::DEFAULT; // Level 6
/// let small = CompressionLevel::MAX;      // Maximum compression
///
/// // Custom levels are clamped to 0-9
/// let custom = CompressionLevel::new(3);
/// assert_eq!(custom.level(), 3);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionLevel(u32);

impl CompressionLevel {
    /// No compression (level 0), members are stored.
    pub const NONE: CompressionLevel = CompressionLevel(0);

    /// Default deflate level (6).
    pub const DEFAULT: CompressionLevel = CompressionLevel(6);

    /// Maximum deflate level (9).
    pub const MAX: CompressionLevel = CompressionLevel(9);

    /// Creates a compression level from 0-9.
    ///
    /// Values greater than 9 are clamped to 9.
    #[must_use]
    pub fn new(level: u32) -> Self {
        CompressionLevel(level.min(9))
    }

    /// Returns the compression level value (0-9).
    #[must_use]
    pub fn level(&self) -> u32 {
        self.0
    }

    fn file_options(&self) -> SimpleFileOptions {
        if self.0 == 0 {
            SimpleFileOptions::default().compression_method(CompressionMethod::Stored)
        } else {
            SimpleFileOptions::default()
                .compression_method(CompressionMethod::Deflated)
                .compression_level(Some(self.0 as i64))
        }
    }
}

impl Default for CompressionLevel {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<u32> for CompressionLevel {
    fn from(level: u32) -> Self {
        CompressionLevel::new(level)
    }
}

/// Creates a `.pkpass` archive from a staging directory.
///
/// Every regular file directly under `staging_dir` becomes a top-level
/// member named after the file. Members are written in name order. The
/// archive is assembled in a temporary file next to `output_path` and renamed
/// over it once complete, so an existing file at `output_path` is replaced
/// and a failure never leaves a truncated archive behind.
///
/// Returns the member names written.
///
/// # Errors
///
/// Returns [`Error::Io`] if:
/// - The staging directory doesn't exist or is not a directory
/// - The output file cannot be created or renamed into place
/// - Any file cannot be read during archiving
///
/// Returns [`Error::Staging`] if a file name is not valid UTF-8, and
/// [`Error::Zip`] if the ZIP archive cannot be written.
pub fn create_pkpass(
    staging_dir: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    compression_level: CompressionLevel,
) -> Result<Vec<String>> {
    let staging_dir = staging_dir.as_ref();
    let output_path = output_path.as_ref();

    if !staging_dir.exists() {
        return Err(Error::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("Staging directory not found: {}", staging_dir.display()),
        )));
    }

    if !staging_dir.is_dir() {
        return Err(Error::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("Not a directory: {}", staging_dir.display()),
        )));
    }

    let parent = match output_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    if !parent.exists() {
        fs::create_dir_all(parent)?;
    }

    let temp = NamedTempFile::new_in(parent)?;
    let mut zip = ZipWriter::new(temp.reopen()?);
    let options = compression_level.file_options();
    let mut members = Vec::new();

    // Only the top level: the archive must stay flat.
    for entry in WalkDir::new(staging_dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(false)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| {
            Error::Io(io::Error::other(format!(
                "Failed to walk directory: {}",
                e
            )))
        })?;

        if !entry.file_type().is_file() {
            debug!(path = %entry.path().display(), "not archiving non-file entry");
            continue;
        }

        let name = entry
            .file_name()
            .to_str()
            .ok_or_else(|| {
                Error::Staging(format!(
                    "File name is not valid UTF-8: {}",
                    entry.path().display()
                ))
            })?
            .to_string();

        let data = fs::read(entry.path())?;
        zip.start_file(name.as_str(), options).map_err(Error::Zip)?;
        zip.write_all(&data)?;
        debug!(member = %name, bytes = data.len(), "archived");
        members.push(name);
    }

    let file: File = zip.finish().map_err(Error::Zip)?;
    file.sync_all()?;
    drop(file);

    temp.persist(output_path).map_err(|e| Error::Io(e.error))?;

    Ok(members)
}
