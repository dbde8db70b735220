//! Structural checks on a finished `.pkpass`.
//!
//! Reopens the archive read-only and reports what a wallet would reject on
//! sight: missing mandatory members, members nested under a directory, and
//! manifest entries that do not match the archived bytes. The signature's
//! cryptographic validity is not checked here; see
//! [`verify_signature`](crate::crypto::verify_signature).

use crate::pass::{digest_bytes, Manifest, MANIFEST_FILE, SIGNATURE_FILE};
use crate::{Error, Result};
use serde::Serialize;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use zip::ZipArchive;

/// Outcome of [`validate_pkpass`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    /// Every member name in archive order.
    pub members: Vec<String>,
    /// Mandatory names not present exactly at the top level.
    pub missing: Vec<String>,
    /// Member names containing a path separator.
    pub nested: Vec<String>,
    /// Manifest entries with no matching member or a different digest.
    pub digest_mismatches: Vec<String>,
    /// Members that are neither listed in the manifest nor the manifest or
    /// signature themselves.
    pub unlisted: Vec<String>,
    /// Why `manifest.json` could not be parsed, if it could not.
    pub manifest_error: Option<String>,
}

impl ValidationReport {
    /// Whether every check passed.
    pub fn is_valid(&self) -> bool {
        self.missing.is_empty()
            && self.nested.is_empty()
            && self.digest_mismatches.is_empty()
            && self.unlisted.is_empty()
            && self.manifest_error.is_none()
    }

    /// Whether all mandatory members are present and nothing is nested.
    pub fn is_flat_and_complete(&self) -> bool {
        self.missing.is_empty() && self.nested.is_empty()
    }
}

/// Validate the structure of the archive at `path`.
///
/// # Errors
///
/// Returns [`Error::Io`] if the file does not exist and [`Error::Zip`] if it
/// is not a ZIP archive. Structural problems, including an unparseable
/// `manifest.json`, are reported in the returned [`ValidationReport`], not as
/// errors.
pub fn validate_pkpass<S: AsRef<str>>(
    path: impl AsRef<Path>,
    mandatory: &[S],
) -> Result<ValidationReport> {
    let path = path.as_ref();
    check_zip_magic(path)?;

    let mut archive = ZipArchive::new(File::open(path)?).map_err(Error::Zip)?;
    let members: Vec<String> = archive.file_names().map(str::to_string).collect();

    let missing = mandatory
        .iter()
        .map(AsRef::as_ref)
        .filter(|name| !members.iter().any(|m| m == name))
        .map(str::to_string)
        .collect();

    let nested = members
        .iter()
        .filter(|name| name.contains('/') || name.contains('\\'))
        .cloned()
        .collect();

    let mut report = ValidationReport {
        members,
        missing,
        nested,
        ..Default::default()
    };

    if report.members.iter().any(|m| m == MANIFEST_FILE) {
        check_manifest(&mut archive, &mut report)?;
    }

    Ok(report)
}

fn check_manifest(archive: &mut ZipArchive<File>, report: &mut ValidationReport) -> Result<()> {
    let manifest = match Manifest::from_bytes(&read_member(archive, MANIFEST_FILE)?) {
        Ok(manifest) => manifest,
        Err(e) => {
            report.manifest_error = Some(e.to_string());
            return Ok(());
        }
    };

    for (name, expected) in manifest.iter() {
        let present = report.members.iter().any(|m| m == name);
        let matches = present && digest_bytes(&read_member(archive, name)?) == expected;
        if !matches {
            report.digest_mismatches.push(name.to_string());
        }
    }

    report.unlisted = report
        .members
        .iter()
        .filter(|m| {
            m.as_str() != MANIFEST_FILE && m.as_str() != SIGNATURE_FILE && manifest.get(m).is_none()
        })
        .cloned()
        .collect();

    Ok(())
}

/// Read one member of the archive at `path`.
///
/// # Errors
///
/// Returns [`Error::Zip`] if the archive cannot be opened or has no member
/// called `name`.
pub fn read_archive_member(path: impl AsRef<Path>, name: &str) -> Result<Vec<u8>> {
    let path = path.as_ref();
    check_zip_magic(path)?;
    let mut archive = ZipArchive::new(File::open(path)?).map_err(Error::Zip)?;
    read_member(&mut archive, name)
}

fn read_member(archive: &mut ZipArchive<File>, name: &str) -> Result<Vec<u8>> {
    let mut entry = archive.by_name(name).map_err(Error::Zip)?;
    let mut data = Vec::new();
    entry.read_to_end(&mut data)?;
    Ok(data)
}

/// Check that `path` exists and starts with a ZIP signature.
pub fn check_zip_magic(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(Error::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("Archive not found: {}", path.display()),
        )));
    }

    let mut file = File::open(path)?;
    let mut magic = [0u8; 4];
    file.read_exact(&mut magic)
        .map_err(|_| Error::Zip(zip::result::ZipError::InvalidArchive("File too short".into())))?;

    if &magic[0..2] != b"PK" {
        return Err(Error::Zip(zip::result::ZipError::InvalidArchive(
            "Not a valid ZIP/pkpass file".into(),
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    const MANDATORY: &[&str] = &["manifest.json", "pass.json", "signature"];

    fn write_zip(dir: &Path, members: &[(&str, &[u8])]) -> PathBuf {
        let path = dir.join("test.pkpass");
        let mut zip = ZipWriter::new(File::create(&path).unwrap());
        for (name, data) in members {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap();
        path
    }

    fn manifest_for(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut manifest = Manifest::new();
        for (name, data) in files {
            manifest.insert(*name, digest_bytes(data));
        }
        manifest.to_bytes().unwrap()
    }

    #[test]
    fn test_validate_complete_pass() {
        let temp_dir = TempDir::new().unwrap();
        let manifest = manifest_for(&[("pass.json", b"{}"), ("icon.png", b"PNG")]);
        let path = write_zip(
            temp_dir.path(),
            &[
                ("pass.json", b"{}"),
                ("icon.png", b"PNG"),
                ("manifest.json", &manifest),
                ("signature", b"SIG"),
            ],
        );

        let report = validate_pkpass(&path, MANDATORY).unwrap();

        assert!(report.is_valid(), "{:?}", report);
        assert_eq!(report.members.len(), 4);
    }

    #[test]
    fn test_validate_reports_missing_pass_json() {
        let temp_dir = TempDir::new().unwrap();
        let manifest = manifest_for(&[("icon.png", b"PNG")]);
        let path = write_zip(
            temp_dir.path(),
            &[
                ("icon.png", b"PNG"),
                ("manifest.json", &manifest),
                ("signature", b"SIG"),
            ],
        );

        let report = validate_pkpass(&path, MANDATORY).unwrap();

        assert_eq!(report.missing, vec!["pass.json"]);
        assert!(report.nested.is_empty());
        assert!(!report.is_valid());
    }

    #[test]
    fn test_validate_reports_nested_members() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_zip(
            temp_dir.path(),
            &[
                ("pass/pass.json", b"{}"),
                ("pass/manifest.json", b"{}"),
                ("pass/signature", b"SIG"),
            ],
        );

        let report = validate_pkpass(&path, MANDATORY).unwrap();

        assert_eq!(report.missing, vec!["manifest.json", "pass.json", "signature"]);
        assert_eq!(report.nested.len(), 3);
        assert!(!report.is_flat_and_complete());
    }

    #[test]
    fn test_validate_reports_digest_mismatch_and_unlisted() {
        let temp_dir = TempDir::new().unwrap();
        let manifest = manifest_for(&[("pass.json", b"{}"), ("logo.png", b"LOGO")]);
        let path = write_zip(
            temp_dir.path(),
            &[
                ("pass.json", b"{\"changed\":true}"),
                ("icon.png", b"PNG"),
                ("manifest.json", &manifest),
                ("signature", b"SIG"),
            ],
        );

        let report = validate_pkpass(&path, MANDATORY).unwrap();

        assert!(report.is_flat_and_complete());
        assert_eq!(report.digest_mismatches, vec!["logo.png", "pass.json"]);
        assert_eq!(report.unlisted, vec!["icon.png"]);
        assert!(!report.is_valid());
    }

    #[test]
    fn test_validate_corrupt_manifest_keeps_structural_results() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_zip(
            temp_dir.path(),
            &[
                ("manifest.json", b"not json"),
                ("signature", b"SIG"),
                ("dir/icon.png", b"PNG"),
            ],
        );

        let report = validate_pkpass(&path, MANDATORY).unwrap();

        assert_eq!(report.missing, vec!["pass.json"]);
        assert_eq!(report.nested, vec!["dir/icon.png"]);
        assert!(report.manifest_error.is_some());
        assert!(report.digest_mismatches.is_empty());
        assert!(!report.is_valid());
    }

    #[test]
    fn test_validate_corrupt_manifest_alone_is_invalid() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_zip(
            temp_dir.path(),
            &[
                ("pass.json", b"{}"),
                ("manifest.json", b"[1, 2]"),
                ("signature", b"SIG"),
            ],
        );

        let report = validate_pkpass(&path, MANDATORY).unwrap();

        assert!(report.is_flat_and_complete());
        assert!(!report.is_valid());
    }

    #[test]
    fn test_read_archive_member() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_zip(temp_dir.path(), &[("signature", b"SIG")]);

        assert_eq!(read_archive_member(&path, "signature").unwrap(), b"SIG");
        assert!(matches!(
            read_archive_member(&path, "manifest.json"),
            Err(Error::Zip(_))
        ));
    }

    #[test]
    fn test_validate_not_found() {
        let result = validate_pkpass("/nonexistent/file.pkpass", MANDATORY);
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn test_validate_invalid_format() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("invalid.pkpass");
        std::fs::write(&path, b"not a zip file").unwrap();

        let result = validate_pkpass(&path, MANDATORY);
        assert!(matches!(result, Err(Error::Zip(_))));
    }
}
