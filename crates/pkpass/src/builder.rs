//! PassBuilder API
//!
//! Turns a directory of pass assets into a signed `.pkpass`. One build runs
//! the stages in [`BuildStage`] order and stops at the first failure:
//!
//! 1. stage the allow-listed assets into a fresh temporary directory
//! 2. hash them into `manifest.json`
//! 3. extract key material and sign the manifest bytes
//! 4. zip the staging directory flat into the output path
//! 5. reopen the archive and check it structurally
//!
//! The staging directory and the extracted key material never outlive the
//! call, whichever stage it ends in.

use crate::archive::{create_pkpass, validate_pkpass, CompressionLevel, ValidationReport};
use crate::config::{AssetFilter, Backend, PassConfig};
use crate::crypto::{SigningBackend, TrustAnchor};
use crate::pass::{Manifest, StagingArea, SIGNATURE_FILE};
use crate::{Error, Result};
use secrecy::SecretString;
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Pipeline stage, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildStage {
    /// Assets copied into the staging directory.
    Staging,
    /// `manifest.json` written.
    Manifested,
    /// `signature` written.
    Signed,
    /// Archive written to the output path.
    Archived,
    /// Archive reopened and checked.
    Validated,
}

impl fmt::Display for BuildStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BuildStage::Staging => "staging",
            BuildStage::Manifested => "manifested",
            BuildStage::Signed => "signed",
            BuildStage::Archived => "archived",
            BuildStage::Validated => "validated",
        };
        f.write_str(name)
    }
}

/// What a finished build produced.
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    /// Path of the written archive.
    pub output: PathBuf,
    /// The signed manifest.
    pub manifest: Manifest,
    /// Archive member names, in the order written.
    pub members: Vec<String>,
    /// Archive size in bytes.
    pub archive_size: u64,
    /// Structural check of the written archive.
    pub validation: ValidationReport,
}

/// Wallet pass builder.
///
/// # Example
///
/// ```no_run
/// use pkpass::PassBuilder;
///
/// let report = PassBuilder::new()
///     .assets_dir("QuestCard.pass")
///     .pkcs12("certificate.p12")
///     .password("secret")
///     .trust_anchor("wwdr.pem")
///     .output("QuestCard.pkpass")
///     .build()?;
/// println!("{} members", report.members.len());
/// # Ok::<(), pkpass::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct PassBuilder {
    config: PassConfig,
}

impl PassBuilder {
    /// Create a builder with default settings.
    pub fn new() -> Self {
        Self {
            config: PassConfig::new(),
        }
    }

    /// Start from an existing configuration.
    pub fn from_config(config: PassConfig) -> Self {
        Self { config }
    }

    /// The configuration built so far.
    pub fn config(&self) -> &PassConfig {
        &self.config
    }

    /// Set the directory holding `pass.json` and the image assets.
    pub fn assets_dir(mut self, path: impl AsRef<Path>) -> Self {
        self.config.assets_dir = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set PKCS#12 file path (.p12 format).
    ///
    /// The bundle holds the pass type identity certificate and its private
    /// key. Use `password()` to set the decryption password.
    pub fn pkcs12(mut self, path: impl AsRef<Path>) -> Self {
        self.config.credential_bundle = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set the password for the PKCS#12 bundle.
    ///
    /// The password is stored securely and will be zeroized when dropped.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.config.password = SecretString::new(password.into());
        self
    }

    /// Set the intermediate CA certificate (PEM or DER).
    pub fn trust_anchor(mut self, path: impl AsRef<Path>) -> Self {
        self.config.trust_anchor = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set the output `.pkpass` path. An existing file is replaced.
    pub fn output(mut self, path: impl AsRef<Path>) -> Self {
        self.config.output = Some(path.as_ref().to_path_buf());
        self
    }

    /// Create staging directories under `path` instead of the system temp dir.
    pub fn staging_root(mut self, path: impl AsRef<Path>) -> Self {
        self.config.staging_root = Some(path.as_ref().to_path_buf());
        self
    }

    /// Add a member the archive must contain at its top level.
    pub fn require(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.config.mandatory_members.contains(&name) {
            self.config.mandatory_members.push(name);
        }
        self
    }

    /// Replace the mandatory member list.
    pub fn mandatory_members<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.mandatory_members = names.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the asset allow-list.
    pub fn asset_filter(mut self, filter: AssetFilter) -> Self {
        self.config.asset_filter = filter;
        self
    }

    /// Add one extension to the asset allow-list.
    pub fn extension(mut self, extension: impl AsRef<str>) -> Self {
        self.config.asset_filter = self.config.asset_filter.allow(extension);
        self
    }

    /// Select the signing backend.
    pub fn backend(mut self, backend: Backend) -> Self {
        self.config.backend = backend;
        self
    }

    /// Sign in-process instead of through the `openssl` executable.
    pub fn native(self) -> Self {
        self.backend(Backend::Native)
    }

    /// Set ZIP compression level for the archive (0-9).
    ///
    /// 0 = stored, 9 = maximum compression. Default is 6.
    pub fn compression_level(mut self, level: u32) -> Self {
        self.config.compression_level = CompressionLevel::new(level);
        self
    }

    /// Keep an archive that fails validation instead of deleting it.
    pub fn keep_invalid_output(mut self, keep: bool) -> Self {
        self.config.keep_invalid_output = keep;
        self
    }

    /// Validate the builder configuration.
    ///
    /// See [`PassConfig::validate`].
    pub fn validate(&self) -> Result<()> {
        self.config.validate()
    }

    /// Run the pipeline with the configured backend.
    ///
    /// # Errors
    ///
    /// Returns the first stage failure. A failure before the archive stage
    /// leaves the output path untouched. An archive that fails validation is
    /// deleted and reported as [`Error::InvalidArchive`] unless
    /// `keep_invalid_output` is set.
    pub fn build(&self) -> Result<BuildReport> {
        self.validate()?;
        let backend = self.config.backend.signer();
        self.run(backend.as_ref())
    }

    /// Run the pipeline with a caller-supplied backend, ignoring the
    /// configured one.
    pub fn build_with(&self, backend: &dyn SigningBackend) -> Result<BuildReport> {
        self.validate()?;
        self.run(backend)
    }

    fn run(&self, backend: &dyn SigningBackend) -> Result<BuildReport> {
        let config = &self.config;
        let (assets_dir, bundle, anchor_path, output) = match (
            &config.assets_dir,
            &config.credential_bundle,
            &config.trust_anchor,
            &config.output,
        ) {
            (Some(a), Some(b), Some(t), Some(o)) => (a, b, t, o),
            _ => return Err(Error::Config("Incomplete configuration".into())),
        };

        let trust_anchor = TrustAnchor::from_file(anchor_path)?;
        let anchor_name = trust_anchor.subject_common_name().unwrap_or_default();
        debug!(anchor = %anchor_name, backend = backend.name(), "loaded trust anchor");

        let staging = StagingArea::create(config.staging_root.as_deref())?;
        let staged = staging.stage_assets(assets_dir, &config.asset_filter)?;
        info!(stage = %BuildStage::Staging, assets = staged.len(), "assets staged");

        let manifest = Manifest::from_dir(staging.path())?;
        let manifest_bytes = manifest.write_to(staging.path())?;
        info!(stage = %BuildStage::Manifested, entries = manifest.len(), "manifest written");

        let signature = {
            let key = backend.extract(bundle, &config.password)?;
            let identity = key.subject_common_name().unwrap_or_default();
            debug!(identity = %identity, "extracted key material");
            backend.sign(&manifest_bytes, &key, &trust_anchor)?
        };
        staging.write_file(SIGNATURE_FILE, &signature)?;
        info!(
            stage = %BuildStage::Signed,
            backend = backend.name(),
            bytes = signature.len(),
            "manifest signed"
        );

        let members = create_pkpass(staging.path(), output, config.compression_level)?;
        staging.close()?;
        let archive_size = fs::metadata(output)?.len();
        info!(
            stage = %BuildStage::Archived,
            output = %output.display(),
            members = members.len(),
            bytes = archive_size,
            "archive written"
        );

        let validation = validate_pkpass(output, config.mandatory_members.as_slice())?;
        if !validation.is_flat_and_complete() {
            if config.keep_invalid_output {
                warn!(
                    output = %output.display(),
                    missing = ?validation.missing,
                    nested = ?validation.nested,
                    "keeping archive that failed validation"
                );
            } else {
                fs::remove_file(output)?;
                return Err(Error::InvalidArchive {
                    missing: validation.missing,
                    nested: validation.nested,
                });
            }
        } else {
            info!(stage = %BuildStage::Validated, output = %output.display(), "pass built");
        }

        Ok(BuildReport {
            output: output.clone(),
            manifest,
            members,
            archive_size,
            validation,
        })
    }
}
