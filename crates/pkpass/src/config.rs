//! Build configuration.
//!
//! [`PassConfig`] is plain data: every input path, the credential password,
//! and the knobs that used to be hard-wired into per-pass build scripts.
//! [`PassBuilder`](crate::PassBuilder) fills it in fluently and calls
//! [`PassConfig::validate`] before any stage runs.

use crate::archive::CompressionLevel;
use crate::crypto::{NativeSigner, OpenSslToolchain, SigningBackend};
use crate::pass::{MANIFEST_FILE, SIGNATURE_FILE};
use crate::{Error, Result};
use secrecy::SecretString;
use std::path::PathBuf;

pub use crate::pass::AssetFilter;

/// Members every pass must carry unless configured otherwise.
pub const DEFAULT_MANDATORY_MEMBERS: &[&str] = &[MANIFEST_FILE, "pass.json", SIGNATURE_FILE];

/// Which signing implementation a build uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    /// Shell out to the `openssl` executable.
    Toolchain {
        /// Executable to run.
        program: PathBuf,
        /// Pass `-legacy` when reading the PKCS#12 bundle.
        legacy: bool,
    },
    /// Sign in-process through the linked OpenSSL library.
    Native,
}

impl Backend {
    /// Instantiate the configured backend.
    pub fn signer(&self) -> Box<dyn SigningBackend> {
        match self {
            Backend::Toolchain { program, legacy } => Box::new(
                OpenSslToolchain::new()
                    .program(program)
                    .legacy(*legacy),
            ),
            Backend::Native => Box::new(NativeSigner::new()),
        }
    }
}

impl Default for Backend {
    fn default() -> Self {
        Backend::Toolchain {
            program: PathBuf::from("openssl"),
            legacy: true,
        }
    }
}

/// Everything one build needs.
#[derive(Debug, Clone)]
pub struct PassConfig {
    /// Directory holding `pass.json` and the image assets.
    pub assets_dir: Option<PathBuf>,
    /// PKCS#12 bundle with the pass type identity.
    pub credential_bundle: Option<PathBuf>,
    /// Password for `credential_bundle`.
    pub password: SecretString,
    /// Intermediate CA certificate embedded next to the identity.
    pub trust_anchor: Option<PathBuf>,
    /// Where the `.pkpass` is written.
    pub output: Option<PathBuf>,
    /// Parent for the staging directory; the system temp dir when unset.
    pub staging_root: Option<PathBuf>,
    /// Names that must sit at the archive's top level.
    pub mandatory_members: Vec<String>,
    /// Which asset files get staged.
    pub asset_filter: AssetFilter,
    /// Signing implementation.
    pub backend: Backend,
    /// Deflate level for archive members.
    pub compression_level: CompressionLevel,
    /// Leave an archive that failed validation on disk instead of deleting it.
    pub keep_invalid_output: bool,
}

impl PassConfig {
    /// Configuration with every default applied and no paths set.
    pub fn new() -> Self {
        Self {
            assets_dir: None,
            credential_bundle: None,
            password: SecretString::new(String::new()),
            trust_anchor: None,
            output: None,
            staging_root: None,
            mandatory_members: DEFAULT_MANDATORY_MEMBERS
                .iter()
                .map(|name| name.to_string())
                .collect(),
            asset_filter: AssetFilter::default(),
            backend: Backend::default(),
            compression_level: CompressionLevel::DEFAULT,
            keep_invalid_output: false,
        }
    }

    /// Check the configuration before a build.
    ///
    /// Returns an error if:
    /// - The assets directory or output path is not set
    /// - The credential bundle or trust anchor is not set
    /// - The mandatory list lacks `manifest.json` or `signature`
    /// - A mandatory member is not a bare file name
    /// - The asset allow-list is empty
    pub fn validate(&self) -> Result<()> {
        if self.assets_dir.is_none() {
            return Err(Error::Config("No assets directory configured".into()));
        }

        if self.output.is_none() {
            return Err(Error::Config("No output path configured".into()));
        }

        if self.credential_bundle.is_none() {
            return Err(Error::MissingCredentials(
                "Must specify a PKCS#12 credential bundle".into(),
            ));
        }

        if self.trust_anchor.is_none() {
            return Err(Error::MissingCredentials(
                "Must specify a trust anchor certificate".into(),
            ));
        }

        for required in [MANIFEST_FILE, SIGNATURE_FILE] {
            if !self.mandatory_members.iter().any(|m| m == required) {
                return Err(Error::Config(format!(
                    "Mandatory members must include {}",
                    required
                )));
            }
        }

        if let Some(nested) = self
            .mandatory_members
            .iter()
            .find(|m| m.is_empty() || m.contains('/') || m.contains('\\'))
        {
            return Err(Error::Config(format!(
                "Mandatory member is not a bare file name: {:?}",
                nested
            )));
        }

        if self.asset_filter.is_empty() {
            return Err(Error::Config("Asset allow-list is empty".into()));
        }

        Ok(())
    }
}

impl Default for PassConfig {
    fn default() -> Self {
        Self::new()
    }
}
