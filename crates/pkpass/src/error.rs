//! Error types for pass building.
//!
//! This module defines the [`enum@Error`] enum covering every way a build can
//! fail: staging inputs, extracting key material, signing, writing the
//! archive and validating it afterwards.
//!
//! # See Also
//!
//! - [`crate::Result`] - Convenience type alias using this error

use thiserror::Error;

/// Error type for pkpass operations.
///
/// All public functions in this crate return [`crate::Result<T>`], which uses this error type.
/// Match on variants to handle specific failure cases.
///
/// # Examples
///
/// ```no_run
/// use pkpass::{Error, PassBuilder};
///
/// let result = PassBuilder::new()
///     .assets_dir("QuestCard.pass")
///     .pkcs12("certificate.p12")
///     .trust_anchor("wwdr.pem")
///     .output("QuestCard.pkpass")
///     .build();
/// match result {
///     Ok(report) => println!("Wrote {}", report.output.display()),
///     Err(Error::Credential(msg)) => eprintln!("Cannot unlock bundle: {msg}"),
///     Err(Error::Io(e)) => eprintln!("IO error: {e}"),
///     Err(e) => eprintln!("Other error: {e}"),
/// }
/// ```
#[derive(Debug, Error)]
pub enum Error {
    /// I/O operation failed.
    ///
    /// Occurs when reading assets, writing staging files or the output archive.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An asset could not be staged.
    ///
    /// The assets directory is missing, holds no selectable assets, or a file
    /// name cannot be represented in the manifest.
    #[error("Staging failed: {0}")]
    Staging(String),

    /// Key material could not be derived from the credential bundle.
    ///
    /// Wrong password, corrupt bundle, or an encryption scheme the backend
    /// cannot read. The message carries the backend's own diagnostic.
    #[error("Credential extraction failed: {0}")]
    Credential(String),

    /// The trust anchor certificate could not be loaded.
    #[error("Invalid trust anchor: {0}")]
    TrustAnchor(String),

    /// The signer ran but produced no usable signature.
    ///
    /// For the toolchain backend the message is the subprocess stderr verbatim.
    #[error("Signing failed: {0}")]
    Signing(String),

    /// The external cryptographic toolchain could not be started.
    #[error("Toolchain error: {0}")]
    Toolchain(String),

    /// Manifest serialization or parsing failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// ZIP archive operation failed.
    ///
    /// Occurs while writing or reopening the `.pkpass` archive.
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Invalid builder configuration.
    ///
    /// A configuration value is invalid or conflicting options were specified.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Required credential inputs not configured.
    ///
    /// A build was attempted without a credential bundle or trust anchor.
    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    /// The produced archive failed structural validation.
    ///
    /// Unless the build was told to keep invalid output, the archive has
    /// already been removed when this is returned.
    #[error("Invalid archive: missing {missing:?}, nested {nested:?}")]
    InvalidArchive {
        /// Mandatory members absent from the archive's top level.
        missing: Vec<String>,
        /// Member names containing a path separator.
        nested: Vec<String>,
    },

    /// A detached signature did not verify.
    #[error("Signature verification failed: {0}")]
    Verification(String),
}
