//! Build signed wallet passes (`.pkpass`).
//!
//! A pass is a flat ZIP archive holding the pass assets, a `manifest.json`
//! mapping each asset to its SHA-1 digest, and a `signature` file with a
//! detached PKCS#7 signature over the manifest bytes.

pub mod archive;
pub mod builder;
pub mod config;
pub mod crypto;
pub mod error;
pub mod pass;

pub use archive::{create_pkpass, validate_pkpass, CompressionLevel, ValidationReport};
pub use builder::{BuildReport, BuildStage, PassBuilder};
pub use config::{AssetFilter, Backend, PassConfig};
pub use crypto::{
    verify_archive, verify_signature, KeyMaterial, NativeSigner, OpenSslToolchain,
    SigningBackend, TrustAnchor,
};
pub use error::Error;
pub use pass::{digest_bytes, digest_file, Manifest};

pub type Result<T> = std::result::Result<T, Error>;
