//! Pass contents: staging, digests and the manifest.
//!
//! A pass is a flat set of asset files plus `manifest.json` (file name to
//! SHA-1) and `signature` (detached PKCS#7 over the manifest bytes).

pub mod digest;
pub mod manifest;
pub mod staging;

pub use digest::{digest_bytes, digest_file};
pub use manifest::{Manifest, MANIFEST_FILE, SIGNATURE_FILE};
pub use staging::{AssetFilter, StagingArea};
