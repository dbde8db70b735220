//! Key material, signing backends and signature verification.

pub mod credentials;
pub mod signer;
#[cfg(test)]
pub(crate) mod testing;
pub mod toolchain;
pub mod verify;

pub use credentials::{common_name, KeyMaterial, TrustAnchor};
pub use signer::{CredentialExtractor, ManifestSigner, NativeSigner, SigningBackend};
pub use toolchain::OpenSslToolchain;
pub use verify::{verify_archive, verify_signature};
