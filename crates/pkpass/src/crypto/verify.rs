//! Detached signature verification.

use super::credentials::TrustAnchor;
use crate::archive::read_archive_member;
use crate::pass::{MANIFEST_FILE, SIGNATURE_FILE};
use crate::{Error, Result};
use openssl::pkcs7::{Pkcs7, Pkcs7Flags};
use openssl::stack::Stack;
use openssl::x509::store::X509StoreBuilder;
use openssl::x509::X509;
use std::path::Path;

/// Verify a detached PKCS#7 `signature` over `manifest`.
///
/// The signer certificate embedded in the signature must chain to
/// `trust_anchor`. Returns the signer certificate on success.
///
/// # Errors
///
/// Returns [`Error::Verification`] if the blob is not PKCS#7, does not cover
/// exactly `manifest`, or its signer does not chain to the anchor.
pub fn verify_signature(
    manifest: &[u8],
    signature: &[u8],
    trust_anchor: &TrustAnchor,
) -> Result<X509> {
    let pkcs7 = Pkcs7::from_der(signature)
        .map_err(|e| Error::Verification(format!("Signature is not DER PKCS#7: {}", e)))?;

    let mut store = X509StoreBuilder::new()
        .map_err(|e| Error::Verification(format!("Failed to create trust store: {}", e)))?;
    store
        .add_cert(trust_anchor.certificate().clone())
        .map_err(|e| Error::Verification(format!("Failed to add trust anchor: {}", e)))?;
    let store = store.build();

    let extra = Stack::<X509>::new()
        .map_err(|e| Error::Verification(format!("Failed to allocate certificate stack: {}", e)))?;

    pkcs7
        .verify(&extra, &store, Some(manifest), None, Pkcs7Flags::BINARY)
        .map_err(|e| Error::Verification(e.to_string()))?;

    let signers = pkcs7
        .signers(&extra, Pkcs7Flags::empty())
        .map_err(|e| Error::Verification(format!("Failed to read signer: {}", e)))?;

    signers
        .iter()
        .next()
        .map(|cert| cert.to_owned())
        .ok_or_else(|| Error::Verification("Signature has no signer certificate".into()))
}

/// Verify the `signature` member of a `.pkpass` against its `manifest.json`.
pub fn verify_archive(path: impl AsRef<Path>, trust_anchor: &TrustAnchor) -> Result<X509> {
    let path = path.as_ref();
    let manifest = read_archive_member(path, MANIFEST_FILE)?;
    let signature = read_archive_member(path, SIGNATURE_FILE)?;
    verify_signature(&manifest, &signature, trust_anchor)
}
