//! Signing capability interface and the in-process OpenSSL backend.
//!
//! The pipeline only talks to [`SigningBackend`]: one operation to derive key
//! material from a credential bundle, one to produce a detached signature.
//! [`NativeSigner`] does both through the linked OpenSSL library;
//! [`OpenSslToolchain`](super::toolchain::OpenSslToolchain) shells out to the
//! `openssl` executable and honours the same failure contract.

use super::credentials::{KeyMaterial, TrustAnchor};
use crate::{Error, Result};
use openssl::pkcs7::{Pkcs7, Pkcs7Flags};
use openssl::stack::Stack;
use secrecy::SecretString;
use std::fs;
use std::path::Path;

/// Derives signing key material from a password-protected credential bundle.
pub trait CredentialExtractor {
    /// Extract the private key and identity certificate from `bundle`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Credential`] when the bundle cannot be decrypted or
    /// parsed. The message includes the backend's own diagnostic text.
    fn extract(&self, bundle: &Path, password: &SecretString) -> Result<KeyMaterial>;
}

/// Produces detached signatures over manifest bytes.
pub trait ManifestSigner {
    /// Sign exactly `manifest` and return a DER PKCS#7 signed-data blob.
    ///
    /// The blob embeds the identity certificate and the trust anchor and does
    /// not contain the manifest itself.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Signing`] if no signature could be produced.
    fn sign(&self, manifest: &[u8], key: &KeyMaterial, trust_anchor: &TrustAnchor)
        -> Result<Vec<u8>>;
}

/// Everything the build pipeline needs from a signing implementation.
pub trait SigningBackend: CredentialExtractor + ManifestSigner {
    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// Signs through the linked OpenSSL library, without subprocesses.
///
/// Bundles protected with legacy algorithms (RC2-40) only decode if the
/// linked OpenSSL has them enabled; use the toolchain backend with
/// `-legacy` otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeSigner;

impl NativeSigner {
    /// Create the native backend.
    pub fn new() -> Self {
        Self
    }
}

impl CredentialExtractor for NativeSigner {
    fn extract(&self, bundle: &Path, password: &SecretString) -> Result<KeyMaterial> {
        let p12_data = fs::read(bundle).map_err(|e| {
            Error::Credential(format!("Failed to read {}: {}", bundle.display(), e))
        })?;
        KeyMaterial::from_pkcs12(&p12_data, password)
    }
}

impl ManifestSigner for NativeSigner {
    fn sign(
        &self,
        manifest: &[u8],
        key: &KeyMaterial,
        trust_anchor: &TrustAnchor,
    ) -> Result<Vec<u8>> {
        let mut certs = Stack::new()
            .map_err(|e| Error::Signing(format!("Failed to allocate certificate stack: {}", e)))?;
        certs
            .push(trust_anchor.certificate().clone())
            .map_err(|e| Error::Signing(format!("Failed to add trust anchor: {}", e)))?;

        let pkcs7 = Pkcs7::sign(
            &key.certificate,
            &key.private_key,
            &certs,
            manifest,
            Pkcs7Flags::BINARY | Pkcs7Flags::DETACHED,
        )
        .map_err(|e| Error::Signing(format!("Failed to build PKCS#7 signature: {}", e)))?;

        let der = pkcs7
            .to_der()
            .map_err(|e| Error::Signing(format!("Failed to encode signature: {}", e)))?;

        if der.is_empty() {
            return Err(Error::Signing("Signer produced an empty signature".into()));
        }

        Ok(der)
    }
}

impl SigningBackend for NativeSigner {
    fn name(&self) -> &'static str {
        "native"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::testing::{generate_ca, generate_leaf, pkcs12_bundle};
    use crate::crypto::verify::verify_signature;
    use tempfile::TempDir;

    fn fixture() -> (KeyMaterial, TrustAnchor) {
        let (ca_key, ca_cert) = generate_ca("Test WWDR");
        let (key, cert) = generate_leaf("Pass Type ID: pass.test", &ca_key, &ca_cert);
        (KeyMaterial::new(cert, key).unwrap(), TrustAnchor::new(ca_cert))
    }

    #[test]
    fn test_native_sign_verifies() {
        let (key, anchor) = fixture();
        let manifest = br#"{ "pass.json": "da39a3ee5e6b4b0d3255bfef95601890afd80709" }"#;

        let signature = NativeSigner::new().sign(manifest, &key, &anchor).unwrap();
        assert!(!signature.is_empty());

        let signer = verify_signature(manifest, &signature, &anchor).unwrap();
        assert_eq!(
            signer.to_der().unwrap(),
            key.certificate.to_der().unwrap()
        );
    }

    #[test]
    fn test_native_sign_is_detached() {
        let (key, anchor) = fixture();
        let manifest = b"MANIFEST-PAYLOAD-MARKER";

        let signature = NativeSigner::new().sign(manifest, &key, &anchor).unwrap();

        assert!(!signature
            .windows(manifest.len())
            .any(|w| w == manifest.as_slice()));
    }

    #[test]
    fn test_two_signatures_both_verify() {
        let (key, anchor) = fixture();
        let manifest = b"{}";

        let first = NativeSigner::new().sign(manifest, &key, &anchor).unwrap();
        let second = NativeSigner::new().sign(manifest, &key, &anchor).unwrap();

        verify_signature(manifest, &first, &anchor).unwrap();
        verify_signature(manifest, &second, &anchor).unwrap();
    }

    #[test]
    fn test_signature_bound_to_bytes() {
        let (key, anchor) = fixture();
        let signature = NativeSigner::new().sign(b"{\"a\":\"1\"}", &key, &anchor).unwrap();

        let result = verify_signature(b"{\"a\":\"2\"}", &signature, &anchor);
        assert!(matches!(result, Err(Error::Verification(_))));
    }

    #[test]
    fn test_native_extract() {
        let (ca_key, ca_cert) = generate_ca("Test WWDR");
        let (key, cert) = generate_leaf("leaf", &ca_key, &ca_cert);
        let temp_dir = TempDir::new().unwrap();
        let bundle = temp_dir.path().join("cert.p12");
        fs::write(&bundle, pkcs12_bundle(&key, &cert, "pw")).unwrap();

        let signer = NativeSigner::new();
        let material = signer
            .extract(&bundle, &SecretString::new("pw".into()))
            .unwrap();
        assert!(material.private_key.public_eq(&key));

        let wrong = signer.extract(&bundle, &SecretString::new("nope".into()));
        assert!(matches!(wrong, Err(Error::Credential(_))));

        let missing = signer.extract(
            &temp_dir.path().join("missing.p12"),
            &SecretString::new("pw".into()),
        );
        assert!(matches!(missing, Err(Error::Credential(_))));
    }
}
