//! Key material and trust anchor loading.
//!
//! The signing identity (private key + certificate) comes out of a
//! password-protected PKCS#12 bundle once per build and is dropped when the
//! build ends. The trust anchor is the intermediate CA certificate that gets
//! embedded next to the identity so verifiers can build the chain.

use crate::{Error, Result};
use openssl::pkcs12::Pkcs12;
use openssl::pkey::{PKey, Private};
use openssl::x509::X509;
use secrecy::{ExposeSecret, SecretString};
use std::fs;
use std::path::Path;

/// Private key and identity certificate for one build.
///
/// # Security
///
/// Holds the unencrypted private key. Never log it and let it drop as soon
/// as the signature is produced.
pub struct KeyMaterial {
    /// Identity certificate whose public key matches `private_key`.
    pub certificate: X509,
    /// Unencrypted private key.
    pub private_key: PKey<Private>,
}

impl KeyMaterial {
    /// Pair a certificate with its private key, checking they belong together.
    pub fn new(certificate: X509, private_key: PKey<Private>) -> Result<Self> {
        validate_key_pair(&certificate, &private_key)?;
        Ok(Self {
            certificate,
            private_key,
        })
    }

    /// Decode a PKCS#12 bundle in-process.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Credential`] if the bundle is malformed, the password
    /// is wrong, the bundle uses an encryption scheme the linked OpenSSL does
    /// not enable, or the key and certificate do not match.
    pub fn from_pkcs12(p12_data: &[u8], password: &SecretString) -> Result<Self> {
        let pkcs12 = Pkcs12::from_der(p12_data)
            .map_err(|e| Error::Credential(format!("Invalid PKCS#12: {}", e)))?;

        let parsed = pkcs12
            .parse2(password.expose_secret().as_str())
            .map_err(|e| Error::Credential(format!("Failed to parse PKCS#12: {}", e)))?;

        let certificate = parsed
            .cert
            .ok_or_else(|| Error::Credential("No certificate in PKCS#12".into()))?;

        let private_key = parsed
            .pkey
            .ok_or_else(|| Error::Credential("No private key in PKCS#12".into()))?;

        Self::new(certificate, private_key)
    }

    /// Parse PEM output of a key/certificate extraction.
    pub fn from_pem(cert_pem: &[u8], key_pem: &[u8]) -> Result<Self> {
        let certificate = X509::from_pem(cert_pem)
            .map_err(|e| Error::Credential(format!("Failed to load certificate: {}", e)))?;

        let private_key = PKey::private_key_from_pem(key_pem)
            .map_err(|e| Error::Credential(format!("Failed to load private key: {}", e)))?;

        Self::new(certificate, private_key)
    }

    /// Subject common name of the identity certificate, for logging.
    pub fn subject_common_name(&self) -> Option<String> {
        common_name(&self.certificate)
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("subject", &self.subject_common_name())
            .field("private_key", &"[REDACTED]")
            .finish()
    }
}

/// Intermediate CA certificate countersigning the identity.
#[derive(Clone)]
pub struct TrustAnchor {
    certificate: X509,
}

impl TrustAnchor {
    /// Wrap an already parsed certificate.
    pub fn new(certificate: X509) -> Self {
        Self { certificate }
    }

    /// Load a PEM (or DER) certificate file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read(path).map_err(|e| {
            Error::TrustAnchor(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_bytes(&data)
    }

    /// Parse PEM, falling back to DER.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let certificate = X509::from_pem(data)
            .or_else(|_| X509::from_der(data))
            .map_err(|e| Error::TrustAnchor(format!("Failed to parse certificate: {}", e)))?;
        Ok(Self { certificate })
    }

    /// The anchor certificate.
    pub fn certificate(&self) -> &X509 {
        &self.certificate
    }

    /// Subject common name, for logging.
    pub fn subject_common_name(&self) -> Option<String> {
        common_name(&self.certificate)
    }
}

impl std::fmt::Debug for TrustAnchor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrustAnchor")
            .field("subject", &self.subject_common_name())
            .finish()
    }
}

/// Check the private key matches the certificate's public key.
fn validate_key_pair(cert: &X509, private_key: &PKey<Private>) -> Result<()> {
    let cert_public_key = cert.public_key().map_err(|e| {
        Error::Credential(format!(
            "Failed to extract public key from certificate: {}",
            e
        ))
    })?;

    if !private_key.public_eq(&cert_public_key) {
        return Err(Error::Credential(
            "Private key does not match certificate public key".into(),
        ));
    }

    Ok(())
}

/// Subject common name of `cert`, if it has a UTF-8 one.
pub fn common_name(cert: &X509) -> Option<String> {
    cert.subject_name()
        .entries_by_nid(openssl::nid::Nid::COMMONNAME)
        .next()
        .and_then(|entry| String::from_utf8(entry.data().as_slice().to_vec()).ok())
}
