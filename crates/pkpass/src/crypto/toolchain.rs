//! Signing through the `openssl` command-line tool.
//!
//! Key material is extracted with `openssl pkcs12` (PEM on stdout, password
//! handed over in an environment variable) and the manifest is signed with
//! `openssl smime -sign`, streaming the manifest on stdin and reading the DER
//! signature from stdout. Exit status 0 means success; anything else is a
//! failure whose stderr text is passed through unchanged.

use super::credentials::{KeyMaterial, TrustAnchor};
use super::signer::{CredentialExtractor, ManifestSigner, SigningBackend};
use crate::{Error, Result};
use secrecy::{ExposeSecret, SecretString};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::thread;
use tempfile::TempDir;
use tracing::debug;

/// Environment variable used to pass the bundle password to `openssl`.
const PASSWORD_ENV: &str = "PKPASS_BUNDLE_PASSWORD";

/// Subprocess-backed signer.
#[derive(Debug, Clone)]
pub struct OpenSslToolchain {
    program: PathBuf,
    legacy: bool,
}

impl OpenSslToolchain {
    /// Use `openssl` from `PATH` with legacy PKCS#12 support enabled.
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("openssl"),
            legacy: true,
        }
    }

    /// Use a specific `openssl` executable.
    pub fn program(mut self, program: impl AsRef<Path>) -> Self {
        self.program = program.as_ref().to_path_buf();
        self
    }

    /// Toggle `-legacy` on PKCS#12 extraction.
    ///
    /// Required by OpenSSL 3 for bundles encrypted with RC2/3DES, rejected by
    /// OpenSSL 1.1.
    pub fn legacy(mut self, legacy: bool) -> Self {
        self.legacy = legacy;
        self
    }

    /// Whether `-legacy` is passed.
    pub fn is_legacy(&self) -> bool {
        self.legacy
    }

    /// Configured executable.
    pub fn program_path(&self) -> &Path {
        &self.program
    }

    fn pkcs12_command(&self, bundle: &Path, password: &SecretString, select: &[&str]) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("pkcs12");
        if self.legacy {
            cmd.arg("-legacy");
        }
        cmd.arg("-in")
            .arg(bundle)
            .args(select)
            .arg("-passin")
            .arg(format!("env:{}", PASSWORD_ENV))
            .env(PASSWORD_ENV, password.expose_secret());
        cmd
    }

    fn run_extraction(&self, mut cmd: Command, what: &str) -> Result<Vec<u8>> {
        let output = self.run(&mut cmd, None)?;

        if !output.status.success() {
            return Err(Error::Credential(format!(
                "Failed to extract {}: {}",
                what,
                stderr_text(&output)
            )));
        }

        if output.stdout.is_empty() {
            return Err(Error::Credential(format!(
                "No {} in bundle: {}",
                what,
                stderr_text(&output)
            )));
        }

        Ok(output.stdout)
    }

    fn run(&self, cmd: &mut Command, stdin: Option<&[u8]>) -> Result<Output> {
        debug!(program = %self.program.display(), "running toolchain");

        cmd.stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| {
            Error::Toolchain(format!(
                "Failed to start {}: {}",
                self.program.display(),
                e
            ))
        })?;

        // Feed stdin from a helper thread so a child that fails before
        // reading it still gets waited on and its stderr collected.
        let writer = match stdin {
            Some(data) => {
                let mut pipe = child
                    .stdin
                    .take()
                    .ok_or_else(|| Error::Toolchain("Child stdin unavailable".into()))?;
                let data = data.to_vec();
                Some(thread::spawn(move || pipe.write_all(&data)))
            }
            None => None,
        };

        let output = child.wait_with_output()?;

        if let Some(writer) = writer {
            match writer.join() {
                Ok(Ok(())) => {}
                Ok(Err(e)) if e.kind() == io::ErrorKind::BrokenPipe => {
                    debug!(status = %output.status, "child closed stdin before reading it all");
                }
                Ok(Err(e)) if output.status.success() => return Err(Error::Io(e)),
                Ok(Err(e)) => debug!(error = %e, "stdin write failed"),
                Err(_) => return Err(Error::Toolchain("Stdin writer panicked".into())),
            }
        }

        Ok(output)
    }
}

impl Default for OpenSslToolchain {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialExtractor for OpenSslToolchain {
    fn extract(&self, bundle: &Path, password: &SecretString) -> Result<KeyMaterial> {
        if !bundle.is_file() {
            return Err(Error::Credential(format!(
                "Credential bundle not found: {}",
                bundle.display()
            )));
        }

        let key_pem = self.run_extraction(
            self.pkcs12_command(bundle, password, &["-nocerts", "-nodes"]),
            "private key",
        )?;
        let cert_pem = self.run_extraction(
            self.pkcs12_command(bundle, password, &["-clcerts", "-nokeys"]),
            "certificate",
        )?;

        KeyMaterial::from_pem(&cert_pem, &key_pem)
    }
}

impl ManifestSigner for OpenSslToolchain {
    fn sign(
        &self,
        manifest: &[u8],
        key: &KeyMaterial,
        trust_anchor: &TrustAnchor,
    ) -> Result<Vec<u8>> {
        // Key, certificate and anchor only live for the duration of this call.
        let workdir = TempDir::new()?;
        let key_path = workdir.path().join("key.pem");
        let cert_path = workdir.path().join("cert.pem");
        let anchor_path = workdir.path().join("anchor.pem");

        let key_pem = key
            .private_key
            .private_key_to_pem_pkcs8()
            .map_err(|e| Error::Signing(format!("Failed to encode private key: {}", e)))?;
        write_private(&key_path, &key_pem)?;

        let cert_pem = key
            .certificate
            .to_pem()
            .map_err(|e| Error::Signing(format!("Failed to encode certificate: {}", e)))?;
        fs::write(&cert_path, cert_pem)?;

        let anchor_pem = trust_anchor
            .certificate()
            .to_pem()
            .map_err(|e| Error::Signing(format!("Failed to encode trust anchor: {}", e)))?;
        fs::write(&anchor_path, anchor_pem)?;

        let mut cmd = Command::new(&self.program);
        cmd.args(["smime", "-binary", "-sign"])
            .arg("-certfile")
            .arg(&anchor_path)
            .arg("-signer")
            .arg(&cert_path)
            .arg("-inkey")
            .arg(&key_path)
            .args(["-outform", "DER"]);

        let output = self.run(&mut cmd, Some(manifest))?;

        if !output.status.success() {
            return Err(Error::Signing(stderr_text(&output)));
        }

        if output.stdout.is_empty() {
            return Err(Error::Signing(format!(
                "Signer produced no signature: {}",
                stderr_text(&output)
            )));
        }

        Ok(output.stdout)
    }
}

impl SigningBackend for OpenSslToolchain {
    fn name(&self) -> &'static str {
        "openssl-toolchain"
    }
}

fn stderr_text(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim_end().to_string()
}

#[cfg(unix)]
fn write_private(path: &Path, data: &[u8]) -> Result<()> {
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(data)?;
    Ok(())
}

#[cfg(not(unix))]
fn write_private(path: &Path, data: &[u8]) -> Result<()> {
    fs::write(path, data)?;
    Ok(())
}
