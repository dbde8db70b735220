//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::hash::MessageDigest;
use openssl::pkcs12::Pkcs12;
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::x509::extension::{BasicConstraints, KeyUsage};
use openssl::x509::{X509Name, X509NameBuilder, X509};
use pkpass::PassBuilder;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const PASSWORD: &str = "quest";

pub const PASS_JSON: &[u8] = br#"{
  "formatVersion": 1,
  "passTypeIdentifier": "pass.com.example.questcard",
  "serialNumber": "0001",
  "teamIdentifier": "ABCDE12345",
  "organizationName": "Quest",
  "description": "Quest card"
}"#;

/// Assets directory, credential bundle and trust anchor on disk.
pub struct PassFixture {
    pub dir: TempDir,
    pub assets: PathBuf,
    pub bundle: PathBuf,
    pub anchor: PathBuf,
    pub output: PathBuf,
}

impl PassFixture {
    /// `icon.png`, `logo.png` and `pass.json`, signed by a fresh CA.
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let assets = dir.path().join("QuestCard.pass");
        fs::create_dir(&assets).unwrap();
        fs::write(assets.join("icon.png"), png_bytes(0x11)).unwrap();
        fs::write(assets.join("logo.png"), png_bytes(0x22)).unwrap();
        fs::write(assets.join("pass.json"), PASS_JSON).unwrap();

        let (ca_key, ca_cert) = certificate_authority();
        let (key, cert) = identity(&ca_key, &ca_cert);

        let bundle = dir.path().join("certificate.p12");
        let mut p12 = Pkcs12::builder();
        p12.name("Pass Type ID").pkey(&key).cert(&cert);
        fs::write(&bundle, p12.build2(PASSWORD).unwrap().to_der().unwrap()).unwrap();

        let anchor = dir.path().join("wwdr.pem");
        fs::write(&anchor, ca_cert.to_pem().unwrap()).unwrap();

        let output = dir.path().join("QuestCard.pkpass");

        Self {
            dir,
            assets,
            bundle,
            anchor,
            output,
        }
    }

    /// Builder wired to this fixture with the in-process backend.
    pub fn builder(&self) -> PassBuilder {
        PassBuilder::new()
            .assets_dir(&self.assets)
            .pkcs12(&self.bundle)
            .password(PASSWORD)
            .trust_anchor(&self.anchor)
            .output(&self.output)
            .native()
    }

    pub fn asset(&self, name: &str) -> Vec<u8> {
        fs::read(self.assets.join(name)).unwrap()
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

/// Not a decodable image, but carries the PNG signature and some payload.
pub fn png_bytes(fill: u8) -> Vec<u8> {
    let mut data = vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];
    data.extend(std::iter::repeat(fill).take(256));
    data
}

fn name(common_name: &str) -> X509Name {
    let mut builder = X509NameBuilder::new().unwrap();
    builder.append_entry_by_text("O", "Quest Test").unwrap();
    builder.append_entry_by_text("CN", common_name).unwrap();
    builder.build()
}

fn rsa_key() -> PKey<Private> {
    PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap()
}

fn certificate_authority() -> (PKey<Private>, X509) {
    let key = rsa_key();
    let subject = name("Test Worldwide Developer Relations");

    let mut builder = X509::builder().unwrap();
    builder.set_version(2).unwrap();
    builder
        .set_serial_number(&BigNum::from_u32(1).unwrap().to_asn1_integer().unwrap())
        .unwrap();
    builder.set_subject_name(&subject).unwrap();
    builder.set_issuer_name(&subject).unwrap();
    builder.set_pubkey(&key).unwrap();
    builder.set_not_before(&Asn1Time::days_from_now(0).unwrap()).unwrap();
    builder.set_not_after(&Asn1Time::days_from_now(30).unwrap()).unwrap();
    builder
        .append_extension(BasicConstraints::new().critical().ca().build().unwrap())
        .unwrap();
    builder
        .append_extension(KeyUsage::new().critical().key_cert_sign().build().unwrap())
        .unwrap();
    builder.sign(&key, MessageDigest::sha256()).unwrap();

    (key, builder.build())
}

fn identity(ca_key: &PKey<Private>, ca_cert: &X509) -> (PKey<Private>, X509) {
    let key = rsa_key();

    let mut builder = X509::builder().unwrap();
    builder.set_version(2).unwrap();
    builder
        .set_serial_number(&BigNum::from_u32(2).unwrap().to_asn1_integer().unwrap())
        .unwrap();
    builder
        .set_subject_name(&name("Pass Type ID: pass.com.example.questcard"))
        .unwrap();
    builder.set_issuer_name(ca_cert.subject_name()).unwrap();
    builder.set_pubkey(&key).unwrap();
    builder.set_not_before(&Asn1Time::days_from_now(0).unwrap()).unwrap();
    builder.set_not_after(&Asn1Time::days_from_now(30).unwrap()).unwrap();
    builder.sign(ca_key, MessageDigest::sha256()).unwrap();

    (key, builder.build())
}
