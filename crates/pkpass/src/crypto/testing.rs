//! Throwaway certificate fixtures for unit tests.

use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::ec::{EcGroup, EcKey};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkcs12::Pkcs12;
use openssl::pkey::{PKey, Private};
use openssl::x509::extension::{BasicConstraints, KeyUsage};
use openssl::x509::{X509Builder, X509NameBuilder, X509};

/// Generate a P-256 key.
pub fn generate_ec_key() -> PKey<Private> {
    let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
    let ec_key = EcKey::generate(&group).unwrap();
    PKey::from_ec_key(ec_key).unwrap()
}

fn builder_for(common_name: &str, serial: u32, key: &PKey<Private>) -> X509Builder {
    let mut name_builder = X509NameBuilder::new().unwrap();
    name_builder.append_entry_by_text("CN", common_name).unwrap();
    let name = name_builder.build();

    let mut builder = X509Builder::new().unwrap();
    builder.set_version(2).unwrap();

    let serial = BigNum::from_u32(serial).unwrap();
    builder
        .set_serial_number(&serial.to_asn1_integer().unwrap())
        .unwrap();

    builder.set_subject_name(&name).unwrap();
    builder.set_pubkey(key).unwrap();

    let not_before = Asn1Time::days_from_now(0).unwrap();
    let not_after = Asn1Time::days_from_now(365).unwrap();
    builder.set_not_before(&not_before).unwrap();
    builder.set_not_after(&not_after).unwrap();
    builder
}

/// Self-signed CA standing in for the intermediate authority.
pub fn generate_ca(common_name: &str) -> (PKey<Private>, X509) {
    let key = generate_ec_key();
    let mut builder = builder_for(common_name, 1, &key);

    let mut name_builder = X509NameBuilder::new().unwrap();
    name_builder.append_entry_by_text("CN", common_name).unwrap();
    builder.set_issuer_name(&name_builder.build()).unwrap();
    builder
        .append_extension(BasicConstraints::new().critical().ca().build().unwrap())
        .unwrap();
    builder
        .append_extension(
            KeyUsage::new()
                .critical()
                .key_cert_sign()
                .crl_sign()
                .build()
                .unwrap(),
        )
        .unwrap();
    builder.sign(&key, MessageDigest::sha256()).unwrap();
    (key, builder.build())
}

/// Identity certificate issued by `ca_cert`.
pub fn generate_leaf(
    common_name: &str,
    ca_key: &PKey<Private>,
    ca_cert: &X509,
) -> (PKey<Private>, X509) {
    let key = generate_ec_key();
    let mut builder = builder_for(common_name, 2, &key);
    builder.set_issuer_name(ca_cert.subject_name()).unwrap();
    builder.sign(ca_key, MessageDigest::sha256()).unwrap();
    (key, builder.build())
}

/// DER PKCS#12 bundle holding `key` and `cert`.
pub fn pkcs12_bundle(key: &PKey<Private>, cert: &X509, password: &str) -> Vec<u8> {
    let mut builder = Pkcs12::builder();
    builder.name("pass-signing").pkey(key).cert(cert);
    builder.build2(password).unwrap().to_der().unwrap()
}
