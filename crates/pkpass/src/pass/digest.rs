//! SHA-1 content digests for pass assets.

use crate::Result;
use sha1::{Digest, Sha1};
use std::fs;
use std::path::Path;

/// Length of a hex-encoded SHA-1 digest.
pub const DIGEST_HEX_LEN: usize = 40;

/// Hash `data` and return the lowercase hex digest.
pub fn digest_bytes(data: &[u8]) -> String {
    hex::encode(Sha1::digest(data))
}

/// Read a file fully and return its lowercase hex digest.
///
/// # Errors
///
/// Returns [`crate::Error::Io`] if the file cannot be read.
pub fn digest_file(path: impl AsRef<Path>) -> Result<String> {
    let data = fs::read(path.as_ref())?;
    Ok(digest_bytes(&data))
}
