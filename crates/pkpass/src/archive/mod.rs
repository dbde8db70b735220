//! `.pkpass` archive creation and structural validation.

pub mod create;
pub mod validate;

pub use create::{create_pkpass, CompressionLevel};
pub use validate::{check_zip_magic, read_archive_member, validate_pkpass, ValidationReport};
