//! Whitespace-insensitive content fingerprint
//!
//! The fingerprint is the unit of change detection: two contents that differ
//! only in whitespace get the same fingerprint, so reformatting an input does
//! not trigger regeneration of everything downstream. It is deliberately
//! short (8 hex digits) because it is written into generated files and read
//! by humans comparing markers; it is not a security measure.

use std::sync::LazyLock;

use regex::Regex;
use sha2::{Digest, Sha256};

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Computes the 8-hex-digit fingerprint of a piece of content.
///
/// Whitespace runs are collapsed to a single space before hashing, so the
/// result is insensitive to indentation, line endings and trailing blanks.
pub fn fingerprint(content: &str) -> String {
    let normalized = WHITESPACE.replace_all(content, " ");
    let digest = Sha256::digest(normalized.as_bytes());
    let head: [u8; 4] = digest[..4].try_into().unwrap();
    format!("{:08x}", i32::from_le_bytes(head).unsigned_abs())
}
