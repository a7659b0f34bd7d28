//! Deterministic logical ids
//!
//! A logical id is the alphanumeric part of the construct path followed by
//! eight uppercase hex digits of its SHA-256, so ids stay stable across
//! re-composition and two paths that sanitize alike still differ.

use sha2::{Digest, Sha256};

/// CloudFormation caps logical ids at 255 characters
const MAX_HUMAN_LEN: usize = 240;

/// Keep only ASCII letters and digits
pub fn sanitize(path: &str) -> String {
    path.chars().filter(char::is_ascii_alphanumeric).collect()
}

pub fn logical_id(path: &str) -> String {
    let digest = Sha256::digest(path.as_bytes());
    let mut human = sanitize(path);
    human.truncate(MAX_HUMAN_LEN);
    format!("{}{}", human, hex::encode_upper(&digest[..4]))
}
