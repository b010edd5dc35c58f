//! SHA-512 digests rendered as lowercase hex.

use sha2::{Digest, Sha512};

/// Length of a hex-encoded SHA-512 digest.
pub const DIGEST_HEX_LEN: usize = 128;

/// Digest arbitrary bytes.
pub fn digest_hex(data: impl AsRef<[u8]>) -> String {
    hex::encode(Sha512::digest(data.as_ref()))
}

/// Digest a string's UTF-8 encoding.
pub fn digest_str(text: &str) -> String {
    digest_hex(text.as_bytes())
}

/// Returns true when `value` has the shape of a digest produced here.
pub fn is_digest(value: &str) -> bool {
    value.len() == DIGEST_HEX_LEN
        && value
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}
