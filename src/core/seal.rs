//! Document sealing.
//!
//! Every uploaded file is wrapped in a [`DocumentSeal`]: a SHA-512 digest of
//! the transmitted payload plus the time it was taken. Files that already
//! carry a `VERUM_OMNIS_SEAL:` marker (in their name or their decoded text)
//! keep the embedded digest and timestamp and are flagged as sealed on
//! arrival.

use std::sync::LazyLock;

use base64::Engine;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::hashing;

pub const SEAL_MARKER_PREFIX: &str = "VERUM_OMNIS_SEAL:";

static SEAL_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^VERUM_OMNIS_SEAL:([a-f0-9]{128})\|(\d+)\|(.+)$")
        .expect("seal marker pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSeal {
    /// Lowercase hex SHA-512 digest.
    pub digest: String,
    pub timestamp: DateTime<Utc>,
    /// Original filename.
    pub filename: String,
    pub mime_type: String,
    pub size: u64,
    /// True when the document already carried a seal marker on arrival.
    pub sealed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedDocument {
    pub name: String,
    pub mime_type: String,
    /// Base64 payload exactly as transmitted upstream.
    pub data: String,
    pub seal: DocumentSeal,
}

/// Seal an uploaded document, reusing an embedded seal when one is present.
pub fn seal(filename: &str, mime_type: &str, base64_data: &str, byte_size: u64) -> SealedDocument {
    seal_at(filename, mime_type, base64_data, byte_size, Utc::now())
}

pub(crate) fn seal_at(
    filename: &str,
    mime_type: &str,
    base64_data: &str,
    byte_size: u64,
    now: DateTime<Utc>,
) -> SealedDocument {
    let seal = match detect_existing_seal(filename, base64_data) {
        Some(existing) => DocumentSeal {
            mime_type: mime_type.to_string(),
            size: byte_size,
            ..existing
        },
        None => DocumentSeal {
            digest: hashing::digest_str(base64_data),
            timestamp: now,
            filename: filename.to_string(),
            mime_type: mime_type.to_string(),
            size: byte_size,
            sealed: false,
        },
    };

    tracing::debug!(
        filename,
        sealed = seal.sealed,
        digest = %format_for_display(&seal),
        "document sealed"
    );

    SealedDocument {
        name: filename.to_string(),
        mime_type: mime_type.to_string(),
        data: base64_data.to_string(),
        seal,
    }
}

/// Look for a seal marker in the filename, then in the decoded payload.
///
/// Payloads that are not valid base64 or do not decode to UTF-8 text are
/// treated as unsealed.
pub fn detect_existing_seal(filename: &str, base64_data: &str) -> Option<DocumentSeal> {
    if let Some(seal) = parse_marker(filename, 0) {
        return Some(seal);
    }

    let compact: String = base64_data
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(compact)
        .ok()?;
    let size = decoded.len() as u64;
    let text = String::from_utf8(decoded).ok()?;
    parse_marker(&text, size)
}

fn parse_marker(haystack: &str, size: u64) -> Option<DocumentSeal> {
    let captures = SEAL_MARKER.captures(haystack)?;
    let millis: i64 = captures[2].parse().ok()?;
    let timestamp = DateTime::from_timestamp_millis(millis)?;
    Some(DocumentSeal {
        digest: captures[1].to_string(),
        timestamp,
        filename: captures[3].trim_end_matches('\r').to_string(),
        mime_type: String::new(),
        size,
        sealed: true,
    })
}

/// Recompute the digest of `data` and compare it with `expected_digest`.
pub fn verify(data: &str, expected_digest: &str) -> bool {
    hashing::digest_str(data) == expected_digest
}

/// Serialize a seal into the marker grammar for embedding in a document.
pub fn create_marker(seal: &DocumentSeal) -> String {
    format!(
        "{SEAL_MARKER_PREFIX}{}|{}|{}",
        seal.digest,
        seal.timestamp.timestamp_millis(),
        seal.filename
    )
}

/// Abbreviated digest: first and last 16 characters.
pub fn format_for_display(seal: &DocumentSeal) -> String {
    abbreviate_digest(&seal.digest)
}

pub fn abbreviate_digest(digest: &str) -> String {
    if digest.len() <= 32 || !digest.is_ascii() {
        return digest.to_string();
    }
    format!("{}...{}", &digest[..16], &digest[digest.len() - 16..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD;

    fn encode(text: &str) -> String {
        STANDARD.encode(text.as_bytes())
    }

    fn sample_digest() -> String {
        "ab".repeat(64)
    }

    #[test]
    fn fresh_upload_is_sealed_with_digest_of_payload() {
        let data = encode("witness statement");
        let sealed = seal("statement.txt", "text/plain", &data, 17);

        assert!(!sealed.seal.sealed);
        assert_eq!(sealed.seal.digest, hashing::digest_str(&data));
        assert_eq!(sealed.seal.filename, "statement.txt");
        assert_eq!(sealed.seal.mime_type, "text/plain");
        assert_eq!(sealed.seal.size, 17);
        assert_eq!(sealed.data, data);
    }

    #[test]
    fn sealing_identical_content_twice_yields_same_digest() {
        let data = encode("same bytes");
        let first = seal("a.txt", "text/plain", &data, 10);
        let second = seal("b.txt", "text/plain", &data, 10);
        assert_eq!(first.seal.digest, second.seal.digest);
    }

    #[test]
    fn verify_accepts_only_original_content() {
        let data = encode("original");
        let sealed = seal("a.txt", "text/plain", &data, 8);
        assert!(verify(&data, &sealed.seal.digest));
        assert!(!verify(&encode("originaL"), &sealed.seal.digest));
    }

    #[test]
    fn detects_marker_in_decoded_content() {
        let digest = sample_digest();
        let content = format!("{SEAL_MARKER_PREFIX}{digest}|1700000000000|report.pdf\nbody");
        let seal = detect_existing_seal("upload.txt", &encode(&content)).expect("seal");

        assert!(seal.sealed);
        assert_eq!(seal.digest, digest);
        assert_eq!(seal.filename, "report.pdf");
        assert_eq!(seal.timestamp.timestamp_millis(), 1_700_000_000_000);
        assert_eq!(seal.size, content.len() as u64);
    }

    #[test]
    fn detects_marker_in_filename() {
        let digest = sample_digest();
        let filename = format!("{SEAL_MARKER_PREFIX}{digest}|1700000000000|report.pdf");
        let seal = detect_existing_seal(&filename, "not base64 at all!").expect("seal");
        assert_eq!(seal.filename, "report.pdf");
        assert_eq!(seal.size, 0);
    }

    #[test]
    fn text_without_marker_is_unsealed() {
        assert!(detect_existing_seal("notes.txt", &encode("just notes")).is_none());
    }

    #[test]
    fn marker_requires_full_length_digest() {
        let short = "ab".repeat(63);
        let content = format!("{SEAL_MARKER_PREFIX}{short}|1700000000000|report.pdf");
        assert!(detect_existing_seal("x.txt", &encode(&content)).is_none());
    }

    #[test]
    fn binary_payload_fails_closed() {
        let binary = STANDARD.encode([0xff, 0xfe, 0x00, 0x81, 0x9c]);
        assert!(detect_existing_seal("image.png", &binary).is_none());
        assert!(detect_existing_seal("image.png", "%%%").is_none());
    }

    #[test]
    fn resealing_marked_document_keeps_embedded_seal() {
        let digest = sample_digest();
        let content = format!("{SEAL_MARKER_PREFIX}{digest}|1700000000000|report.pdf");
        let sealed = seal("copy.txt", "text/plain", &encode(&content), 42);

        assert!(sealed.seal.sealed);
        assert_eq!(sealed.seal.digest, digest);
        assert_eq!(sealed.seal.mime_type, "text/plain");
        assert_eq!(sealed.seal.size, 42);
        assert_eq!(sealed.name, "copy.txt");
    }

    #[test]
    fn marker_round_trips_through_detection() {
        let now = DateTime::from_timestamp_millis(1_700_000_123_456).expect("timestamp");
        let sealed = seal_at("evidence.txt", "text/plain", &encode("evidence"), 8, now);
        let marker = create_marker(&sealed.seal);

        assert!(marker.starts_with(SEAL_MARKER_PREFIX));
        assert!(marker.ends_with("|1700000123456|evidence.txt"));

        let detected = detect_existing_seal("carrier.txt", &encode(&marker)).expect("seal");
        assert_eq!(detected.digest, sealed.seal.digest);
        assert_eq!(detected.timestamp, now);
    }

    #[test]
    fn display_form_abbreviates_digest() {
        let digest = format!("{}{}", "0".repeat(64), "f".repeat(64));
        assert_eq!(
            abbreviate_digest(&digest),
            "0000000000000000...ffffffffffffffff"
        );
        assert_eq!(abbreviate_digest("short"), "short");
    }
}
