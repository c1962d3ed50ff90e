use std::fmt;

use http::header::{HeaderMap, HeaderName, HeaderValue};
use sha2::{Digest, Sha256};

use super::fields::{dictionary_get, parse_byte_sequence, parse_dictionary, serialize_byte_sequence};
use super::message::combined_header;
use crate::error::SignatureError;

pub const CONTENT_DIGEST: HeaderName = HeaderName::from_static("content-digest");
pub const SHA_256: &str = "sha-256";

/// A SHA-256 digest of a message body, as carried in `Content-Digest`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDigestValue {
    digest: [u8; 32],
}

impl ContentDigestValue {
    pub fn as_bytes(&self) -> &[u8] {
        &self.digest
    }

    /// `sha-256=:<base64>:`
    pub fn header_value(&self) -> String {
        format!("{SHA_256}={}", serialize_byte_sequence(&self.digest))
    }
}

impl fmt::Display for ContentDigestValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.header_value())
    }
}

pub fn compute(body: &[u8]) -> ContentDigestValue {
    ContentDigestValue {
        digest: Sha256::digest(body).into(),
    }
}

/// Checks a `Content-Digest` value against the raw body bytes.
///
/// `body` must be the bytes exactly as received. Hashing a parsed and
/// re-encoded body changes whitespace and key order and breaks the check.
pub fn verify(header: Option<&str>, body: &[u8]) -> Result<(), SignatureError> {
    let header = header.ok_or(SignatureError::MissingContentDigest)?;
    let members = parse_dictionary(header).map_err(|_| SignatureError::ContentDigestMismatch)?;
    let claimed = dictionary_get(&members, SHA_256)
        .ok_or(SignatureError::ContentDigestMismatch)
        .and_then(|value| {
            parse_byte_sequence(value).map_err(|_| SignatureError::ContentDigestMismatch)
        })?;

    if claimed.as_slice() != compute(body).as_bytes() {
        return Err(SignatureError::ContentDigestMismatch);
    }
    Ok(())
}

pub fn verify_headers(headers: &HeaderMap, body: &[u8]) -> Result<(), SignatureError> {
    if !headers.contains_key(CONTENT_DIGEST) {
        return Err(SignatureError::MissingContentDigest);
    }
    // present but not UTF-8 cannot match anything we produce
    let header = combined_header(headers, CONTENT_DIGEST.as_str())
        .ok_or(SignatureError::ContentDigestMismatch)?;
    verify(Some(&header), body)
}

/// Computes the digest of `body` and sets the `Content-Digest` header.
pub fn inject(headers: &mut HeaderMap, body: &[u8]) -> Result<ContentDigestValue, SignatureError> {
    let digest = compute(body);
    headers.insert(CONTENT_DIGEST, HeaderValue::from_str(&digest.header_value())?);
    Ok(digest)
}
