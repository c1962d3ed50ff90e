use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use http::header::{HeaderMap, HeaderName, HeaderValue};

use super::base::{Component, SignatureBase, SignatureParams};
use super::digest;
use super::fields::serialize_byte_sequence;
use super::message::HttpMessage;
use crate::config::Settings;
use crate::error::SignatureError;
use crate::keys::{HttpJwksSource, JwksSource, KeyResolver};

pub const SIGNATURE_INPUT: HeaderName = HeaderName::from_static("signature-input");
pub const SIGNATURE: HeaderName = HeaderName::from_static("signature");

/// Header values produced by signing a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureMetadata {
    pub label: String,
    pub key_id: String,
    /// `<label>=(...);created=..;keyid="..";alg=".."`
    pub signature_input: String,
    /// `<label>=:<base64>:`
    pub signature: String,
}

impl SignatureMetadata {
    /// Sets `Signature-Input` and `Signature`, replacing earlier values.
    pub fn apply(&self, headers: &mut HeaderMap) -> Result<(), SignatureError> {
        headers.insert(SIGNATURE_INPUT, HeaderValue::from_str(&self.signature_input)?);
        headers.insert(SIGNATURE, HeaderValue::from_str(&self.signature)?);
        Ok(())
    }
}

/// Signs messages with the private keys held by a [`KeyResolver`].
pub struct MessageSigner<S = HttpJwksSource> {
    resolver: Arc<KeyResolver<S>>,
    label: String,
}

impl<S: JwksSource> MessageSigner<S> {
    pub fn new(resolver: Arc<KeyResolver<S>>, label: impl Into<String>) -> Self {
        Self {
            resolver,
            label: label.into(),
        }
    }

    pub fn from_settings(resolver: Arc<KeyResolver<S>>, settings: &Settings) -> Self {
        Self::new(resolver, settings.signature_label.clone())
    }

    pub fn sign<M: HttpMessage + ?Sized>(
        &self,
        message: &M,
        key_id: &str,
        covered: &[Component],
    ) -> Result<SignatureMetadata, SignatureError> {
        self.sign_at(message, key_id, covered, unix_now())
    }

    /// Like [`sign`](Self::sign) with an explicit `created` timestamp.
    pub fn sign_at<M: HttpMessage + ?Sized>(
        &self,
        message: &M,
        key_id: &str,
        covered: &[Component],
        created: u64,
    ) -> Result<SignatureMetadata, SignatureError> {
        let key = self.resolver.private_key(key_id)?;
        let params = SignatureParams {
            created: Some(created),
            key_id: key.key_id().to_string(),
        }
        .serialize(covered);
        let base = SignatureBase::build(message, covered, &params)?;
        let signature = key.sign(base.as_bytes())?;

        Ok(SignatureMetadata {
            label: self.label.clone(),
            key_id: key.key_id().to_string(),
            signature_input: format!("{}={params}", self.label),
            signature: format!("{}={}", self.label, serialize_byte_sequence(&signature)),
        })
    }

    /// Sets `Content-Digest` from `body`, signs, and applies the signature
    /// headers to `message`.
    pub fn sign_message<M: HttpMessage + ?Sized>(
        &self,
        message: &mut M,
        body: &[u8],
        key_id: &str,
        covered: &[Component],
    ) -> Result<SignatureMetadata, SignatureError> {
        digest::inject(message.headers_mut(), body)?;
        let metadata = self.sign(&*message, key_id, covered)?;
        metadata.apply(message.headers_mut())?;
        Ok(metadata)
    }
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default()
}

/// First characters of the signature for log lines, or `NO SIGNATURE`.
pub fn short_signature(headers: &HeaderMap) -> String {
    headers
        .get(SIGNATURE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(':').nth(1))
        .map(|encoded| format!("{}..", encoded.chars().take(6).collect::<String>()))
        .unwrap_or_else(|| "NO SIGNATURE".to_string())
}
