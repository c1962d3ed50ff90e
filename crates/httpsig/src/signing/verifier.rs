use std::sync::Arc;
use std::time::Duration;

use rsa::pkcs1v15::{Signature, VerifyingKey};
use rsa::signature::Verifier;
use sha2::Sha256;
use tracing::debug;

use super::base::{Component, SIGNATURE_ALGORITHM, SignatureBase};
use super::digest;
use super::fields::{dictionary_get, parse_byte_sequence, parse_dictionary, parse_inner_list};
use super::message::{HttpMessage, combined_header};
use super::signer::{SIGNATURE, SIGNATURE_INPUT, unix_now};
use crate::config::Settings;
use crate::error::SignatureError;
use crate::keys::{HttpJwksSource, JwksSource, KeyResolver};

/// How far in the future a `created` timestamp may lie.
const ALLOWED_CLOCK_SKEW: u64 = 60;

/// A signature that passed verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedSignature {
    pub label: String,
    pub key_id: String,
    pub components: Vec<Component>,
    pub created: Option<u64>,
}

/// Verifies `Signature-Input` / `Signature` headers on incoming messages.
///
/// Every signature must cover the required components, `content-digest` by
/// default. A signature over fewer components binds nothing the caller
/// relies on and is rejected.
pub struct MessageVerifier<S = HttpJwksSource> {
    resolver: Arc<KeyResolver<S>>,
    max_age: Duration,
    required: Vec<Component>,
}

impl<S: JwksSource> MessageVerifier<S> {
    pub fn new(resolver: Arc<KeyResolver<S>>, max_age: Duration) -> Self {
        Self {
            resolver,
            max_age,
            required: vec![Component::ContentDigest],
        }
    }

    /// Replaces the set of components each signature has to cover.
    ///
    /// Requests should require `@method` so a signed response cannot be
    /// replayed as a request.
    pub fn requiring(mut self, components: &[Component]) -> Self {
        self.required = components.to_vec();
        self
    }

    pub fn from_settings(resolver: Arc<KeyResolver<S>>, settings: &Settings) -> Self {
        Self::new(resolver, settings.signature_max_age)
    }

    /// Verifies the content digest against the raw `body`, then the signature.
    ///
    /// A digest failure returns before any key is resolved.
    pub async fn verify_with_body<M>(
        &self,
        message: &M,
        body: &[u8],
    ) -> Result<Vec<VerifiedSignature>, SignatureError>
    where
        M: HttpMessage + Sync + ?Sized,
    {
        digest::verify_headers(message.headers(), body)?;
        self.verify(message).await
    }

    /// Verifies every signature declared in `Signature-Input`.
    pub async fn verify<M>(&self, message: &M) -> Result<Vec<VerifiedSignature>, SignatureError>
    where
        M: HttpMessage + Sync + ?Sized,
    {
        self.verify_at(message, unix_now()).await
    }

    /// Like [`verify`](Self::verify) with an explicit current time.
    pub async fn verify_at<M>(
        &self,
        message: &M,
        now: u64,
    ) -> Result<Vec<VerifiedSignature>, SignatureError>
    where
        M: HttpMessage + Sync + ?Sized,
    {
        let headers = message.headers();
        let inputs = combined_header(headers, SIGNATURE_INPUT.as_str())
            .and_then(|value| parse_dictionary(&value).ok())
            .filter(|members| !members.is_empty())
            .ok_or(SignatureError::MissingSignature)?;
        let signatures = combined_header(headers, SIGNATURE.as_str())
            .and_then(|value| parse_dictionary(&value).ok())
            .ok_or(SignatureError::MissingSignature)?;

        let mut verified = Vec::with_capacity(inputs.len());
        for (label, raw_params) in &inputs {
            let signature = dictionary_get(&signatures, label)
                .and_then(|value| parse_byte_sequence(value).ok())
                .ok_or(SignatureError::MissingSignature)?;
            let params = parse_inner_list(raw_params).map_err(|_| SignatureError::MissingSignature)?;
            let key_id = params
                .string_param("keyid")
                .ok_or(SignatureError::MissingSignature)?;

            if let Some(alg) = params.string_param("alg") {
                if alg != SIGNATURE_ALGORITHM {
                    return Err(rejected(label, key_id, "unsupported algorithm"));
                }
            }
            let created = match params.param("created") {
                None => None,
                Some(_) => {
                    let created = params
                        .integer_param("created")
                        .and_then(|created| u64::try_from(created).ok())
                        .ok_or_else(|| rejected(label, key_id, "malformed created"))?;
                    self.check_freshness(created, now)
                        .map_err(|reason| rejected(label, key_id, reason))?;
                    Some(created)
                }
            };
            let components = Component::parse_list(&params.items)
                .map_err(|_| rejected(label, key_id, "unsupported component"))?;
            if components.is_empty() {
                return Err(rejected(label, key_id, "no components covered"));
            }
            if !self.required.iter().all(|required| components.contains(required)) {
                return Err(rejected(label, key_id, "required component not covered"));
            }

            let public_key = self.resolver.public_key(key_id).await?;
            let base = SignatureBase::build(message, &components, raw_params)
                .map_err(|_| rejected(label, key_id, "covered component not present"))?;

            let signature = Signature::try_from(signature.as_slice())
                .map_err(|_| rejected(label, key_id, "signature bytes malformed"))?;
            VerifyingKey::<Sha256>::new(public_key)
                .verify(base.as_bytes(), &signature)
                .map_err(|_| rejected(label, key_id, "signature mismatch"))?;

            verified.push(VerifiedSignature {
                label: label.clone(),
                key_id: key_id.to_string(),
                components,
                created,
            });
        }
        Ok(verified)
    }

    fn check_freshness(&self, created: u64, now: u64) -> Result<(), &'static str> {
        if created > now.saturating_add(ALLOWED_CLOCK_SKEW) {
            return Err("created lies in the future");
        }
        if now.saturating_sub(created) > self.max_age.as_secs() {
            return Err("signature expired");
        }
        Ok(())
    }
}

/// Callers only learn that the signature is invalid; the reason is logged.
fn rejected(label: &str, key_id: &str, reason: &'static str) -> SignatureError {
    debug!(label, key_id, reason, "Rejecting signature");
    SignatureError::SignatureInvalid
}
