use rsa::RsaPublicKey;
use rsa::traits::PublicKeyParts;
use serde::{Deserialize, Serialize};

use super::{JWK_ALGORITHM, decode_uint, derive_key_id, encode_uint};
use crate::error::SignatureError;

/// A published RSA signing key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    pub kid: String,
    pub kty: String,
    #[serde(rename = "use", default, skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    pub n: String,
    pub e: String,
}

impl Jwk {
    pub fn from_public_key(public_key: &RsaPublicKey) -> Self {
        let n = encode_uint(public_key.n());
        let e = encode_uint(public_key.e());
        Self {
            kid: derive_key_id(&e, &n),
            kty: "RSA".to_string(),
            key_use: Some("sig".to_string()),
            alg: Some(JWK_ALGORITHM.to_string()),
            n,
            e,
        }
    }

    /// Rebuilds the RSA public key from the published numbers.
    pub fn to_public_key(&self) -> Result<RsaPublicKey, SignatureError> {
        if self.kty != "RSA" {
            return Err(SignatureError::KeyFetchFailed(format!(
                "key {} has unsupported type {}",
                self.kid, self.kty
            )));
        }
        let decode = |field: &str, value: &str| {
            decode_uint(value).map_err(|err| {
                SignatureError::KeyFetchFailed(format!("key {}: bad {field}: {err}", self.kid))
            })
        };
        let n = decode("n", &self.n)?;
        let e = decode("e", &self.e)?;
        RsaPublicKey::new(n, e)
            .map_err(|err| SignatureError::KeyFetchFailed(format!("key {}: {err}", self.kid)))
    }
}

/// The `{"keys": [...]}` document served at `/.well-known/jwks.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwkSet {
    pub keys: Vec<Jwk>,
}

/// A key set fetched from another party.
///
/// Entries stay untyped until looked up, so a key of a type this crate does
/// not handle (EC, OKP) cannot break resolution of the RSA keys next to it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoteKeySet {
    keys: Vec<serde_json::Value>,
}

impl RemoteKeySet {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Finds the entry whose `kid` matches and parses it.
    pub fn find(&self, kid: &str) -> Option<Result<Jwk, serde_json::Error>> {
        self.keys
            .iter()
            .find(|entry| entry.get("kid").and_then(|v| v.as_str()) == Some(kid))
            .map(|entry| serde_json::from_value(entry.clone()))
    }

    /// Every well-formed RSA entry; other key types and broken entries are skipped.
    pub fn rsa_keys(&self) -> impl Iterator<Item = Jwk> + '_ {
        self.keys
            .iter()
            .filter_map(|entry| serde_json::from_value::<Jwk>(entry.clone()).ok())
            .filter(|jwk| jwk.kty == "RSA")
    }
}

impl From<JwkSet> for RemoteKeySet {
    fn from(set: JwkSet) -> Self {
        Self {
            keys: set
                .keys
                .into_iter()
                .filter_map(|jwk| serde_json::to_value(jwk).ok())
                .collect(),
        }
    }
}
