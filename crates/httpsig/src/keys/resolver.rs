use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rsa::RsaPublicKey;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::{JwkSet, PrivateKeySecret, RemoteKeySet};
use crate::config::Settings;
use crate::error::SignatureError;

/// Where public keys of other parties come from.
pub trait JwksSource: Send + Sync {
    /// Fetches the whole key set. May perform network I/O.
    fn fetch(&self) -> impl Future<Output = Result<RemoteKeySet, SignatureError>> + Send;

    /// Human readable location, for logs.
    fn location(&self) -> &str;
}

/// Fetches a JWKS document over HTTP.
#[derive(Debug, Clone)]
pub struct HttpJwksSource {
    client: reqwest::Client,
    uri: String,
}

impl HttpJwksSource {
    pub fn new(uri: impl Into<String>, timeout: Duration) -> Result<Self, SignatureError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| SignatureError::KeyFetchFailed(err.to_string()))?;
        Ok(Self {
            client,
            uri: uri.into(),
        })
    }
}

impl JwksSource for HttpJwksSource {
    async fn fetch(&self) -> Result<RemoteKeySet, SignatureError> {
        let fetch_failed = |err: reqwest::Error| SignatureError::KeyFetchFailed(err.to_string());
        let body = self
            .client
            .get(&self.uri)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(fetch_failed)?
            .bytes()
            .await
            .map_err(fetch_failed)?;
        RemoteKeySet::from_slice(&body)
            .map_err(|err| SignatureError::KeyFetchFailed(format!("{}: {err}", self.uri)))
    }

    fn location(&self) -> &str {
        &self.uri
    }
}

/// Supplies private keys by id from the local store and public keys by id
/// from a cache backed by the local store and a remote key set.
pub struct KeyResolver<S = HttpJwksSource> {
    private_keys: HashMap<String, Arc<PrivateKeySecret>>,
    public_keys: RwLock<HashMap<String, RsaPublicKey>>,
    source: S,
    fetch_timeout: Duration,
}

impl KeyResolver<HttpJwksSource> {
    pub fn from_settings(settings: &Settings) -> Result<Self, SignatureError> {
        let source = HttpJwksSource::new(&settings.jwks_uri, settings.jwks_fetch_timeout)?;
        Ok(Self::new(
            [settings.private_key.clone()],
            source,
            settings.jwks_fetch_timeout,
        ))
    }
}

impl<S: JwksSource> KeyResolver<S> {
    pub fn new(
        keys: impl IntoIterator<Item = Arc<PrivateKeySecret>>,
        source: S,
        fetch_timeout: Duration,
    ) -> Self {
        let private_keys: HashMap<_, _> = keys
            .into_iter()
            .map(|key| (key.key_id().to_string(), key))
            .collect();
        let public_keys = private_keys
            .iter()
            .map(|(kid, key)| (kid.clone(), key.public_key().clone()))
            .collect();
        Self {
            private_keys,
            public_keys: RwLock::new(public_keys),
            source,
            fetch_timeout,
        }
    }

    pub fn private_key(&self, key_id: &str) -> Result<Arc<PrivateKeySecret>, SignatureError> {
        self.private_keys
            .get(key_id)
            .cloned()
            .ok_or_else(|| SignatureError::UnknownKeyId(key_id.to_string()))
    }

    /// Public halves of the local keys, as served at the well-known endpoint.
    pub fn published_keys(&self) -> JwkSet {
        let mut keys: Vec<_> = self.private_keys.values().map(|key| key.jwk().clone()).collect();
        keys.sort_by(|a, b| a.kid.cmp(&b.kid));
        JwkSet { keys }
    }

    /// Resolves a public key, fetching the remote key set on a cache miss.
    ///
    /// The cache lock is released while the fetch is in flight. Two callers
    /// missing on the same id may both fetch; the first insert wins. Every
    /// other RSA key in the fetched set is cached as well.
    pub async fn public_key(&self, key_id: &str) -> Result<RsaPublicKey, SignatureError> {
        if let Some(key) = self.public_keys.read().await.get(key_id) {
            return Ok(key.clone());
        }

        info!(
            key_id,
            source = self.source.location(),
            "Resolving public RSA key"
        );
        let key_set = tokio::time::timeout(self.fetch_timeout, self.source.fetch())
            .await
            .map_err(|_| {
                SignatureError::KeyFetchFailed(format!(
                    "{} did not answer within {:?}",
                    self.source.location(),
                    self.fetch_timeout
                ))
            })??;

        let jwk = match key_set.find(key_id) {
            Some(parsed) => parsed.map_err(|err| {
                SignatureError::KeyFetchFailed(format!("key {key_id} is malformed: {err}"))
            })?,
            None => {
                warn!(key_id, keys = key_set.len(), "Key id not present in remote key set");
                return Err(SignatureError::UnknownKeyId(key_id.to_string()));
            }
        };
        let public_key = jwk.to_public_key()?;
        let siblings: Vec<_> = key_set
            .rsa_keys()
            .filter(|jwk| jwk.kid != key_id)
            .filter_map(|jwk| match jwk.to_public_key() {
                Ok(key) => Some((jwk.kid, key)),
                Err(err) => {
                    debug!(key_id = %jwk.kid, error = %err, "Skipping unusable remote key");
                    None
                }
            })
            .collect();

        let mut cache = self.public_keys.write().await;
        for (kid, key) in siblings {
            cache.entry(kid).or_insert(key);
        }
        Ok(cache
            .entry(key_id.to_string())
            .or_insert(public_key)
            .clone())
    }
}
