use std::sync::Arc;
use std::time::Duration;

use crate::keys::PrivateKeySecret;

pub const DEFAULT_JWKS_URI: &str = "http://127.0.0.1:8080/.well-known/jwks.json";
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";
pub const DEFAULT_SIGNATURE_LABEL: &str = "sig1";
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_SIGNATURE_MAX_AGE: Duration = Duration::from_secs(60 * 60);

/// Process configuration, built once at startup and handed to constructors.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Key used to sign outgoing messages and published at the JWKS endpoint.
    pub private_key: Arc<PrivateKeySecret>,
    /// Where to load public keys to verify incoming signatures.
    pub jwks_uri: String,
    pub jwks_fetch_timeout: Duration,
    /// Oldest `created` timestamp accepted on incoming signatures.
    pub signature_max_age: Duration,
    pub signature_label: String,
    /// Externally visible base URL, used to build absolute links.
    pub base_url: String,
}

impl Settings {
    pub fn new(private_key: PrivateKeySecret) -> Self {
        Self {
            private_key: Arc::new(private_key),
            jwks_uri: DEFAULT_JWKS_URI.to_string(),
            jwks_fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            signature_max_age: DEFAULT_SIGNATURE_MAX_AGE,
            signature_label: DEFAULT_SIGNATURE_LABEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_jwks_uri(mut self, jwks_uri: impl Into<String>) -> Self {
        self.jwks_uri = jwks_uri.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// `base_url` joined with an absolute path, without a doubled slash.
    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}
