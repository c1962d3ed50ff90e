#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use simple_httpsig::keys::RemoteKeySet;
use simple_httpsig::{JwkSet, JwksSource, KeyResolver, PrivateKeySecret, SignatureError};

pub const KEY_A: &str = include_str!("../fixtures/rsa_a.pem");
pub const KEY_B: &str = include_str!("../fixtures/rsa_b.pem");
pub const KID_A: &str = "353aff21bc04cf9195673684e542e4e4";
pub const KID_B: &str = "0d04489bf28f7ced0b7bfa23eaa6ef06";

/// In-memory key set that counts how often it was fetched.
#[derive(Clone)]
pub struct StaticSource {
    keys: JwkSet,
    pub fetches: Arc<AtomicUsize>,
}

impl StaticSource {
    pub fn new(keys: &[&PrivateKeySecret]) -> Self {
        Self {
            keys: JwkSet {
                keys: keys.iter().map(|key| key.jwk().clone()).collect(),
            },
            fetches: Arc::default(),
        }
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl JwksSource for StaticSource {
    async fn fetch(&self) -> Result<RemoteKeySet, SignatureError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.keys.clone().into())
    }

    fn location(&self) -> &str {
        "memory"
    }
}

pub fn key(pem: &str) -> PrivateKeySecret {
    PrivateKeySecret::from_pem(pem).unwrap()
}

/// A resolver holding `local` privately and knowing `remote` through the source.
pub fn resolver(local: &str, remote: &[&str]) -> (Arc<KeyResolver<StaticSource>>, StaticSource) {
    let remote: Vec<_> = remote.iter().map(|pem| key(pem)).collect();
    let source = StaticSource::new(&remote.iter().collect::<Vec<_>>());
    let resolver = KeyResolver::new(
        [Arc::new(key(local))],
        source.clone(),
        Duration::from_secs(5),
    );
    (Arc::new(resolver), source)
}
