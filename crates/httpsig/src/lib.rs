pub mod config;
pub mod error;
pub mod keys;
pub mod server;
pub mod signing;

pub use config::Settings;
pub use error::{ServerError, SignatureError};
pub use keys::{HttpJwksSource, Jwk, JwkSet, JwksSource, KeyResolver, PrivateKeySecret};
pub use server::{AppState, router, run};
pub use signing::{
    Component, HttpMessage, MessageSigner, MessageVerifier, SignatureMetadata, VerifiedSignature,
};
