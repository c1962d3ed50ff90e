mod base;
pub mod digest;
mod fields;
mod message;
mod signer;
mod verifier;

pub use base::{Component, SIGNATURE_ALGORITHM, SignatureBase, SignatureParams};
pub use digest::{CONTENT_DIGEST, ContentDigestValue};
pub use fields::is_valid_key;
pub use message::HttpMessage;
pub use signer::{MessageSigner, SIGNATURE, SIGNATURE_INPUT, SignatureMetadata, short_signature};
pub use verifier::{MessageVerifier, VerifiedSignature};
