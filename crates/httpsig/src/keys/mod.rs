mod jwk;
mod resolver;
mod secret;

use base64::Engine;
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use rsa::BigUint;
use sha2::{Digest, Sha256};

pub use jwk::{Jwk, JwkSet, RemoteKeySet};
pub use resolver::{HttpJwksSource, JwksSource, KeyResolver};
pub use secret::PrivateKeySecret;

/// JOSE algorithm name published for every key.
pub const JWK_ALGORITHM: &str = "RS256";

const KEY_ID_HEX_LEN: usize = 32;

/// base64url without padding on output, tolerant of padding on input.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Encodes an unsigned integer as minimal big-endian bytes in base64url.
///
/// Zero is encoded as a single `0x00` byte rather than an empty string.
pub fn encode_uint(value: &BigUint) -> String {
    let mut bytes = value.to_bytes_be();
    if bytes.is_empty() {
        bytes.push(0);
    }
    URL_SAFE_LENIENT.encode(bytes)
}

pub fn decode_uint(encoded: &str) -> Result<BigUint, base64::DecodeError> {
    let bytes = URL_SAFE_LENIENT.decode(encoded)?;
    Ok(BigUint::from_bytes_be(&bytes))
}

/// Derives the key id from the encoded public numbers.
///
/// The input is `rsa:<e>:<n>` (exponent first) and the hex digest is cut to
/// 32 characters. Both details are fixed by deployed peers.
pub fn derive_key_id(public_exponent: &str, modulus: &str) -> String {
    let digest = Sha256::digest(format!("rsa:{public_exponent}:{modulus}").as_bytes());
    let mut kid = hex::encode(digest);
    kid.truncate(KEY_ID_HEX_LEN);
    kid
}
