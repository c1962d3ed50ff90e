use axum::http::StatusCode;
use axum_core::response::{IntoResponse as AxumCoreIntoResponse, Response};

#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    #[error("Invalid private key: {0}")]
    InvalidKeyFormat(String),
    #[error("Content-Digest header is missing")]
    MissingContentDigest,
    #[error("Content-Digest does not match the message body")]
    ContentDigestMismatch,
    #[error("Cannot resolve signature component: {0}")]
    UnresolvableComponent(String),
    #[error("Unknown key id: {0}")]
    UnknownKeyId(String),
    #[error("Failed to fetch public key: {0}")]
    KeyFetchFailed(String),
    #[error("Signature headers are missing or malformed")]
    MissingSignature,
    #[error("Signature is invalid")]
    SignatureInvalid,
    #[error("Failed to produce signature: {0}")]
    Signing(#[from] rsa::signature::Error),
    #[error(transparent)]
    InvalidHeader(#[from] http::header::InvalidHeaderValue),
}

impl SignatureError {
    /// Whether the caller may retry the operation later.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::KeyFetchFailed(_))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Signature(#[from] SignatureError),
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Failed to encode response body: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Trait implementation to convert this error into an axum http response
impl AxumCoreIntoResponse for ServerError {
    fn into_response(self) -> Response {
        match self {
            bad_request_error @ ServerError::BadRequest(_) => {
                (StatusCode::BAD_REQUEST, bad_request_error.to_string()).into_response()
            }
            ServerError::Signature(
                digest_error @ (SignatureError::MissingContentDigest
                | SignatureError::ContentDigestMismatch),
            ) => (StatusCode::BAD_REQUEST, digest_error.to_string()).into_response(),
            ServerError::Signature(
                SignatureError::MissingSignature
                | SignatureError::SignatureInvalid
                | SignatureError::UnknownKeyId(_),
            ) => (StatusCode::UNAUTHORIZED, "Signature verification failed").into_response(),
            ServerError::Signature(SignatureError::KeyFetchFailed(_)) => (
                StatusCode::BAD_GATEWAY,
                "Unable to resolve signing key, try again later",
            )
                .into_response(),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Something wrong happened.",
            )
                .into_response(),
        }
    }
}
