use std::fmt;
use std::str::FromStr;

use super::digest::CONTENT_DIGEST;
use super::fields::serialize_string;
use super::message::{HttpMessage, combined_header};
use crate::error::SignatureError;

/// Algorithm name carried in the `alg` signature parameter.
pub const SIGNATURE_ALGORITHM: &str = "rsa-v1_5-sha256";

const SIGNATURE_PARAMS_ID: &str = "@signature-params";

/// A message component that a signature can cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Component {
    /// `@method`: the request method.
    Method,
    /// `content-digest`: the `Content-Digest` header value.
    ContentDigest,
}

impl Component {
    pub fn id(&self) -> &'static str {
        match self {
            Self::Method => "@method",
            Self::ContentDigest => "content-digest",
        }
    }

    /// Parses a list of component identifiers, keeping order.
    pub fn parse_list<I, T>(ids: I) -> Result<Vec<Self>, SignatureError>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        ids.into_iter().map(|id| id.as_ref().parse()).collect()
    }

    fn value<M: HttpMessage + ?Sized>(&self, message: &M) -> Result<String, SignatureError> {
        match self {
            Self::Method => message
                .method()
                .map(|method| method.as_str().to_ascii_uppercase())
                .ok_or_else(|| {
                    SignatureError::UnresolvableComponent("@method on a response".into())
                }),
            Self::ContentDigest => combined_header(message.headers(), CONTENT_DIGEST.as_str())
                .ok_or_else(|| {
                    SignatureError::UnresolvableComponent("content-digest header is missing".into())
                }),
        }
    }
}

impl FromStr for Component {
    type Err = SignatureError;

    fn from_str(id: &str) -> Result<Self, Self::Err> {
        // identifiers are lowercase; "Content-Digest" is not a valid id
        match id {
            "@method" => Ok(Self::Method),
            "content-digest" => Ok(Self::ContentDigest),
            _ => Err(SignatureError::UnresolvableComponent(id.to_string())),
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Parameters attached to a signature in `Signature-Input`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureParams {
    pub created: Option<u64>,
    pub key_id: String,
}

impl SignatureParams {
    /// Serializes the covered components and parameters as the
    /// `Signature-Input` member value, which is also the value of the
    /// `@signature-params` line.
    pub fn serialize(&self, components: &[Component]) -> String {
        let ids = components
            .iter()
            .map(|component| serialize_string(component.id()))
            .collect::<Vec<_>>()
            .join(" ");
        let mut out = format!("({ids})");
        if let Some(created) = self.created {
            out.push_str(&format!(";created={created}"));
        }
        out.push_str(";keyid=");
        out.push_str(&serialize_string(&self.key_id));
        out.push_str(";alg=");
        out.push_str(&serialize_string(SIGNATURE_ALGORITHM));
        out
    }
}

/// The canonical string a signature is computed over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureBase(String);

impl SignatureBase {
    /// One `"<id>": <value>` line per component in the given order, then the
    /// `"@signature-params"` line carrying `signature_params` verbatim.
    pub fn build<M: HttpMessage + ?Sized>(
        message: &M,
        components: &[Component],
        signature_params: &str,
    ) -> Result<Self, SignatureError> {
        let mut lines = Vec::with_capacity(components.len() + 1);
        for (i, component) in components.iter().enumerate() {
            if components[..i].contains(component) {
                return Err(SignatureError::UnresolvableComponent(format!(
                    "{component} is listed twice"
                )));
            }
            lines.push(format!("\"{}\": {}", component.id(), component.value(message)?));
        }
        lines.push(format!("\"{SIGNATURE_PARAMS_ID}\": {signature_params}"));
        Ok(Self(lines.join("\n")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for SignatureBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
