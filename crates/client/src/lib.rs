use std::sync::Arc;

use anyhow::{Context, Result, bail};
use http::header::{AUTHORIZATION, CONTENT_TYPE};
use simple_httpsig::signing::short_signature;
use simple_httpsig::{Component, KeyResolver, MessageSigner, MessageVerifier, Settings};
use tracing::info;
use url::Url;

/// One call to a data product behind the gateway.
#[derive(Debug, Clone)]
pub struct ProductRequest {
    pub gateway: Url,
    pub data_product: String,
    pub source: String,
    pub id_token: Option<String>,
    pub payload: serde_json::Value,
}

impl ProductRequest {
    /// `<gateway>/<data_product>?source=<source>`, keeping any gateway path prefix.
    pub fn url(&self) -> Result<Url> {
        let mut base = self.gateway.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let mut url = base
            .join(self.data_product.trim_start_matches('/'))
            .with_context(|| format!("joining {} onto {}", self.data_product, self.gateway))?;
        url.query_pairs_mut().append_pair("source", &self.source);
        Ok(url)
    }
}

/// Sends a signed request and returns the verified JSON response.
pub async fn run(settings: Settings, request: ProductRequest) -> Result<serde_json::Value> {
    let key_id = settings.private_key.key_id().to_string();
    let resolver = Arc::new(KeyResolver::from_settings(&settings)?);
    let signer = MessageSigner::from_settings(resolver.clone(), &settings);
    let verifier = MessageVerifier::from_settings(resolver, &settings)
        .requiring(&[Component::ContentDigest]);

    let url = request.url()?;
    let body = serde_json::to_vec(&request.payload)?;
    let mut builder = http::Request::post(url.as_str()).header(CONTENT_TYPE, "application/json");
    if let Some(token) = &request.id_token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    let mut outgoing = builder.body(body.clone())?;
    signer.sign_message(
        &mut outgoing,
        &body,
        &key_id,
        &simple_httpsig::server::REQUEST_COMPONENTS,
    )?;
    info!(%url, signature = %short_signature(outgoing.headers()), "Sending signed request");

    let client = reqwest::Client::builder()
        .timeout(settings.jwks_fetch_timeout)
        .build()?;
    let response = client
        .execute(reqwest::Request::try_from(outgoing)?)
        .await
        .with_context(|| format!("POST {url}"))?;

    let status = response.status();
    let headers = response.headers().clone();
    let body = response.bytes().await?;
    if !status.is_success() {
        bail!("{url} answered {status}: {}", String::from_utf8_lossy(&body));
    }

    let mut incoming = http::Response::new(());
    *incoming.status_mut() = status;
    *incoming.headers_mut() = headers;
    info!(signature = %short_signature(incoming.headers()), "Received response");

    let verified = verifier
        .verify_with_body(&incoming, &body)
        .await
        .context("verifying response signature")?;
    for signature in &verified {
        info!(label = %signature.label, key_id = %signature.key_id, "Response signature verified");
    }

    serde_json::from_slice(&body).context("response body is not JSON")
}
