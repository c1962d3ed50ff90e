use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    body::to_bytes,
    extract::{Request, State},
    http::{
        StatusCode,
        header::{ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::Settings;
use crate::error::ServerError;
use crate::keys::{HttpJwksSource, JwkSet, JwksSource, KeyResolver};
use crate::signing::{Component, MessageSigner, MessageVerifier, short_signature};

pub const JWKS_PATH: &str = "/.well-known/jwks.json";
pub const PARTY_CONFIGURATION_PATH: &str = "/.well-known/dataspace/party-configuration.json";
pub const WEATHER_PATH: &str = "/draft/Weather/Current/Metric";

const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Incoming requests must bind both the method and the body.
pub const REQUEST_COMPONENTS: [Component; 2] = [Component::Method, Component::ContentDigest];

pub struct AppState<S = HttpJwksSource> {
    pub settings: Arc<Settings>,
    pub resolver: Arc<KeyResolver<S>>,
    pub signer: Arc<MessageSigner<S>>,
    pub verifier: Arc<MessageVerifier<S>>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            settings: self.settings.clone(),
            resolver: self.resolver.clone(),
            signer: self.signer.clone(),
            verifier: self.verifier.clone(),
        }
    }
}

impl AppState<HttpJwksSource> {
    pub fn from_settings(settings: Settings) -> Result<Self> {
        let resolver = KeyResolver::from_settings(&settings).context("building key resolver")?;
        Ok(Self::new(settings, resolver))
    }
}

impl<S: JwksSource> AppState<S> {
    pub fn new(settings: Settings, resolver: KeyResolver<S>) -> Self {
        let resolver = Arc::new(resolver);
        Self {
            signer: Arc::new(MessageSigner::from_settings(resolver.clone(), &settings)),
            verifier: Arc::new(
                MessageVerifier::from_settings(resolver.clone(), &settings)
                    .requiring(&REQUEST_COMPONENTS),
            ),
            settings: Arc::new(settings),
            resolver,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartyConfiguration {
    pub jwks_uri: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentWeather {
    pub humidity: u32,
    pub pressure: u32,
    pub rain: bool,
    pub temp: f64,
    pub wind_speed: f64,
    pub wind_direction: u32,
}

pub fn router<S: JwksSource + 'static>(state: AppState<S>) -> Router {
    Router::new()
        .route("/healthcheck", get(|| async move { (StatusCode::OK, "Ok").into_response() }))
        .route(JWKS_PATH, get(jwks::<S>))
        .route(PARTY_CONFIGURATION_PATH, get(party_configuration::<S>))
        .route(WEATHER_PATH, post(current_weather::<S>))
        .with_state(state)
}

pub async fn run(host: String, port: u16, settings: Settings) -> Result<()> {
    let state = AppState::from_settings(settings)?;
    info!(
        key_id = state.settings.private_key.key_id(),
        jwks_uri = %state.settings.jwks_uri,
        "Signing key loaded"
    );

    let listener = tokio::net::TcpListener::bind((host.as_str(), port))
        .await
        .with_context(|| format!("binding {host}:{port}"))?;
    info!(address = %listener.local_addr()?, "Listening");

    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("serving")?;

    Ok(())
}

async fn jwks<S: JwksSource>(State(state): State<AppState<S>>) -> impl IntoResponse {
    let keys: JwkSet = state.resolver.published_keys();
    ([(ACCESS_CONTROL_ALLOW_ORIGIN, "*")], Json(keys))
}

async fn party_configuration<S: JwksSource>(
    State(state): State<AppState<S>>,
) -> impl IntoResponse {
    let configuration = PartyConfiguration {
        jwks_uri: state.settings.url_for(JWKS_PATH),
    };
    ([(ACCESS_CONTROL_ALLOW_ORIGIN, "*")], Json(configuration))
}

/// Verifies the signed request and answers with a signed response.
async fn current_weather<S: JwksSource>(
    State(state): State<AppState<S>>,
    request: Request,
) -> Result<Response, ServerError> {
    let (parts, body) = request.into_parts();
    // digest the bytes exactly as received
    let body = to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|err| ServerError::BadRequest(err.to_string()))?;
    let request_signature = short_signature(&parts.headers);
    info!(signature = %request_signature, "Received weather request");

    state
        .verifier
        .verify_with_body(&parts, &body)
        .await
        .inspect_err(|err| warn!(signature = %request_signature, error = %err, "Rejected request"))?;
    info!(signature = %request_signature, "Request signature verified");

    let weather = CurrentWeather {
        humidity: 48,
        pressure: 1015,
        rain: false,
        temp: 1.4600000000000364,
        wind_speed: 6.71,
        wind_direction: 1,
    };
    let body = serde_json::to_vec(&weather)?;

    let mut response = ([(CONTENT_TYPE, "application/json")], body.clone()).into_response();
    // responses have no method; only the digest is covered
    let metadata = state.signer.sign_message(
        &mut response,
        &body,
        state.settings.private_key.key_id(),
        &[Component::ContentDigest],
    )?;
    info!(key_id = %metadata.key_id, signature = %short_signature(response.headers()), "Signed response");

    Ok(response)
}
