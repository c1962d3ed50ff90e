use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use simple_httpsig::{PrivateKeySecret, Settings};
use simple_httpsig_client::{ProductRequest, run};
use tracing_subscriber::EnvFilter;
use url::Url;

#[derive(Parser)]
struct Args {
    #[clap(long, env = "PRODUCT_GATEWAY_URL", default_value = "http://localhost:3000")]
    gateway: Url,
    #[clap(long, default_value = "draft/Weather/Current/Metric")]
    data_product: String,
    #[clap(long, default_value = "productizer")]
    source: String,
    /// Sent as `Authorization: Bearer <token>`.
    #[clap(long, env = "ID_TOKEN", hide_env_values = true)]
    id_token: Option<String>,
    /// JSON request body.
    #[clap(long, default_value = r#"{"lat": 60.192059, "lon": 24.945831}"#)]
    payload: String,
    #[clap(long, env = "PRIVATE_KEY", hide_env_values = true)]
    private_key: Option<String>,
    #[clap(long, env = "PRIVATE_KEY_FILE")]
    private_key_file: Option<PathBuf>,
    #[clap(long, env = "DEV_KEY_SEED")]
    dev_key_seed: Option<String>,
    /// Key set used to verify the response signature.
    #[clap(
        long,
        env = "HTTP_SIG_VERIFY_JWKS_URI",
        default_value = "http://localhost:3000/.well-known/jwks.json"
    )]
    jwks_uri: String,
    #[clap(long, env = "REQUEST_TIMEOUT", default_value = "30")]
    timeout: u64,
}

impl Args {
    fn private_key(&self) -> Result<PrivateKeySecret> {
        match (&self.private_key, &self.private_key_file, &self.dev_key_seed) {
            (Some(pem), _, _) => PrivateKeySecret::from_pem(pem).context("PRIVATE_KEY"),
            (None, Some(path), _) => {
                PrivateKeySecret::from_pem_file(path).context("PRIVATE_KEY_FILE")
            }
            (None, None, Some(seed)) => PrivateKeySecret::from_seed(seed).context("DEV_KEY_SEED"),
            (None, None, None) => bail!("no signing key configured, set PRIVATE_KEY"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut settings = Settings::new(args.private_key()?).with_jwks_uri(&args.jwks_uri);
    settings.jwks_fetch_timeout = Duration::from_secs(args.timeout);

    let request = ProductRequest {
        gateway: args.gateway,
        data_product: args.data_product,
        source: args.source,
        id_token: args.id_token,
        payload: serde_json::from_str(&args.payload).context("--payload is not JSON")?,
    };
    let response = run(settings, request).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
