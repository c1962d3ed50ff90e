use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use simple_httpsig::signing::is_valid_key;
use simple_httpsig::{PrivateKeySecret, Settings, run};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
struct Args {
    #[clap(long, env = "HOST", default_value = "127.0.0.1")]
    host: String,
    #[clap(long, env = "PORT", default_value = "3000")]
    port: u16,
    /// PEM-encoded RSA private key (PKCS#8 or PKCS#1).
    #[clap(long, env = "PRIVATE_KEY", hide_env_values = true)]
    private_key: Option<String>,
    #[clap(long, env = "PRIVATE_KEY_FILE")]
    private_key_file: Option<PathBuf>,
    /// Derive a throwaway key from a seed. Development only.
    #[clap(long, env = "DEV_KEY_SEED")]
    dev_key_seed: Option<String>,
    #[clap(
        long,
        env = "HTTP_SIG_VERIFY_JWKS_URI",
        default_value = simple_httpsig::config::DEFAULT_JWKS_URI
    )]
    jwks_uri: String,
    /// Seconds to wait for the JWKS endpoint.
    #[clap(long, env = "JWKS_FETCH_TIMEOUT", default_value = "30")]
    jwks_fetch_timeout: u64,
    /// Seconds after `created` during which a signature is accepted.
    #[clap(long, env = "SIGNATURE_MAX_AGE", default_value = "3600")]
    signature_max_age: u64,
    #[clap(long, env = "SIGNATURE_LABEL", default_value = "sig1")]
    signature_label: String,
    #[clap(long, env = "BASE_URL", default_value = simple_httpsig::config::DEFAULT_BASE_URL)]
    base_url: String,
}

impl Args {
    fn private_key(&self) -> Result<PrivateKeySecret> {
        if let Some(pem) = &self.private_key {
            return PrivateKeySecret::from_pem(pem).context("PRIVATE_KEY");
        }
        if let Some(path) = &self.private_key_file {
            return PrivateKeySecret::from_pem_file(path).context("PRIVATE_KEY_FILE");
        }
        if let Some(seed) = &self.dev_key_seed {
            tracing::warn!("Using a seed-derived signing key, do not use in production");
            return PrivateKeySecret::from_seed(seed).context("DEV_KEY_SEED");
        }
        bail!("no signing key configured, set PRIVATE_KEY or --private-key-file")
    }

    fn into_settings(self) -> Result<Settings> {
        if !is_valid_key(&self.signature_label) {
            bail!("invalid signature label {:?}", self.signature_label);
        }
        let mut settings = Settings::new(self.private_key()?)
            .with_jwks_uri(self.jwks_uri)
            .with_base_url(self.base_url);
        settings.jwks_fetch_timeout = Duration::from_secs(self.jwks_fetch_timeout);
        settings.signature_max_age = Duration::from_secs(self.signature_max_age);
        settings.signature_label = self.signature_label;
        Ok(settings)
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
    let (host, port) = (args.host.clone(), args.port);
    let settings = args.into_settings()?;

    run(host, port, settings).await
}
