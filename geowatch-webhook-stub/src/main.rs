//! Destinataire webhook local : affiche chaque notification reçue.
//! Adresse via `WEBHOOK_STUB_ADDR` (défaut `0.0.0.0:9090`).

use anyhow::Result;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let addr = std::env::var("WEBHOOK_STUB_ADDR").unwrap_or_else(|_| "0.0.0.0:9090".into());
    geowatch_devkit::webhook_stub::serve(&addr).await
}
