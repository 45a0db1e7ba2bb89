/**
 * GEOWATCH KERNEL - Point d'entrée du service
 *
 * RÔLE : Bootstrap complet : .env, logs, config, stockages, sink webhook,
 * kernel, serveur HTTP. Arrêt propre sur Ctrl+C : le serveur cesse
 * d'accepter, puis les dispatchers sont annulés et attendus.
 */

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use geowatch_kernel::config::load_config;
use geowatch_kernel::dispatcher::HttpWebhookSink;
use geowatch_kernel::{Kernel, Stores};

#[tokio::main]
async fn main() -> Result<()> {
    // .env optionnel
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,geowatch_kernel=info")),
        )
        .init();

    let cfg = load_config().await;

    let stores = Stores::open(&cfg.storage)
        .with_context(|| format!("failed to open stores under {}", cfg.storage.data_dir.display()))?;
    let sink = HttpWebhookSink::from_conf(&cfg.webhook).context("failed to build webhook client")?;

    let kernel = Kernel::start(&cfg, stores, Arc::new(sink));
    let app = kernel.router();

    let listener = TcpListener::bind(&cfg.server.bind)
        .await
        .with_context(|| format!("failed to bind {}", cfg.server.bind))?;
    tracing::info!(addr = %cfg.server.bind, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutdown requested");
        })
        .await
        .context("http server failed")?;

    kernel.shutdown().await;
    Ok(())
}
