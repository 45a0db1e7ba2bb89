/*!
Test Harness GeoWatch

Démarre un kernel complet sur un port éphémère :
- stockages en mémoire (handles concrets conservés pour seed et assertions)
- vrai client HTTP webhook pointé sur un StubWebhookServer local
- timings de dispatch raccourcis pour des tests rapides
*/

use anyhow::{Context, Result};
use geowatch_kernel::config::KernelConfig;
use geowatch_kernel::dispatcher::HttpWebhookSink;
use geowatch_kernel::models::{HazardCheckLog, Incident};
use geowatch_kernel::ports::memory::{MemoryCacheStore, MemoryCheckLogStore, MemoryIncidentStore, MemoryQueueStore};
use geowatch_kernel::{Kernel, Stores};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::webhook_stub::{StubBehavior, StubWebhookServer};

pub struct TestHarness {
    pub base_url: String,
    pub webhook: StubWebhookServer,
    pub incidents: Arc<MemoryIncidentStore>,
    pub check_logs: Arc<MemoryCheckLogStore>,
    kernel: Option<Kernel>,
    server: JoinHandle<()>,
}

impl TestHarness {
    pub async fn start() -> Result<Self> {
        Self::start_with(StubBehavior::Accept).await
    }

    pub async fn start_with(behavior: StubBehavior) -> Result<Self> {
        tracing_subscriber::fmt().with_test_writer().try_init().ok();

        let webhook = StubWebhookServer::start(behavior).await?;

        let mut config = KernelConfig::default();
        config.webhook.url = webhook.url();
        config.webhook.timeout_secs = 2;
        config.webhook.retry_delay_ms = 10;
        config.webhook.dequeue_timeout_secs = 1;
        config.webhook.idle_sleep_ms = 20;

        let incidents = Arc::new(MemoryIncidentStore::new());
        let check_logs = Arc::new(MemoryCheckLogStore::new());
        let stores = Stores {
            incidents: incidents.clone(),
            check_logs: check_logs.clone(),
            queue: Arc::new(MemoryQueueStore::new()),
            cache: Arc::new(MemoryCacheStore::new()),
        };

        let sink = HttpWebhookSink::from_conf(&config.webhook).context("failed to build webhook client")?;
        let kernel = Kernel::start(&config, stores, Arc::new(sink));

        let listener = TcpListener::bind("127.0.0.1:0").await.context("failed to bind kernel")?;
        let base_url = format!("http://{}", listener.local_addr()?);
        let app = kernel.router();
        let server = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!(error = %e, "test kernel server stopped");
            }
        });

        Ok(Self {
            base_url,
            webhook,
            incidents,
            check_logs,
            kernel: Some(kernel),
            server,
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn seed(&self, incident: Incident) -> &Self {
        self.incidents.upsert(incident);
        self
    }

    /// Attend que le journal contienne au moins `count` lignes
    pub async fn wait_for_check_logs(&self, count: usize, timeout: Duration) -> Vec<HazardCheckLog> {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline && self.check_logs.len() < count {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        self.check_logs.rows()
    }

    pub async fn shutdown(mut self) {
        if let Some(kernel) = self.kernel.take() {
            kernel.shutdown().await;
        }
        self.server.abort();
    }
}

impl Drop for TestHarness {
    fn drop(&mut self) {
        self.server.abort();
    }
}
