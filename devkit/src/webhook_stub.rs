/*!
Webhook stub pour développement sans destinataire réel

Serveur axum minimal qui accepte `POST /webhook`, enregistre chaque payload
JSON reçu et répond `{"status":"ok"}`. Peut simuler des pannes (N premiers
appels en 500, ou tous) pour exercer le retry du dispatcher.
*/

use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StubBehavior {
    Accept,
    /// Les N premiers appels reçoivent un 500
    FailFirst(usize),
    AlwaysFail,
}

#[derive(Clone)]
struct StubState {
    behavior: StubBehavior,
    hits: Arc<Mutex<usize>>,
    received: Arc<Mutex<Vec<Value>>>,
}

impl StubState {
    fn new(behavior: StubBehavior) -> Self {
        Self {
            behavior,
            hits: Arc::new(Mutex::new(0)),
            received: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

fn router(state: StubState) -> Router {
    Router::new().route("/webhook", post(receive)).with_state(state)
}

async fn receive(State(stub): State<StubState>, body: Bytes) -> (StatusCode, Json<Value>) {
    let hit = {
        let mut hits = stub.hits.lock();
        *hits += 1;
        *hits
    };

    let payload: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "[stub] non-JSON webhook body");
            return (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() })));
        }
    };

    let failing = match stub.behavior {
        StubBehavior::Accept => false,
        StubBehavior::FailFirst(n) => hit <= n,
        StubBehavior::AlwaysFail => true,
    };
    if failing {
        tracing::info!(hit, "[stub] simulated webhook failure");
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "status": "error" })));
    }

    let pretty = serde_json::to_string_pretty(&payload).unwrap_or_default();
    tracing::info!(hit, "[stub] webhook received:\n{pretty}");
    stub.received.lock().push(payload);
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}

/// Stub lancé sur un port éphémère local ; arrêté au drop
pub struct StubWebhookServer {
    addr: SocketAddr,
    state: StubState,
    handle: JoinHandle<()>,
}

impl StubWebhookServer {
    pub async fn start(behavior: StubBehavior) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await.context("failed to bind webhook stub")?;
        let addr = listener.local_addr()?;
        let state = StubState::new(behavior);
        let app = router(state.clone());

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!(error = %e, "[stub] server stopped");
            }
        });

        Ok(Self { addr, state, handle })
    }

    pub fn url(&self) -> String {
        format!("http://{}/webhook", self.addr)
    }

    /// Nombre total de requêtes, échecs simulés compris
    pub fn hits(&self) -> usize {
        *self.state.hits.lock()
    }

    /// Payloads acceptés, dans l'ordre d'arrivée
    pub fn received(&self) -> Vec<Value> {
        self.state.received.lock().clone()
    }

    /// Attend au moins `count` requêtes ; false au timeout
    pub async fn wait_for_hits(&self, count: usize, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            if self.hits() >= count {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        self.hits() >= count
    }
}

impl Drop for StubWebhookServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Sert le stub (toujours en succès) jusqu'à Ctrl+C
pub async fn serve(addr: &str) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "webhook stub listening on /webhook");

    axum::serve(listener, router(StubState::new(StubBehavior::Accept)))
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await
        .context("webhook stub failed")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fail_first_then_accept() {
        let stub = StubWebhookServer::start(StubBehavior::FailFirst(1)).await.unwrap();
        let client = reqwest::Client::new();

        let first = client.post(stub.url()).json(&json!({"n": 1})).send().await.unwrap();
        assert_eq!(first.status().as_u16(), 500);

        let second = client.post(stub.url()).json(&json!({"n": 2})).send().await.unwrap();
        assert_eq!(second.status().as_u16(), 200);
        let body: Value = second.json().await.unwrap();
        assert_eq!(body["status"], "ok");

        assert_eq!(stub.hits(), 2);
        assert_eq!(stub.received(), vec![json!({"n": 2})]);
    }

    #[tokio::test]
    async fn test_non_json_body_is_rejected() {
        let stub = StubWebhookServer::start(StubBehavior::Accept).await.unwrap();
        let resp = reqwest::Client::new()
            .post(stub.url())
            .body("plain text")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 400);
        assert!(stub.received().is_empty());
    }
}
