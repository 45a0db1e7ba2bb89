/**
 * API REST GEOWATCH - Surface HTTP entrante du kernel
 *
 * RÔLE :
 * Expose la vérification de position et les statistiques de zones.
 *
 * ROUTES :
 * - POST /api/v1/location/check     : verdict de danger pour une position
 * - GET  /api/v1/incidents/stats    : utilisateurs distincts par zone
 *
 * ERREURS :
 * - position invalide  => 400 {"error": msg}, aucun effet de bord
 * - stockage en échec  => 500 {"error": msg}
 * - JSON mal formé     => rejeté par l'extracteur axum avant le métier
 */

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::check::{CheckError, LocationChecker};
use crate::models::{LocationCheckRequest, LocationCheckResponse, StatsResponse};
use crate::stats::ZoneStatsAggregator;

#[derive(Clone)]
pub struct AppState {
    pub checker: Arc<LocationChecker>,
    pub stats: Arc<ZoneStatsAggregator>,
}

type ApiError = (StatusCode, Json<Value>);

fn api_error(code: StatusCode, msg: impl std::fmt::Display) -> ApiError {
    (code, Json(json!({ "error": msg.to_string() })))
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/api/v1/location/check", post(check_location))
        .route("/api/v1/incidents/stats", get(incident_stats))
        .with_state(app_state)
}

// POST /api/v1/location/check
async fn check_location(
    State(app): State<AppState>,
    Json(req): Json<LocationCheckRequest>,
) -> Result<Json<LocationCheckResponse>, ApiError> {
    match app.checker.check(&req).await {
        Ok(resp) => Ok(Json(resp)),
        Err(CheckError::Validation(e)) => Err(api_error(StatusCode::BAD_REQUEST, e)),
        Err(e @ CheckError::Search(_)) => {
            tracing::error!(user_id = %req.user_id, error = %e, "location check failed");
            Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, e))
        }
    }
}

// GET /api/v1/incidents/stats
async fn incident_stats(State(app): State<AppState>) -> Result<Json<StatsResponse>, ApiError> {
    app.stats.compute().await.map(Json).map_err(|e| {
        tracing::error!(error = %e, "failed to compute zone stats");
        api_error(StatusCode::INTERNAL_SERVER_ERROR, format!("failed to get stats: {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ActiveIncidentCache;
    use crate::effects::{EffectSink, SideEffect};
    use crate::models::{Incident, Position};
    use crate::ports::memory::{MemoryCacheStore, MemoryCheckLogStore};
    use crate::ports::{IncidentStore, StoreError};
    use crate::proximity::{ProximitySearch, DEFAULT_COARSE_RADIUS_M};
    use async_trait::async_trait;
    use std::time::Duration;

    struct DownIncidentStore;

    #[async_trait]
    impl IncidentStore for DownIncidentStore {
        async fn find_nearby(&self, _point: Position, _max: f64) -> Result<Vec<Incident>, StoreError> {
            Err(StoreError::Unavailable("database is down".into()))
        }

        async fn active_incidents(&self) -> Result<Vec<Incident>, StoreError> {
            Err(StoreError::Unavailable("database is down".into()))
        }
    }

    struct DiscardEffects;

    impl EffectSink for DiscardEffects {
        fn submit(&self, _effect: SideEffect) {}
    }

    async fn serve_with_broken_store() -> String {
        let incidents: Arc<dyn IncidentStore> = Arc::new(DownIncidentStore);
        let check_logs = Arc::new(MemoryCheckLogStore::new());
        let cache = ActiveIncidentCache::new(Arc::new(MemoryCacheStore::new()), Duration::from_secs(60));

        let app = build_router(AppState {
            checker: Arc::new(LocationChecker::new(
                ProximitySearch::new(incidents.clone(), DEFAULT_COARSE_RADIUS_M),
                Arc::new(DiscardEffects),
            )),
            stats: Arc::new(ZoneStatsAggregator::new(check_logs, incidents, cache, 60)),
        });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_store_failure_maps_to_500_on_check() {
        let base = serve_with_broken_store().await;
        let resp = reqwest::Client::new()
            .post(format!("{base}/api/v1/location/check"))
            .json(&json!({ "user_id": "u", "latitude": 10.0, "longitude": 10.0 }))
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status().as_u16(), 500);
        let body: Value = resp.json().await.unwrap();
        assert!(body["error"].as_str().unwrap().contains("database is down"));
    }

    #[tokio::test]
    async fn test_store_failure_maps_to_500_on_stats() {
        let base = serve_with_broken_store().await;
        let resp = reqwest::get(format!("{base}/api/v1/incidents/stats")).await.unwrap();

        assert_eq!(resp.status().as_u16(), 500);
        let body: Value = resp.json().await.unwrap();
        assert!(body["error"].as_str().unwrap().starts_with("failed to get stats"));
    }
}
