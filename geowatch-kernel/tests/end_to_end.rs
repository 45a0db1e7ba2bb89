//! Kernel complet piloté par HTTP, avec un vrai destinataire webhook local

use geowatch_devkit::{offset_north, IncidentBuilder, StubBehavior, TestHarness};
use geowatch_kernel::models::{LocationCheckResponse, Position, StatsResponse};
use serde_json::{json, Value};
use std::time::Duration;

const CENTER: Position = Position {
    latitude: 48.8584,
    longitude: 2.2945,
};

async fn check(client: &reqwest::Client, harness: &TestHarness, user: &str, at: Position) -> reqwest::Response {
    client
        .post(harness.url("/api/v1/location/check"))
        .json(&json!({ "user_id": user, "latitude": at.latitude, "longitude": at.longitude }))
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_hazardous_check_logs_and_notifies() {
    let harness = TestHarness::start().await.unwrap();
    let fire = IncidentBuilder::new("Fire", CENTER, 500.0).build();
    harness.seed(fire.clone());
    let client = reqwest::Client::new();

    let resp = check(&client, &harness, "walker", offset_north(CENTER, 200.0)).await;
    assert_eq!(resp.status().as_u16(), 200);
    let body: LocationCheckResponse = resp.json().await.unwrap();
    assert!(body.has_danger);
    assert_eq!(body.nearby_incidents.len(), 1);
    assert_eq!(body.nearby_incidents[0].id, fire.id);

    let logs = harness.wait_for_check_logs(1, Duration::from_secs(3)).await;
    assert_eq!(logs.len(), 1);
    assert!(logs[0].has_danger);
    assert_eq!(logs[0].user_id, "walker");

    assert!(harness.webhook.wait_for_hits(1, Duration::from_secs(5)).await);
    let delivered = harness.webhook.received();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0]["user_id"], "walker");
    assert_eq!(delivered[0]["incidents"][0]["title"], "Fire");

    harness.shutdown().await;
}

#[tokio::test]
async fn test_safe_check_logs_without_notification() {
    let harness = TestHarness::start().await.unwrap();
    harness.seed(IncidentBuilder::new("Fire", CENTER, 100.0).build());
    let client = reqwest::Client::new();

    let resp = check(&client, &harness, "walker", offset_north(CENTER, 2_000.0)).await;
    let body: LocationCheckResponse = resp.json().await.unwrap();
    assert!(!body.has_danger);
    assert!(body.nearby_incidents.is_empty());

    let logs = harness.wait_for_check_logs(1, Duration::from_secs(3)).await;
    assert_eq!(logs.len(), 1);
    assert!(!logs[0].has_danger);

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(harness.webhook.hits(), 0);

    harness.shutdown().await;
}

#[tokio::test]
async fn test_invalid_position_is_bad_request() {
    let harness = TestHarness::start().await.unwrap();
    let client = reqwest::Client::new();

    let resp = check(&client, &harness, "walker", Position::new(200.0, 0.0)).await;
    assert_eq!(resp.status().as_u16(), 400);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("latitude"));

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(harness.check_logs.is_empty());

    harness.shutdown().await;
}

#[tokio::test]
async fn test_malformed_body_is_rejected_by_extractor() {
    let harness = TestHarness::start().await.unwrap();
    let resp = reqwest::Client::new()
        .post(harness.url("/api/v1/location/check"))
        .header("content-type", "application/json")
        .body("{\"user_id\": 1")
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_client_error());

    harness.shutdown().await;
}

#[tokio::test]
async fn test_webhook_retried_until_accepted() {
    let harness = TestHarness::start_with(StubBehavior::FailFirst(2)).await.unwrap();
    harness.seed(IncidentBuilder::new("Gas leak", CENTER, 300.0).build());
    let client = reqwest::Client::new();

    check(&client, &harness, "walker", CENTER).await;

    assert!(harness.webhook.wait_for_hits(3, Duration::from_secs(5)).await);
    assert_eq!(harness.webhook.received().len(), 1);

    harness.shutdown().await;
}

#[tokio::test]
async fn test_stats_count_distinct_users() {
    let harness = TestHarness::start().await.unwrap();
    harness.seed(IncidentBuilder::new("Flood", CENTER, 1_000.0).build());
    harness.seed(IncidentBuilder::new("Empty", offset_north(CENTER, 50_000.0), 100.0).build());
    let client = reqwest::Client::new();

    for user in ["ana", "ben", "ana"] {
        check(&client, &harness, user, offset_north(CENTER, 10.0)).await;
    }
    harness.wait_for_check_logs(3, Duration::from_secs(3)).await;

    let resp = client.get(harness.url("/api/v1/incidents/stats")).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let stats: StatsResponse = resp.json().await.unwrap();
    assert_eq!(stats.zones.len(), 1);
    assert_eq!(stats.zones[0].title, "Flood");
    assert_eq!(stats.zones[0].user_count, 2);
    assert_eq!(stats.total, 2);

    harness.shutdown().await;
}
