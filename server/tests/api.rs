//! Router-level tests: the in-memory store behind the real middleware stack,
//! with the insecure verifier standing in for Telegram.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use tapcoin_engine::MemoryStore;
use tapcoin_server::{Api, App, AuthVerifier, ServerConfig};

fn test_router() -> Router {
    let config = ServerConfig {
        combo_chance: 0.0,
        http_rate_limit_per_second: None,
        http_rate_limit_burst: None,
        http_body_limit_bytes: None,
        ..ServerConfig::default()
    };
    let app = Arc::new(App::new(
        Arc::new(MemoryStore::new()),
        AuthVerifier::Insecure,
        config,
    ));
    Api::new(app).router()
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

async fn get(router: &Router, path: &str, init_data: Option<&str>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method("GET").uri(path);
    if let Some(init_data) = init_data {
        builder = builder.header("x-telegram-init-data", init_data);
    }
    send(router, builder.body(Body::empty()).unwrap()).await
}

async fn post_action(
    router: &Router,
    identity: &str,
    init_data: &str,
    action: &str,
) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(format!("/api/action/{identity}"))
        .header("content-type", "application/json")
        .header("x-telegram-init-data", init_data)
        .body(Body::from(json!({ "action": action }).to_string()))
        .unwrap();
    send(router, request).await
}

#[tokio::test]
async fn healthz_responds_ok() {
    let router = test_router();
    let (status, body) = get(&router, "/healthz", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
}

#[tokio::test]
async fn missing_init_data_is_unauthorized() {
    let router = test_router();
    let (status, _) = get(&router, "/api/user/42", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn identity_mismatch_is_forbidden() {
    let router = test_router();
    let (status, _) = get(&router, "/api/user/42", Some("7")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn first_fetch_bootstraps_a_default_player() {
    let router = test_router();
    let (status, body) = get(&router, "/api/user/42", Some("42")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["identity"], "42");
    assert_eq!(body["coins"], 0.0);
    assert_eq!(body["energy"], 1000.0);
    assert_eq!(body["max_energy"], 1000);
    assert_eq!(body["multi_tap_level"], 1);
    assert_eq!(body["username"], "anonymous");
    assert_eq!(body["first_name"], "Player");
}

#[tokio::test]
async fn verified_profile_fields_are_stored() {
    let router = test_router();
    let init = r#"{"id":42,"username":"tapper","first_name":"Tap"}"#;
    let (status, body) = get(&router, "/api/user/42", Some(init)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "tapper");
    assert_eq!(body["first_name"], "Tap");
}

#[tokio::test]
async fn tap_earns_a_coin_and_spends_energy() {
    let router = test_router();
    let (status, body) = post_action(&router, "42", "42", "tap").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["event"]["status"], "ok");
    assert_eq!(body["event"]["coins_earned"], 1);
    assert_eq!(body["event"]["is_combo"], false);
    assert_eq!(body["data"]["coins"], 1.0);
    assert!(body["data"]["energy"].as_f64().unwrap() < 1000.0);
}

#[tokio::test]
async fn unknown_action_is_a_bad_request() {
    let router = test_router();
    let (status, body) = post_action(&router, "42", "42", "buy_autotap").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "unknown action");
}

#[tokio::test]
async fn underfunded_purchase_reports_the_price() {
    let router = test_router();
    let (status, body) = post_action(&router, "42", "42", "buy_multitap").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["event"]["status"], "rejected");
    assert_eq!(body["event"]["reason"], "not_enough_coins");
    assert_eq!(body["event"]["required"], 100);
    assert_eq!(body["data"]["multi_tap_level"], 1);
}

#[tokio::test]
async fn leaderboard_orders_players_by_coins() {
    let router = test_router();
    for (identity, taps) in [("1", 3), ("2", 1), ("3", 2)] {
        for _ in 0..taps {
            let (status, _) = post_action(&router, identity, identity, "tap").await;
            assert_eq!(status, StatusCode::OK);
        }
    }

    let (status, body) = get(&router, "/api/leaderboard", Some("1")).await;
    assert_eq!(status, StatusCode::OK);
    let order: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row["identity"].as_str().unwrap())
        .collect();
    assert_eq!(order, ["1", "3", "2"]);
    // Rows carry display fields but never energy or timers.
    let first = &body[0];
    assert!(first.get("username").is_some());
    assert!(first.get("energy").is_none());
    assert!(first.get("last_update").is_none());
}

#[tokio::test]
async fn leaderboard_requires_a_verified_caller() {
    let router = test_router();
    let (status, _) = get(&router, "/api/leaderboard", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
