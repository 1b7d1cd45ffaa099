use axum::{
    extract::{Path, State as AxumState},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

use tapcoin_engine::EngineError;
use tapcoin_types::{ActionKind, ActionRequest};

use crate::auth::WebAppUser;
use crate::{now_ms, now_unix, App};

const INIT_DATA_HEADER: &str = "x-telegram-init-data";

#[derive(Serialize)]
struct HealthzResponse {
    ok: bool,
}

pub(super) async fn healthz() -> Response {
    Json(HealthzResponse { ok: true }).into_response()
}

/// Verifies the init-data header and, when `identity` is given, that the
/// verified user is the player being addressed.
fn authorize(app: &App, headers: &HeaderMap, identity: Option<&str>) -> Result<WebAppUser, Response> {
    let raw = headers
        .get(INIT_DATA_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    let user = match app.verifier().verify(raw, now_unix()) {
        Ok(user) => user,
        Err(err) => {
            app.metrics().inc_auth_failure();
            return Err((
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": err.to_string() })),
            )
                .into_response());
        }
    };
    if let Some(identity) = identity {
        if user.identity() != identity {
            app.metrics().inc_auth_failure();
            return Err((
                StatusCode::FORBIDDEN,
                Json(json!({ "error": "identity mismatch" })),
            )
                .into_response());
        }
    }
    Ok(user)
}

fn engine_error_response(app: &App, err: EngineError) -> Response {
    match err {
        EngineError::Busy => {
            app.metrics().inc_busy();
            (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({ "error": "action already in flight" })),
            )
                .into_response()
        }
        EngineError::Storage(err) => {
            warn!(error = %err, "player store unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "error": "storage unavailable" })),
            )
                .into_response()
        }
    }
}

pub(super) async fn get_user(
    AxumState(app): AxumState<Arc<App>>,
    Path(identity): Path<String>,
    headers: HeaderMap,
) -> Response {
    let start = Instant::now();
    let user = match authorize(&app, &headers, Some(&identity)) {
        Ok(user) => user,
        Err(response) => return response,
    };
    let response = match app.engine().snapshot(&identity, &user.profile(), now_ms()).await {
        Ok(state) => Json(state).into_response(),
        Err(err) => engine_error_response(&app, err),
    };
    app.metrics().record_user(start.elapsed());
    response
}

pub(super) async fn post_action(
    AxumState(app): AxumState<Arc<App>>,
    Path(identity): Path<String>,
    headers: HeaderMap,
    Json(request): Json<ActionRequest>,
) -> Response {
    let start = Instant::now();
    let user = match authorize(&app, &headers, Some(&identity)) {
        Ok(user) => user,
        Err(response) => return response,
    };
    let kind: ActionKind = match request.action.parse() {
        Ok(kind) => kind,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "unknown action", "action": request.action })),
            )
                .into_response();
        }
    };
    let response = match app
        .engine()
        .act(&identity, &user.profile(), kind, now_ms())
        .await
    {
        Ok(outcome) => {
            app.metrics()
                .record_event(kind == ActionKind::Tap, &outcome.event);
            Json(outcome).into_response()
        }
        Err(err) => engine_error_response(&app, err),
    };
    app.metrics().record_action(start.elapsed());
    response
}

pub(super) async fn leaderboard(
    AxumState(app): AxumState<Arc<App>>,
    headers: HeaderMap,
) -> Response {
    let start = Instant::now();
    // Any verified user may read the board; no identity match required.
    if let Err(response) = authorize(&app, &headers, None) {
        return response;
    }
    let response = match app.engine().store().top(app.config().leaderboard_limit).await {
        Ok(rows) => Json(rows).into_response(),
        Err(err) => engine_error_response(&app, EngineError::Storage(err)),
    };
    app.metrics().record_leaderboard(start.elapsed());
    response
}

pub(super) async fn metrics(
    headers: HeaderMap,
    AxumState(app): AxumState<Arc<App>>,
) -> Response {
    if let Some(status) = metrics_auth_error(&headers) {
        return status.into_response();
    }
    Json(app.metrics().snapshot()).into_response()
}

fn metrics_auth_error(headers: &HeaderMap) -> Option<StatusCode> {
    let token = std::env::var("METRICS_AUTH_TOKEN").unwrap_or_default();
    if token.is_empty() {
        return None;
    }
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_string);
    let header_token = headers
        .get("x-metrics-token")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    if bearer.as_deref() == Some(token.as_str()) || header_token.as_deref() == Some(token.as_str()) {
        None
    } else {
        Some(StatusCode::UNAUTHORIZED)
    }
}
