//! REST surface: health, metrics, TURN credentials, media tokens, presence,
//! and identity lookups alongside the WebSocket signaling transport.

use crate::network::gateway::GatewayState;
use crate::state::ids::UserId;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use serde_json::json;

pub fn routes() -> Router<GatewayState> {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/api/turn-credentials", get(turn_credentials))
        .route("/api/livekit/token", post(livekit_token))
        .route("/api/presence", get(presence))
        .route("/whoami", get(whoami))
        .route("/api/exists/:user_id", get(exists))
}

async fn health(State(state): State<GatewayState>) -> impl IntoResponse {
    let storage = if state.core.store.is_degraded() { "degraded" } else { "ok" };
    Json(json!({ "ok": true, "storage": storage }))
}

async fn metrics() -> String {
    crate::metrics::gather_metrics()
}

#[derive(Deserialize)]
struct TurnQuery {
    ttl: Option<u64>,
}

async fn turn_credentials(
    State(state): State<GatewayState>,
    Query(query): Query<TurnQuery>,
) -> impl IntoResponse {
    match state.core.turn.issue(query.ttl) {
        Some(creds) => Json(creds).into_response(),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "ok": false, "error": "turn_secret_not_configured" })),
        )
            .into_response(),
    }
}

#[derive(Deserialize)]
struct LivekitTokenRequest {
    #[serde(rename = "userId")]
    user_id: String,
    #[serde(rename = "roomName")]
    room_name: String,
}

async fn livekit_token(
    State(state): State<GatewayState>,
    Json(body): Json<LivekitTokenRequest>,
) -> impl IntoResponse {
    let user_id = UserId::from(body.user_id.as_str());
    match state.core.media_tokens.mint(&user_id, &body.room_name).await {
        Ok(token) => Json(json!({ "token": token.token, "url": token.url })).into_response(),
        Err(err) => {
            tracing::warn!(error = %err, "livekit token mint failed");
            (StatusCode::BAD_GATEWAY, Json(json!({ "error": "token_mint_failed" }))).into_response()
        }
    }
}

async fn presence(State(state): State<GatewayState>) -> impl IntoResponse {
    let list: Vec<String> = state.core.connections.online_users().into_iter().map(|u| u.to_string()).collect();
    Json(json!({ "ok": true, "list": list }))
}

#[derive(Deserialize)]
struct WhoamiQuery {
    #[serde(rename = "installId")]
    install_id: String,
}

async fn whoami(State(state): State<GatewayState>, Query(query): Query<WhoamiQuery>) -> impl IntoResponse {
    match state.core.directory.resolve_install(&query.install_id).await {
        Ok(Some(user_id)) => Json(json!({ "ok": true, "userId": user_id })).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, Json(json!({ "ok": false }))).into_response(),
        Err(err) => {
            tracing::warn!(error = %err, "whoami lookup failed");
            (StatusCode::BAD_GATEWAY, Json(json!({ "ok": false }))).into_response()
        }
    }
}

async fn exists(State(state): State<GatewayState>, Path(user_id): Path<String>) -> impl IntoResponse {
    let user_id = UserId::from(user_id.as_str());
    match state.core.directory.exists(&user_id).await {
        Ok(exists) => Json(json!({ "ok": true, "exists": exists })).into_response(),
        Err(err) => {
            tracing::warn!(error = %err, "exists lookup failed");
            (StatusCode::BAD_GATEWAY, Json(json!({ "ok": false, "exists": false }))).into_response()
        }
    }
}
