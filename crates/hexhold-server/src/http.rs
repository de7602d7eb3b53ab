//! HTTP surface: registration, color change, history export, health, and
//! static assets.

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use hexhold_protocol::{GameEvent, PlayerId, RoomId};

use crate::auth::{Auth, AuthError, RegisteredPlayer};
use crate::data::{now_ms, DataError, GameData};
use crate::rooms::RoomRegistry;

#[derive(Clone)]
pub struct AppState {
    pub data: GameData,
    pub auth: Arc<Auth>,
    pub registry: RoomRegistry,
}

pub fn router(state: AppState, static_dir: PathBuf) -> Router {
    Router::new()
        .route("/api/register", post(register))
        .route("/api/player/color", post(change_color))
        .route("/api/history", get(history))
        .route("/api/lobby", post(join_lobby))
        .route("/health", get(health))
        .route("/ws/:room_id", get(crate::ws::ws_handler))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// API error taxonomy mapped onto status codes.
enum ApiError {
    BadInput(&'static str),
    AuthFailed,
    Gone(&'static str),
    Unavailable,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadInput(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::AuthFailed => (StatusCode::UNAUTHORIZED, "invalid token"),
            ApiError::Gone(msg) => (StatusCode::GONE, msg),
            ApiError::Unavailable => (StatusCode::INTERNAL_SERVER_ERROR, "backend unavailable"),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<DataError> for ApiError {
    fn from(err: DataError) -> Self {
        match err {
            DataError::NotFound("player") => ApiError::Gone("player not found"),
            other => {
                tracing::warn!(error = %other, "data layer failure");
                ApiError::Unavailable
            }
        }
    }
}

#[derive(Deserialize)]
struct RegisterBody {
    username: String,
}

async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterBody>,
) -> Result<Json<RegisteredPlayer>, ApiError> {
    match state.auth.register(&state.data, &body.username).await {
        Ok(registered) => Ok(Json(registered)),
        Err(AuthError::BadUsername) => Err(ApiError::BadInput("username must be 2-24 characters")),
        Err(AuthError::Unavailable(err)) => Err(err.into()),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ColorBody {
    player_id: PlayerId,
    token: String,
    color: String,
}

async fn change_color(
    State(state): State<AppState>,
    Json(body): Json<ColorBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !state.auth.verify(&body.player_id, &body.token) {
        return Err(ApiError::AuthFailed);
    }
    if !is_valid_color(&body.color) {
        return Err(ApiError::BadInput("color must match #RRGGBB"));
    }
    state
        .data
        .set_player_color(&body.player_id, &body.color)
        .await?;
    Ok(Json(json!({ "ok": true })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoryQuery {
    lobby_id: String,
}

#[derive(Serialize)]
struct HistoryResponse {
    clicks: Vec<GameEvent>,
}

/// Event log export used by the replay viewer.
async fn history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    if query.lobby_id.is_empty() {
        return Err(ApiError::BadInput("lobbyId is required"));
    }
    let clicks = state
        .data
        .get_game_events(&RoomId::new(query.lobby_id))
        .await?;
    Ok(Json(HistoryResponse { clicks }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LobbyResponse {
    room_id: RoomId,
}

/// Matchmaking entry point: hand back a lobby with spare capacity, opening a
/// fresh one when every lobby is full.
async fn join_lobby(State(state): State<AppState>) -> Result<Json<LobbyResponse>, ApiError> {
    let handle = state.registry.find_or_create_lobby().await?;
    Ok(Json(LobbyResponse { room_id: handle.id }))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let kv = state.data.kv().is_available().await;
    Json(json!({
        "status": if kv { "healthy" } else { "degraded" },
        "timestamp": now_ms(),
        "kv": kv,
    }))
}

fn is_valid_color(color: &str) -> bool {
    let Some(hex) = color.strip_prefix('#') else {
        return false;
    };
    hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit())
}
