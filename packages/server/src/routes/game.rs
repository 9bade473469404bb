use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::models::{error::GameError, role::ActionKind, vote::ExecutionDecision};
use crate::routes::MessageResponse;
use crate::services::storage::StoreError;
use crate::state::AppState;
use crate::utils::websocket;

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub player_id: String,
    pub display_name: String,
}

/// Body of start, end and phase/next.
#[derive(Debug, Serialize, Deserialize)]
pub struct RequesterRequest {
    pub requester_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NightActionRequest {
    pub actor_id: String,
    pub target_id: String,
    #[serde(default)]
    pub kind: Option<ActionKind>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VoteRequest {
    pub voter_id: String,
    pub target_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub requester_id: String,
    pub target_id: String,
    pub decision: ExecutionDecision,
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .nest(
            "/:venue_id",
            Router::new()
                // 参加と開始
                .route("/register", post(register_handler))
                .route("/start", post(start_handler))
                .route("/end", post(end_handler))
                // ゲームアクション
                .route("/night-action", post(night_action_handler))
                .route("/vote", post(vote_handler))
                .route("/execution", post(execution_handler))
                // 進行と参照
                .route("/phase/next", post(advance_phase_handler))
                .route("/state", get(state_handler))
                .route("/role/:player_id", get(role_handler))
                .route("/history", get(history_handler))
                .route("/ws", get(websocket::handler)),
        )
        .with_state(state)
}

async fn register_handler(
    State(state): State<AppState>,
    Path(venue_id): Path<String>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, GameError> {
    let message = state
        .manager
        .register(&venue_id, &req.player_id, &req.display_name)
        .await?;
    Ok(MessageResponse::ok(message))
}

async fn start_handler(
    State(state): State<AppState>,
    Path(venue_id): Path<String>,
    Json(req): Json<RequesterRequest>,
) -> Result<impl IntoResponse, GameError> {
    let authorized = state.is_admin(&req.requester_id);
    let message = state
        .manager
        .start(&venue_id, &req.requester_id, authorized)
        .await?;
    Ok(MessageResponse::ok(message))
}

async fn end_handler(
    State(state): State<AppState>,
    Path(venue_id): Path<String>,
    Json(req): Json<RequesterRequest>,
) -> Result<impl IntoResponse, GameError> {
    let authorized = state.is_admin(&req.requester_id);
    let message = state
        .manager
        .force_end(&venue_id, &req.requester_id, authorized)
        .await?;
    Ok(MessageResponse::ok(message))
}

async fn night_action_handler(
    State(state): State<AppState>,
    Path(venue_id): Path<String>,
    Json(req): Json<NightActionRequest>,
) -> Result<impl IntoResponse, GameError> {
    let message = state
        .manager
        .submit_night_action(&venue_id, &req.actor_id, &req.target_id, req.kind)
        .await?;
    Ok(MessageResponse::ok(message))
}

async fn vote_handler(
    State(state): State<AppState>,
    Path(venue_id): Path<String>,
    Json(req): Json<VoteRequest>,
) -> Result<impl IntoResponse, GameError> {
    let message = state
        .manager
        .cast_vote(&venue_id, &req.voter_id, &req.target_id)
        .await?;
    Ok(MessageResponse::ok(message))
}

async fn execution_handler(
    State(state): State<AppState>,
    Path(venue_id): Path<String>,
    Json(req): Json<ExecutionRequest>,
) -> Result<impl IntoResponse, GameError> {
    let authorized = state.is_admin(&req.requester_id);
    let message = state
        .manager
        .decide_execution(
            &venue_id,
            &req.requester_id,
            &req.target_id,
            req.decision,
            authorized,
        )
        .await?;
    Ok(MessageResponse::ok(message))
}

async fn advance_phase_handler(
    State(state): State<AppState>,
    Path(venue_id): Path<String>,
    Json(req): Json<RequesterRequest>,
) -> Result<impl IntoResponse, GameError> {
    let authorized = state.is_admin(&req.requester_id);
    let message = state
        .manager
        .advance_phase(&venue_id, &req.requester_id, authorized)
        .await?;
    Ok(MessageResponse::ok(message))
}

async fn state_handler(
    State(state): State<AppState>,
    Path(venue_id): Path<String>,
) -> Result<impl IntoResponse, GameError> {
    Ok(Json(state.manager.view(&venue_id).await?))
}

async fn role_handler(
    State(state): State<AppState>,
    Path((venue_id, player_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, GameError> {
    let briefing = state.manager.role_briefing(&venue_id, &player_id).await?;
    Ok(MessageResponse::ok(briefing))
}

async fn history_handler(
    State(state): State<AppState>,
    Path(venue_id): Path<String>,
) -> Result<impl IntoResponse, StoreError> {
    Ok(Json(state.manager.history(&venue_id).await?))
}
