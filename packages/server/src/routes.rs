use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json, Router,
};
use serde::Serialize;

use crate::models::error::GameError;
use crate::services::storage::StoreError;
use crate::state::AppState;

mod game;
mod players;
mod profile;

pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .nest("/api/game", game::routes(state.clone()))
        .nest("/api/players", players::routes(state.clone()))
        .nest("/api/profile", profile::routes(state))
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn ok(message: String) -> Json<Self> {
        Json(MessageResponse {
            success: true,
            message,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<GameError>,
}

impl IntoResponse for GameError {
    fn into_response(self) -> Response {
        let status = match self {
            GameError::SessionNotFound => StatusCode::NOT_FOUND,
            GameError::NotAuthorized => StatusCode::FORBIDDEN,
            GameError::AlreadyRegistered
            | GameError::CapacityExceeded
            | GameError::InvalidPhaseForAction { .. } => StatusCode::CONFLICT,
            GameError::InsufficientPlayers { .. } | GameError::UnknownTarget => {
                StatusCode::BAD_REQUEST
            }
        };
        (
            status,
            Json(ErrorResponse {
                success: false,
                error: self.to_string(),
                kind: Some(self),
            }),
        )
            .into_response()
    }
}

impl IntoResponse for StoreError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self, "storage failure");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                success: false,
                error: "Storage is unavailable".to_string(),
                kind: None,
            }),
        )
            .into_response()
    }
}
