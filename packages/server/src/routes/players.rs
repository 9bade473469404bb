use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;

use crate::{routes::ErrorResponse, state::AppState};

#[derive(Debug, Serialize)]
pub struct PlayerVenue {
    player_id: String,
    venue_id: String,
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/:player_id/venue", get(get_player_venue))
        .with_state(state)
}

async fn get_player_venue(
    State(state): State<AppState>,
    Path(player_id): Path<String>,
) -> impl IntoResponse {
    match state.manager.venue_of(&player_id).await {
        Some(venue_id) => (
            StatusCode::OK,
            Json(PlayerVenue {
                player_id,
                venue_id,
            }),
        )
            .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                success: false,
                error: "Player is not in a game".to_string(),
                kind: None,
            }),
        )
            .into_response(),
    }
}
