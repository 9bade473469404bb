use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;

use crate::{models::history::ProfileStats, services::storage::StoreError, state::AppState};

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    player_id: String,
    #[serde(flatten)]
    stats: ProfileStats,
    win_rate: f64,
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/:player_id", get(get_profile))
        .with_state(state)
}

async fn get_profile(
    State(state): State<AppState>,
    Path(player_id): Path<String>,
) -> Result<impl IntoResponse, StoreError> {
    let stats = state.manager.profile(&player_id).await?;
    Ok(Json(ProfileResponse {
        player_id,
        win_rate: stats.win_rate(),
        stats,
    }))
}
