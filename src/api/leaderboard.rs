use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use crate::error::Result;
use crate::models::{ApiResponse, LeaderboardEntry};

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    pub limit: Option<i64>,
}

/// GET /api/v1/leaderboard
pub async fn get_leaderboard(
    State(state): State<AppState>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<ApiResponse<Vec<LeaderboardEntry>>>> {
    let limit = query.limit.unwrap_or(100).clamp(1, 500);
    let entries = state.db.get_leaderboard(limit).await?;
    Ok(Json(ApiResponse::success(entries)))
}
