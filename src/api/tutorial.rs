use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;

use crate::error::Result;
use crate::models::{ApiResponse, TutorialProgress};
use crate::utils::{address_key, parse_address};

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct SaveTutorialRequest {
    pub completed: bool,
    pub skipped: bool,
}

/// GET /api/v1/tutorial/{address}
pub async fn get_progress(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<ApiResponse<Option<TutorialProgress>>>> {
    let key = address_key(&parse_address(&address)?);
    let progress = state.db.get_tutorial_progress(&key).await?;
    Ok(Json(ApiResponse::success(progress)))
}

/// POST /api/v1/tutorial/{address}
pub async fn save_progress(
    State(state): State<AppState>,
    Path(address): Path<String>,
    Json(req): Json<SaveTutorialRequest>,
) -> Result<Json<ApiResponse<TutorialProgress>>> {
    let key = address_key(&parse_address(&address)?);
    let progress = state
        .db
        .save_tutorial_progress(&key, req.completed, req.skipped)
        .await?;
    Ok(Json(ApiResponse::success(progress)))
}
