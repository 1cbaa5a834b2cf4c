use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{ApiResponse, PaginatedResponse, PlayerEvent};
use crate::utils::{address_key, parse_address};

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct ListEventsQuery {
    pub address: String,
    pub unread_only: Option<bool>,
    pub page: Option<i32>,
    pub limit: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct MarkReadRequest {
    pub address: String,
    pub event_ids: Vec<i64>,
}

#[derive(Debug, Deserialize)]
pub struct MarkAllReadRequest {
    pub address: String,
}

#[derive(Debug, Deserialize)]
pub struct EventStatsQuery {
    pub address: String,
}

#[derive(Debug, Serialize)]
pub struct EventStats {
    pub unread_count: i64,
    pub total_count: i64,
}

/// GET /api/v1/events/list
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListEventsQuery>,
) -> Result<Json<ApiResponse<PaginatedResponse<PlayerEvent>>>> {
    let key = address_key(&parse_address(&query.address)?);
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(20).clamp(1, 200);
    let offset = (page - 1) * limit;

    let events = state
        .db
        .get_player_events(
            &key,
            query.unread_only.unwrap_or(false),
            limit as i64,
            offset as i64,
        )
        .await?;
    let (_, total) = state.db.player_event_stats(&key).await?;

    Ok(Json(ApiResponse::success(PaginatedResponse {
        items: events,
        page,
        limit,
        total,
    })))
}

/// POST /api/v1/events/mark-read
pub async fn mark_read(
    State(state): State<AppState>,
    Json(req): Json<MarkReadRequest>,
) -> Result<Json<ApiResponse<String>>> {
    let key = address_key(&parse_address(&req.address)?);
    for id in req.event_ids {
        state.db.mark_event_read(id, &key).await?;
    }
    Ok(Json(ApiResponse::success("Events marked as read".to_string())))
}

/// POST /api/v1/events/mark-all-read
pub async fn mark_all_read(
    State(state): State<AppState>,
    Json(req): Json<MarkAllReadRequest>,
) -> Result<Json<ApiResponse<String>>> {
    let key = address_key(&parse_address(&req.address)?);
    state.db.mark_all_events_read(&key).await?;
    Ok(Json(ApiResponse::success(
        "All events marked as read".to_string(),
    )))
}

/// GET /api/v1/events/stats
pub async fn get_stats(
    State(state): State<AppState>,
    Query(query): Query<EventStatsQuery>,
) -> Result<Json<ApiResponse<EventStats>>> {
    let key = address_key(&parse_address(&query.address)?);
    let (unread_count, total_count) = state.db.player_event_stats(&key).await?;
    Ok(Json(ApiResponse::success(EventStats {
        unread_count,
        total_count,
    })))
}
