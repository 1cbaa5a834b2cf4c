use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::constants::MAX_SCAN_RESULTS;
use crate::error::Result;
use crate::indexer::log_scanner::{scan_battle_history, ScanConfig};
use crate::indexer::BattleResultEvent;
use crate::models::{
    ApiResponse, Battle, BattleHistoryEntry, PendingReward, PlayerProfile, PlayerStatsCache,
};
use crate::utils::{address_key, parse_address};

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

/// Scanner output shaped for the API.
#[derive(Debug, Serialize)]
pub struct BattleLogItem {
    pub attacker: String,
    pub defender: String,
    pub attacker_won: bool,
    pub battle_reward: String,
    pub timestamp: u64,
    pub block_number: u64,
    pub transaction_hash: String,
    pub log_index: u64,
}

impl From<BattleResultEvent> for BattleLogItem {
    fn from(event: BattleResultEvent) -> Self {
        Self {
            attacker: address_key(&event.attacker),
            defender: address_key(&event.defender),
            attacker_won: event.attacker_won,
            battle_reward: event.battle_reward.to_string(),
            timestamp: event.timestamp,
            block_number: event.meta.block_number,
            transaction_hash: event.meta.transaction_hash,
            log_index: event.meta.log_index,
        }
    }
}

/// GET /api/v1/players/{address}/stats
pub async fn get_stats(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<ApiResponse<Option<PlayerStatsCache>>>> {
    let key = address_key(&parse_address(&address)?);
    let stats = state.db.get_player_stats(&key).await?;
    Ok(Json(ApiResponse::success(stats)))
}

/// GET /api/v1/players/{address}/profile
pub async fn get_profile(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<ApiResponse<PlayerProfile>>> {
    let player = parse_address(&address)?;
    let profile = state.game.player_profile(player).await?;
    Ok(Json(ApiResponse::success(profile)))
}

/// GET /api/v1/players/{address}/battles (cache-backed, newest first)
pub async fn get_battles(
    State(state): State<AppState>,
    Path(address): Path<String>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<ApiResponse<Vec<Battle>>>> {
    let key = address_key(&parse_address(&address)?);
    let limit = query.limit.unwrap_or(50).clamp(1, 200);
    let battles = state.db.get_battles_for_player(&key, limit).await?;
    Ok(Json(ApiResponse::success(battles)))
}

/// GET /api/v1/players/{address}/battle-log (live on-chain scan)
pub async fn get_battle_log(
    State(state): State<AppState>,
    Path(address): Path<String>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<ApiResponse<Vec<BattleLogItem>>>> {
    let player = parse_address(&address)?;
    let limit = query.limit.unwrap_or(20).clamp(1, MAX_SCAN_RESULTS as i64) as usize;

    let events = scan_battle_history(
        state.game.source(),
        player,
        limit,
        &ScanConfig::default(),
    )
    .await?;

    let items = events.into_iter().map(BattleLogItem::from).collect();
    Ok(Json(ApiResponse::success(items)))
}

/// GET /api/v1/players/{address}/history (personal battle_history rows)
pub async fn get_history(
    State(state): State<AppState>,
    Path(address): Path<String>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<ApiResponse<Vec<BattleHistoryEntry>>>> {
    let key = address_key(&parse_address(&address)?);
    let limit = query.limit.unwrap_or(20).clamp(1, 100);
    let entries = state.db.get_battle_history(&key, limit).await?;
    Ok(Json(ApiResponse::success(entries)))
}

/// GET /api/v1/players/{address}/pending-reward
pub async fn get_pending_reward(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<ApiResponse<PendingReward>>> {
    let player = parse_address(&address)?;
    let reward = state.game.pending_reward(player).await?;
    Ok(Json(ApiResponse::success(reward)))
}
