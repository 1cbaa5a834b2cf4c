use axum::{
    extract::{Query, State},
    Json,
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::Result;
use crate::models::{
    ApiResponse, BattleDetails, FairOpponent, GameStats, NewBattleHistoryEntry, TxOutcome,
};
use crate::services::game_service::BattleSummary;
use crate::utils::{
    address_key, format_token_amount, format_token_amount_with_decimals, parse_address,
};

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct AmountRequest {
    pub amount: String,
}

#[derive(Debug, Deserialize)]
pub struct AttackRequest {
    pub defender: String,
}

#[derive(Debug, Deserialize)]
pub struct OpponentsQuery {
    pub max_results: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct AttackResponse {
    pub outcome: TxOutcome,
    pub attacker_won: Option<bool>,
    pub battle_reward: Option<String>,
}

/// GET /api/v1/game/stats
pub async fn get_stats(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<GameStats>>> {
    let stats = state.game.game_stats().await?;
    Ok(Json(ApiResponse::success(stats)))
}

#[derive(Debug, Deserialize)]
pub struct BattleDetailsQuery {
    pub attacker: String,
    pub defender: String,
}

/// GET /api/v1/game/battle-details (matchup preview between two players)
pub async fn get_battle_details(
    State(state): State<AppState>,
    Query(query): Query<BattleDetailsQuery>,
) -> Result<Json<ApiResponse<BattleDetails>>> {
    let attacker = parse_address(&query.attacker)?;
    let defender = parse_address(&query.defender)?;
    let details = state.game.battle_details(attacker, defender).await?;
    Ok(Json(ApiResponse::success(details)))
}

/// GET /api/v1/game/opponents
pub async fn get_opponents(
    State(state): State<AppState>,
    Query(query): Query<OpponentsQuery>,
) -> Result<Json<ApiResponse<Vec<FairOpponent>>>> {
    let max_results = query.max_results.unwrap_or(5).clamp(1, 20);
    let opponents = state.game.fair_opponents(max_results).await?;
    Ok(Json(ApiResponse::success(opponents)))
}

/// POST /api/v1/game/deposit
pub async fn deposit(
    State(state): State<AppState>,
    Json(req): Json<AmountRequest>,
) -> Result<Json<ApiResponse<TxOutcome>>> {
    let outcome = state.game.deposit(&req.amount).await?;
    Ok(Json(ApiResponse::success(outcome)))
}

/// POST /api/v1/game/withdraw
pub async fn withdraw(
    State(state): State<AppState>,
    Json(req): Json<AmountRequest>,
) -> Result<Json<ApiResponse<TxOutcome>>> {
    let outcome = state.game.withdraw(&req.amount).await?;
    Ok(Json(ApiResponse::success(outcome)))
}

/// POST /api/v1/game/attack
///
/// The on-chain action is authoritative; recording the result into
/// battle_history is best-effort and never fails the request.
pub async fn attack(
    State(state): State<AppState>,
    Json(req): Json<AttackRequest>,
) -> Result<Json<ApiResponse<AttackResponse>>> {
    let defender = parse_address(&req.defender)?;
    let (outcome, summary) = state.game.attack_player(defender).await?;

    if let Some(summary) = &summary {
        if let Some(entry) = history_entry(summary, &outcome) {
            if let Err(err) = state.db.upsert_battle_history(&entry).await {
                tracing::warn!(
                    "Failed to record battle history for {}: {}",
                    entry.player_address,
                    err
                );
            }
        }
    }

    Ok(Json(ApiResponse::success(AttackResponse {
        attacker_won: summary.as_ref().map(|s| s.attacker_won),
        battle_reward: summary.as_ref().map(|s| format_token_amount(s.reward)),
        outcome,
    })))
}

/// POST /api/v1/game/expand-kingdom
pub async fn expand_kingdom(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<TxOutcome>>> {
    let outcome = state.game.expand_kingdom().await?;
    Ok(Json(ApiResponse::success(outcome)))
}

/// POST /api/v1/game/reset-cooldown
pub async fn reset_cooldown(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<TxOutcome>>> {
    let outcome = state.game.reset_cooldown().await?;
    Ok(Json(ApiResponse::success(outcome)))
}

fn history_entry(summary: &BattleSummary, outcome: &TxOutcome) -> Option<NewBattleHistoryEntry> {
    let reward = Decimal::from_str(&format_token_amount_with_decimals(summary.reward, 4)).ok()?;
    Some(NewBattleHistoryEntry {
        player_address: address_key(&summary.attacker),
        opponent_address: address_key(&summary.defender),
        is_attacker: true,
        won_battle: summary.attacker_won,
        battle_reward: reward,
        block_number: outcome.block_number.unwrap_or(0) as i64,
        transaction_hash: outcome.transaction_hash.clone(),
        battle_timestamp: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::{Address, U256};

    #[test]
    fn history_entry_records_attacker_side() {
        let summary = BattleSummary {
            attacker: Address::from_low_u64_be(1),
            defender: Address::from_low_u64_be(2),
            attacker_won: true,
            reward: U256::exp10(18) * U256::from(5u64),
        };
        let outcome = TxOutcome {
            transaction_hash: "0xbeef".to_string(),
            block_number: Some(77),
        };

        let entry = history_entry(&summary, &outcome).unwrap();
        assert!(entry.is_attacker);
        assert!(entry.won_battle);
        assert_eq!(entry.block_number, 77);
        assert_eq!(entry.battle_reward, Decimal::from_str("5.0000").unwrap());
        assert_eq!(entry.transaction_hash, "0xbeef");
    }
}
