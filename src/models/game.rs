use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ==================== BATTLES ====================
/// Mirrored BattleDetailsUpdated event. Immutable once recorded; unique on
/// transaction_hash.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Battle {
    pub id: i64,
    pub attacker_address: String,
    pub defender_address: String,
    pub attacker_won: bool,
    pub battle_reward: String,
    pub attacker_power: String,
    pub defender_power: String,
    pub attacker_level: i32,
    pub defender_level: i32,
    pub transaction_hash: String,
    pub block_number: i64,
    pub timestamp: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

// ==================== PLAYER STATS ====================
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PlayerStatsCache {
    pub player_address: String,
    pub player_level: i32,
    pub total_battles: i32,
    pub battles_won: i32,
    pub kingdom_size: i32,
    pub battle_score: i64,
    pub win_rate: i32,
    pub current_power: String,
    pub pending_reward: String,
    pub league_name: String,
    pub league_id: i32,
    pub last_attack_time: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

// ==================== PLAYER EVENTS (NOTIFICATIONS) ====================
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PlayerEvent {
    pub id: i64,
    pub player_address: String,
    pub event_type: String,
    pub event_data: serde_json::Value,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

// ==================== LEADERBOARD ====================
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LeaderboardEntry {
    pub player_address: String,
    pub ranking: i32,
    pub power: String,
    pub level: i32,
    pub win_rate: i32,
    pub total_battles: i32,
    pub league_name: String,
    pub updated_at: DateTime<Utc>,
}

// ==================== SYNC CHECKPOINT ====================
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SyncStatus {
    pub contract_address: String,
    pub last_synced_block: i64,
    pub is_syncing: bool,
    pub last_sync_time: Option<DateTime<Utc>>,
}

// ==================== TUTORIAL ====================
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TutorialProgress {
    pub wallet_address: String,
    pub completed: bool,
    pub skipped: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

// ==================== BATTLE HISTORY ====================
/// Per-player personal log row, written after an attack confirms and read by
/// the history endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BattleHistoryEntry {
    pub id: i64,
    pub player_address: String,
    pub opponent_address: String,
    pub is_attacker: bool,
    pub won_battle: bool,
    pub battle_reward: Decimal,
    pub block_number: i64,
    pub transaction_hash: String,
    pub battle_timestamp: DateTime<Utc>,
}

// ==================== INSERT PAYLOADS ====================
#[derive(Debug, Clone, PartialEq)]
pub struct NewBattle {
    pub attacker_address: String,
    pub defender_address: String,
    pub attacker_won: bool,
    pub battle_reward: String,
    pub attacker_power: String,
    pub defender_power: String,
    pub attacker_level: i32,
    pub defender_level: i32,
    pub transaction_hash: String,
    pub block_number: i64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPlayerStats {
    pub player_address: String,
    pub player_level: i32,
    pub total_battles: i32,
    pub battles_won: i32,
    pub kingdom_size: i32,
    pub battle_score: i64,
    pub win_rate: i32,
}

#[derive(Debug, Clone)]
pub struct NewLeaderboardEntry {
    pub player_address: String,
    pub ranking: i32,
    pub power: String,
    pub level: i32,
    pub win_rate: i32,
    pub total_battles: i32,
    pub league_name: String,
}

#[derive(Debug, Clone)]
pub struct NewBattleHistoryEntry {
    pub player_address: String,
    pub opponent_address: String,
    pub is_attacker: bool,
    pub won_battle: bool,
    pub battle_reward: Decimal,
    pub block_number: i64,
    pub transaction_hash: String,
    pub battle_timestamp: DateTime<Utc>,
}

// ==================== CONTRACT READ RESPONSES ====================
#[derive(Debug, Clone, Serialize)]
pub struct PlayerProfile {
    pub level: u64,
    pub kingdom_size: u64,
    pub power: String,
    pub total_battles: u64,
    pub battles_won: u64,
    pub win_rate: u64,
    pub can_be_attacked: bool,
    pub last_attack_time: u64,
    pub league: String,
    pub battle_score: u64,
    pub league_id: u64,
}

/// Matchup preview between two players, straight from getBattleDetails.
#[derive(Debug, Clone, Serialize)]
pub struct BattleDetails {
    pub attacker_power: String,
    pub defender_power: String,
    pub attacker_level: u64,
    pub defender_level: u64,
    pub win_probability: u64,
    pub can_attack: bool,
    pub attacker_league: String,
    pub defender_league: String,
    pub is_fair_match: bool,
}

/// Live getPlayerStats snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct PlayerStatsLive {
    pub level: u64,
    pub total_battles: u64,
    pub battles_won: u64,
    pub kingdom_size: u64,
    pub next_attack_time: u64,
    pub win_rate: u64,
    pub league: String,
    pub battle_score: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct GameStats {
    pub total_players: u64,
    pub active_players: u64,
    pub total_battles: u64,
    pub total_kingdom_size: u64,
    pub strongest_player: String,
    pub strongest_player_power: String,
    pub league_counts: Vec<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FairOpponent {
    pub address: String,
    pub power: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PendingReward {
    pub raw: String,
    pub formatted: String,
}

/// Receipt summary returned by state-changing game actions.
#[derive(Debug, Clone, Serialize)]
pub struct TxOutcome {
    pub transaction_hash: String,
    pub block_number: Option<u64>,
}

// ==================== API RESPONSE ====================
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub page: i32,
    pub limit: i32,
    pub total: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_response_success_sets_flag() {
        let response = ApiResponse::success("ok");
        assert!(response.success);
        assert_eq!(response.data, "ok");
    }

    #[test]
    fn battle_serializes_snake_case() {
        let battle = Battle {
            id: 1,
            attacker_address: "0xaa".to_string(),
            defender_address: "0xbb".to_string(),
            attacker_won: true,
            battle_reward: "100".to_string(),
            attacker_power: "5000".to_string(),
            defender_power: "4000".to_string(),
            attacker_level: 3,
            defender_level: 2,
            transaction_hash: "0xdead".to_string(),
            block_number: 42,
            timestamp: Utc::now(),
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&battle).unwrap();
        assert_eq!(json["attacker_address"], "0xaa");
        assert_eq!(json["block_number"], 42);
    }
}
