pub mod evm_client;
pub mod log_scanner;

use async_trait::async_trait;
use ethers::types::{Address, U256};

use crate::error::Result;

/// Log position of an emitted event, used for ordering and deduplication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventMeta {
    pub block_number: u64,
    pub transaction_hash: String,
    pub log_index: u64,
}

impl EventMeta {
    /// Unique transaction position within the chain.
    pub fn position(&self) -> (u64, u64) {
        (self.block_number, self.log_index)
    }
}

/// BattleResult(address indexed attacker, address indexed defender, ...)
#[derive(Debug, Clone, PartialEq)]
pub struct BattleResultEvent {
    pub attacker: Address,
    pub defender: Address,
    pub attacker_won: bool,
    pub battle_reward: U256,
    pub timestamp: u64,
    pub meta: EventMeta,
}

impl BattleResultEvent {
    pub fn involves(&self, player: Address) -> bool {
        self.attacker == player || self.defender == player
    }
}

/// BattleDetailsUpdated carries the full battle snapshot mirrored into the
/// battles table.
#[derive(Debug, Clone, PartialEq)]
pub struct BattleDetailsEvent {
    pub attacker: Address,
    pub defender: Address,
    pub attacker_level: u64,
    pub defender_level: u64,
    pub attacker_power: U256,
    pub defender_power: U256,
    pub attacker_won: bool,
    pub reward: U256,
    pub timestamp: u64,
    pub meta: EventMeta,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerStatsEvent {
    pub player: Address,
    pub level: u64,
    pub total_battles: u64,
    pub battles_won: u64,
    pub kingdom_size: u64,
    pub battle_score: u64,
    pub win_rate: u64,
    pub timestamp: u64,
    pub meta: EventMeta,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LeaguePromotionEvent {
    pub player: Address,
    pub old_league: String,
    pub new_league: String,
    pub new_league_id: u64,
    pub timestamp: u64,
    pub meta: EventMeta,
}

/// Which indexed topic a battle-result filter pins down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BattleSide {
    Attacker,
    Defender,
}

/// Read access to the game contract's event logs. Implemented by the ethers
/// client; swapped for an in-memory provider in tests.
#[async_trait]
pub trait GameEventSource: Send + Sync {
    async fn latest_block(&self) -> Result<u64>;

    async fn block_timestamp(&self, block_number: u64) -> Result<u64>;

    /// BattleResult logs with the given player pinned on one indexed side.
    async fn battle_results(
        &self,
        side: BattleSide,
        player: Address,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<BattleResultEvent>>;

    async fn battle_details(&self, from_block: u64, to_block: u64)
        -> Result<Vec<BattleDetailsEvent>>;

    async fn player_stats_updates(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<PlayerStatsEvent>>;

    async fn league_promotions(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<LeaguePromotionEvent>>;
}
