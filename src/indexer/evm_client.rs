use std::sync::Arc;

use async_trait::async_trait;
use ethers::contract::abigen;
use ethers::providers::{Http, Middleware, Provider};
use ethers::types::{Address, H256};

use crate::error::{classify_provider_error, AppError, Result};

use super::{
    BattleDetailsEvent, BattleResultEvent, BattleSide, EventMeta, GameEventSource,
    LeaguePromotionEvent, PlayerStatsEvent,
};

abigen!(
    KingdomStakers,
    r#"[
        function deposit(uint256 _amount) external
        function withdraw(uint256 _amount) external
        function attackPlayer(address _defender) external
        function expandKingdom() external
        function resetCooldown() external
        function stakedToken() external view returns (address)
        function rewardToken() external view returns (address)
        function pendingReward(address _user) external view returns (uint256)
        function getPlayerStats(address _player) external view returns (uint256 level, uint256 totalBattles, uint256 battlesWon, uint256 kingdomSize, uint256 nextAttackTime, uint256 winRate, string league, uint256 battleScore)
        function getPlayerProfile(address _player) external view returns (uint256 level, uint256 kingdomSize, uint256 power, uint256 totalBattles, uint256 battlesWon, uint256 winRate, bool canBeAttacked, uint256 lastAttackTime, string league, uint256 battleScore, uint256 leagueId)
        function getBattleDetails(address _attacker, address _defender) external view returns (uint256 attackerPower, uint256 defenderPower, uint256 attackerLevel, uint256 defenderLevel, uint256 winProbability, bool canAttack, string attackerLeague, string defenderLeague, bool isFairMatch)
        function getGameStats() external view returns (uint256 totalPlayers, uint256 activePlayers, uint256 totalBattles, uint256 totalKingdomSize, address strongestPlayer, uint256 strongestPlayerPower, uint256[] leagueCounts)
        function getTopPlayers(uint256 _topN) external view returns (address[] players, uint256[] powers, uint256[] levels)
        function findFairOpponents(uint256 _maxResults) external view returns (address[] opponents, uint256[] powers)
        event BattleResult(address indexed attacker, address indexed defender, bool attackerWon, uint256 battleReward, uint256 timestamp)
        event BattleDetailsUpdated(address indexed attacker, address indexed defender, uint256 attackerLevel, uint256 defenderLevel, uint256 attackerPower, uint256 defenderPower, bool attackerWon, uint256 reward, uint256 timestamp)
        event PlayerStatsUpdated(address indexed player, uint256 level, uint256 totalBattles, uint256 battlesWon, uint256 kingdomSize, uint256 battleScore, uint256 winRate, uint256 timestamp)
        event LeaguePromotion(address indexed player, string oldLeague, string newLeague, uint256 newLeagueId, uint256 timestamp)
    ]"#
);

/// Wrap any provider/contract failure into the classified error taxonomy.
pub(crate) fn chain_err<E: ToString>(error: E) -> AppError {
    AppError::Chain(classify_provider_error(&error.to_string()))
}

fn event_meta(meta: &ethers::contract::LogMeta) -> EventMeta {
    EventMeta {
        block_number: meta.block_number.as_u64(),
        transaction_hash: format!("{:#x}", meta.transaction_hash),
        log_index: meta.log_index.as_u64(),
    }
}

/// Read-side client for the game contract over an HTTP JSON-RPC provider.
#[derive(Clone)]
pub struct EvmClient {
    provider: Arc<Provider<Http>>,
    contract: KingdomStakers<Provider<Http>>,
}

impl EvmClient {
    pub fn connect(rpc_url: &str, contract_address: Address) -> Result<Self> {
        let provider = Provider::<Http>::try_from(rpc_url)
            .map_err(|e| AppError::BadRequest(format!("Invalid RPC URL: {}", e)))?;
        let provider = Arc::new(provider);
        let contract = KingdomStakers::new(contract_address, provider.clone());
        Ok(Self { provider, contract })
    }

    pub fn provider(&self) -> Arc<Provider<Http>> {
        self.provider.clone()
    }

    pub fn contract(&self) -> &KingdomStakers<Provider<Http>> {
        &self.contract
    }

    pub fn contract_address(&self) -> Address {
        self.contract.address()
    }
}

#[async_trait]
impl GameEventSource for EvmClient {
    async fn latest_block(&self) -> Result<u64> {
        let block = self
            .provider
            .get_block_number()
            .await
            .map_err(chain_err)?;
        Ok(block.as_u64())
    }

    async fn block_timestamp(&self, block_number: u64) -> Result<u64> {
        let block = self
            .provider
            .get_block(block_number)
            .await
            .map_err(chain_err)?
            .ok_or_else(|| AppError::NotFound(format!("Block {} not found", block_number)))?;
        Ok(block.timestamp.as_u64())
    }

    async fn battle_results(
        &self,
        side: BattleSide,
        player: Address,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<BattleResultEvent>> {
        let mut query = self
            .contract
            .event::<BattleResultFilter>()
            .from_block(from_block)
            .to_block(to_block);
        query = match side {
            BattleSide::Attacker => query.topic1(H256::from(player)),
            BattleSide::Defender => query.topic2(H256::from(player)),
        };

        let logs = query.query_with_meta().await.map_err(chain_err)?;
        Ok(logs
            .into_iter()
            .map(|(event, meta)| BattleResultEvent {
                attacker: event.attacker,
                defender: event.defender,
                attacker_won: event.attacker_won,
                battle_reward: event.battle_reward,
                timestamp: event.timestamp.as_u64(),
                meta: event_meta(&meta),
            })
            .collect())
    }

    async fn battle_details(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<BattleDetailsEvent>> {
        let logs = self
            .contract
            .event::<BattleDetailsUpdatedFilter>()
            .from_block(from_block)
            .to_block(to_block)
            .query_with_meta()
            .await
            .map_err(chain_err)?;
        Ok(logs
            .into_iter()
            .map(|(event, meta)| BattleDetailsEvent {
                attacker: event.attacker,
                defender: event.defender,
                attacker_level: event.attacker_level.as_u64(),
                defender_level: event.defender_level.as_u64(),
                attacker_power: event.attacker_power,
                defender_power: event.defender_power,
                attacker_won: event.attacker_won,
                reward: event.reward,
                timestamp: event.timestamp.as_u64(),
                meta: event_meta(&meta),
            })
            .collect())
    }

    async fn player_stats_updates(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<PlayerStatsEvent>> {
        let logs = self
            .contract
            .event::<PlayerStatsUpdatedFilter>()
            .from_block(from_block)
            .to_block(to_block)
            .query_with_meta()
            .await
            .map_err(chain_err)?;
        Ok(logs
            .into_iter()
            .map(|(event, meta)| PlayerStatsEvent {
                player: event.player,
                level: event.level.as_u64(),
                total_battles: event.total_battles.as_u64(),
                battles_won: event.battles_won.as_u64(),
                kingdom_size: event.kingdom_size.as_u64(),
                battle_score: event.battle_score.as_u64(),
                win_rate: event.win_rate.as_u64(),
                timestamp: event.timestamp.as_u64(),
                meta: event_meta(&meta),
            })
            .collect())
    }

    async fn league_promotions(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<LeaguePromotionEvent>> {
        let logs = self
            .contract
            .event::<LeaguePromotionFilter>()
            .from_block(from_block)
            .to_block(to_block)
            .query_with_meta()
            .await
            .map_err(chain_err)?;
        Ok(logs
            .into_iter()
            .map(|(event, meta)| LeaguePromotionEvent {
                player: event.player,
                old_league: event.old_league,
                new_league: event.new_league,
                new_league_id: event.new_league_id.as_u64(),
                timestamp: event.timestamp.as_u64(),
                meta: event_meta(&meta),
            })
            .collect())
    }
}
