use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ethers::providers::{Middleware, Provider, Ws};
use ethers::types::Address;
use futures_util::StreamExt;

use crate::db::Database;
use crate::error::{AppError, Result};
use crate::indexer::evm_client::{chain_err, BattleDetailsUpdatedFilter, KingdomStakers};
use crate::indexer::{BattleDetailsEvent, EventMeta, GameEventSource, LeaguePromotionEvent, PlayerStatsEvent};
use crate::models::{NewBattle, NewPlayerStats, SyncStatus};
use crate::utils::address_key;

/// Write seam between the synchronizer and the cache store. `Database` is the
/// production implementation; tests use an in-memory one.
#[async_trait]
pub trait SyncStore: Send + Sync {
    async fn get_sync_status(&self, contract_address: &str) -> Result<Option<SyncStatus>>;
    async fn mark_syncing(&self, contract_address: &str, is_syncing: bool) -> Result<()>;
    async fn advance_checkpoint(
        &self,
        contract_address: &str,
        last_synced_block: i64,
        is_syncing: bool,
    ) -> Result<()>;
    async fn upsert_battle(&self, battle: &NewBattle) -> Result<()>;
    async fn insert_player_event(
        &self,
        address: &str,
        event_type: &str,
        event_data: serde_json::Value,
    ) -> Result<()>;
    async fn upsert_player_stats(&self, stats: &NewPlayerStats) -> Result<()>;
}

#[async_trait]
impl SyncStore for Database {
    async fn get_sync_status(&self, contract_address: &str) -> Result<Option<SyncStatus>> {
        Database::get_sync_status(self, contract_address).await
    }

    async fn mark_syncing(&self, contract_address: &str, is_syncing: bool) -> Result<()> {
        Database::mark_syncing(self, contract_address, is_syncing).await
    }

    async fn advance_checkpoint(
        &self,
        contract_address: &str,
        last_synced_block: i64,
        is_syncing: bool,
    ) -> Result<()> {
        Database::advance_checkpoint(self, contract_address, last_synced_block, is_syncing).await
    }

    async fn upsert_battle(&self, battle: &NewBattle) -> Result<()> {
        Database::upsert_battle(self, battle).await
    }

    async fn insert_player_event(
        &self,
        address: &str,
        event_type: &str,
        event_data: serde_json::Value,
    ) -> Result<()> {
        Database::insert_player_event(self, address, event_type, event_data).await
    }

    async fn upsert_player_stats(&self, stats: &NewPlayerStats) -> Result<()> {
        Database::upsert_player_stats(self, stats).await
    }
}

/// Database-backed store that additionally pushes each new notification to
/// connected websocket subscribers.
#[derive(Clone)]
pub struct BroadcastingStore {
    db: Database,
    broker: crate::services::notifications::PlayerEventBroker,
}

impl BroadcastingStore {
    pub fn new(db: Database, broker: crate::services::notifications::PlayerEventBroker) -> Self {
        Self { db, broker }
    }
}

#[async_trait]
impl SyncStore for BroadcastingStore {
    async fn get_sync_status(&self, contract_address: &str) -> Result<Option<SyncStatus>> {
        self.db.get_sync_status(contract_address).await
    }

    async fn mark_syncing(&self, contract_address: &str, is_syncing: bool) -> Result<()> {
        self.db.mark_syncing(contract_address, is_syncing).await
    }

    async fn advance_checkpoint(
        &self,
        contract_address: &str,
        last_synced_block: i64,
        is_syncing: bool,
    ) -> Result<()> {
        self.db
            .advance_checkpoint(contract_address, last_synced_block, is_syncing)
            .await
    }

    async fn upsert_battle(&self, battle: &NewBattle) -> Result<()> {
        self.db.upsert_battle(battle).await
    }

    async fn insert_player_event(
        &self,
        address: &str,
        event_type: &str,
        event_data: serde_json::Value,
    ) -> Result<()> {
        self.db
            .insert_player_event(address, event_type, event_data.clone())
            .await?;
        self.broker.publish(address, event_type, event_data).await;
        Ok(())
    }

    async fn upsert_player_stats(&self, stats: &NewPlayerStats) -> Result<()> {
        self.db.upsert_player_stats(stats).await
    }
}

/// Requested block bounds. An explicit from_block replays history regardless
/// of the stored checkpoint; to_block defaults to the chain head.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncRange {
    pub from_block: Option<u64>,
    pub to_block: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub processed_events: u64,
    pub synced_blocks: u64,
    pub message: String,
}

/// Idempotent, resumable replay of contract events into the cache tables.
///
/// Battle rows are keyed on transaction hash, so replaying a range cannot
/// duplicate them. Player-event notifications are plain inserts with no
/// unique key: replaying a range duplicates those, which is the documented
/// at-least-once behavior for that table.
pub struct EventSynchronizer<'a, S: GameEventSource, C: SyncStore> {
    source: &'a S,
    store: &'a C,
    contract_key: String,
    chunk_size: u64,
}

impl<'a, S: GameEventSource, C: SyncStore> EventSynchronizer<'a, S, C> {
    pub fn new(source: &'a S, store: &'a C, contract_address: Address, chunk_size: u64) -> Self {
        Self {
            source,
            store,
            contract_key: address_key(&contract_address),
            chunk_size: chunk_size.max(1),
        }
    }

    pub async fn run(&self, range: SyncRange) -> Result<SyncOutcome> {
        let status = self.store.get_sync_status(&self.contract_key).await?;
        let checkpoint = status
            .as_ref()
            .map(|s| s.last_synced_block.max(0) as u64)
            .filter(|b| *b > 0);

        let start_block = range.from_block.or(checkpoint).unwrap_or(0);
        let end_block = match range.to_block {
            Some(block) => block,
            None => self.source.latest_block().await?,
        };

        self.store.mark_syncing(&self.contract_key, true).await?;

        let mut processed: u64 = 0;
        let mut last_completed: Option<u64> = None;
        let mut failure: Option<AppError> = None;
        let mut timestamps: HashMap<u64, u64> = HashMap::new();

        for (chunk_start, chunk_end) in plan_chunks(start_block, end_block, self.chunk_size) {
            match self.sync_chunk(chunk_start, chunk_end, &mut timestamps).await {
                Ok(count) => {
                    processed += count;
                    last_completed = Some(chunk_end);
                    // Checkpoint only moves once the whole chunk landed.
                    self.store
                        .advance_checkpoint(&self.contract_key, chunk_end as i64, true)
                        .await?;
                }
                Err(err) => {
                    tracing::error!(
                        "Sync aborted in chunk {}..{}: {}",
                        chunk_start,
                        chunk_end,
                        err
                    );
                    failure = Some(err);
                    break;
                }
            }
        }

        // Completion and fatal failure both clear the syncing flag; the
        // GREATEST upsert keeps the checkpoint monotone.
        let final_block = match &failure {
            None => end_block,
            Some(_) => last_completed.unwrap_or(0),
        };
        self.store
            .advance_checkpoint(&self.contract_key, final_block as i64, false)
            .await?;

        if let Some(err) = failure {
            return Err(err);
        }

        Ok(SyncOutcome {
            processed_events: processed,
            synced_blocks: end_block.saturating_sub(start_block),
            message: format!(
                "Synced {} events from block {} to {}",
                processed, start_block, end_block
            ),
        })
    }

    /// One chunk: three event-type queries, derived rows written as we go.
    /// Store failures on individual rows are logged and skipped; a provider
    /// failure aborts the chunk.
    async fn sync_chunk(
        &self,
        from_block: u64,
        to_block: u64,
        timestamps: &mut HashMap<u64, u64>,
    ) -> Result<u64> {
        let mut processed = 0;

        let battles = self.source.battle_details(from_block, to_block).await?;
        for event in battles {
            let block_timestamp = self.block_timestamp_cached(event.meta.block_number, timestamps).await?;
            let battle = battle_row(&event, block_timestamp);
            match self.store.upsert_battle(&battle).await {
                Ok(()) => {
                    for (address, event_type, data) in battle_notifications(&event) {
                        if let Err(err) = self
                            .store
                            .insert_player_event(&address, event_type, data)
                            .await
                        {
                            tracing::warn!(
                                "Failed to insert player event for {}: {}",
                                address,
                                err
                            );
                        }
                    }
                }
                Err(err) => {
                    tracing::warn!(
                        "Failed to upsert battle {}: {}",
                        battle.transaction_hash,
                        err
                    );
                }
            }
            processed += 1;
        }

        let stats_updates = self.source.player_stats_updates(from_block, to_block).await?;
        for event in stats_updates {
            let row = stats_row(&event);
            if let Err(err) = self.store.upsert_player_stats(&row).await {
                tracing::warn!("Failed to upsert stats for {}: {}", row.player_address, err);
            }
        }

        let promotions = self.source.league_promotions(from_block, to_block).await?;
        for event in promotions {
            let (address, event_type, data) = promotion_notification(&event);
            if let Err(err) = self
                .store
                .insert_player_event(&address, event_type, data)
                .await
            {
                tracing::warn!("Failed to insert promotion event for {}: {}", address, err);
            }
        }

        Ok(processed)
    }

    async fn block_timestamp_cached(
        &self,
        block_number: u64,
        timestamps: &mut HashMap<u64, u64>,
    ) -> Result<u64> {
        if let Some(ts) = timestamps.get(&block_number) {
            return Ok(*ts);
        }
        let ts = self.source.block_timestamp(block_number).await?;
        timestamps.insert(block_number, ts);
        Ok(ts)
    }
}

/// Inclusive fixed-size chunks covering [start, end].
fn plan_chunks(start: u64, end: u64, chunk_size: u64) -> Vec<(u64, u64)> {
    let mut chunks = Vec::new();
    if start > end {
        return chunks;
    }
    let mut current = start;
    loop {
        let chunk_end = current.saturating_add(chunk_size - 1).min(end);
        chunks.push((current, chunk_end));
        if chunk_end == end {
            break;
        }
        current = chunk_end + 1;
    }
    chunks
}

fn utc_from_unix(timestamp: u64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(timestamp as i64, 0).unwrap_or_else(Utc::now)
}

pub(crate) fn battle_row(event: &BattleDetailsEvent, block_timestamp: u64) -> NewBattle {
    NewBattle {
        attacker_address: address_key(&event.attacker),
        defender_address: address_key(&event.defender),
        attacker_won: event.attacker_won,
        battle_reward: event.reward.to_string(),
        attacker_power: event.attacker_power.to_string(),
        defender_power: event.defender_power.to_string(),
        attacker_level: event.attacker_level as i32,
        defender_level: event.defender_level as i32,
        transaction_hash: event.meta.transaction_hash.clone(),
        block_number: event.meta.block_number as i64,
        timestamp: utc_from_unix(block_timestamp),
    }
}

/// The two complementary notifications a battle produces, one per side.
pub(crate) fn battle_notifications(
    event: &BattleDetailsEvent,
) -> Vec<(String, &'static str, serde_json::Value)> {
    let attacker = address_key(&event.attacker);
    let defender = address_key(&event.defender);
    let reward = event.reward.to_string();

    vec![
        (
            attacker.clone(),
            if event.attacker_won { "battle_won" } else { "battle_lost" },
            serde_json::json!({
                "opponent": defender,
                "reward": reward,
                "isAttacker": true
            }),
        ),
        (
            defender,
            if event.attacker_won { "battle_lost" } else { "battle_won" },
            serde_json::json!({
                "opponent": attacker,
                "reward": reward,
                "isAttacker": false
            }),
        ),
    ]
}

pub(crate) fn stats_row(event: &PlayerStatsEvent) -> NewPlayerStats {
    NewPlayerStats {
        player_address: address_key(&event.player),
        player_level: event.level as i32,
        total_battles: event.total_battles as i32,
        battles_won: event.battles_won as i32,
        kingdom_size: event.kingdom_size as i32,
        battle_score: event.battle_score as i64,
        win_rate: event.win_rate as i32,
    }
}

pub(crate) fn promotion_notification(
    event: &LeaguePromotionEvent,
) -> (String, &'static str, serde_json::Value) {
    (
        address_key(&event.player),
        "league_promotion",
        serde_json::json!({
            "oldLeague": event.old_league,
            "newLeague": event.new_league,
            "leagueId": event.new_league_id
        }),
    )
}

/// Live subscription mode: insert battle rows as events arrive. Fire and
/// forget; no reconnect, no backoff, no checkpoint advancement.
pub async fn start_listen(ws_url: &str, contract_address: Address, db: Database) -> Result<()> {
    let provider = Provider::<Ws>::connect(ws_url).await.map_err(chain_err)?;
    let provider = Arc::new(provider);

    tokio::spawn(async move {
        let contract = KingdomStakers::new(contract_address, provider.clone());
        let events = contract.event::<BattleDetailsUpdatedFilter>();
        let mut stream = match events.subscribe_with_meta().await {
            Ok(stream) => stream,
            Err(err) => {
                tracing::error!("Failed to subscribe to battle events: {}", err);
                return;
            }
        };

        tracing::info!("Listening for battle events on {:#x}", contract_address);
        while let Some(item) = stream.next().await {
            let (event, meta) = match item {
                Ok(pair) => pair,
                Err(err) => {
                    tracing::warn!("Battle event stream error: {}", err);
                    continue;
                }
            };

            let block_number = meta.block_number.as_u64();
            // Fall back to the event's own timestamp if the header read fails.
            let block_timestamp = match provider.get_block(block_number).await {
                Ok(Some(block)) => block.timestamp.as_u64(),
                _ => event.timestamp.as_u64(),
            };

            let domain_event = BattleDetailsEvent {
                attacker: event.attacker,
                defender: event.defender,
                attacker_level: event.attacker_level.as_u64(),
                defender_level: event.defender_level.as_u64(),
                attacker_power: event.attacker_power,
                defender_power: event.defender_power,
                attacker_won: event.attacker_won,
                reward: event.reward,
                timestamp: event.timestamp.as_u64(),
                meta: EventMeta {
                    block_number,
                    transaction_hash: format!("{:#x}", meta.transaction_hash),
                    log_index: meta.log_index.as_u64(),
                },
            };

            let battle = battle_row(&domain_event, block_timestamp);
            if let Err(err) = db.insert_battle(&battle).await {
                tracing::warn!("Failed to insert live battle {}: {}", battle.transaction_hash, err);
            }
        }

        tracing::info!("Battle event subscription ended");
    });

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChainErrorKind;
    use crate::indexer::{BattleResultEvent, BattleSide};
    use std::sync::Mutex;

    fn addr(byte: u8) -> Address {
        Address::from_low_u64_be(byte as u64)
    }

    fn battle_event(
        attacker: Address,
        defender: Address,
        attacker_won: bool,
        block_number: u64,
        tx_hash: &str,
    ) -> BattleDetailsEvent {
        BattleDetailsEvent {
            attacker,
            defender,
            attacker_level: 3,
            defender_level: 2,
            attacker_power: 5_000u64.into(),
            defender_power: 4_000u64.into(),
            attacker_won,
            reward: 1_000u64.into(),
            timestamp: block_number * 3,
            meta: EventMeta {
                block_number,
                transaction_hash: tx_hash.to_string(),
                log_index: 0,
            },
        }
    }

    fn stats_event(player: Address, block_number: u64, level: u64, wins: u64) -> PlayerStatsEvent {
        PlayerStatsEvent {
            player,
            level,
            total_battles: wins + 1,
            battles_won: wins,
            kingdom_size: 4,
            battle_score: 1_200,
            win_rate: 50,
            timestamp: block_number * 3,
            meta: EventMeta {
                block_number,
                transaction_hash: format!("0x{:064x}", block_number),
                log_index: 1,
            },
        }
    }

    struct MockChain {
        head: u64,
        battles: Vec<BattleDetailsEvent>,
        stats: Vec<PlayerStatsEvent>,
        promotions: Vec<LeaguePromotionEvent>,
        // Any chunk containing this block fails with a network error
        broken_block: Mutex<Option<u64>>,
    }

    impl MockChain {
        fn new(head: u64) -> Self {
            Self {
                head,
                battles: Vec::new(),
                stats: Vec::new(),
                promotions: Vec::new(),
                broken_block: Mutex::new(None),
            }
        }

        fn repair(&self) {
            *self.broken_block.lock().unwrap() = None;
        }

        fn check_range(&self, from_block: u64, to_block: u64) -> Result<()> {
            if let Some(broken) = *self.broken_block.lock().unwrap() {
                if from_block <= broken && broken <= to_block {
                    return Err(AppError::Chain(ChainErrorKind::NetworkError));
                }
            }
            Ok(())
        }
    }

    #[async_trait]
    impl GameEventSource for MockChain {
        async fn latest_block(&self) -> Result<u64> {
            Ok(self.head)
        }

        async fn block_timestamp(&self, block_number: u64) -> Result<u64> {
            Ok(1_700_000_000 + block_number)
        }

        async fn battle_results(
            &self,
            _side: BattleSide,
            _player: Address,
            _from_block: u64,
            _to_block: u64,
        ) -> Result<Vec<BattleResultEvent>> {
            Ok(Vec::new())
        }

        async fn battle_details(
            &self,
            from_block: u64,
            to_block: u64,
        ) -> Result<Vec<BattleDetailsEvent>> {
            self.check_range(from_block, to_block)?;
            Ok(self
                .battles
                .iter()
                .filter(|e| e.meta.block_number >= from_block && e.meta.block_number <= to_block)
                .cloned()
                .collect())
        }

        async fn player_stats_updates(
            &self,
            from_block: u64,
            to_block: u64,
        ) -> Result<Vec<PlayerStatsEvent>> {
            self.check_range(from_block, to_block)?;
            Ok(self
                .stats
                .iter()
                .filter(|e| e.meta.block_number >= from_block && e.meta.block_number <= to_block)
                .cloned()
                .collect())
        }

        async fn league_promotions(
            &self,
            from_block: u64,
            to_block: u64,
        ) -> Result<Vec<LeaguePromotionEvent>> {
            self.check_range(from_block, to_block)?;
            Ok(self
                .promotions
                .iter()
                .filter(|e| e.meta.block_number >= from_block && e.meta.block_number <= to_block)
                .cloned()
                .collect())
        }
    }

    #[derive(Default)]
    struct MemoryState {
        battles: HashMap<String, NewBattle>,
        player_events: Vec<(String, String, serde_json::Value)>,
        stats: HashMap<String, NewPlayerStats>,
        status: HashMap<String, SyncStatus>,
    }

    #[derive(Default)]
    struct MemoryStore {
        state: Mutex<MemoryState>,
    }

    impl MemoryStore {
        fn battles(&self) -> Vec<NewBattle> {
            self.state.lock().unwrap().battles.values().cloned().collect()
        }

        fn events(&self) -> Vec<(String, String, serde_json::Value)> {
            self.state.lock().unwrap().player_events.clone()
        }

        fn stats_for(&self, key: &str) -> Option<NewPlayerStats> {
            self.state.lock().unwrap().stats.get(key).cloned()
        }

        fn status_for(&self, key: &str) -> Option<SyncStatus> {
            self.state.lock().unwrap().status.get(key).cloned()
        }
    }

    #[async_trait]
    impl SyncStore for MemoryStore {
        async fn get_sync_status(&self, contract_address: &str) -> Result<Option<SyncStatus>> {
            Ok(self.state.lock().unwrap().status.get(contract_address).cloned())
        }

        async fn mark_syncing(&self, contract_address: &str, is_syncing: bool) -> Result<()> {
            let mut state = self.state.lock().unwrap();
            let entry = state
                .status
                .entry(contract_address.to_string())
                .or_insert_with(|| SyncStatus {
                    contract_address: contract_address.to_string(),
                    last_synced_block: 0,
                    is_syncing: false,
                    last_sync_time: None,
                });
            entry.is_syncing = is_syncing;
            entry.last_sync_time = Some(Utc::now());
            Ok(())
        }

        async fn advance_checkpoint(
            &self,
            contract_address: &str,
            last_synced_block: i64,
            is_syncing: bool,
        ) -> Result<()> {
            let mut state = self.state.lock().unwrap();
            let entry = state
                .status
                .entry(contract_address.to_string())
                .or_insert_with(|| SyncStatus {
                    contract_address: contract_address.to_string(),
                    last_synced_block: 0,
                    is_syncing: false,
                    last_sync_time: None,
                });
            // Same monotonicity rule as the SQL GREATEST upsert.
            entry.last_synced_block = entry.last_synced_block.max(last_synced_block);
            entry.is_syncing = is_syncing;
            entry.last_sync_time = Some(Utc::now());
            Ok(())
        }

        async fn upsert_battle(&self, battle: &NewBattle) -> Result<()> {
            self.state
                .lock()
                .unwrap()
                .battles
                .insert(battle.transaction_hash.clone(), battle.clone());
            Ok(())
        }

        async fn insert_player_event(
            &self,
            address: &str,
            event_type: &str,
            event_data: serde_json::Value,
        ) -> Result<()> {
            self.state.lock().unwrap().player_events.push((
                address.to_string(),
                event_type.to_string(),
                event_data,
            ));
            Ok(())
        }

        async fn upsert_player_stats(&self, stats: &NewPlayerStats) -> Result<()> {
            self.state
                .lock()
                .unwrap()
                .stats
                .insert(stats.player_address.clone(), stats.clone());
            Ok(())
        }
    }

    fn contract() -> Address {
        addr(0xCC)
    }

    #[tokio::test]
    async fn resync_duplicates_notifications_but_not_battles() {
        let mut chain = MockChain::new(10);
        chain
            .battles
            .push(battle_event(addr(1), addr(2), true, 5, "0xabc"));
        let store = MemoryStore::default();
        let sync = EventSynchronizer::new(&chain, &store, contract(), 1000);

        let range = SyncRange {
            from_block: Some(0),
            to_block: Some(10),
        };
        let first = sync.run(range).await.unwrap();
        let second = sync.run(range).await.unwrap();

        assert_eq!(first.processed_events, 1);
        assert_eq!(second.processed_events, 1);
        // Exactly-once for battles, at-least-once for notifications.
        assert_eq!(store.battles().len(), 1);
        assert_eq!(store.events().len(), 4);
    }

    #[tokio::test]
    async fn one_battle_yields_one_row_and_two_complementary_events() {
        let attacker = addr(0xA1);
        let defender = addr(0xB2);
        let mut chain = MockChain::new(10);
        chain
            .battles
            .push(battle_event(attacker, defender, true, 7, "0xfeed"));
        let store = MemoryStore::default();
        let sync = EventSynchronizer::new(&chain, &store, contract(), 1000);

        sync.run(SyncRange::default()).await.unwrap();

        let battles = store.battles();
        assert_eq!(battles.len(), 1);
        assert_eq!(battles[0].transaction_hash, "0xfeed");
        assert_eq!(battles[0].attacker_address, address_key(&attacker));
        assert!(battles[0].attacker_won);

        let events = store.events();
        assert_eq!(events.len(), 2);
        let attacker_event = events
            .iter()
            .find(|(address, _, _)| *address == address_key(&attacker))
            .unwrap();
        let defender_event = events
            .iter()
            .find(|(address, _, _)| *address == address_key(&defender))
            .unwrap();
        assert_eq!(attacker_event.1, "battle_won");
        assert_eq!(defender_event.1, "battle_lost");
        assert_eq!(attacker_event.2["opponent"], address_key(&defender));
        assert_eq!(attacker_event.2["isAttacker"], true);
        assert_eq!(defender_event.2["isAttacker"], false);
    }

    #[tokio::test]
    async fn checkpoint_stays_monotone_when_a_chunk_fails() {
        let mut chain = MockChain::new(2500);
        chain.battles.push(battle_event(addr(1), addr(2), true, 5, "0x01"));
        chain.battles.push(battle_event(addr(1), addr(2), false, 1500, "0x02"));
        chain.battles.push(battle_event(addr(2), addr(1), true, 2400, "0x03"));
        *chain.broken_block.lock().unwrap() = Some(1500);

        let store = MemoryStore::default();
        let key = address_key(&contract());
        let sync = EventSynchronizer::new(&chain, &store, contract(), 1000);

        let range = SyncRange {
            from_block: Some(0),
            to_block: Some(2500),
        };
        let result = sync.run(range).await;
        assert!(result.is_err());

        // First chunk completed, second failed: checkpoint parked at 999 with
        // the syncing flag cleared.
        let status = store.status_for(&key).unwrap();
        assert_eq!(status.last_synced_block, 999);
        assert!(!status.is_syncing);

        // Recovery resumes from the checkpoint and finishes the range.
        chain.repair();
        let outcome = sync.run(SyncRange { from_block: None, to_block: Some(2500) }).await.unwrap();
        assert_eq!(outcome.processed_events, 2);
        let status = store.status_for(&key).unwrap();
        assert_eq!(status.last_synced_block, 2500);

        // A later run bounded to an older block cannot move the checkpoint
        // backwards.
        sync.run(SyncRange { from_block: Some(0), to_block: Some(10) })
            .await
            .unwrap();
        let status = store.status_for(&key).unwrap();
        assert_eq!(status.last_synced_block, 2500);
        assert_eq!(store.battles().len(), 3);
    }

    #[tokio::test]
    async fn stats_upserts_keep_latest_write() {
        let player = addr(9);
        let mut chain = MockChain::new(10);
        chain.stats.push(stats_event(player, 1, 2, 1));
        chain.stats.push(stats_event(player, 2, 3, 2));
        let store = MemoryStore::default();
        let sync = EventSynchronizer::new(&chain, &store, contract(), 1000);

        sync.run(SyncRange::default()).await.unwrap();

        let row = store.stats_for(&address_key(&player)).unwrap();
        assert_eq!(row.player_level, 3);
        assert_eq!(row.battles_won, 2);
    }

    #[tokio::test]
    async fn league_promotion_becomes_notification() {
        let player = addr(7);
        let mut chain = MockChain::new(10);
        chain.promotions.push(LeaguePromotionEvent {
            player,
            old_league: "Bronze".to_string(),
            new_league: "Silver".to_string(),
            new_league_id: 2,
            timestamp: 33,
            meta: EventMeta {
                block_number: 4,
                transaction_hash: "0xpromo".to_string(),
                log_index: 0,
            },
        });
        let store = MemoryStore::default();
        let sync = EventSynchronizer::new(&chain, &store, contract(), 1000);

        sync.run(SyncRange::default()).await.unwrap();

        let events = store.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].1, "league_promotion");
        assert_eq!(events[0].2["newLeague"], "Silver");
        assert_eq!(events[0].2["leagueId"], 2);
    }

    #[test]
    fn plan_chunks_covers_range_inclusively() {
        assert_eq!(
            plan_chunks(0, 2500, 1000),
            vec![(0, 999), (1000, 1999), (2000, 2500)]
        );
        assert_eq!(plan_chunks(5, 5, 1000), vec![(5, 5)]);
        assert!(plan_chunks(10, 5, 1000).is_empty());
    }

    #[test]
    fn battle_row_normalizes_addresses_and_amounts() {
        let event = battle_event(addr(0xAB), addr(0xCD), true, 42, "0xDEAD");
        let row = battle_row(&event, 1_700_000_042);
        assert_eq!(row.attacker_address, address_key(&addr(0xAB)));
        assert_eq!(row.battle_reward, "1000");
        assert_eq!(row.block_number, 42);
        assert_eq!(row.timestamp.timestamp(), 1_700_000_042);
    }
}
