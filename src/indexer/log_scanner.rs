use std::collections::HashSet;

use ethers::types::Address;

use crate::constants::{
    INITIAL_RECENT_BLOCKS, MAX_BLOCKS_TO_SCAN, MAX_RANGE_SPLITS, MAX_SCAN_RESULTS, SCAN_CHUNK_SIZE,
};
use crate::error::{AppError, Result};

use super::{BattleResultEvent, BattleSide, GameEventSource};

/// Tunables for a battle-history scan. Production uses the defaults; tests
/// shrink them.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub initial_recent_blocks: u64,
    pub chunk_size: u64,
    pub max_blocks_to_scan: u64,
    pub max_range_splits: u32,
    pub max_results: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            initial_recent_blocks: INITIAL_RECENT_BLOCKS,
            chunk_size: SCAN_CHUNK_SIZE,
            max_blocks_to_scan: MAX_BLOCKS_TO_SCAN,
            max_range_splits: MAX_RANGE_SPLITS,
            max_results: MAX_SCAN_RESULTS,
        }
    }
}

/// Retrieve up to `limit` most-recent battles involving `player` on either
/// side.
///
/// Walks backward from the chain head: an initial recent window first, then
/// fixed-size steps down to the scan floor. Each window queries the
/// as-attacker and as-defender filters; a window the provider rejects as too
/// wide is split in half and both halves retried, within a total split
/// budget. Any other provider failure skips that sub-window; this is a
/// best-effort read and partial results are acceptable. Scanning stops early
/// once twice the requested count has accumulated, leaving room for the final
/// merge-sort before truncation.
pub async fn scan_battle_history<S: GameEventSource>(
    source: &S,
    player: Address,
    limit: usize,
    config: &ScanConfig,
) -> Result<Vec<BattleResultEvent>> {
    if limit == 0 {
        return Err(AppError::BadRequest(
            "Requested event count must be positive".to_string(),
        ));
    }
    let limit = limit.min(config.max_results);
    let target = limit.saturating_mul(2);

    let head = source.latest_block().await?;
    let floor = head.saturating_sub(config.max_blocks_to_scan.saturating_sub(1));
    let windows = plan_windows(head, floor, config.initial_recent_blocks, config.chunk_size);

    let mut collected: Vec<BattleResultEvent> = Vec::new();
    let mut splits_left = config.max_range_splits;

    'windows: for (window_from, window_to) in windows {
        let mut pending = vec![(window_from, window_to)];

        while let Some((from_block, to_block)) = pending.pop() {
            match fetch_window(source, player, from_block, to_block).await {
                Ok(mut events) => collected.append(&mut events),
                Err(AppError::Chain(kind))
                    if kind.should_subdivide() && splits_left > 0 && to_block > from_block =>
                {
                    splits_left -= 1;
                    let mid = from_block + (to_block - from_block) / 2;
                    pending.push((from_block, mid));
                    pending.push((mid + 1, to_block));
                }
                Err(err) => {
                    tracing::warn!(
                        "Battle log scan skipping blocks {}..{}: {}",
                        from_block,
                        to_block,
                        err
                    );
                }
            }

            if collected.len() >= target {
                break 'windows;
            }
        }
    }

    Ok(finalize_events(collected, player, limit))
}

/// Query both indexed filters for one window. A range-too-large failure on
/// either side fails the whole window so it gets subdivided as a unit.
async fn fetch_window<S: GameEventSource>(
    source: &S,
    player: Address,
    from_block: u64,
    to_block: u64,
) -> Result<Vec<BattleResultEvent>> {
    let (as_attacker, as_defender) = tokio::join!(
        source.battle_results(BattleSide::Attacker, player, from_block, to_block),
        source.battle_results(BattleSide::Defender, player, from_block, to_block),
    );

    match (as_attacker, as_defender) {
        (Ok(mut attacker_events), Ok(defender_events)) => {
            attacker_events.extend(defender_events);
            Ok(attacker_events)
        }
        (Err(err), other) | (other, Err(err)) => {
            if let AppError::Chain(kind) = &err {
                if kind.should_subdivide() {
                    return Err(err);
                }
            }
            // Prefer reporting a subdividable error if the other side saw one.
            if let Err(AppError::Chain(kind)) = &other {
                if kind.should_subdivide() {
                    return other;
                }
            }
            Err(err)
        }
    }
}

/// Block windows from newest to oldest: one initial recent window, then
/// fixed-size steps, clamped at the floor.
fn plan_windows(head: u64, floor: u64, initial_recent: u64, chunk_size: u64) -> Vec<(u64, u64)> {
    let chunk_size = chunk_size.max(1);
    let mut windows = Vec::new();

    let end = head;
    let mut start = head
        .saturating_sub(initial_recent.saturating_sub(1))
        .max(floor);
    windows.push((start, end));

    while start > floor {
        let end = start - 1;
        start = start.saturating_sub(chunk_size).max(floor);
        windows.push((start, end));
    }

    windows
}

/// Merge step: drop events not involving the player, dedupe by transaction
/// position, sort most-recent-first (block desc, then in-block index desc),
/// truncate.
fn finalize_events(
    events: Vec<BattleResultEvent>,
    player: Address,
    limit: usize,
) -> Vec<BattleResultEvent> {
    let mut seen: HashSet<(u64, u64)> = HashSet::new();
    let mut merged: Vec<BattleResultEvent> = events
        .into_iter()
        .filter(|event| event.involves(player))
        .filter(|event| seen.insert(event.meta.position()))
        .collect();

    merged.sort_by(|a, b| b.meta.position().cmp(&a.meta.position()));
    merged.truncate(limit);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChainErrorKind;
    use crate::indexer::EventMeta;
    use async_trait::async_trait;
    use ethers::types::U256;
    use std::sync::Mutex;

    fn addr(byte: u8) -> Address {
        Address::from_low_u64_be(byte as u64)
    }

    fn event(
        attacker: Address,
        defender: Address,
        block_number: u64,
        log_index: u64,
    ) -> BattleResultEvent {
        BattleResultEvent {
            attacker,
            defender,
            attacker_won: true,
            battle_reward: U256::from(100u64),
            timestamp: block_number * 3,
            meta: EventMeta {
                block_number,
                transaction_hash: format!("0x{:064x}", block_number * 1000 + log_index),
                log_index,
            },
        }
    }

    struct MockSource {
        head: u64,
        events: Vec<BattleResultEvent>,
        // Ranges wider than this fail with RangeTooLarge
        max_range: Option<u64>,
        // Any range containing this block fails with NetworkError
        broken_block: Option<u64>,
        calls: Mutex<Vec<(u64, u64)>>,
    }

    impl MockSource {
        fn new(head: u64, events: Vec<BattleResultEvent>) -> Self {
            Self {
                head,
                events,
                max_range: None,
                broken_block: None,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl GameEventSource for MockSource {
        async fn latest_block(&self) -> Result<u64> {
            Ok(self.head)
        }

        async fn block_timestamp(&self, block_number: u64) -> Result<u64> {
            Ok(block_number * 3)
        }

        async fn battle_results(
            &self,
            side: BattleSide,
            player: Address,
            from_block: u64,
            to_block: u64,
        ) -> Result<Vec<BattleResultEvent>> {
            self.calls.lock().unwrap().push((from_block, to_block));

            if let Some(max_range) = self.max_range {
                if to_block - from_block + 1 > max_range {
                    return Err(AppError::Chain(ChainErrorKind::RangeTooLarge));
                }
            }
            if let Some(broken) = self.broken_block {
                if from_block <= broken && broken <= to_block {
                    return Err(AppError::Chain(ChainErrorKind::NetworkError));
                }
            }

            Ok(self
                .events
                .iter()
                .filter(|e| e.meta.block_number >= from_block && e.meta.block_number <= to_block)
                .filter(|e| match side {
                    BattleSide::Attacker => e.attacker == player,
                    BattleSide::Defender => e.defender == player,
                })
                .cloned()
                .collect())
        }

        async fn battle_details(
            &self,
            _from_block: u64,
            _to_block: u64,
        ) -> Result<Vec<crate::indexer::BattleDetailsEvent>> {
            Ok(Vec::new())
        }

        async fn player_stats_updates(
            &self,
            _from_block: u64,
            _to_block: u64,
        ) -> Result<Vec<crate::indexer::PlayerStatsEvent>> {
            Ok(Vec::new())
        }

        async fn league_promotions(
            &self,
            _from_block: u64,
            _to_block: u64,
        ) -> Result<Vec<crate::indexer::LeaguePromotionEvent>> {
            Ok(Vec::new())
        }
    }

    fn small_config() -> ScanConfig {
        ScanConfig {
            initial_recent_blocks: 100,
            chunk_size: 200,
            max_blocks_to_scan: 1000,
            max_range_splits: 32,
            max_results: 100,
        }
    }

    #[tokio::test]
    async fn returns_events_sorted_desc_and_truncated() {
        let player = addr(1);
        let opponent = addr(2);
        let events = vec![
            event(player, opponent, 900, 0),
            event(player, opponent, 900, 2),
            event(opponent, player, 950, 1),
            event(player, opponent, 800, 0),
        ];
        let source = MockSource::new(1000, events);

        let result = scan_battle_history(&source, player, 3, &small_config())
            .await
            .unwrap();

        assert_eq!(result.len(), 3);
        assert_eq!(result[0].meta.position(), (950, 1));
        assert_eq!(result[1].meta.position(), (900, 2));
        assert_eq!(result[2].meta.position(), (900, 0));
    }

    #[tokio::test]
    async fn no_duplicate_positions_after_merge() {
        let player = addr(1);
        // Self-battle comes back from both the attacker and defender filters.
        let events = vec![event(player, player, 500, 0)];
        let source = MockSource::new(1000, events);

        let result = scan_battle_history(&source, player, 10, &small_config())
            .await
            .unwrap();

        assert_eq!(result.len(), 1);
    }

    #[test]
    fn merge_drops_events_not_involving_player() {
        let player = addr(1);
        // A misbehaving provider handed back a log matching neither side.
        let events = vec![
            event(player, addr(2), 990, 0),
            event(addr(3), addr(4), 995, 0),
        ];

        let result = finalize_events(events, player, 10);

        assert_eq!(result.len(), 1);
        assert!(result[0].involves(player));
    }

    #[tokio::test]
    async fn converges_by_subdividing_rejected_ranges() {
        let player = addr(1);
        let opponent = addr(2);
        let events = vec![
            event(player, opponent, 10, 0),
            event(player, opponent, 450, 0),
            event(opponent, player, 999, 0),
        ];
        let mut source = MockSource::new(999, events);
        // Provider rejects anything wider than 64 blocks.
        source.max_range = Some(64);

        let config = ScanConfig {
            initial_recent_blocks: 1000,
            chunk_size: 1000,
            max_blocks_to_scan: 1000,
            max_range_splits: 64,
            max_results: 100,
        };
        let result = scan_battle_history(&source, player, 10, &config).await.unwrap();

        assert_eq!(result.len(), 3);
        assert_eq!(result[0].meta.block_number, 999);
        assert_eq!(result[2].meta.block_number, 10);
        // Subdivision converged without exhausting the provider.
        assert!(source.call_count() < 200);
    }

    #[tokio::test]
    async fn stops_early_once_enough_events_accumulate() {
        let player = addr(1);
        let opponent = addr(2);
        // 20 events in the most recent window, plus one far back.
        let mut events: Vec<BattleResultEvent> = (0..20)
            .map(|i| event(player, opponent, 960 + i, 0))
            .collect();
        events.push(event(player, opponent, 50, 0));
        let source = MockSource::new(1000, events);

        let result = scan_battle_history(&source, player, 5, &small_config())
            .await
            .unwrap();

        assert_eq!(result.len(), 5);
        // One window, two filter queries: never reached the older windows.
        assert_eq!(source.call_count(), 2);
    }

    #[tokio::test]
    async fn skips_failing_subrange_and_returns_partial_results() {
        let player = addr(1);
        let opponent = addr(2);
        let events = vec![
            event(player, opponent, 950, 0),
            event(player, opponent, 850, 0),
        ];
        let mut source = MockSource::new(1000, events);
        // The window covering block 850 fails with a non-range error.
        source.broken_block = Some(850);

        let result = scan_battle_history(&source, player, 10, &small_config())
            .await
            .unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].meta.block_number, 950);
    }

    #[tokio::test]
    async fn rejects_zero_limit() {
        let source = MockSource::new(1000, Vec::new());
        let result = scan_battle_history(&source, addr(1), 0, &small_config()).await;
        assert!(result.is_err());
    }

    #[test]
    fn plan_windows_covers_range_without_gaps() {
        let windows = plan_windows(1000, 0, 100, 200);

        assert_eq!(windows[0], (901, 1000));
        assert_eq!(windows[1], (701, 900));
        assert_eq!(*windows.last().unwrap(), (0, 100));

        for pair in windows.windows(2) {
            // Each older window ends right below the newer one.
            assert_eq!(pair[1].1 + 1, pair[0].0);
        }
    }

    #[test]
    fn plan_windows_respects_floor() {
        let windows = plan_windows(1_000_000, 900_001, 10_000, 30_000);
        assert!(windows.iter().all(|(start, _)| *start >= 900_001));
        assert_eq!(windows.last().unwrap().0, 900_001);
    }
}
