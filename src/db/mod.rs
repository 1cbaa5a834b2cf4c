use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{config::Config, error::Result, models::*};

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn new(config: &Config) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .connect(&config.database_url)
            .await?;

        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

// ==================== BATTLE QUERIES ====================
impl Database {
    /// Upsert keyed on transaction_hash. The payload is immutable, so a
    /// replay overwrites a row with identical values instead of erroring.
    pub async fn upsert_battle(&self, battle: &NewBattle) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO battles
                (attacker_address, defender_address, attacker_won, battle_reward,
                 attacker_power, defender_power, attacker_level, defender_level,
                 transaction_hash, block_number, timestamp)
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11)
            ON CONFLICT (transaction_hash) DO UPDATE
            SET attacker_won = EXCLUDED.attacker_won,
                battle_reward = EXCLUDED.battle_reward,
                block_number = EXCLUDED.block_number,
                timestamp = EXCLUDED.timestamp
            "#,
        )
        .bind(&battle.attacker_address)
        .bind(&battle.defender_address)
        .bind(battle.attacker_won)
        .bind(&battle.battle_reward)
        .bind(&battle.attacker_power)
        .bind(&battle.defender_power)
        .bind(battle.attacker_level)
        .bind(battle.defender_level)
        .bind(&battle.transaction_hash)
        .bind(battle.block_number)
        .bind(battle.timestamp)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Plain insert used by the live listener; duplicates surface as errors
    /// and are logged by the caller.
    pub async fn insert_battle(&self, battle: &NewBattle) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO battles
                (attacker_address, defender_address, attacker_won, battle_reward,
                 attacker_power, defender_power, attacker_level, defender_level,
                 transaction_hash, block_number, timestamp)
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11)
            "#,
        )
        .bind(&battle.attacker_address)
        .bind(&battle.defender_address)
        .bind(battle.attacker_won)
        .bind(&battle.battle_reward)
        .bind(&battle.attacker_power)
        .bind(&battle.defender_power)
        .bind(battle.attacker_level)
        .bind(battle.defender_level)
        .bind(&battle.transaction_hash)
        .bind(battle.block_number)
        .bind(battle.timestamp)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_battles_for_player(
        &self,
        address: &str,
        limit: i64,
    ) -> Result<Vec<Battle>> {
        let battles = sqlx::query_as::<_, Battle>(
            r#"
            SELECT * FROM battles
            WHERE attacker_address = $1 OR defender_address = $1
            ORDER BY block_number DESC, timestamp DESC
            LIMIT $2
            "#,
        )
        .bind(address)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(battles)
    }
}

// ==================== PLAYER STATS QUERIES ====================
impl Database {
    /// Latest-write-wins upsert from PlayerStatsUpdated events.
    pub async fn upsert_player_stats(&self, stats: &NewPlayerStats) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO player_stats_cache
                (player_address, player_level, total_battles, battles_won,
                 kingdom_size, battle_score, win_rate, updated_at)
            VALUES ($1,$2,$3,$4,$5,$6,$7,NOW())
            ON CONFLICT (player_address) DO UPDATE
            SET player_level = EXCLUDED.player_level,
                total_battles = EXCLUDED.total_battles,
                battles_won = EXCLUDED.battles_won,
                kingdom_size = EXCLUDED.kingdom_size,
                battle_score = EXCLUDED.battle_score,
                win_rate = EXCLUDED.win_rate,
                updated_at = NOW()
            "#,
        )
        .bind(&stats.player_address)
        .bind(stats.player_level)
        .bind(stats.total_battles)
        .bind(stats.battles_won)
        .bind(stats.kingdom_size)
        .bind(stats.battle_score)
        .bind(stats.win_rate)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Columns the stats poller refreshes from live profile reads.
    pub async fn update_player_profile_cache(
        &self,
        address: &str,
        power: &str,
        league_name: &str,
        league_id: i32,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO player_stats_cache (player_address, current_power, league_name, league_id, updated_at)
            VALUES ($1,$2,$3,$4,NOW())
            ON CONFLICT (player_address) DO UPDATE
            SET current_power = EXCLUDED.current_power,
                league_name = EXCLUDED.league_name,
                league_id = EXCLUDED.league_id,
                updated_at = NOW()
            "#,
        )
        .bind(address)
        .bind(power)
        .bind(league_name)
        .bind(league_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn update_pending_reward(&self, address: &str, pending_reward: &str) -> Result<()> {
        sqlx::query(
            "UPDATE player_stats_cache SET pending_reward = $2, updated_at = NOW()
             WHERE player_address = $1",
        )
        .bind(address)
        .bind(pending_reward)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_player_stats(&self, address: &str) -> Result<Option<PlayerStatsCache>> {
        let stats = sqlx::query_as::<_, PlayerStatsCache>(
            "SELECT * FROM player_stats_cache WHERE player_address = $1",
        )
        .bind(address)
        .fetch_optional(&self.pool)
        .await?;
        Ok(stats)
    }

    /// Addresses touched recently, for the background stats poller.
    pub async fn recently_active_players(
        &self,
        window_minutes: i64,
        limit: i64,
    ) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT player_address FROM player_stats_cache
            WHERE updated_at >= NOW() - make_interval(mins => $1::int)
            ORDER BY updated_at DESC
            LIMIT $2
            "#,
        )
        .bind(window_minutes)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(address,)| address).collect())
    }
}

// ==================== PLAYER EVENT QUERIES ====================
impl Database {
    /// Append-only: no unique key, so replaying a range duplicates rows.
    pub async fn insert_player_event(
        &self,
        address: &str,
        event_type: &str,
        event_data: serde_json::Value,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO player_events (player_address, event_type, event_data)
             VALUES ($1,$2,$3)",
        )
        .bind(address)
        .bind(event_type)
        .bind(event_data)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_player_events(
        &self,
        address: &str,
        unread_only: bool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<PlayerEvent>> {
        let events = if unread_only {
            sqlx::query_as::<_, PlayerEvent>(
                "SELECT * FROM player_events
                 WHERE player_address = $1 AND read = false
                 ORDER BY created_at DESC
                 LIMIT $2 OFFSET $3",
            )
            .bind(address)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query_as::<_, PlayerEvent>(
                "SELECT * FROM player_events
                 WHERE player_address = $1
                 ORDER BY created_at DESC
                 LIMIT $2 OFFSET $3",
            )
            .bind(address)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?
        };
        Ok(events)
    }

    pub async fn mark_event_read(&self, id: i64, address: &str) -> Result<()> {
        sqlx::query(
            "UPDATE player_events SET read = true WHERE id = $1 AND player_address = $2",
        )
        .bind(id)
        .bind(address)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn mark_all_events_read(&self, address: &str) -> Result<()> {
        sqlx::query(
            "UPDATE player_events SET read = true WHERE player_address = $1 AND read = false",
        )
        .bind(address)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn player_event_stats(&self, address: &str) -> Result<(i64, i64)> {
        let row: (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COALESCE(COUNT(*) FILTER (WHERE NOT read), 0) as unread,
                COUNT(*) as total
            FROM player_events
            WHERE player_address = $1
            "#,
        )
        .bind(address)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }
}

// ==================== LEADERBOARD QUERIES ====================
impl Database {
    pub async fn upsert_leaderboard_entry(&self, entry: &NewLeaderboardEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO leaderboard_cache
                (player_address, ranking, power, level, win_rate, total_battles, league_name, updated_at)
            VALUES ($1,$2,$3,$4,$5,$6,$7,NOW())
            ON CONFLICT (player_address) DO UPDATE
            SET ranking = EXCLUDED.ranking,
                power = EXCLUDED.power,
                level = EXCLUDED.level,
                win_rate = EXCLUDED.win_rate,
                total_battles = EXCLUDED.total_battles,
                league_name = EXCLUDED.league_name,
                updated_at = NOW()
            "#,
        )
        .bind(&entry.player_address)
        .bind(entry.ranking)
        .bind(&entry.power)
        .bind(entry.level)
        .bind(entry.win_rate)
        .bind(entry.total_battles)
        .bind(&entry.league_name)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_leaderboard(&self, limit: i64) -> Result<Vec<LeaderboardEntry>> {
        let entries = sqlx::query_as::<_, LeaderboardEntry>(
            "SELECT * FROM leaderboard_cache ORDER BY ranking ASC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }
}

// ==================== SYNC CHECKPOINT QUERIES ====================
impl Database {
    pub async fn get_sync_status(&self, contract_address: &str) -> Result<Option<SyncStatus>> {
        let status = sqlx::query_as::<_, SyncStatus>(
            "SELECT * FROM contract_sync_status WHERE contract_address = $1",
        )
        .bind(contract_address)
        .fetch_optional(&self.pool)
        .await?;
        Ok(status)
    }

    /// Flip the syncing flag without touching the checkpoint block.
    pub async fn mark_syncing(&self, contract_address: &str, is_syncing: bool) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO contract_sync_status (contract_address, is_syncing, last_sync_time)
            VALUES ($1, $2, NOW())
            ON CONFLICT (contract_address) DO UPDATE
            SET is_syncing = EXCLUDED.is_syncing,
                last_sync_time = EXCLUDED.last_sync_time
            "#,
        )
        .bind(contract_address)
        .bind(is_syncing)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Checkpoint write. GREATEST keeps last_synced_block monotonically
    /// non-decreasing even if two sync invocations race on the same row.
    pub async fn advance_checkpoint(
        &self,
        contract_address: &str,
        last_synced_block: i64,
        is_syncing: bool,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO contract_sync_status
                (contract_address, last_synced_block, is_syncing, last_sync_time)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (contract_address) DO UPDATE
            SET last_synced_block = GREATEST(contract_sync_status.last_synced_block, EXCLUDED.last_synced_block),
                is_syncing = EXCLUDED.is_syncing,
                last_sync_time = EXCLUDED.last_sync_time
            "#,
        )
        .bind(contract_address)
        .bind(last_synced_block)
        .bind(is_syncing)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

// ==================== TUTORIAL QUERIES ====================
impl Database {
    pub async fn get_tutorial_progress(
        &self,
        wallet_address: &str,
    ) -> Result<Option<TutorialProgress>> {
        let progress = sqlx::query_as::<_, TutorialProgress>(
            "SELECT * FROM tutorial_progress WHERE wallet_address = $1",
        )
        .bind(wallet_address)
        .fetch_optional(&self.pool)
        .await?;
        Ok(progress)
    }

    pub async fn save_tutorial_progress(
        &self,
        wallet_address: &str,
        completed: bool,
        skipped: bool,
    ) -> Result<TutorialProgress> {
        let progress = sqlx::query_as::<_, TutorialProgress>(
            r#"
            INSERT INTO tutorial_progress (wallet_address, completed, skipped, completed_at, updated_at)
            VALUES ($1, $2, $3, NOW(), NOW())
            ON CONFLICT (wallet_address) DO UPDATE
            SET completed = EXCLUDED.completed,
                skipped = EXCLUDED.skipped,
                completed_at = EXCLUDED.completed_at,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(wallet_address)
        .bind(completed)
        .bind(skipped)
        .fetch_one(&self.pool)
        .await?;
        Ok(progress)
    }
}

// ==================== BATTLE HISTORY QUERIES ====================
impl Database {
    pub async fn upsert_battle_history(&self, entry: &NewBattleHistoryEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO battle_history
                (player_address, opponent_address, is_attacker, won_battle,
                 battle_reward, block_number, transaction_hash, battle_timestamp)
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8)
            ON CONFLICT (transaction_hash) DO UPDATE
            SET won_battle = EXCLUDED.won_battle,
                battle_reward = EXCLUDED.battle_reward
            "#,
        )
        .bind(&entry.player_address)
        .bind(&entry.opponent_address)
        .bind(entry.is_attacker)
        .bind(entry.won_battle)
        .bind(entry.battle_reward)
        .bind(entry.block_number)
        .bind(&entry.transaction_hash)
        .bind(entry.battle_timestamp)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_battle_history(
        &self,
        address: &str,
        limit: i64,
    ) -> Result<Vec<BattleHistoryEntry>> {
        let entries = sqlx::query_as::<_, BattleHistoryEntry>(
            "SELECT * FROM battle_history
             WHERE player_address = $1
             ORDER BY battle_timestamp DESC
             LIMIT $2",
        )
        .bind(address)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;

    #[tokio::test]
    async fn database_new_returns_error_on_invalid_url() {
        let config = test_config("not-a-url");
        let result = Database::new(&config).await;
        assert!(result.is_err());
    }
}
