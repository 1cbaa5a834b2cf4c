use std::sync::Arc;

use tokio::time::{interval, Duration};

use crate::constants::{
    ACTIVE_PLAYER_WINDOW_MINUTES, REWARD_REFRESH_INTERVAL_SECS, STATS_REFRESH_INTERVAL_SECS,
};
use crate::db::Database;
use crate::error::Result;
use crate::models::{NewPlayerStats, PlayerStatsLive};
use crate::services::game_service::GameClient;
use crate::utils::parse_address;

const POLL_BATCH_LIMIT: i64 = 200;

/// Fixed-interval refresh of the stats cache for recently-active players:
/// profile snapshots every 10 s, pending rewards every 15 s. Plain timers,
/// no jitter or coalescing.
pub struct StatsPoller {
    db: Database,
    client: Arc<GameClient>,
}

impl StatsPoller {
    pub fn new(db: Database, client: Arc<GameClient>) -> Self {
        Self { db, client }
    }

    pub async fn start(self: Arc<Self>) {
        let stats_poller = self.clone();
        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(STATS_REFRESH_INTERVAL_SECS));
            loop {
                ticker.tick().await;
                if let Err(err) = stats_poller.refresh_stats().await {
                    tracing::error!("Stats refresh failed: {}", err);
                }
            }
        });

        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(REWARD_REFRESH_INTERVAL_SECS));
            loop {
                ticker.tick().await;
                if let Err(err) = self.refresh_rewards().await {
                    tracing::error!("Reward refresh failed: {}", err);
                }
            }
        });
    }

    async fn refresh_stats(&self) -> Result<()> {
        let players = self
            .db
            .recently_active_players(ACTIVE_PLAYER_WINDOW_MINUTES, POLL_BATCH_LIMIT)
            .await?;

        for address in players {
            let parsed = match parse_address(&address) {
                Ok(parsed) => parsed,
                Err(_) => {
                    tracing::warn!("Skipping malformed cached address {}", address);
                    continue;
                }
            };
            match self.client.player_stats(parsed).await {
                Ok(live) => {
                    let stats = stats_from_live(&address, &live);
                    if let Err(err) = self.db.upsert_player_stats(&stats).await {
                        tracing::warn!("Failed to refresh stats for {}: {}", address, err);
                    }
                }
                Err(err) => {
                    tracing::debug!("Stats read failed for {}: {}", address, err);
                }
            }
            match self.client.player_profile(parsed).await {
                Ok(profile) => {
                    if let Err(err) = self
                        .db
                        .update_player_profile_cache(
                            &address,
                            &profile.power,
                            &profile.league,
                            profile.league_id as i32,
                        )
                        .await
                    {
                        tracing::warn!("Failed to refresh profile for {}: {}", address, err);
                    }
                }
                Err(err) => {
                    tracing::debug!("Profile read failed for {}: {}", address, err);
                }
            }
        }
        Ok(())
    }

    async fn refresh_rewards(&self) -> Result<()> {
        let players = self
            .db
            .recently_active_players(ACTIVE_PLAYER_WINDOW_MINUTES, POLL_BATCH_LIMIT)
            .await?;

        for address in players {
            let parsed = match parse_address(&address) {
                Ok(parsed) => parsed,
                Err(_) => continue,
            };
            match self.client.pending_reward(parsed).await {
                Ok(reward) => {
                    if let Err(err) = self.db.update_pending_reward(&address, &reward.raw).await {
                        tracing::warn!("Failed to store pending reward for {}: {}", address, err);
                    }
                }
                Err(err) => {
                    tracing::debug!("Pending reward read failed for {}: {}", address, err);
                }
            }
        }
        Ok(())
    }
}

fn stats_from_live(address: &str, live: &PlayerStatsLive) -> NewPlayerStats {
    NewPlayerStats {
        player_address: address.to_string(),
        player_level: live.level as i32,
        total_battles: live.total_battles as i32,
        battles_won: live.battles_won as i32,
        kingdom_size: live.kingdom_size as i32,
        battle_score: live.battle_score as i64,
        win_rate: live.win_rate as i32,
    }
}
