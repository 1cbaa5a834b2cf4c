use std::sync::Arc;

use tokio::time::{interval, Duration};

use crate::constants::{LEADERBOARD_REFRESH_INTERVAL_SECS, LEADERBOARD_TOP_N};
use crate::db::Database;
use crate::error::Result;
use crate::models::NewLeaderboardEntry;
use crate::services::game_service::{GameClient, TopPlayer};
use crate::utils::address_key;

/// Periodically mirrors getTopPlayers into leaderboard_cache, enriched with
/// whatever the stats cache already knows about each player.
pub struct LeaderboardRefresher {
    db: Database,
    client: Arc<GameClient>,
}

impl LeaderboardRefresher {
    pub fn new(db: Database, client: Arc<GameClient>) -> Self {
        Self { db, client }
    }

    pub async fn start(self: Arc<Self>) {
        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(LEADERBOARD_REFRESH_INTERVAL_SECS));
            loop {
                ticker.tick().await;
                if let Err(err) = self.refresh().await {
                    tracing::error!("Leaderboard refresh failed: {}", err);
                }
            }
        });
    }

    async fn refresh(&self) -> Result<()> {
        let top = self.client.top_players(LEADERBOARD_TOP_N).await?;

        for (rank, player) in top.iter().enumerate() {
            let mut entry = base_entry(rank, player);
            if let Ok(Some(stats)) = self.db.get_player_stats(&entry.player_address).await {
                entry.win_rate = stats.win_rate;
                entry.total_battles = stats.total_battles;
                entry.league_name = stats.league_name;
            }
            if let Err(err) = self.db.upsert_leaderboard_entry(&entry).await {
                tracing::warn!(
                    "Failed to upsert leaderboard entry for {}: {}",
                    entry.player_address,
                    err
                );
            }
        }

        tracing::debug!("Leaderboard refreshed with {} entries", top.len());
        Ok(())
    }
}

fn base_entry(rank: usize, player: &TopPlayer) -> NewLeaderboardEntry {
    NewLeaderboardEntry {
        player_address: address_key(&player.address),
        ranking: rank as i32 + 1,
        power: player.power.to_string(),
        level: player.level as i32,
        win_rate: 0,
        total_battles: 0,
        league_name: "Bronze".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::{Address, U256};

    #[test]
    fn rankings_start_at_one_in_input_order() {
        let players = vec![
            TopPlayer {
                address: Address::from_low_u64_be(1),
                power: U256::from(9_000u64),
                level: 7,
            },
            TopPlayer {
                address: Address::from_low_u64_be(2),
                power: U256::from(8_000u64),
                level: 6,
            },
        ];

        let first = base_entry(0, &players[0]);
        let second = base_entry(1, &players[1]);
        assert_eq!(first.ranking, 1);
        assert_eq!(second.ranking, 2);
        assert_eq!(first.power, "9000");
        assert_eq!(second.level, 6);
    }
}
