// All service modules
pub mod event_sync;
pub mod game_service;
pub mod leaderboard_refresher;
pub mod notifications;
pub mod stats_poller;
pub mod wallet;

// Re-export for convenience
pub use event_sync::{BroadcastingStore, EventSynchronizer, SyncRange};
pub use game_service::GameClient;
pub use leaderboard_refresher::LeaderboardRefresher;
pub use notifications::PlayerEventBroker;
pub use stats_poller::StatsPoller;

use std::sync::Arc;

use tokio::time::{interval, Duration};

use crate::{config::Config, constants::SYNC_INTERVAL_SECS, db::Database};

fn is_env_flag_enabled(name: &str, default: bool) -> bool {
    std::env::var(name)
        .ok()
        .map(|value| {
            let normalized = value.trim().to_ascii_lowercase();
            normalized == "1" || normalized == "true" || normalized == "yes" || normalized == "on"
        })
        .unwrap_or(default)
}

/// Start all background services
pub async fn start_background_services(
    db: Database,
    config: Config,
    client: Arc<GameClient>,
    broker: PlayerEventBroker,
) {
    tracing::info!("Starting background services...");

    if is_env_flag_enabled("ENABLE_EVENT_SYNC", true) {
        let sync_db = db.clone();
        let sync_config = config.clone();
        let sync_client = client.clone();
        let sync_broker = broker.clone();
        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(SYNC_INTERVAL_SECS));
            loop {
                ticker.tick().await;
                let store = BroadcastingStore::new(sync_db.clone(), sync_broker.clone());
                let synchronizer = EventSynchronizer::new(
                    sync_client.source(),
                    &store,
                    sync_client.contract_address(),
                    sync_config.sync_chunk_size,
                );
                match synchronizer.run(SyncRange::default()).await {
                    Ok(outcome) if outcome.processed_events > 0 => {
                        tracing::info!("{}", outcome.message);
                    }
                    Ok(_) => {
                        tracing::debug!("Sync tick: no new events");
                    }
                    Err(err) => {
                        tracing::error!("Background sync failed: {}", err);
                    }
                }
            }
        });
    } else {
        tracing::warn!("Event sync disabled via ENABLE_EVENT_SYNC");
    }

    // Live subscription is opt-in: best-effort, no reconnect or checkpoint.
    if is_env_flag_enabled("ENABLE_EVENT_LISTEN", false) {
        match &config.ws_rpc_url {
            Some(ws_url) => {
                if let Err(err) =
                    event_sync::start_listen(ws_url, client.contract_address(), db.clone()).await
                {
                    tracing::error!("Failed to start live event listener: {}", err);
                }
            }
            None => {
                tracing::warn!("ENABLE_EVENT_LISTEN set but WS_RPC_URL is not configured");
            }
        }
    }

    if is_env_flag_enabled("ENABLE_LEADERBOARD_REFRESHER", true) {
        let refresher = Arc::new(LeaderboardRefresher::new(db.clone(), client.clone()));
        refresher.start().await;
    }

    if is_env_flag_enabled("ENABLE_STATS_POLLER", true) {
        let poller = Arc::new(StatsPoller::new(db.clone(), client.clone()));
        poller.start().await;
    }

    tracing::info!("All background services started");
}
