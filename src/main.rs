use axum::http::HeaderValue;
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod config;
mod constants;
mod db;
mod error;
mod indexer;
mod models;
mod services;
mod utils;
mod websocket;

use config::Config;
use constants::API_VERSION;
use db::Database;
use services::{GameClient, PlayerEventBroker};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kingdoms_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    config.validate()?;

    tracing::info!("Starting Kingdom Stakers backend");
    tracing::info!("Environment: {}", config.environment);
    tracing::info!("API Version: {}", API_VERSION);

    // Initialize database
    let db = Database::new(&config).await?;

    tracing::info!("Running database migrations...");
    db.run_migrations().await?;

    // Contract client context: reads always, writes when a signer is present
    let game = Arc::new(GameClient::connect(&config)?);
    tracing::info!("Game wallet backend: {}", game.wallet_name());

    let broker = PlayerEventBroker::new();

    let app_state = api::AppState {
        db: db.clone(),
        config: config.clone(),
        game: game.clone(),
        broker: broker.clone(),
    };

    // Build router
    let app = build_router(app_state);

    // Start background services
    tokio::spawn(services::start_background_services(
        db.clone(),
        config.clone(),
        game.clone(),
        broker.clone(),
    ));

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    game.disconnect();
    Ok(())
}

fn build_router(state: api::AppState) -> Router {
    let cors = cors_from_config(&state.config);

    Router::new()
        // Health check
        .route("/health", get(api::health::health_check))
        // Event sync
        .route("/api/v1/sync", post(api::sync::handle))
        .route("/api/v1/sync/status", get(api::sync::get_status))
        // Players
        .route(
            "/api/v1/players/{address}/stats",
            get(api::players::get_stats),
        )
        .route(
            "/api/v1/players/{address}/profile",
            get(api::players::get_profile),
        )
        .route(
            "/api/v1/players/{address}/battles",
            get(api::players::get_battles),
        )
        .route(
            "/api/v1/players/{address}/battle-log",
            get(api::players::get_battle_log),
        )
        .route(
            "/api/v1/players/{address}/history",
            get(api::players::get_history),
        )
        .route(
            "/api/v1/players/{address}/pending-reward",
            get(api::players::get_pending_reward),
        )
        // Leaderboard
        .route("/api/v1/leaderboard", get(api::leaderboard::get_leaderboard))
        // Game reads
        .route("/api/v1/game/stats", get(api::game::get_stats))
        .route(
            "/api/v1/game/battle-details",
            get(api::game::get_battle_details),
        )
        .route("/api/v1/game/opponents", get(api::game::get_opponents))
        // Game actions
        .route("/api/v1/game/deposit", post(api::game::deposit))
        .route("/api/v1/game/withdraw", post(api::game::withdraw))
        .route("/api/v1/game/attack", post(api::game::attack))
        .route(
            "/api/v1/game/expand-kingdom",
            post(api::game::expand_kingdom),
        )
        .route(
            "/api/v1/game/reset-cooldown",
            post(api::game::reset_cooldown),
        )
        // Player event feed
        .route("/api/v1/events/list", get(api::events::list))
        .route("/api/v1/events/mark-read", post(api::events::mark_read))
        .route(
            "/api/v1/events/mark-all-read",
            post(api::events::mark_all_read),
        )
        .route("/api/v1/events/stats", get(api::events::get_stats))
        // Tutorial
        .route(
            "/api/v1/tutorial/{address}",
            get(api::tutorial::get_progress).post(api::tutorial::save_progress),
        )
        // WebSocket
        .route("/ws/events", get(websocket::events::handler))
        .layer(cors)
        .with_state(state)
}

fn cors_from_config(config: &Config) -> CorsLayer {
    let raw = config.cors_allowed_origins.trim();
    if raw.is_empty() || raw == "*" {
        return CorsLayer::very_permissive();
    }

    let allowed: Vec<HeaderValue> = raw
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<HeaderValue>().ok())
        .collect();

    if allowed.is_empty() {
        tracing::warn!("No valid CORS origins parsed; falling back to permissive");
        return CorsLayer::very_permissive();
    }

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}
