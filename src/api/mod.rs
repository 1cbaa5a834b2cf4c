// API endpoint modules
pub mod events;
pub mod game;
pub mod health;
pub mod leaderboard;
pub mod players;
pub mod sync;
pub mod tutorial;

use std::sync::Arc;

use axum::http::{header::AUTHORIZATION, HeaderMap};

use crate::config::Config;
use crate::db::Database;
use crate::error::{AppError, Result};
use crate::services::{GameClient, PlayerEventBroker};

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Config,
    pub game: Arc<GameClient>,
    pub broker: PlayerEventBroker,
}

/// Bearer-token guard for the sync endpoint. A missing SYNC_AUTH_TOKEN leaves
/// the endpoint open (validated config already warned about that).
pub fn require_sync_token(headers: &HeaderMap, state: &AppState) -> Result<()> {
    check_bearer_token(headers, state.config.sync_auth_token.as_deref())
}

fn check_bearer_token(headers: &HeaderMap, expected: Option<&str>) -> Result<()> {
    let Some(expected) = expected else {
        return Ok(());
    };

    let auth_header = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".to_string()))?;
    let auth_str = auth_header
        .to_str()
        .map_err(|_| AppError::Unauthorized("Invalid Authorization header".to_string()))?;
    let token = auth_str
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Unauthorized("Invalid Authorization scheme".to_string()))?;

    if token != expected {
        return Err(AppError::Unauthorized("Invalid sync token".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn no_configured_token_leaves_endpoint_open() {
        let headers = HeaderMap::new();
        assert!(check_bearer_token(&headers, None).is_ok());
    }

    #[test]
    fn missing_header_is_rejected_when_token_configured() {
        let headers = HeaderMap::new();
        assert!(check_bearer_token(&headers, Some("secret")).is_err());
    }

    #[test]
    fn matching_bearer_token_is_accepted() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer secret"));
        assert!(check_bearer_token(&headers, Some("secret")).is_ok());
        assert!(check_bearer_token(&headers, Some("other")).is_err());
    }
}
