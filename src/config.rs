use serde::Deserialize;
use std::env;

use crate::constants::{DEFAULT_CHAIN_ID, DEFAULT_RPC_URL, SYNC_CHUNK_SIZE};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // Server
    pub host: String,
    pub port: u16,
    pub environment: String,

    // Database
    pub database_url: String,
    pub database_max_connections: u32,

    // Blockchain
    pub rpc_url: String,
    pub ws_rpc_url: Option<String>,
    pub chain_id: u64,
    pub contract_address: String,

    // Sync
    pub sync_auth_token: Option<String>,
    pub sync_chunk_size: u64,

    // CORS
    pub cors_allowed_origins: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        Ok(Config {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),

            database_url: env::var("DATABASE_URL")?,
            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()?,

            rpc_url: env::var("RPC_URL").unwrap_or_else(|_| DEFAULT_RPC_URL.to_string()),
            ws_rpc_url: env::var("WS_RPC_URL").ok().filter(|v| !v.trim().is_empty()),
            chain_id: env::var("CHAIN_ID")
                .unwrap_or_else(|_| DEFAULT_CHAIN_ID.to_string())
                .parse()?,
            contract_address: env::var("CONTRACT_ADDRESS")?,

            sync_auth_token: env::var("SYNC_AUTH_TOKEN")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            sync_chunk_size: env::var("SYNC_CHUNK_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v| *v > 0)
                .unwrap_or(SYNC_CHUNK_SIZE),

            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "*".to_string()),
        })
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.database_url.trim().is_empty() {
            anyhow::bail!("DATABASE_URL is empty");
        }
        if self.rpc_url.trim().is_empty() {
            anyhow::bail!("RPC_URL is empty");
        }
        if url::Url::parse(&self.rpc_url).is_err() {
            anyhow::bail!("RPC_URL is not a valid URL");
        }
        if let Some(ws_url) = &self.ws_rpc_url {
            if url::Url::parse(ws_url).is_err() {
                anyhow::bail!("WS_RPC_URL is not a valid URL");
            }
        }
        if self.contract_address.trim().is_empty() {
            anyhow::bail!("CONTRACT_ADDRESS is empty");
        }

        if self.contract_address.starts_with("0x0000") {
            if !self.is_testnet() {
                anyhow::bail!("CONTRACT_ADDRESS is a placeholder");
            }
            tracing::warn!("Using placeholder game contract address");
        }
        if self.sync_auth_token.is_none() {
            tracing::warn!("SYNC_AUTH_TOKEN not set; sync endpoint is unauthenticated");
        }
        if self.cors_allowed_origins.trim().is_empty() {
            tracing::warn!("CORS_ALLOWED_ORIGINS is empty; requests may be blocked");
        }

        Ok(())
    }

    pub fn is_testnet(&self) -> bool {
        self.environment == "development" || self.environment == "testnet"
    }
}

#[cfg(test)]
pub(crate) fn test_config(database_url: &str) -> Config {
    Config {
        host: "0.0.0.0".to_string(),
        port: 3000,
        environment: "development".to_string(),
        database_url: database_url.to_string(),
        database_max_connections: 1,
        rpc_url: "http://localhost:8545".to_string(),
        ws_rpc_url: None,
        chain_id: 1116,
        contract_address: "0x0000000000000000000000000000000000000001".to_string(),
        sync_auth_token: None,
        sync_chunk_size: 1000,
        cors_allowed_origins: "*".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_empty_database_url() {
        let mut config = test_config("");
        config.database_url = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_rpc_url() {
        let mut config = test_config("postgres://localhost/game");
        config.rpc_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_accepts_minimal_config() {
        let config = test_config("postgres://localhost/game");
        assert!(config.validate().is_ok());
        assert!(config.is_testnet());
    }

    #[test]
    fn placeholder_contract_is_fatal_in_production() {
        let mut config = test_config("postgres://localhost/game");
        config.environment = "production".to_string();
        assert!(config.validate().is_err());

        config.contract_address = "0xC447163802012BD45883fF7f203E7700e5Fa886C".to_string();
        assert!(config.validate().is_ok());
    }
}
