use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::indexer::evm_client::EvmClient;
use crate::models::{ApiResponse, SyncStatus};
use crate::services::event_sync::{start_listen, EventSynchronizer, SyncRange};
use crate::services::BroadcastingStore;
use crate::utils::{address_key, parse_address};

use super::{require_sync_token, AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    pub action: String,
    pub contract_address: String,
    pub rpc_url: String,
    pub from_block: Option<u64>,
    pub to_block: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResponse {
    pub success: bool,
    pub processed_events: u64,
    pub synced_blocks: u64,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ListenResponse {
    pub success: bool,
    pub message: String,
}

/// POST /api/v1/sync
///
/// `sync` replays events between the checkpoint (or explicit bounds) and the
/// chain head against the request's RPC endpoint. `listen` opens a
/// fire-and-forget live subscription.
pub async fn handle(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<SyncRequest>,
) -> Result<Response> {
    require_sync_token(&headers, &state)?;

    let contract_address = parse_address(&req.contract_address)?;

    match req.action.as_str() {
        "sync" => {
            let client = EvmClient::connect(&req.rpc_url, contract_address)?;
            let store = BroadcastingStore::new(state.db.clone(), state.broker.clone());
            let synchronizer = EventSynchronizer::new(
                &client,
                &store,
                contract_address,
                state.config.sync_chunk_size,
            );
            let outcome = synchronizer
                .run(SyncRange {
                    from_block: req.from_block,
                    to_block: req.to_block,
                })
                .await?;

            Ok(Json(SyncResponse {
                success: true,
                processed_events: outcome.processed_events,
                synced_blocks: outcome.synced_blocks,
                message: outcome.message,
            })
            .into_response())
        }
        "listen" => {
            start_listen(&req.rpc_url, contract_address, state.db.clone()).await?;
            Ok(Json(ListenResponse {
                success: true,
                message: "Listening for events...".to_string(),
            })
            .into_response())
        }
        _ => Err(AppError::BadRequest(
            "Invalid action. Use 'sync' or 'listen'".to_string(),
        )),
    }
}

#[derive(Debug, Deserialize)]
pub struct SyncStatusQuery {
    pub contract: Option<String>,
}

/// GET /api/v1/sync/status
pub async fn get_status(
    State(state): State<AppState>,
    Query(query): Query<SyncStatusQuery>,
) -> Result<Json<ApiResponse<Option<SyncStatus>>>> {
    let contract_key = match query.contract {
        Some(raw) => address_key(&parse_address(&raw)?),
        None => address_key(&state.game.contract_address()),
    };
    let status = state.db.get_sync_status(&contract_key).await?;
    Ok(Json(ApiResponse::success(status)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_request_uses_camel_case_keys() {
        let req: SyncRequest = serde_json::from_str(
            r#"{
                "action": "sync",
                "contractAddress": "0xC447163802012BD45883fF7f203E7700e5Fa886C",
                "rpcUrl": "https://rpc.coredao.org",
                "fromBlock": 100,
                "toBlock": 200
            }"#,
        )
        .unwrap();
        assert_eq!(req.action, "sync");
        assert_eq!(req.from_block, Some(100));
        assert_eq!(req.to_block, Some(200));
    }

    #[test]
    fn sync_response_serializes_camel_case() {
        let response = SyncResponse {
            success: true,
            processed_events: 3,
            synced_blocks: 1000,
            message: "Synced 3 events from block 0 to 1000".to_string(),
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["processedEvents"], 3);
        assert_eq!(json["syncedBlocks"], 1000);
        assert_eq!(json["success"], true);
    }
}
