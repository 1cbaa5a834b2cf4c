use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::time::{interval, timeout, Duration};

use crate::{
    api::AppState,
    constants::{WS_CLIENT_TIMEOUT_SECS, WS_HEARTBEAT_INTERVAL_SECS},
    utils::{address_key, parse_address},
};

#[derive(Debug, Deserialize)]
pub struct EventStreamQuery {
    pub address: String,
}

fn connected_payload(address: &str) -> String {
    serde_json::json!({
        "type": "connected",
        "address": address,
        "message": "Connected to player event stream"
    })
    .to_string()
}

/// WebSocket handler for live player events
pub async fn handler(
    ws: WebSocketUpgrade,
    Query(query): Query<EventStreamQuery>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, query.address))
}

async fn handle_socket(socket: WebSocket, state: AppState, address: String) {
    let (mut sender, mut receiver) = socket.split();

    let key = match parse_address(&address) {
        Ok(parsed) => address_key(&parsed),
        Err(_) => {
            let _ = sender
                .send(Message::Text(
                    serde_json::json!({"type": "error", "message": "Invalid address"})
                        .to_string()
                        .into(),
                ))
                .await;
            return;
        }
    };

    let mut rx = state.broker.register_connection(key.clone()).await;
    let _ = sender
        .send(Message::Text(connected_payload(&key).into()))
        .await;

    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = interval(Duration::from_secs(WS_HEARTBEAT_INTERVAL_SECS));

        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    if sender.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
                result = rx.recv() => {
                    match result {
                        Ok(event) => {
                            let json = serde_json::to_string(&event).unwrap_or_default();
                            if sender.send(Message::Text(json.into())).await.is_err() {
                                break;
                            }
                        }
                        Err(_) => break,
                    }
                }
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        loop {
            let next_msg =
                timeout(Duration::from_secs(WS_CLIENT_TIMEOUT_SECS), receiver.next()).await;
            let msg = match next_msg {
                Ok(Some(Ok(msg))) => msg,
                Ok(Some(Err(_))) | Ok(None) => break,
                Err(_) => {
                    tracing::info!("WebSocket client timeout");
                    break;
                }
            };

            match msg {
                Message::Text(text) => {
                    tracing::debug!("Received: {}", text);
                }
                Message::Close(_) => {
                    tracing::info!("Client disconnected");
                    break;
                }
                Message::Ping(_) => {
                    tracing::debug!("Ping received");
                }
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => {
            recv_task.abort();
        }
        _ = &mut recv_task => {
            send_task.abort();
        }
    }

    state.broker.unregister_connection(&key).await;
    tracing::info!("WebSocket connection closed for player: {}", key);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connected_payload_has_type_and_address() {
        let payload = connected_payload("0xabc");
        assert!(payload.contains("\"type\":\"connected\""));
        assert!(payload.contains("0xabc"));
    }
}
