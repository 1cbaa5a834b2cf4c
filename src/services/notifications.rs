use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{broadcast, RwLock};

use crate::models::PlayerEvent;

/// Fan-out registry for live player-event streams, one broadcast channel per
/// player address. Rows are persisted separately; this only feeds connected
/// websockets.
#[derive(Clone, Default)]
pub struct PlayerEventBroker {
    connections: Arc<RwLock<HashMap<String, broadcast::Sender<PlayerEvent>>>>,
}

impl PlayerEventBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register_connection(&self, address: String) -> broadcast::Receiver<PlayerEvent> {
        let mut connections = self.connections.write().await;
        if let Some(sender) = connections.get(&address) {
            sender.subscribe()
        } else {
            let (tx, rx) = broadcast::channel(100);
            connections.insert(address, tx);
            rx
        }
    }

    pub async fn unregister_connection(&self, address: &str) {
        let mut connections = self.connections.write().await;
        if let Some(sender) = connections.get(address) {
            if sender.receiver_count() == 0 {
                connections.remove(address);
            }
        }
    }

    /// Push a freshly derived event to whoever is listening. The id is not
    /// the persisted one; subscribers treat these as ephemeral.
    pub async fn publish(&self, address: &str, event_type: &str, event_data: serde_json::Value) {
        let connections = self.connections.read().await;
        if let Some(sender) = connections.get(address) {
            let event = PlayerEvent {
                id: 0,
                player_address: address.to_string(),
                event_type: event_type.to_string(),
                event_data,
                read: false,
                created_at: Utc::now(),
            };
            let _ = sender.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_reaches_registered_subscriber() {
        let broker = PlayerEventBroker::new();
        let mut rx = broker.register_connection("0xabc".to_string()).await;

        broker
            .publish("0xabc", "battle_won", serde_json::json!({"reward": "10"}))
            .await;

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type, "battle_won");
        assert_eq!(event.player_address, "0xabc");
    }

    #[tokio::test]
    async fn publish_without_subscriber_is_a_noop() {
        let broker = PlayerEventBroker::new();
        // Should not panic or block.
        broker
            .publish("0xdef", "league_promotion", serde_json::json!({}))
            .await;
    }
}
