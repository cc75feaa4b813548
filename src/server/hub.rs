//! Change broadcasting for live subscriptions.
//!
//! Every write to the document store publishes a change batch to the
//! collection's broadcast channel. Each WebSocket subscriber holds a
//! receiver; a subscriber that falls too far behind misses batches
//! (broadcast semantics), which the store's authoritativeness tolerates.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

use whereizit_core::{ChangeBatch, DocumentChange};

/// Buffered batches per collection channel.
const CHANNEL_CAPACITY: usize = 64;

/// Tracks all live subscriptions and fans change batches out to them.
pub struct ChangeHub {
    /// Broadcast channels keyed by collection name.
    channels: RwLock<HashMap<String, broadcast::Sender<ChangeBatch>>>,
}

impl ChangeHub {
    pub fn new() -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
        }
    }

    /// Subscribes to changes for a collection.
    pub async fn subscribe(&self, collection: &str) -> broadcast::Receiver<ChangeBatch> {
        let mut channels = self.channels.write().await;

        if let Some(sender) = channels.get(collection) {
            sender.subscribe()
        } else {
            let (sender, receiver) = broadcast::channel(CHANNEL_CAPACITY);
            channels.insert(collection.to_string(), sender);
            receiver
        }
    }

    /// Publishes a single change as a one-element batch.
    pub async fn publish(&self, collection: &str, change: DocumentChange) {
        self.publish_batch(collection, vec![change]).await;
    }

    /// Publishes a batch of changes to a collection's subscribers.
    ///
    /// Dropped silently when nobody is subscribed.
    pub async fn publish_batch(&self, collection: &str, batch: ChangeBatch) {
        let channels = self.channels.read().await;
        if let Some(sender) = channels.get(collection) {
            // Send fails only when there are no receivers.
            let _ = sender.send(batch);
        }
    }
}

impl Default for ChangeHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared handle used by handlers.
pub type SharedHub = Arc<ChangeHub>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;
    use whereizit_core::ChangeKind;

    #[tokio::test]
    async fn test_subscriber_receives_published_batch() {
        let hub = ChangeHub::new();
        let mut receiver = hub.subscribe("smokingAreas").await;

        hub.publish(
            "smokingAreas",
            DocumentChange::added("doc-1", Map::new()),
        )
        .await;

        let batch = receiver.recv().await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].kind, ChangeKind::Added);
        assert_eq!(batch[0].document_id, "doc-1");
    }

    #[tokio::test]
    async fn test_collections_are_isolated() {
        let hub = ChangeHub::new();
        let mut areas = hub.subscribe("smokingAreas").await;
        let _reports = hub.subscribe("reports").await;

        hub.publish("reports", DocumentChange::added("r-1", Map::new()))
            .await;
        hub.publish(
            "smokingAreas",
            DocumentChange::added("a-1", Map::new()),
        )
        .await;

        let batch = areas.recv().await.unwrap();
        assert_eq!(batch[0].document_id, "a-1");
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_ok() {
        let hub = ChangeHub::new();
        hub.publish("smokingAreas", DocumentChange::added("doc-1", Map::new()))
            .await;
    }
}
