//! Generic in-process pub/sub hub for progress/ready/error frame delivery.
//!
//! Provides topic-keyed broadcast channels for pushing events to WS/SSE
//! endpoints. Topics are opaque strings — the hub has no knowledge of what's
//! being streamed; domain code keys topics by `requestId`.
//!
//! # Usage
//!
//! Producers (the Pipeline Runner):
//!   hub.publish(&format!("search:{request_id}"), json!({"type": "progress", ...})).await;
//!
//! Consumers (SSE routes):
//!   let rx = hub.subscribe(&format!("search:{request_id}")).await;

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

/// Generic in-process pub/sub hub.
///
/// Thread-safe, cloneable. Keyed by string topics. Payloads are
/// `serde_json::Value` — domains serialize their own frame types.
#[derive(Clone)]
pub struct StreamHub {
    channels: Arc<RwLock<HashMap<String, broadcast::Sender<serde_json::Value>>>>,
    capacity: usize,
}

impl StreamHub {
    /// Create a new StreamHub with default capacity (256 messages per channel).
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            capacity,
        }
    }

    /// Publish a JSON value to a topic. No-op if no subscribers. Delivery is
    /// best-effort; a send failure (no active receivers) is ignored, never
    /// propagated — publishing never blocks or fails the caller.
    pub async fn publish(&self, topic: &str, value: serde_json::Value) {
        let channels = self.channels.read().await;
        if let Some(tx) = channels.get(topic) {
            let _ = tx.send(value);
        }
    }

    /// Subscribe to a topic. Creates the channel if it doesn't exist.
    pub async fn subscribe(&self, topic: &str) -> broadcast::Receiver<serde_json::Value> {
        let mut channels = self.channels.write().await;
        let tx = channels
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0);
        tx.subscribe()
    }

    /// Remove channels with zero subscribers (housekeeping).
    pub async fn cleanup(&self) {
        let mut channels = self.channels.write().await;
        channels.retain(|_, tx| tx.receiver_count() > 0);
    }
}

impl Default for StreamHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_subscribe_roundtrip() {
        let hub = StreamHub::new();
        let mut rx = hub.subscribe("search:abc").await;

        let value = serde_json::json!({"type": "progress", "progress": 10});
        hub.publish("search:abc", value.clone()).await;

        let received = rx.recv().await.unwrap();
        assert_eq!(received, value);
    }

    #[tokio::test]
    async fn publish_no_subscribers_is_noop() {
        let hub = StreamHub::new();
        hub.publish("nobody:listening", serde_json::json!({"data": "dropped"}))
            .await;
    }

    #[tokio::test]
    async fn cleanup_removes_empty_channels() {
        let hub = StreamHub::new();
        let rx = hub.subscribe("search:ephemeral").await;

        assert_eq!(hub.channels.read().await.len(), 1);

        drop(rx);
        hub.cleanup().await;

        assert_eq!(hub.channels.read().await.len(), 0);
    }

    #[tokio::test]
    async fn multiple_subscribers_each_receive() {
        let hub = StreamHub::new();
        let mut rx1 = hub.subscribe("search:multi").await;
        let mut rx2 = hub.subscribe("search:multi").await;

        let value = serde_json::json!({"type": "ready"});
        hub.publish("search:multi", value.clone()).await;

        assert_eq!(rx1.recv().await.unwrap(), value);
        assert_eq!(rx2.recv().await.unwrap(), value);
    }
}
