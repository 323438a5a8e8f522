//! Outbound domain notifications.
//!
//! The core only needs a `publish` capability; transport and delivery are
//! owned by whoever subscribes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::debug;

use crate::error::Result;
use crate::traits::EventPublisher;
use crate::types::now_utc;

/// Bus topic an event is published on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Topic {
    System,
    Governor,
}

/// A state-change notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEvent {
    pub topic: Topic,
    /// Event type, e.g. `vector.event.logged`.
    pub kind: String,
    pub payload: Value,
    pub emitted_at: DateTime<Utc>,
}

impl LedgerEvent {
    pub fn new(topic: Topic, kind: &str, payload: Value) -> Self {
        Self {
            topic,
            kind: kind.to_string(),
            payload,
            emitted_at: now_utc(),
        }
    }
}

/// Publisher that fans events out over a tokio broadcast channel.
#[derive(Debug, Clone)]
pub struct BroadcastPublisher {
    sender: broadcast::Sender<LedgerEvent>,
}

impl BroadcastPublisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastPublisher {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl EventPublisher for BroadcastPublisher {
    async fn publish(&self, event: LedgerEvent) -> Result<()> {
        if self.sender.send(event).is_err() {
            // No subscribers is not a failure.
            debug!("Dropped ledger event: no subscribers");
        }
        Ok(())
    }
}

/// Publisher that writes events to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingPublisher;

#[async_trait]
impl EventPublisher for TracingPublisher {
    async fn publish(&self, event: LedgerEvent) -> Result<()> {
        debug!(topic = ?event.topic, kind = %event.kind, payload = %event.payload, "ledger event");
        Ok(())
    }
}

/// Publisher used when no bus is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPublisher;

#[async_trait]
impl EventPublisher for NullPublisher {
    async fn publish(&self, _event: LedgerEvent) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_broadcast_delivers() {
        let publisher = BroadcastPublisher::new(8);
        let mut rx = publisher.subscribe();

        publisher
            .publish(LedgerEvent::new(Topic::System, "vector.event.logged", json!({"id": "a"})))
            .await
            .unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.kind, "vector.event.logged");
        assert_eq!(received.payload["id"], "a");
    }

    #[tokio::test]
    async fn test_broadcast_without_subscribers_is_ok() {
        let publisher = BroadcastPublisher::default();
        let result = publisher
            .publish(LedgerEvent::new(Topic::Governor, "reputation.edge.added", json!({})))
            .await;
        assert!(result.is_ok());
    }
}
