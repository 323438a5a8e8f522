//! Capability traits connecting the components to their collaborators.
//!
//! Each component depends only on the trait it needs, so the durable and
//! in-memory stores are interchangeable and chosen once at construction.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use tracing::warn;

use crate::error::Result;
use crate::events::LedgerEvent;
use crate::types::{
    MerkleRoot, MetricRecord, RepoFingerprint, ReputationEdge, ReputationNode, ReputationScore,
    VectorEvent, WatchdogAlert, WatchdogSnapshot,
};

/// Storage for vector events and their daily Merkle roots.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    // Event operations
    async fn insert_vector_event(&self, event: &VectorEvent) -> Result<()>;
    async fn get_vector_event(&self, id: &str) -> Result<Option<VectorEvent>>;

    /// Events for one object, newest first.
    async fn list_vector_events(
        &self,
        object_type: &str,
        object_id: &str,
        limit: u32,
    ) -> Result<Vec<VectorEvent>>;

    /// Events with `start_ms <= created_at < end_ms`, oldest first, ties by id.
    async fn vector_events_between(&self, start_ms: i64, end_ms: i64) -> Result<Vec<VectorEvent>>;

    // Root operations
    async fn upsert_merkle_root(&self, root: &MerkleRoot) -> Result<()>;
    async fn get_merkle_root(&self, batch_date: NaiveDate) -> Result<Option<MerkleRoot>>;
}

/// Storage for the reputation graph and its scores.
#[async_trait]
pub trait ReputationStore: Send + Sync {
    // Node operations
    /// Insert the node if absent. An existing node keeps its type.
    async fn ensure_node(&self, id: &str, node_type: &str) -> Result<()>;
    async fn get_node(&self, id: &str) -> Result<Option<ReputationNode>>;
    async fn list_node_ids(&self) -> Result<Vec<String>>;

    // Edge operations
    /// Insert or replace weight, signature and created_at of `(src, dst, kind)`.
    async fn upsert_edge(&self, edge: &ReputationEdge) -> Result<()>;
    async fn list_edges(&self) -> Result<Vec<ReputationEdge>>;

    // Score operations
    /// Delete scores for nodes not in `scores`, then upsert every entry.
    async fn replace_scores(&self, scores: &[ReputationScore]) -> Result<()>;
    async fn get_score(&self, node_id: &str) -> Result<Option<ReputationScore>>;

    /// Highest scores first, ties by node id.
    async fn top_scores(&self, limit: u32) -> Result<Vec<ReputationScore>>;
}

/// Storage for filesystem fingerprints and watchdog alerts.
#[async_trait]
pub trait WatchdogStore: Send + Sync {
    /// Id of the recorded snapshot with the most recent `recorded_at`.
    async fn latest_snapshot_id(&self) -> Result<Option<String>>;
    async fn get_snapshot(&self, snapshot_id: &str) -> Result<Vec<RepoFingerprint>>;

    /// Write the snapshot marker and its fingerprints as one unit.
    /// Fingerprints are upserted by `(snapshot_id, path)`.
    async fn record_snapshot(
        &self,
        snapshot: &WatchdogSnapshot,
        fingerprints: &[RepoFingerprint],
    ) -> Result<()>;

    async fn insert_alert(&self, alert: &WatchdogAlert) -> Result<()>;

    /// Newest first.
    async fn list_alerts(&self, limit: u32) -> Result<Vec<WatchdogAlert>>;
}

/// Best-effort metrics sink.
#[async_trait]
pub trait MetricsSink: Send + Sync {
    async fn record_metric(&self, metric_id: &str, payload: Value) -> Result<()>;
    async fn get_metric(&self, metric_id: &str) -> Result<Option<MetricRecord>>;
}

/// Fire-and-forget event publisher.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: LedgerEvent) -> Result<()>;
}

/// Metrics sink used when metrics are disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullMetrics;

#[async_trait]
impl MetricsSink for NullMetrics {
    async fn record_metric(&self, _metric_id: &str, _payload: Value) -> Result<()> {
        Ok(())
    }

    async fn get_metric(&self, _metric_id: &str) -> Result<Option<MetricRecord>> {
        Ok(None)
    }
}

/// Publish an event, logging and swallowing any failure.
pub async fn publish_quietly(publisher: &dyn EventPublisher, event: LedgerEvent) {
    let kind = event.kind.clone();
    if let Err(e) = publisher.publish(event).await {
        warn!("Failed to publish {}: {}", kind, e);
    }
}

/// Record a metric, logging and swallowing any failure.
pub async fn record_quietly(metrics: &dyn MetricsSink, metric_id: &str, payload: Value) {
    if let Err(e) = metrics.record_metric(metric_id, payload).await {
        warn!("Failed to record metric {}: {}", metric_id, e);
    }
}
