//! In-memory store used by tests and ephemeral runs.

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

use trust_core::{
    now_utc, LedgerStore, MerkleRoot, MetricRecord, MetricsSink, RepoFingerprint, ReputationEdge,
    ReputationNode, ReputationScore, ReputationStore, Result, TrustError, VectorEvent,
    WatchdogAlert, WatchdogSnapshot, WatchdogStore,
};

#[derive(Default)]
struct MemoryState {
    events: BTreeMap<String, VectorEvent>,
    roots: BTreeMap<NaiveDate, MerkleRoot>,
    nodes: BTreeMap<String, ReputationNode>,
    edges: BTreeMap<(String, String, String), ReputationEdge>,
    scores: BTreeMap<String, ReputationScore>,
    snapshots: BTreeMap<String, WatchdogSnapshot>,
    fingerprints: BTreeMap<(String, String), RepoFingerprint>,
    alerts: Vec<WatchdogAlert>,
    metrics: BTreeMap<String, MetricRecord>,
}

/// Store backed by ordered maps behind an async lock.
///
/// Mirrors the ordering guarantees of `SqliteStore` so components behave
/// identically on either backend.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn insert_vector_event(&self, event: &VectorEvent) -> Result<()> {
        let mut state = self.state.write().await;
        if state.events.contains_key(&event.id) {
            return Err(TrustError::invalid_argument(format!(
                "vector event already exists: {}",
                event.id
            )));
        }
        state.events.insert(event.id.clone(), event.clone());
        debug!("Inserted vector event: {}", event.id);
        Ok(())
    }

    async fn get_vector_event(&self, id: &str) -> Result<Option<VectorEvent>> {
        Ok(self.state.read().await.events.get(id).cloned())
    }

    async fn list_vector_events(
        &self,
        object_type: &str,
        object_id: &str,
        limit: u32,
    ) -> Result<Vec<VectorEvent>> {
        let state = self.state.read().await;
        let mut events: Vec<VectorEvent> = state
            .events
            .values()
            .filter(|e| e.object_type == object_type && e.object_id == object_id)
            .cloned()
            .collect();
        events.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        events.truncate(limit as usize);
        Ok(events)
    }

    async fn vector_events_between(&self, start_ms: i64, end_ms: i64) -> Result<Vec<VectorEvent>> {
        let state = self.state.read().await;
        let mut events: Vec<VectorEvent> = state
            .events
            .values()
            .filter(|e| {
                let ts = e.created_at.timestamp_millis();
                ts >= start_ms && ts < end_ms
            })
            .cloned()
            .collect();
        events.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(events)
    }

    async fn upsert_merkle_root(&self, root: &MerkleRoot) -> Result<()> {
        self.state
            .write()
            .await
            .roots
            .insert(root.batch_date, root.clone());
        Ok(())
    }

    async fn get_merkle_root(&self, batch_date: NaiveDate) -> Result<Option<MerkleRoot>> {
        Ok(self.state.read().await.roots.get(&batch_date).cloned())
    }
}

#[async_trait]
impl ReputationStore for MemoryStore {
    async fn ensure_node(&self, id: &str, node_type: &str) -> Result<()> {
        let mut state = self.state.write().await;
        state
            .nodes
            .entry(id.to_string())
            .or_insert_with(|| ReputationNode {
                id: id.to_string(),
                node_type: node_type.to_string(),
                created_at: now_utc(),
            });
        Ok(())
    }

    async fn get_node(&self, id: &str) -> Result<Option<ReputationNode>> {
        Ok(self.state.read().await.nodes.get(id).cloned())
    }

    async fn list_node_ids(&self) -> Result<Vec<String>> {
        Ok(self.state.read().await.nodes.keys().cloned().collect())
    }

    async fn upsert_edge(&self, edge: &ReputationEdge) -> Result<()> {
        let mut state = self.state.write().await;
        for endpoint in [&edge.src, &edge.dst] {
            if !state.nodes.contains_key(endpoint) {
                return Err(TrustError::invalid_argument(format!(
                    "unknown reputation node: {}",
                    endpoint
                )));
            }
        }
        let key = (edge.src.clone(), edge.dst.clone(), edge.kind.clone());
        state.edges.insert(key, edge.clone());
        Ok(())
    }

    async fn list_edges(&self) -> Result<Vec<ReputationEdge>> {
        Ok(self.state.read().await.edges.values().cloned().collect())
    }

    async fn replace_scores(&self, scores: &[ReputationScore]) -> Result<()> {
        let mut state = self.state.write().await;
        let keep: HashSet<&str> = scores.iter().map(|s| s.node_id.as_str()).collect();
        state.scores.retain(|node_id, _| keep.contains(node_id.as_str()));
        for score in scores {
            state.scores.insert(score.node_id.clone(), score.clone());
        }
        Ok(())
    }

    async fn get_score(&self, node_id: &str) -> Result<Option<ReputationScore>> {
        Ok(self.state.read().await.scores.get(node_id).cloned())
    }

    async fn top_scores(&self, limit: u32) -> Result<Vec<ReputationScore>> {
        let state = self.state.read().await;
        let mut scores: Vec<ReputationScore> = state.scores.values().cloned().collect();
        scores.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.node_id.cmp(&b.node_id))
        });
        scores.truncate(limit as usize);
        Ok(scores)
    }
}

#[async_trait]
impl WatchdogStore for MemoryStore {
    async fn latest_snapshot_id(&self) -> Result<Option<String>> {
        let state = self.state.read().await;
        Ok(state
            .snapshots
            .values()
            .max_by(|a, b| {
                a.recorded_at
                    .cmp(&b.recorded_at)
                    .then_with(|| a.snapshot_id.cmp(&b.snapshot_id))
            })
            .map(|snapshot| snapshot.snapshot_id.clone()))
    }

    async fn get_snapshot(&self, snapshot_id: &str) -> Result<Vec<RepoFingerprint>> {
        let state = self.state.read().await;
        // Keys are ordered by (snapshot_id, path), so rows come out sorted by path.
        Ok(state
            .fingerprints
            .iter()
            .filter(|((id, _), _)| id == snapshot_id)
            .map(|(_, fp)| fp.clone())
            .collect())
    }

    async fn record_snapshot(
        &self,
        snapshot: &WatchdogSnapshot,
        fingerprints: &[RepoFingerprint],
    ) -> Result<()> {
        let mut state = self.state.write().await;
        state
            .snapshots
            .insert(snapshot.snapshot_id.clone(), snapshot.clone());
        for fp in fingerprints {
            state
                .fingerprints
                .insert((fp.snapshot_id.clone(), fp.path.clone()), fp.clone());
        }
        Ok(())
    }

    async fn insert_alert(&self, alert: &WatchdogAlert) -> Result<()> {
        let mut state = self.state.write().await;
        if state.alerts.iter().any(|a| a.alert_id == alert.alert_id) {
            return Err(TrustError::invalid_argument(format!(
                "watchdog alert already exists: {}",
                alert.alert_id
            )));
        }
        state.alerts.push(alert.clone());
        Ok(())
    }

    async fn list_alerts(&self, limit: u32) -> Result<Vec<WatchdogAlert>> {
        let state = self.state.read().await;
        let mut alerts = state.alerts.clone();
        alerts.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.alert_id.cmp(&a.alert_id))
        });
        alerts.truncate(limit as usize);
        Ok(alerts)
    }
}

#[async_trait]
impl MetricsSink for MemoryStore {
    async fn record_metric(&self, metric_id: &str, payload: Value) -> Result<()> {
        self.state.write().await.metrics.insert(
            metric_id.to_string(),
            MetricRecord {
                metric_id: metric_id.to_string(),
                payload,
                recorded_at: now_utc(),
            },
        );
        Ok(())
    }

    async fn get_metric(&self, metric_id: &str) -> Result<Option<MetricRecord>> {
        Ok(self.state.read().await.metrics.get(metric_id).cloned())
    }
}
