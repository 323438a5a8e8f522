//! Daily Merkle rollups over the vector ledger.

use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::json;
use tracing::{debug, info, warn};

use trust_core::{
    day_bounds_millis, now_utc, publish_quietly, record_quietly, EventPublisher, HashAlgorithm,
    LedgerEvent, LedgerStore, MerkleRoot, MetricsSink, NullMetrics, NullPublisher, Result,
    RollupAudit, RollupResult, Topic, VectorEvent,
};

use crate::merkle::{leaf_hash, merkle_root_hex};

/// A day's root computed from the events currently in the store.
struct DayRoot {
    merkle_root: String,
    hash_algo: HashAlgorithm,
    event_count: u64,
}

/// Seals each UTC day's vector events under a Merkle root.
pub struct RollupBatcher {
    store: Arc<dyn LedgerStore>,
    metrics: Arc<dyn MetricsSink>,
    publisher: Arc<dyn EventPublisher>,
}

impl RollupBatcher {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self {
            store,
            metrics: Arc::new(NullMetrics),
            publisher: Arc::new(NullPublisher),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.publisher = publisher;
        self
    }

    /// Compute and commit the root for `date`.
    ///
    /// Returns `None` when the day has no events. Re-running a day
    /// overwrites the stored root.
    pub async fn run_rollup(&self, date: NaiveDate) -> Result<Option<RollupResult>> {
        let Some(day) = self.compute(date).await? else {
            debug!("No vector events on {}, skipping rollup", date);
            return Ok(None);
        };

        let computed_at = now_utc();
        let root = MerkleRoot {
            batch_date: date,
            merkle_root: day.merkle_root.clone(),
            hash_algo: day.hash_algo,
            event_count: day.event_count,
            computed_at,
        };
        self.store.upsert_merkle_root(&root).await?;

        info!(
            "Rolled up {} events for {} ({}): {}",
            day.event_count, date, day.hash_algo, day.merkle_root
        );

        let batch_date = date.format("%Y-%m-%d").to_string();

        publish_quietly(
            self.publisher.as_ref(),
            LedgerEvent::new(
                Topic::System,
                "vector.rollup.completed",
                json!({
                    "batchDate": batch_date,
                    "merkleRoot": day.merkle_root,
                    "hashAlgo": day.hash_algo.name(),
                    "eventCount": day.event_count,
                }),
            ),
        )
        .await;

        record_quietly(
            self.metrics.as_ref(),
            "vector.rollup",
            json!({
                "batchDate": batch_date,
                "merkleRoot": day.merkle_root,
                "hashAlgo": day.hash_algo.name(),
                "eventCount": day.event_count,
                "computedAt": computed_at.to_rfc3339(),
            }),
        )
        .await;

        Ok(Some(RollupResult {
            batch_date: date,
            merkle_root: day.merkle_root,
            hash_algo: day.hash_algo,
            event_count: day.event_count,
        }))
    }

    /// The committed root for `date`, if any.
    pub async fn get_root(&self, date: NaiveDate) -> Result<Option<MerkleRoot>> {
        self.store.get_merkle_root(date).await
    }

    /// Recompute `date` without writing and compare against the stored root.
    pub async fn audit_day(&self, date: NaiveDate) -> Result<RollupAudit> {
        let recomputed = self.compute(date).await?;
        let stored = self.store.get_merkle_root(date).await?;

        let audit = match (stored, recomputed) {
            (_, None) => RollupAudit::NoEvents,
            (None, Some(day)) => RollupAudit::MissingRoot {
                recomputed: day.merkle_root,
                event_count: day.event_count,
            },
            (Some(stored), Some(day)) => {
                if stored.merkle_root == day.merkle_root && stored.event_count == day.event_count
                {
                    RollupAudit::Matches {
                        merkle_root: day.merkle_root,
                        event_count: day.event_count,
                    }
                } else {
                    warn!(
                        "Merkle root mismatch for {}: stored {} recomputed {}",
                        date, stored.merkle_root, day.merkle_root
                    );
                    RollupAudit::Mismatch {
                        stored: stored.merkle_root,
                        recomputed: day.merkle_root,
                        stored_count: stored.event_count,
                        recomputed_count: day.event_count,
                    }
                }
            }
        };

        Ok(audit)
    }

    async fn compute(&self, date: NaiveDate) -> Result<Option<DayRoot>> {
        let (start, end) = day_bounds_millis(date);
        let events = self.store.vector_events_between(start, end).await?;

        let Some(first) = events.first() else {
            return Ok(None);
        };

        // Every leaf uses the first event's algorithm.
        let algo = first.hash_algo;
        warn_mixed_algorithms(date, algo, &events);

        let leaves: Vec<Vec<u8>> = events.iter().map(|e| leaf_hash(e, algo)).collect();
        let Some(merkle_root) = merkle_root_hex(&leaves, algo) else {
            return Ok(None);
        };

        Ok(Some(DayRoot {
            merkle_root,
            hash_algo: algo,
            event_count: events.len() as u64,
        }))
    }
}

fn warn_mixed_algorithms(date: NaiveDate, algo: HashAlgorithm, events: &[VectorEvent]) {
    let others = events.iter().filter(|e| e.hash_algo != algo).count();
    if others > 0 {
        warn!(
            "{} of {} events on {} were logged with a different algorithm than {}",
            others,
            events.len(),
            date,
            algo
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use trust_core::BroadcastPublisher;
    use trust_store::MemoryStore;

    fn event(id: &str, at_ms: i64, algo: HashAlgorithm) -> VectorEvent {
        VectorEvent {
            id: id.to_string(),
            object_type: "doc".to_string(),
            object_id: id.to_string(),
            model: "m1".to_string(),
            dim: 0,
            hash_algo: algo,
            vec_hash: algo.hex_digest(format!("vec-{}", id).as_bytes()),
            payload_hash: algo.hex_digest(format!("payload-{}", id).as_bytes()),
            created_at: Utc.timestamp_millis_opt(at_ms).unwrap(),
        }
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    async fn seeded() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        let (start, end) = day_bounds_millis(day());
        for (i, at) in [start, start + 1_000, start + 2_000].iter().enumerate() {
            store
                .insert_vector_event(&event(&format!("E{}", i), *at, HashAlgorithm::Sha256))
                .await
                .unwrap();
        }
        // Belongs to the next day.
        store
            .insert_vector_event(&event("NEXT", end, HashAlgorithm::Sha256))
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_empty_day() {
        let batcher = RollupBatcher::new(Arc::new(MemoryStore::new()));
        assert!(batcher.run_rollup(day()).await.unwrap().is_none());
        assert!(batcher.get_root(day()).await.unwrap().is_none());
        assert_eq!(batcher.audit_day(day()).await.unwrap(), RollupAudit::NoEvents);
    }

    #[tokio::test]
    async fn test_rollup_commits_root() {
        let store = seeded().await;
        let batcher = RollupBatcher::new(store.clone()).with_metrics(store.clone());

        let result = batcher.run_rollup(day()).await.unwrap().unwrap();
        assert_eq!(result.event_count, 3);
        assert_eq!(result.hash_algo, HashAlgorithm::Sha256);
        assert_eq!(result.merkle_root.len(), 64);

        let stored = batcher.get_root(day()).await.unwrap().unwrap();
        assert_eq!(stored.merkle_root, result.merkle_root);
        assert_eq!(stored.event_count, 3);

        let metric = store.get_metric("vector.rollup").await.unwrap().unwrap();
        assert_eq!(metric.payload["batchDate"], "2024-06-01");
        assert_eq!(metric.payload["eventCount"], 3);
    }

    #[tokio::test]
    async fn test_root_matches_manual_tree() {
        let store = seeded().await;
        let batcher = RollupBatcher::new(store.clone());
        let result = batcher.run_rollup(day()).await.unwrap().unwrap();

        let (start, end) = day_bounds_millis(day());
        let events = store.vector_events_between(start, end).await.unwrap();
        let leaves: Vec<Vec<u8>> = events
            .iter()
            .map(|e| leaf_hash(e, HashAlgorithm::Sha256))
            .collect();
        assert_eq!(
            Some(result.merkle_root),
            merkle_root_hex(&leaves, HashAlgorithm::Sha256)
        );
    }

    #[tokio::test]
    async fn test_rollup_idempotent() {
        let store = seeded().await;
        let batcher = RollupBatcher::new(store);

        let first = batcher.run_rollup(day()).await.unwrap().unwrap();
        let second = batcher.run_rollup(day()).await.unwrap().unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_single_event_root_is_leaf() {
        let store = Arc::new(MemoryStore::new());
        let (start, _) = day_bounds_millis(day());
        let only = event("ONLY", start + 5, HashAlgorithm::Blake3);
        store.insert_vector_event(&only).await.unwrap();

        let batcher = RollupBatcher::new(store);
        let result = batcher.run_rollup(day()).await.unwrap().unwrap();
        assert_eq!(result.hash_algo, HashAlgorithm::Blake3);
        assert_eq!(
            result.merkle_root,
            hex::encode(leaf_hash(&only, HashAlgorithm::Blake3))
        );
    }

    #[tokio::test]
    async fn test_mixed_algorithms_use_first() {
        let store = Arc::new(MemoryStore::new());
        let (start, _) = day_bounds_millis(day());
        store
            .insert_vector_event(&event("A", start, HashAlgorithm::Sha3_512))
            .await
            .unwrap();
        store
            .insert_vector_event(&event("B", start + 1, HashAlgorithm::Sha256))
            .await
            .unwrap();

        let batcher = RollupBatcher::new(store);
        let result = batcher.run_rollup(day()).await.unwrap().unwrap();
        assert_eq!(result.hash_algo, HashAlgorithm::Sha3_512);
        assert_eq!(result.merkle_root.len(), 128);
    }

    #[tokio::test]
    async fn test_audit_detects_tampering() {
        let store = seeded().await;
        let batcher = RollupBatcher::new(store.clone());
        let result = batcher.run_rollup(day()).await.unwrap().unwrap();

        assert_eq!(
            batcher.audit_day(day()).await.unwrap(),
            RollupAudit::Matches {
                merkle_root: result.merkle_root.clone(),
                event_count: 3,
            }
        );

        let mut forged = batcher.get_root(day()).await.unwrap().unwrap();
        forged.merkle_root = "00".repeat(32);
        store.upsert_merkle_root(&forged).await.unwrap();

        match batcher.audit_day(day()).await.unwrap() {
            RollupAudit::Mismatch {
                stored, recomputed, ..
            } => {
                assert_eq!(stored, "00".repeat(32));
                assert_eq!(recomputed, result.merkle_root);
            }
            other => panic!("expected mismatch, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_audit_missing_root() {
        let batcher = RollupBatcher::new(seeded().await);
        match batcher.audit_day(day()).await.unwrap() {
            RollupAudit::MissingRoot { event_count, .. } => assert_eq!(event_count, 3),
            other => panic!("expected missing root, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_publishes_completion() {
        let bus = Arc::new(BroadcastPublisher::default());
        let mut rx = bus.subscribe();
        let batcher = RollupBatcher::new(seeded().await).with_publisher(bus);

        batcher.run_rollup(day()).await.unwrap();

        let published = rx.recv().await.unwrap();
        assert_eq!(published.kind, "vector.rollup.completed");
        assert_eq!(published.payload["eventCount"], 3);
    }
}
