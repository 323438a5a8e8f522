//! Reputation graph maintenance and score recomputation.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info};

use trust_core::{
    now_utc, publish_quietly, record_quietly, EventPublisher, LeaderboardEntry, LedgerEvent,
    MetricsSink, NewEdge, NullMetrics, NullPublisher, RecomputeSummary, ReputationConfig,
    ReputationEdge, ReputationNode, ReputationScore, ReputationStore, Result, Topic, TrustError,
    UNKNOWN_NODE_TYPE,
};

use crate::propagate::propagate;

/// Maintains the trust graph and its derived scores.
pub struct ReputationScorer {
    store: Arc<dyn ReputationStore>,
    metrics: Arc<dyn MetricsSink>,
    publisher: Arc<dyn EventPublisher>,

    /// Defaults for `recompute_default` and `leaderboard`.
    config: ReputationConfig,
}

impl ReputationScorer {
    pub fn new(store: Arc<dyn ReputationStore>, config: ReputationConfig) -> Self {
        Self {
            store,
            metrics: Arc::new(NullMetrics),
            publisher: Arc::new(NullPublisher),
            config,
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

    /// Insert a node if absent. An existing node keeps its type.
    pub async fn ensure_node(&self, id: &str, node_type: &str) -> Result<()> {
        if id.is_empty() {
            return Err(TrustError::invalid_argument("node id must not be empty"));
        }
        self.store.ensure_node(id, node_type).await
    }

    pub async fn get_node(&self, id: &str) -> Result<Option<ReputationNode>> {
        self.store.get_node(id).await
    }

    /// Add or replace the `(src, dst, kind)` edge, creating missing endpoints.
    pub async fn add_edge(&self, input: NewEdge) -> Result<ReputationEdge> {
        let weight = input.weight.unwrap_or(1.0);
        if !weight.is_finite() {
            return Err(TrustError::invalid_argument(format!(
                "edge weight must be finite, got {}",
                weight
            )));
        }
        if input.kind.is_empty() {
            return Err(TrustError::invalid_argument("edge kind must not be empty"));
        }

        self.ensure_node(&input.src, UNKNOWN_NODE_TYPE).await?;
        self.ensure_node(&input.dst, UNKNOWN_NODE_TYPE).await?;

        let edge = ReputationEdge {
            src: input.src,
            dst: input.dst,
            kind: input.kind,
            weight,
            signature: input.signature,
            created_at: now_utc(),
        };
        self.store.upsert_edge(&edge).await?;

        debug!(
            "Added edge {} -[{}]-> {} (weight {})",
            edge.src, edge.kind, edge.dst, edge.weight
        );

        publish_quietly(
            self.publisher.as_ref(),
            LedgerEvent::new(
                Topic::Governor,
                "reputation.edge.added",
                json!({
                    "src": edge.src,
                    "dst": edge.dst,
                    "kind": edge.kind,
                    "weight": edge.weight,
                }),
            ),
        )
        .await;

        Ok(edge)
    }

    pub async fn get_score(&self, node_id: &str) -> Result<Option<ReputationScore>> {
        self.store.get_score(node_id).await
    }

    /// Recompute with the configured iteration count and damping.
    pub async fn recompute_default(&self) -> Result<Option<RecomputeSummary>> {
        self.recompute_scores(self.config.iterations, self.config.damping)
            .await
    }

    /// Recompute every score and replace the stored generation.
    ///
    /// Returns `None` when the graph has no nodes.
    pub async fn recompute_scores(
        &self,
        iterations: u32,
        damping: f64,
    ) -> Result<Option<RecomputeSummary>> {
        if !(0.0..=1.0).contains(&damping) {
            return Err(TrustError::invalid_argument(format!(
                "damping must be within [0, 1], got {}",
                damping
            )));
        }

        let nodes = self.store.list_node_ids().await?;
        if nodes.is_empty() {
            debug!("Reputation graph is empty, nothing to recompute");
            return Ok(None);
        }
        let edges = self.store.list_edges().await?;

        let scores = propagate(&nodes, &edges, iterations, damping);

        let computed_at = now_utc();
        let rows: Vec<ReputationScore> = scores
            .into_iter()
            .map(|(node_id, score)| ReputationScore {
                node_id,
                score,
                computed_at,
            })
            .collect();
        self.store.replace_scores(&rows).await?;

        info!(
            "Recomputed reputation for {} nodes over {} edges ({} iterations, damping {})",
            nodes.len(),
            edges.len(),
            iterations,
            damping
        );

        record_quietly(
            self.metrics.as_ref(),
            "reputation.scores",
            json!({
                "nodeCount": nodes.len(),
                "edgeCount": edges.len(),
                "lastComputedAt": computed_at.to_rfc3339(),
            }),
        )
        .await;

        publish_quietly(
            self.publisher.as_ref(),
            LedgerEvent::new(
                Topic::Governor,
                "reputation.scores.updated",
                json!({
                    "nodeCount": nodes.len(),
                    "edgeCount": edges.len(),
                }),
            ),
        )
        .await;

        Ok(Some(RecomputeSummary {
            node_count: nodes.len(),
            edge_count: edges.len(),
            iterations,
            damping,
            computed_at,
        }))
    }

    /// Highest scores first, ties by node id.
    pub async fn leaderboard(&self, limit: Option<u32>) -> Result<Vec<LeaderboardEntry>> {
        let limit = limit.unwrap_or(self.config.leaderboard_limit);
        let top = self.store.top_scores(limit).await?;
        Ok(top
            .into_iter()
            .map(|s| LeaderboardEntry {
                node_id: s.node_id,
                score: s.score,
            })
            .collect())
    }
}
