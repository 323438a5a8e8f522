//! Append-only ledger of vector hash commitments.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use serde_json::json;
use tracing::{debug, info};
use ulid::Generator;

use trust_core::{
    now_utc, publish_quietly, record_quietly, EventPublisher, HashEngine, LedgerEvent,
    LedgerStore, MetricsSink, NewVectorEvent, NullMetrics, NullPublisher, Result, Topic,
    TrustError, Verification, VerificationReport, VerifyRequest, VectorEvent,
};

const DEFAULT_HISTORY_LIMIT: u32 = 100;

/// Records and verifies hash commitments of vectors and payloads.
///
/// Raw vectors and payloads are never stored; only their digests are.
pub struct VectorLedger {
    /// Event storage.
    store: Arc<dyn LedgerStore>,

    /// Latest-value metrics.
    metrics: Arc<dyn MetricsSink>,

    /// Outbound notifications.
    publisher: Arc<dyn EventPublisher>,

    /// Hashing front-end with the configured default algorithm.
    engine: HashEngine,

    /// Monotonic id source, so ids minted in the same millisecond still sort.
    ids: Mutex<Generator>,

    /// Limit applied when `history` is called without one.
    history_limit: u32,
}

impl VectorLedger {
    /// Create a ledger with no metrics and no publisher.
    pub fn new(store: Arc<dyn LedgerStore>, engine: HashEngine) -> Self {
        Self {
            store,
            metrics: Arc::new(NullMetrics),
            publisher: Arc::new(NullPublisher),
            engine,
            ids: Mutex::new(Generator::new()),
            history_limit: DEFAULT_HISTORY_LIMIT,
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

    pub fn with_history_limit(mut self, limit: u32) -> Self {
        self.history_limit = limit;
        self
    }

    /// Hash and persist a new event.
    pub async fn log_event(&self, input: NewVectorEvent) -> Result<VectorEvent> {
        let algo = input
            .hash_algo
            .unwrap_or_else(|| self.engine.default_algorithm());
        let vector = input.vector.unwrap_or_default();
        let dim = u32::try_from(vector.len()).map_err(|_| {
            TrustError::invalid_argument(format!("vector too long: {} elements", vector.len()))
        })?;

        let event = VectorEvent {
            id: self.next_id()?,
            object_type: input.object_type,
            object_id: input.object_id,
            model: input.model,
            dim,
            hash_algo: algo,
            vec_hash: self.engine.hash_vector_with(&vector, algo),
            payload_hash: self.engine.hash_json_with(input.payload.as_ref(), algo),
            created_at: now_utc(),
        };

        self.store.insert_vector_event(&event).await?;

        info!(
            "Logged vector event {} for {}/{} ({}, dim {})",
            event.id, event.object_type, event.object_id, algo, dim
        );

        publish_quietly(
            self.publisher.as_ref(),
            LedgerEvent::new(
                Topic::System,
                "vector.event.logged",
                json!({
                    "id": event.id,
                    "objectType": event.object_type,
                    "objectId": event.object_id,
                    "model": event.model,
                    "hashAlgo": algo.name(),
                }),
            ),
        )
        .await;

        record_quietly(
            self.metrics.as_ref(),
            "vector.events",
            json!({
                "lastEventId": event.id,
                "lastObjectType": event.object_type,
                "lastObjectId": event.object_id,
                "lastModel": event.model,
                "lastHashAlgo": algo.name(),
                "lastCreatedAt": event.created_at.to_rfc3339(),
            }),
        )
        .await;

        Ok(event)
    }

    /// Events for one object, newest first.
    pub async fn history(
        &self,
        object_type: &str,
        object_id: &str,
        limit: Option<u32>,
    ) -> Result<Vec<VectorEvent>> {
        let limit = limit.unwrap_or(self.history_limit);
        self.store
            .list_vector_events(object_type, object_id, limit)
            .await
    }

    pub async fn get_event(&self, id: &str) -> Result<Option<VectorEvent>> {
        self.store.get_vector_event(id).await
    }

    /// Re-hash supplied content with the event's stored algorithm and compare.
    ///
    /// A dimension that is not supplied is not checked and counts as a match.
    pub async fn verify(&self, request: VerifyRequest) -> Result<Verification> {
        let start = Instant::now();

        let Some(event) = self.store.get_vector_event(&request.id).await? else {
            debug!("Verification requested for unknown event {}", request.id);
            record_quietly(
                self.metrics.as_ref(),
                "vector.verify",
                json!({
                    "lastId": request.id,
                    "ok": false,
                    "reason": "not_found",
                    "latencyMs": start.elapsed().as_millis() as u64,
                    "timestamp": now_utc().to_rfc3339(),
                }),
            )
            .await;
            return Ok(Verification::NotFound { id: request.id });
        };

        let algo = event.hash_algo;
        let computed_vec_hash = request
            .vector
            .as_deref()
            .map(|v| self.engine.hash_vector_with(v, algo));
        let computed_payload_hash = request
            .payload
            .as_ref()
            .map(|p| self.engine.hash_json_with(Some(p), algo));

        let vec_matches = computed_vec_hash
            .as_ref()
            .map_or(true, |h| *h == event.vec_hash);
        let payload_matches = computed_payload_hash
            .as_ref()
            .map_or(true, |h| *h == event.payload_hash);
        let ok = vec_matches && payload_matches;

        debug!(
            "Verified event {}: vector={} payload={}",
            event.id, vec_matches, payload_matches
        );

        record_quietly(
            self.metrics.as_ref(),
            "vector.verify",
            json!({
                "lastId": event.id,
                "ok": ok,
                "vecMatches": vec_matches,
                "payloadMatches": payload_matches,
                "latencyMs": start.elapsed().as_millis() as u64,
                "timestamp": now_utc().to_rfc3339(),
            }),
        )
        .await;

        Ok(Verification::Checked(VerificationReport {
            ok,
            vec_matches,
            payload_matches,
            expected_vec_hash: event.vec_hash,
            computed_vec_hash,
            expected_payload_hash: event.payload_hash,
            computed_payload_hash,
        }))
    }

    fn next_id(&self) -> Result<String> {
        let mut ids = self
            .ids
            .lock()
            .map_err(|e| TrustError::internal(e.to_string()))?;
        let id = ids
            .generate()
            .map_err(|e| TrustError::internal(format!("Failed to generate event id: {}", e)))?;
        Ok(id.to_string())
    }
}
