//! Core domain types for the trust ledger.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TrustError;
use crate::hash::HashAlgorithm;

/// Node type assigned to nodes created implicitly by edge insertion.
pub const UNKNOWN_NODE_TYPE: &str = "unknown";

/// Current UTC time truncated to millisecond precision.
///
/// Every store keeps timestamps as Unix milliseconds, so values are
/// truncated up front to compare equal after a round-trip.
pub fn now_utc() -> DateTime<Utc> {
    from_millis(Utc::now().timestamp_millis())
}

/// Convert Unix milliseconds to a UTC timestamp (epoch on overflow).
pub fn from_millis(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Half-open `[start, end)` millisecond range covering one UTC day.
pub fn day_bounds_millis(date: NaiveDate) -> (i64, i64) {
    let start = date.and_hms_opt(0, 0, 0).map(|t| t.and_utc().timestamp_millis());
    let start = start.unwrap_or_default();
    (start, start + 86_400_000)
}

// ----------------------------------------------------------------------------
// Vector ledger
// ----------------------------------------------------------------------------

/// A hash-committed vector event. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorEvent {
    /// Unique identifier (ULID).
    pub id: String,

    pub object_type: String,
    pub object_id: String,

    /// Embedding model name.
    pub model: String,

    /// Vector length. Informational only.
    pub dim: u32,

    /// Algorithm the hashes were computed with.
    pub hash_algo: HashAlgorithm,

    /// Hex hash of the vector bytes.
    pub vec_hash: String,

    /// Hex hash of the canonical payload.
    pub payload_hash: String,

    pub created_at: DateTime<Utc>,
}

/// Input to `VectorLedger::log_event`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewVectorEvent {
    pub object_type: String,
    pub object_id: String,
    pub model: String,
    #[serde(default)]
    pub vector: Option<Vec<f32>>,
    #[serde(default)]
    pub payload: Option<Value>,
    /// Overrides the engine default when set.
    #[serde(default)]
    pub hash_algo: Option<HashAlgorithm>,
}

impl NewVectorEvent {
    pub fn new(object_type: &str, object_id: &str, model: &str) -> Self {
        Self {
            object_type: object_type.to_string(),
            object_id: object_id.to_string(),
            model: model.to_string(),
            ..Default::default()
        }
    }

    pub fn with_vector(mut self, vector: Vec<f32>) -> Self {
        self.vector = Some(vector);
        self
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_algorithm(mut self, algo: HashAlgorithm) -> Self {
        self.hash_algo = Some(algo);
        self
    }
}

/// Input to `VectorLedger::verify`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerifyRequest {
    pub id: String,
    #[serde(default)]
    pub vector: Option<Vec<f32>>,
    #[serde(default)]
    pub payload: Option<Value>,
}

impl VerifyRequest {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            ..Default::default()
        }
    }

    pub fn with_vector(mut self, vector: Vec<f32>) -> Self {
        self.vector = Some(vector);
        self
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }
}

/// Outcome of re-checking an event against supplied content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Verification {
    /// No event with that id exists.
    NotFound { id: String },

    /// The event exists and was re-hashed.
    Checked(VerificationReport),
}

impl Verification {
    /// True only if the event exists and every checked dimension matches.
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Checked(report) if report.ok)
    }

    pub fn report(&self) -> Option<&VerificationReport> {
        match self {
            Self::Checked(report) => Some(report),
            Self::NotFound { .. } => None,
        }
    }
}

/// Per-dimension verification result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub ok: bool,
    pub vec_matches: bool,
    pub payload_matches: bool,
    pub expected_vec_hash: String,
    /// `None` when no vector was supplied.
    pub computed_vec_hash: Option<String>,
    pub expected_payload_hash: String,
    /// `None` when no payload was supplied.
    pub computed_payload_hash: Option<String>,
}

// ----------------------------------------------------------------------------
// Merkle rollups
// ----------------------------------------------------------------------------

/// The committed Merkle root for one UTC day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MerkleRoot {
    pub batch_date: NaiveDate,
    pub merkle_root: String,
    pub hash_algo: HashAlgorithm,
    pub event_count: u64,
    pub computed_at: DateTime<Utc>,
}

/// Result of a rollup run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollupResult {
    pub batch_date: NaiveDate,
    pub merkle_root: String,
    pub hash_algo: HashAlgorithm,
    pub event_count: u64,
}

/// Comparison of a stored root against a fresh recomputation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RollupAudit {
    Matches { merkle_root: String, event_count: u64 },
    Mismatch {
        stored: String,
        recomputed: String,
        stored_count: u64,
        recomputed_count: u64,
    },
    /// Events exist but no root was ever committed.
    MissingRoot { recomputed: String, event_count: u64 },
    /// No events on that day.
    NoEvents,
}

// ----------------------------------------------------------------------------
// Reputation graph
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReputationNode {
    pub id: String,
    /// Free-form tag, `"unknown"` for implicitly created nodes.
    pub node_type: String,
    pub created_at: DateTime<Utc>,
}

/// A directed, weighted trust edge. `(src, dst, kind)` is unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReputationEdge {
    pub src: String,
    pub dst: String,
    pub kind: String,
    pub weight: f64,
    pub signature: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Input to `ReputationScorer::add_edge`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewEdge {
    pub src: String,
    pub dst: String,
    pub kind: String,
    /// Defaults to 1.0.
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub signature: Option<String>,
}

impl NewEdge {
    pub fn new(src: &str, dst: &str, kind: &str) -> Self {
        Self {
            src: src.to_string(),
            dst: dst.to_string(),
            kind: kind.to_string(),
            ..Default::default()
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight);
        self
    }

    pub fn with_signature(mut self, signature: &str) -> Self {
        self.signature = Some(signature.to_string());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReputationScore {
    pub node_id: String,
    pub score: f64,
    pub computed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub node_id: String,
    pub score: f64,
}

/// Summary of a completed score recomputation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecomputeSummary {
    pub node_count: usize,
    pub edge_count: usize,
    pub iterations: u32,
    pub damping: f64,
    pub computed_at: DateTime<Utc>,
}

// ----------------------------------------------------------------------------
// Watchdog
// ----------------------------------------------------------------------------

/// One completed snapshot run. Written even when the tree is empty, so an
/// empty tree becomes the baseline for the next diff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchdogSnapshot {
    pub snapshot_id: String,
    pub file_count: u64,
    pub hash_algo: HashAlgorithm,
    pub recorded_at: DateTime<Utc>,
}

/// Content hash of one file within one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepoFingerprint {
    pub snapshot_id: String,
    /// Root-relative path with `/` separators.
    pub path: String,
    pub hash_algo: HashAlgorithm,
    pub hash: String,
    pub size_bytes: u64,
    pub recorded_at: DateTime<Utc>,
}

/// Set difference between two snapshots. Each list is sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub changed: Vec<String>,
}

impl SnapshotDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }

    /// Human-readable summary used as the alert message.
    pub fn summary(&self) -> String {
        format!(
            "Watchdog detected changes: +{} ~{} -{}",
            self.added.len(),
            self.changed.len(),
            self.removed.len()
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = TrustError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            other => Err(TrustError::invalid_argument(format!(
                "unknown severity: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchdogAlert {
    pub alert_id: String,
    pub severity: Severity,
    pub message: String,
    pub diff: SnapshotDiff,
    pub created_at: DateTime<Utc>,
}

/// Result of one watchdog pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotReport {
    pub snapshot_id: String,
    pub previous_snapshot_id: Option<String>,
    pub file_count: usize,
    pub diff: SnapshotDiff,
    pub alert: Option<WatchdogAlert>,
}

// ----------------------------------------------------------------------------
// Metrics
// ----------------------------------------------------------------------------

/// Latest observation recorded under a metric id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub metric_id: String,
    pub payload: Value,
    pub recorded_at: DateTime<Utc>,
}
