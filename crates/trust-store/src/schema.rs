//! Database schema definitions.

/// Main schema SQL for initializing the database.
pub const SCHEMA: &str = r#"
-- Hash-committed vector events (append-only)
CREATE TABLE IF NOT EXISTS vector_events (
    id TEXT PRIMARY KEY,
    object_type TEXT NOT NULL,
    object_id TEXT NOT NULL,
    model TEXT NOT NULL,
    dim INTEGER NOT NULL,
    hash_algo TEXT NOT NULL DEFAULT 'SHA-256',
    vec_hash TEXT NOT NULL,
    payload_hash TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_vector_events_object
    ON vector_events(object_type, object_id, created_at);
CREATE INDEX IF NOT EXISTS idx_vector_events_created ON vector_events(created_at);

-- One Merkle root per UTC day
CREATE TABLE IF NOT EXISTS vector_roots (
    batch_date TEXT PRIMARY KEY,
    merkle_root TEXT NOT NULL,
    hash_algo TEXT NOT NULL,
    event_count INTEGER NOT NULL,
    computed_at INTEGER NOT NULL
);

-- Reputation graph
CREATE TABLE IF NOT EXISTS rep_nodes (
    id TEXT PRIMARY KEY,
    type TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS rep_edges (
    src TEXT NOT NULL REFERENCES rep_nodes(id) ON DELETE CASCADE,
    dst TEXT NOT NULL REFERENCES rep_nodes(id) ON DELETE CASCADE,
    kind TEXT NOT NULL,
    weight REAL NOT NULL DEFAULT 1.0,
    signature TEXT,
    created_at INTEGER NOT NULL,
    PRIMARY KEY (src, dst, kind)
);

CREATE TABLE IF NOT EXISTS rep_scores (
    node_id TEXT PRIMARY KEY REFERENCES rep_nodes(id) ON DELETE CASCADE,
    score REAL NOT NULL,
    computed_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_rep_scores_score ON rep_scores(score DESC);

-- One row per watchdog snapshot run, including runs over an empty tree
CREATE TABLE IF NOT EXISTS watchdog_snapshots (
    snapshot_id TEXT PRIMARY KEY,
    file_count INTEGER NOT NULL,
    hash_algo TEXT NOT NULL,
    recorded_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_watchdog_snapshots_recorded ON watchdog_snapshots(recorded_at);

-- Filesystem fingerprints, one row per file per snapshot
CREATE TABLE IF NOT EXISTS repo_fingerprints (
    snapshot_id TEXT NOT NULL,
    path TEXT NOT NULL,
    hash_algo TEXT NOT NULL,
    hash TEXT NOT NULL,
    size_bytes INTEGER NOT NULL,
    recorded_at INTEGER NOT NULL,
    PRIMARY KEY (snapshot_id, path)
);

CREATE INDEX IF NOT EXISTS idx_repo_fingerprints_recorded ON repo_fingerprints(recorded_at);

-- Watchdog alerts (append-only audit trail)
CREATE TABLE IF NOT EXISTS watchdog_alerts (
    alert_id TEXT PRIMARY KEY,
    severity TEXT NOT NULL,
    message TEXT NOT NULL,
    diff TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

-- Latest observation per metric id
CREATE TABLE IF NOT EXISTS trust_metrics (
    metric_id TEXT PRIMARY KEY,
    payload TEXT NOT NULL,
    recorded_at INTEGER NOT NULL
);
"#;

/// Schema version for migrations.
pub const SCHEMA_VERSION: u32 = 2;
