//! SQLite-based storage implementation.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use serde_json::Value;
use tracing::{debug, info};

use trust_core::{
    from_millis, now_utc, DatabaseConfig, HashAlgorithm, LedgerStore, MerkleRoot, MetricRecord,
    MetricsSink, RepoFingerprint, ReputationEdge, ReputationNode, ReputationScore,
    ReputationStore, Result, TrustError, VectorEvent, WatchdogAlert, WatchdogSnapshot,
    WatchdogStore,
};

use crate::schema::SCHEMA;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// SQLite-based store implementation.
///
/// The connection sits behind a blocking Mutex that is only held inside
/// synchronous closures, never across an `.await`.
pub struct SqliteStore {
    /// Connection wrapped in blocking Mutex.
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open or create a database at the given path with default settings.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let config = DatabaseConfig {
            path: path.as_ref().to_path_buf(),
            ..DatabaseConfig::default()
        };
        Self::open_with_config(&config)
    }

    /// Open or create a database described by `config`.
    pub fn open_with_config(config: &DatabaseConfig) -> Result<Self> {
        let path = config.path.as_path();

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| TrustError::database(format!("Failed to open database: {}", e)))?;

        Self::init(conn, config, path)
    }

    /// Open an in-memory database (for testing).
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| {
            TrustError::database(format!("Failed to open in-memory database: {}", e))
        })?;

        Self::init(conn, &DatabaseConfig::default(), Path::new(":memory:"))
    }

    /// Initialize the store with a connection.
    fn init(conn: Connection, config: &DatabaseConfig, path: &Path) -> Result<Self> {
        Self::configure_connection(&conn, config)?;

        conn.execute_batch(SCHEMA)
            .map_err(|e| TrustError::database(format!("Failed to initialize schema: {}", e)))?;

        info!("Database opened at {:?}", path);

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Configure SQLite connection for optimal performance.
    fn configure_connection(conn: &Connection, config: &DatabaseConfig) -> Result<()> {
        let journal_mode = if config.wal_mode { "WAL" } else { "DELETE" };
        conn.execute_batch(&format!(
            r#"
            PRAGMA journal_mode = {};
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = {};
            PRAGMA temp_store = MEMORY;
            PRAGMA foreign_keys = ON;
            "#,
            journal_mode, config.busy_timeout_ms
        ))
        .map_err(|e| TrustError::database(format!("Failed to configure connection: {}", e)))?;

        Ok(())
    }

    /// Execute a blocking operation on the connection.
    fn with_conn<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Connection) -> Result<R>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| TrustError::database(e.to_string()))?;
        f(&conn)
    }
}

#[async_trait]
impl LedgerStore for SqliteStore {
    // Event operations

    async fn insert_vector_event(&self, event: &VectorEvent) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                r#"
                INSERT INTO vector_events (id, object_type, object_id, model, dim,
                                           hash_algo, vec_hash, payload_hash, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
                params![
                    event.id,
                    event.object_type,
                    event.object_id,
                    event.model,
                    event.dim,
                    event.hash_algo.name(),
                    event.vec_hash,
                    event.payload_hash,
                    event.created_at.timestamp_millis(),
                ],
            )
            .map_err(|e| {
                if e.to_string().contains("UNIQUE constraint") {
                    TrustError::invalid_argument(format!(
                        "vector event already exists: {}",
                        event.id
                    ))
                } else {
                    TrustError::database(format!("Failed to insert vector event: {}", e))
                }
            })?;

            debug!("Inserted vector event: {}", event.id);
            Ok(())
        })
    }

    async fn get_vector_event(&self, id: &str) -> Result<Option<VectorEvent>> {
        self.with_conn(|conn| {
            conn.query_row(
                r#"
                SELECT id, object_type, object_id, model, dim,
                       hash_algo, vec_hash, payload_hash, created_at
                FROM vector_events WHERE id = ?1
                "#,
                params![id],
                Self::row_to_vector_event,
            )
            .optional()
            .map_err(|e| TrustError::database(e.to_string()))
        })
    }

    async fn list_vector_events(
        &self,
        object_type: &str,
        object_id: &str,
        limit: u32,
    ) -> Result<Vec<VectorEvent>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    r#"
                    SELECT id, object_type, object_id, model, dim,
                           hash_algo, vec_hash, payload_hash, created_at
                    FROM vector_events
                    WHERE object_type = ?1 AND object_id = ?2
                    ORDER BY created_at DESC, id DESC
                    LIMIT ?3
                    "#,
                )
                .map_err(|e| TrustError::database(e.to_string()))?;

            let events = stmt
                .query_map(params![object_type, object_id, limit], Self::row_to_vector_event)
                .map_err(|e| TrustError::database(e.to_string()))?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| TrustError::database(e.to_string()))?;

            Ok(events)
        })
    }

    async fn vector_events_between(&self, start_ms: i64, end_ms: i64) -> Result<Vec<VectorEvent>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    r#"
                    SELECT id, object_type, object_id, model, dim,
                           hash_algo, vec_hash, payload_hash, created_at
                    FROM vector_events
                    WHERE created_at >= ?1 AND created_at < ?2
                    ORDER BY created_at ASC, id ASC
                    "#,
                )
                .map_err(|e| TrustError::database(e.to_string()))?;

            let events = stmt
                .query_map(params![start_ms, end_ms], Self::row_to_vector_event)
                .map_err(|e| TrustError::database(e.to_string()))?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| TrustError::database(e.to_string()))?;

            Ok(events)
        })
    }

    // Root operations

    async fn upsert_merkle_root(&self, root: &MerkleRoot) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                r#"
                INSERT INTO vector_roots (batch_date, merkle_root, hash_algo, event_count, computed_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT (batch_date)
                DO UPDATE SET merkle_root = excluded.merkle_root,
                              hash_algo = excluded.hash_algo,
                              event_count = excluded.event_count,
                              computed_at = excluded.computed_at
                "#,
                params![
                    root.batch_date.format(DATE_FORMAT).to_string(),
                    root.merkle_root,
                    root.hash_algo.name(),
                    root.event_count as i64,
                    root.computed_at.timestamp_millis(),
                ],
            )
            .map_err(|e| TrustError::database(format!("Failed to upsert merkle root: {}", e)))?;

            debug!("Upserted merkle root for {}", root.batch_date);
            Ok(())
        })
    }

    async fn get_merkle_root(&self, batch_date: NaiveDate) -> Result<Option<MerkleRoot>> {
        let key = batch_date.format(DATE_FORMAT).to_string();
        self.with_conn(|conn| {
            conn.query_row(
                r#"
                SELECT batch_date, merkle_root, hash_algo, event_count, computed_at
                FROM vector_roots WHERE batch_date = ?1
                "#,
                params![key],
                |row| {
                    let date_str: String = row.get(0)?;
                    let algo: String = row.get(2)?;
                    Ok(MerkleRoot {
                        batch_date: NaiveDate::parse_from_str(&date_str, DATE_FORMAT)
                            .map_err(|e| conversion_error(0, e))?,
                        merkle_root: row.get(1)?,
                        hash_algo: HashAlgorithm::resolve(&algo),
                        event_count: row.get::<_, i64>(3)? as u64,
                        computed_at: from_millis(row.get(4)?),
                    })
                },
            )
            .optional()
            .map_err(|e| TrustError::database(e.to_string()))
        })
    }
}

#[async_trait]
impl ReputationStore for SqliteStore {
    // Node operations

    async fn ensure_node(&self, id: &str, node_type: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                r#"
                INSERT INTO rep_nodes (id, type, created_at) VALUES (?1, ?2, ?3)
                ON CONFLICT (id) DO NOTHING
                "#,
                params![id, node_type, now_utc().timestamp_millis()],
            )
            .map_err(|e| TrustError::database(format!("Failed to ensure node: {}", e)))?;
            Ok(())
        })
    }

    async fn get_node(&self, id: &str) -> Result<Option<ReputationNode>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, type, created_at FROM rep_nodes WHERE id = ?1",
                params![id],
                |row| {
                    Ok(ReputationNode {
                        id: row.get(0)?,
                        node_type: row.get(1)?,
                        created_at: from_millis(row.get(2)?),
                    })
                },
            )
            .optional()
            .map_err(|e| TrustError::database(e.to_string()))
        })
    }

    async fn list_node_ids(&self) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT id FROM rep_nodes ORDER BY id")
                .map_err(|e| TrustError::database(e.to_string()))?;

            let ids = stmt
                .query_map([], |row| row.get(0))
                .map_err(|e| TrustError::database(e.to_string()))?
                .collect::<std::result::Result<Vec<String>, _>>()
                .map_err(|e| TrustError::database(e.to_string()))?;

            Ok(ids)
        })
    }

    // Edge operations

    async fn upsert_edge(&self, edge: &ReputationEdge) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                r#"
                INSERT INTO rep_edges (src, dst, kind, weight, signature, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT (src, dst, kind)
                DO UPDATE SET weight = excluded.weight,
                              signature = excluded.signature,
                              created_at = excluded.created_at
                "#,
                params![
                    edge.src,
                    edge.dst,
                    edge.kind,
                    edge.weight,
                    edge.signature,
                    edge.created_at.timestamp_millis(),
                ],
            )
            .map_err(|e| TrustError::database(format!("Failed to upsert edge: {}", e)))?;

            debug!("Upserted edge {} -[{}]-> {}", edge.src, edge.kind, edge.dst);
            Ok(())
        })
    }

    async fn list_edges(&self) -> Result<Vec<ReputationEdge>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    r#"
                    SELECT src, dst, kind, weight, signature, created_at
                    FROM rep_edges
                    ORDER BY src, dst, kind
                    "#,
                )
                .map_err(|e| TrustError::database(e.to_string()))?;

            let edges = stmt
                .query_map([], |row| {
                    Ok(ReputationEdge {
                        src: row.get(0)?,
                        dst: row.get(1)?,
                        kind: row.get(2)?,
                        weight: row.get(3)?,
                        signature: row.get(4)?,
                        created_at: from_millis(row.get(5)?),
                    })
                })
                .map_err(|e| TrustError::database(e.to_string()))?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| TrustError::database(e.to_string()))?;

            Ok(edges)
        })
    }

    // Score operations

    async fn replace_scores(&self, scores: &[ReputationScore]) -> Result<()> {
        self.with_conn(|conn| {
            let tx = conn
                .unchecked_transaction()
                .map_err(|e| TrustError::database(e.to_string()))?;

            let keep: HashSet<&str> = scores.iter().map(|s| s.node_id.as_str()).collect();

            let existing: Vec<String> = {
                let mut stmt = tx
                    .prepare("SELECT node_id FROM rep_scores")
                    .map_err(|e| TrustError::database(e.to_string()))?;
                let rows = stmt
                    .query_map([], |row| row.get(0))
                    .map_err(|e| TrustError::database(e.to_string()))?
                    .collect::<std::result::Result<Vec<String>, _>>()
                    .map_err(|e| TrustError::database(e.to_string()))?;
                rows
            };

            let stale: Vec<&String> = existing
                .iter()
                .filter(|id| !keep.contains(id.as_str()))
                .collect();

            {
                let mut delete = tx
                    .prepare("DELETE FROM rep_scores WHERE node_id = ?1")
                    .map_err(|e| TrustError::database(e.to_string()))?;
                for node_id in &stale {
                    delete
                        .execute(params![node_id])
                        .map_err(|e| TrustError::database(format!("Failed to delete score: {}", e)))?;
                }

                let mut upsert = tx
                    .prepare(
                        r#"
                        INSERT INTO rep_scores (node_id, score, computed_at)
                        VALUES (?1, ?2, ?3)
                        ON CONFLICT (node_id)
                        DO UPDATE SET score = excluded.score, computed_at = excluded.computed_at
                        "#,
                    )
                    .map_err(|e| TrustError::database(e.to_string()))?;
                for score in scores {
                    upsert
                        .execute(params![
                            score.node_id,
                            score.score,
                            score.computed_at.timestamp_millis()
                        ])
                        .map_err(|e| TrustError::database(format!("Failed to upsert score: {}", e)))?;
                }
            }

            tx.commit().map_err(|e| TrustError::database(e.to_string()))?;

            debug!(
                "Replaced scores: {} upserted, {} removed",
                scores.len(),
                stale.len()
            );
            Ok(())
        })
    }

    async fn get_score(&self, node_id: &str) -> Result<Option<ReputationScore>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT node_id, score, computed_at FROM rep_scores WHERE node_id = ?1",
                params![node_id],
                Self::row_to_score,
            )
            .optional()
            .map_err(|e| TrustError::database(e.to_string()))
        })
    }

    async fn top_scores(&self, limit: u32) -> Result<Vec<ReputationScore>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    r#"
                    SELECT node_id, score, computed_at
                    FROM rep_scores
                    ORDER BY score DESC, node_id ASC
                    LIMIT ?1
                    "#,
                )
                .map_err(|e| TrustError::database(e.to_string()))?;

            let scores = stmt
                .query_map(params![limit], Self::row_to_score)
                .map_err(|e| TrustError::database(e.to_string()))?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| TrustError::database(e.to_string()))?;

            Ok(scores)
        })
    }
}

#[async_trait]
impl WatchdogStore for SqliteStore {
    async fn latest_snapshot_id(&self) -> Result<Option<String>> {
        self.with_conn(|conn| {
            conn.query_row(
                r#"
                SELECT snapshot_id FROM watchdog_snapshots
                ORDER BY recorded_at DESC, snapshot_id DESC
                LIMIT 1
                "#,
                [],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| TrustError::database(e.to_string()))
        })
    }

    async fn get_snapshot(&self, snapshot_id: &str) -> Result<Vec<RepoFingerprint>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    r#"
                    SELECT snapshot_id, path, hash_algo, hash, size_bytes, recorded_at
                    FROM repo_fingerprints
                    WHERE snapshot_id = ?1
                    ORDER BY path
                    "#,
                )
                .map_err(|e| TrustError::database(e.to_string()))?;

            let rows = stmt
                .query_map(params![snapshot_id], |row| {
                    let algo: String = row.get(2)?;
                    Ok(RepoFingerprint {
                        snapshot_id: row.get(0)?,
                        path: row.get(1)?,
                        hash_algo: HashAlgorithm::resolve(&algo),
                        hash: row.get(3)?,
                        size_bytes: row.get::<_, i64>(4)? as u64,
                        recorded_at: from_millis(row.get(5)?),
                    })
                })
                .map_err(|e| TrustError::database(e.to_string()))?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| TrustError::database(e.to_string()))?;

            Ok(rows)
        })
    }

    async fn record_snapshot(
        &self,
        snapshot: &WatchdogSnapshot,
        fingerprints: &[RepoFingerprint],
    ) -> Result<()> {
        self.with_conn(|conn| {
            let tx = conn
                .unchecked_transaction()
                .map_err(|e| TrustError::database(e.to_string()))?;

            tx.execute(
                r#"
                INSERT INTO watchdog_snapshots (snapshot_id, file_count, hash_algo, recorded_at)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT (snapshot_id)
                DO UPDATE SET file_count = excluded.file_count,
                              hash_algo = excluded.hash_algo,
                              recorded_at = excluded.recorded_at
                "#,
                params![
                    snapshot.snapshot_id,
                    snapshot.file_count as i64,
                    snapshot.hash_algo.name(),
                    snapshot.recorded_at.timestamp_millis(),
                ],
            )
            .map_err(|e| TrustError::database(format!("Failed to record snapshot: {}", e)))?;

            {
                let mut stmt = tx
                    .prepare(
                        r#"
                        INSERT INTO repo_fingerprints (snapshot_id, path, hash_algo, hash,
                                                       size_bytes, recorded_at)
                        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                        ON CONFLICT (snapshot_id, path)
                        DO UPDATE SET hash_algo = excluded.hash_algo,
                                      hash = excluded.hash,
                                      size_bytes = excluded.size_bytes,
                                      recorded_at = excluded.recorded_at
                        "#,
                    )
                    .map_err(|e| TrustError::database(e.to_string()))?;

                for fp in fingerprints {
                    stmt.execute(params![
                        fp.snapshot_id,
                        fp.path,
                        fp.hash_algo.name(),
                        fp.hash,
                        fp.size_bytes as i64,
                        fp.recorded_at.timestamp_millis(),
                    ])
                    .map_err(|e| {
                        TrustError::database(format!("Failed to upsert fingerprint: {}", e))
                    })?;
                }
            }

            tx.commit().map_err(|e| TrustError::database(e.to_string()))?;

            debug!(
                "Recorded snapshot {} with {} fingerprints",
                snapshot.snapshot_id,
                fingerprints.len()
            );
            Ok(())
        })
    }

    async fn insert_alert(&self, alert: &WatchdogAlert) -> Result<()> {
        let diff = serde_json::to_string(&alert.diff)?;
        self.with_conn(|conn| {
            conn.execute(
                r#"
                INSERT INTO watchdog_alerts (alert_id, severity, message, diff, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
                params![
                    alert.alert_id,
                    alert.severity.as_str(),
                    alert.message,
                    diff,
                    alert.created_at.timestamp_millis(),
                ],
            )
            .map_err(|e| TrustError::database(format!("Failed to insert alert: {}", e)))?;

            debug!("Inserted watchdog alert: {}", alert.alert_id);
            Ok(())
        })
    }

    async fn list_alerts(&self, limit: u32) -> Result<Vec<WatchdogAlert>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    r#"
                    SELECT alert_id, severity, message, diff, created_at
                    FROM watchdog_alerts
                    ORDER BY created_at DESC, alert_id DESC
                    LIMIT ?1
                    "#,
                )
                .map_err(|e| TrustError::database(e.to_string()))?;

            let alerts = stmt
                .query_map(params![limit], |row| {
                    let severity: String = row.get(1)?;
                    let diff: String = row.get(3)?;
                    Ok(WatchdogAlert {
                        alert_id: row.get(0)?,
                        severity: severity.parse().map_err(|e| conversion_error(1, e))?,
                        message: row.get(2)?,
                        diff: serde_json::from_str(&diff).map_err(|e| conversion_error(3, e))?,
                        created_at: from_millis(row.get(4)?),
                    })
                })
                .map_err(|e| TrustError::database(e.to_string()))?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| TrustError::database(e.to_string()))?;

            Ok(alerts)
        })
    }
}

#[async_trait]
impl MetricsSink for SqliteStore {
    async fn record_metric(&self, metric_id: &str, payload: Value) -> Result<()> {
        let payload = serde_json::to_string(&payload)?;
        self.with_conn(|conn| {
            conn.execute(
                r#"
                INSERT INTO trust_metrics (metric_id, payload, recorded_at)
                VALUES (?1, ?2, ?3)
                ON CONFLICT (metric_id)
                DO UPDATE SET payload = excluded.payload, recorded_at = excluded.recorded_at
                "#,
                params![metric_id, payload, now_utc().timestamp_millis()],
            )
            .map_err(|e| TrustError::database(format!("Failed to record metric: {}", e)))?;
            Ok(())
        })
    }

    async fn get_metric(&self, metric_id: &str) -> Result<Option<MetricRecord>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT metric_id, payload, recorded_at FROM trust_metrics WHERE metric_id = ?1",
                params![metric_id],
                |row| {
                    let payload: String = row.get(1)?;
                    Ok(MetricRecord {
                        metric_id: row.get(0)?,
                        payload: serde_json::from_str(&payload)
                            .map_err(|e| conversion_error(1, e))?,
                        recorded_at: from_millis(row.get(2)?),
                    })
                },
            )
            .optional()
            .map_err(|e| TrustError::database(e.to_string()))
        })
    }
}

// Helper methods
impl SqliteStore {
    /// Convert a row to a VectorEvent.
    fn row_to_vector_event(row: &rusqlite::Row<'_>) -> rusqlite::Result<VectorEvent> {
        let algo: String = row.get(5)?;
        Ok(VectorEvent {
            id: row.get(0)?,
            object_type: row.get(1)?,
            object_id: row.get(2)?,
            model: row.get(3)?,
            dim: row.get(4)?,
            hash_algo: HashAlgorithm::resolve(&algo),
            vec_hash: row.get(6)?,
            payload_hash: row.get(7)?,
            created_at: from_millis(row.get(8)?),
        })
    }

    /// Convert a row to a ReputationScore.
    fn row_to_score(row: &rusqlite::Row<'_>) -> rusqlite::Result<ReputationScore> {
        Ok(ReputationScore {
            node_id: row.get(0)?,
            score: row.get(1)?,
            computed_at: from_millis(row.get(2)?),
        })
    }
}

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conformance;

    #[tokio::test]
    async fn test_open_memory() {
        let store = SqliteStore::open_memory().unwrap();
        assert!(store.list_node_ids().await.unwrap().is_empty());
        assert!(store.latest_snapshot_id().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_open_file_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("ledger.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.ensure_node("alice", "agent").await.unwrap();
        }

        let reopened = SqliteStore::open(&path).unwrap();
        let node = reopened.get_node("alice").await.unwrap().unwrap();
        assert_eq!(node.node_type, "agent");
    }

    #[tokio::test]
    async fn test_edge_requires_nodes() {
        let store = SqliteStore::open_memory().unwrap();
        let edge = ReputationEdge {
            src: "a".to_string(),
            dst: "b".to_string(),
            kind: "vouch".to_string(),
            weight: 1.0,
            signature: None,
            created_at: now_utc(),
        };
        // Foreign keys are enforced.
        assert!(store.upsert_edge(&edge).await.is_err());
    }

    #[tokio::test]
    async fn test_vector_events() {
        conformance::vector_events(&SqliteStore::open_memory().unwrap()).await;
    }

    #[tokio::test]
    async fn test_merkle_roots() {
        conformance::merkle_roots(&SqliteStore::open_memory().unwrap()).await;
    }

    #[tokio::test]
    async fn test_reputation() {
        conformance::reputation(&SqliteStore::open_memory().unwrap()).await;
    }

    #[tokio::test]
    async fn test_fingerprints_and_alerts() {
        conformance::fingerprints_and_alerts(&SqliteStore::open_memory().unwrap()).await;
    }

    #[tokio::test]
    async fn test_metrics() {
        conformance::metrics(&SqliteStore::open_memory().unwrap()).await;
    }
}
