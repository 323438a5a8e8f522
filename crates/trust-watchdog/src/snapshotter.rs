//! Watchdog snapshot runs.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use serde_json::json;
use tracing::{debug, info, warn};
use ulid::Generator;

use trust_core::{
    now_utc, publish_quietly, record_quietly, EventPublisher, HashEngine, LedgerEvent,
    MetricsSink, NullMetrics, NullPublisher, RepoFingerprint, Result, Severity, SnapshotDiff,
    SnapshotReport, Topic, TrustError, WatchdogAlert, WatchdogConfig, WatchdogSnapshot,
    WatchdogStore,
};

use crate::diff::diff_snapshots;
use crate::notifier::WebhookNotifier;
use crate::walker::{scan_tree, ScannedFile, WalkOptions};

/// Fingerprints a directory tree and alerts on changes between runs.
pub struct Snapshotter {
    store: Arc<dyn WatchdogStore>,
    metrics: Arc<dyn MetricsSink>,
    publisher: Arc<dyn EventPublisher>,
    notifier: WebhookNotifier,

    /// Files are hashed with the engine's default algorithm.
    engine: HashEngine,
    options: WalkOptions,
    severity: Severity,

    /// Snapshot and alert ids.
    ids: Mutex<Generator>,
}

impl Snapshotter {
    /// Create a snapshotter for the configured root and webhook.
    pub fn new(
        store: Arc<dyn WatchdogStore>,
        engine: HashEngine,
        config: &WatchdogConfig,
    ) -> Result<Self> {
        Ok(Self {
            store,
            metrics: Arc::new(NullMetrics),
            publisher: Arc::new(NullPublisher),
            notifier: WebhookNotifier::from_config(config)?,
            engine,
            options: WalkOptions::from_config(config),
            severity: config.alert_severity,
            ids: Mutex::new(Generator::new()),
        })
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.publisher = publisher;
        self
    }

    pub fn with_notifier(mut self, notifier: WebhookNotifier) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn options(&self) -> &WalkOptions {
        &self.options
    }

    /// Take a snapshot, diff it against the previous one and alert on changes.
    ///
    /// A failed walk aborts the run before anything is written.
    pub async fn run_snapshot(&self) -> Result<SnapshotReport> {
        let previous_snapshot_id = self.store.latest_snapshot_id().await?;

        let algo = self.engine.default_algorithm();
        let options = self.options.clone();
        let files = tokio::task::spawn_blocking(move || scan_tree(&options, algo))
            .await
            .map_err(|e| TrustError::internal(format!("walk task failed: {}", e)))??;

        let snapshot_id = self.next_id()?;

        let diff = match previous_snapshot_id.as_deref() {
            Some(prev) if prev != snapshot_id => {
                let previous: BTreeMap<String, String> = self
                    .store
                    .get_snapshot(prev)
                    .await?
                    .into_iter()
                    .map(|fp| (fp.path, fp.hash))
                    .collect();
                diff_snapshots(&previous, &path_hashes(&files))
            }
            _ => SnapshotDiff::default(),
        };

        let alert = if diff.is_empty() {
            None
        } else {
            Some(self.raise_alert(&diff).await?)
        };

        let recorded_at = now_utc();
        let fingerprints: Vec<RepoFingerprint> = files
            .iter()
            .map(|f| RepoFingerprint {
                snapshot_id: snapshot_id.clone(),
                path: f.path.clone(),
                hash_algo: algo,
                hash: f.hash.clone(),
                size_bytes: f.size_bytes,
                recorded_at,
            })
            .collect();
        let snapshot = WatchdogSnapshot {
            snapshot_id: snapshot_id.clone(),
            file_count: files.len() as u64,
            hash_algo: algo,
            recorded_at,
        };
        self.store.record_snapshot(&snapshot, &fingerprints).await?;

        info!(
            "Watchdog snapshot {} recorded {} files ({})",
            snapshot_id,
            files.len(),
            if diff.is_empty() { "no changes".to_string() } else { diff.summary() }
        );

        record_quietly(
            self.metrics.as_ref(),
            "watchdog.snapshot",
            json!({
                "snapshotId": snapshot_id,
                "files": files.len(),
                "diff": diff,
                "timestamp": recorded_at.to_rfc3339(),
            }),
        )
        .await;

        Ok(SnapshotReport {
            snapshot_id,
            previous_snapshot_id,
            file_count: files.len(),
            diff,
            alert,
        })
    }

    /// Most recent alerts first.
    pub async fn list_alerts(&self, limit: u32) -> Result<Vec<WatchdogAlert>> {
        self.store.list_alerts(limit).await
    }

    async fn raise_alert(&self, diff: &SnapshotDiff) -> Result<WatchdogAlert> {
        let alert = WatchdogAlert {
            alert_id: self.next_id()?,
            severity: self.severity,
            message: diff.summary(),
            diff: diff.clone(),
            created_at: now_utc(),
        };
        self.store.insert_alert(&alert).await?;
        warn!("{} [{}]", alert.message, alert.alert_id);

        if let Err(e) = self.notifier.notify(&alert).await {
            warn!("Failed to deliver alert {}: {}", alert.alert_id, e);
        }

        publish_quietly(
            self.publisher.as_ref(),
            LedgerEvent::new(
                Topic::System,
                "watchdog.alert",
                json!({
                    "alertId": alert.alert_id,
                    "severity": alert.severity,
                    "message": alert.message,
                }),
            ),
        )
        .await;

        debug!("Raised watchdog alert {}", alert.alert_id);
        Ok(alert)
    }

    fn next_id(&self) -> Result<String> {
        let mut ids = self
            .ids
            .lock()
            .map_err(|e| TrustError::internal(e.to_string()))?;
        let id = ids
            .generate()
            .map_err(|e| TrustError::internal(format!("Failed to generate id: {}", e)))?;
        Ok(id.to_string())
    }
}

fn path_hashes(files: &[ScannedFile]) -> BTreeMap<String, String> {
    files
        .iter()
        .map(|f| (f.path.clone(), f.hash.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use std::time::Duration;

    use trust_core::BroadcastPublisher;
    use trust_store::{MemoryStore, SqliteStore};

    use crate::notifier::tests::{alerts_url, posted_bodies, webhook_server};

    fn config(root: &Path) -> WatchdogConfig {
        WatchdogConfig {
            root: root.to_path_buf(),
            ..WatchdogConfig::default()
        }
    }

    fn snapshotter(store: Arc<MemoryStore>, root: &Path) -> Snapshotter {
        Snapshotter::new(store.clone(), HashEngine::default(), &config(root))
            .unwrap()
            .with_metrics(store)
    }

    #[tokio::test]
    async fn test_first_snapshot_has_no_alert() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a"), b"1").unwrap();
        fs::write(dir.path().join("b"), b"2").unwrap();

        let store = Arc::new(MemoryStore::new());
        let report = snapshotter(store.clone(), dir.path())
            .run_snapshot()
            .await
            .unwrap();

        assert!(report.previous_snapshot_id.is_none());
        assert_eq!(report.file_count, 2);
        assert!(report.diff.is_empty());
        assert!(report.alert.is_none());
        assert_eq!(store.get_snapshot(&report.snapshot_id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_diff_and_single_alert() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a"), b"1").unwrap();
        fs::write(dir.path().join("b"), b"2").unwrap();

        let store = Arc::new(MemoryStore::new());
        let watchdog = snapshotter(store.clone(), dir.path());
        let first = watchdog.run_snapshot().await.unwrap();

        fs::remove_file(dir.path().join("b")).unwrap();
        fs::write(dir.path().join("c"), b"3").unwrap();

        let second = watchdog.run_snapshot().await.unwrap();
        assert_eq!(second.previous_snapshot_id.as_deref(), Some(first.snapshot_id.as_str()));
        assert_eq!(second.diff.added, vec!["c"]);
        assert_eq!(second.diff.removed, vec!["b"]);
        assert!(second.diff.changed.is_empty());

        let alert = second.alert.unwrap();
        assert_eq!(alert.severity, Severity::Medium);
        assert_eq!(alert.message, "Watchdog detected changes: +1 ~0 -1");

        let alerts = watchdog.list_alerts(10).await.unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_id, alert.alert_id);
    }

    #[tokio::test]
    async fn test_changed_file_and_quiet_rerun() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a"), b"1").unwrap();

        let store = Arc::new(SqliteStore::open_memory().unwrap());
        let watchdog = Snapshotter::new(store.clone(), HashEngine::default(), &config(dir.path()))
            .unwrap()
            .with_metrics(store.clone());

        watchdog.run_snapshot().await.unwrap();
        fs::write(dir.path().join("a"), b"changed").unwrap();

        let changed = watchdog.run_snapshot().await.unwrap();
        assert_eq!(changed.diff.changed, vec!["a"]);
        assert!(changed.alert.is_some());

        let quiet = watchdog.run_snapshot().await.unwrap();
        assert!(quiet.diff.is_empty());
        assert!(quiet.alert.is_none());
        assert_eq!(watchdog.list_alerts(10).await.unwrap().len(), 1);

        let metric = store.get_metric("watchdog.snapshot").await.unwrap().unwrap();
        assert_eq!(metric.payload["snapshotId"], quiet.snapshot_id.as_str());
        assert_eq!(metric.payload["files"], 1);
    }

    #[tokio::test]
    async fn test_emptied_tree_alerts_once() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a"), b"1").unwrap();

        let store = Arc::new(SqliteStore::open_memory().unwrap());
        let watchdog = Snapshotter::new(store.clone(), HashEngine::default(), &config(dir.path()))
            .unwrap();
        watchdog.run_snapshot().await.unwrap();

        fs::remove_file(dir.path().join("a")).unwrap();
        let emptied = watchdog.run_snapshot().await.unwrap();
        assert_eq!(emptied.file_count, 0);
        assert_eq!(emptied.diff.removed, vec!["a"]);
        assert!(emptied.alert.is_some());
        assert_eq!(
            store.latest_snapshot_id().await.unwrap().as_deref(),
            Some(emptied.snapshot_id.as_str())
        );

        let quiet = watchdog.run_snapshot().await.unwrap();
        assert_eq!(quiet.previous_snapshot_id.as_deref(), Some(emptied.snapshot_id.as_str()));
        assert!(quiet.diff.is_empty());
        assert!(quiet.alert.is_none());
        assert_eq!(watchdog.list_alerts(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_walk_failure_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        let watchdog = snapshotter(store.clone(), &dir.path().join("missing"));

        assert!(watchdog.run_snapshot().await.is_err());
        assert!(store.latest_snapshot_id().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_alert_is_published_and_posted() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a"), b"1").unwrap();

        let server = webhook_server(200).await;
        let bus = Arc::new(BroadcastPublisher::default());
        let mut rx = bus.subscribe();

        let store = Arc::new(MemoryStore::new());
        let watchdog = snapshotter(store, dir.path())
            .with_publisher(bus)
            .with_notifier(
                WebhookNotifier::http(alerts_url(&server), Duration::from_secs(5)).unwrap(),
            );

        watchdog.run_snapshot().await.unwrap();
        fs::write(dir.path().join("b"), b"2").unwrap();
        let report = watchdog.run_snapshot().await.unwrap();
        let alert = report.alert.unwrap();

        let published = rx.recv().await.unwrap();
        assert_eq!(published.kind, "watchdog.alert");
        assert_eq!(published.topic, Topic::System);
        assert_eq!(published.payload["alertId"], alert.alert_id.as_str());
        assert_eq!(published.payload["severity"], "medium");

        let bodies = posted_bodies(&server).await;
        assert_eq!(bodies.len(), 1);
        let body = &bodies[0];
        assert_eq!(body["alertId"], alert.alert_id.as_str());
        assert_eq!(body["diff"]["added"][0], "b");
    }

    #[tokio::test]
    async fn test_webhook_failure_is_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a"), b"1").unwrap();

        let server = webhook_server(503).await;
        let store = Arc::new(MemoryStore::new());
        let watchdog = snapshotter(store.clone(), dir.path()).with_notifier(
            WebhookNotifier::http(alerts_url(&server), Duration::from_secs(5)).unwrap(),
        );

        watchdog.run_snapshot().await.unwrap();
        fs::write(dir.path().join("a"), b"2").unwrap();
        let report = watchdog.run_snapshot().await.unwrap();
        assert_eq!(posted_bodies(&server).await.len(), 1);

        assert!(report.alert.is_some());
        assert_eq!(store.list_alerts(10).await.unwrap().len(), 1);
    }
}
