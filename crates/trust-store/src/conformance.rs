//! Behaviour shared by every store backend, run against each one.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use serde_json::json;

use trust_core::{
    day_bounds_millis, HashAlgorithm, LedgerStore, MerkleRoot, MetricsSink, RepoFingerprint,
    ReputationEdge, ReputationScore, ReputationStore, Severity, SnapshotDiff, VectorEvent,
    WatchdogAlert, WatchdogSnapshot, WatchdogStore,
};

fn event(id: &str, object_id: &str, millis: i64) -> VectorEvent {
    VectorEvent {
        id: id.to_string(),
        object_type: "doc".to_string(),
        object_id: object_id.to_string(),
        model: "m1".to_string(),
        dim: 3,
        hash_algo: HashAlgorithm::Sha256,
        vec_hash: format!("vec-{}", id),
        payload_hash: format!("payload-{}", id),
        created_at: Utc.timestamp_millis_opt(millis).unwrap(),
    }
}

pub async fn vector_events(store: &impl LedgerStore) {
    let day = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
    let (start, end) = day_bounds_millis(day);

    store.insert_vector_event(&event("01A", "1", start + 10)).await.unwrap();
    store.insert_vector_event(&event("01C", "1", start + 20)).await.unwrap();
    store.insert_vector_event(&event("01B", "1", start + 20)).await.unwrap();
    store.insert_vector_event(&event("01D", "2", end)).await.unwrap();

    // Duplicate ids are rejected.
    assert!(store.insert_vector_event(&event("01A", "1", start)).await.is_err());

    let fetched = store.get_vector_event("01A").await.unwrap().unwrap();
    assert_eq!(fetched, event("01A", "1", start + 10));
    assert!(store.get_vector_event("missing").await.unwrap().is_none());

    let history = store.list_vector_events("doc", "1", 10).await.unwrap();
    let ids: Vec<&str> = history.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["01C", "01B", "01A"]);

    let limited = store.list_vector_events("doc", "1", 1).await.unwrap();
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0].id, "01C");

    assert!(store.list_vector_events("doc", "9", 10).await.unwrap().is_empty());

    // The day range is half-open: the event at `end` belongs to the next day.
    let day_events = store.vector_events_between(start, end).await.unwrap();
    let ids: Vec<&str> = day_events.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["01A", "01B", "01C"]);
}

pub async fn merkle_roots(store: &impl LedgerStore) {
    let day = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
    assert!(store.get_merkle_root(day).await.unwrap().is_none());

    let mut root = MerkleRoot {
        batch_date: day,
        merkle_root: "aa".to_string(),
        hash_algo: HashAlgorithm::Sha256,
        event_count: 2,
        computed_at: Utc.timestamp_millis_opt(1_714_521_600_000).unwrap(),
    };
    store.upsert_merkle_root(&root).await.unwrap();
    assert_eq!(store.get_merkle_root(day).await.unwrap(), Some(root.clone()));

    root.merkle_root = "bb".to_string();
    root.hash_algo = HashAlgorithm::Blake3;
    root.event_count = 3;
    root.computed_at = root.computed_at + Duration::seconds(5);
    store.upsert_merkle_root(&root).await.unwrap();
    assert_eq!(store.get_merkle_root(day).await.unwrap(), Some(root));
}

pub async fn reputation(store: &impl ReputationStore) {
    store.ensure_node("alice", "agent").await.unwrap();
    store.ensure_node("alice", "human").await.unwrap();
    store.ensure_node("bob", "unknown").await.unwrap();
    store.ensure_node("carol", "unknown").await.unwrap();

    // The first type wins.
    let alice = store.get_node("alice").await.unwrap().unwrap();
    assert_eq!(alice.node_type, "agent");
    assert!(store.get_node("dave").await.unwrap().is_none());
    assert_eq!(
        store.list_node_ids().await.unwrap(),
        vec!["alice".to_string(), "bob".to_string(), "carol".to_string()]
    );

    let t0 = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
    let mut edge = ReputationEdge {
        src: "alice".to_string(),
        dst: "bob".to_string(),
        kind: "vouch".to_string(),
        weight: 1.0,
        signature: None,
        created_at: t0,
    };
    store.upsert_edge(&edge).await.unwrap();

    edge.weight = 2.5;
    edge.signature = Some("sig".to_string());
    edge.created_at = t0 + Duration::seconds(1);
    store.upsert_edge(&edge).await.unwrap();

    let mut other = edge.clone();
    other.kind = "review".to_string();
    store.upsert_edge(&other).await.unwrap();

    let edges = store.list_edges().await.unwrap();
    assert_eq!(edges.len(), 2);
    let vouch = edges.iter().find(|e| e.kind == "vouch").unwrap();
    assert_eq!(vouch.weight, 2.5);
    assert_eq!(vouch.signature.as_deref(), Some("sig"));
    assert_eq!(vouch.created_at, t0 + Duration::seconds(1));

    let score = |node: &str, value: f64| ReputationScore {
        node_id: node.to_string(),
        score: value,
        computed_at: t0,
    };

    store
        .replace_scores(&[score("alice", 0.2), score("bob", 0.5), score("carol", 0.3)])
        .await
        .unwrap();
    let top: Vec<String> = store
        .top_scores(2)
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.node_id)
        .collect();
    assert_eq!(top, vec!["bob".to_string(), "carol".to_string()]);

    // Scores for nodes missing from the new set are removed.
    store
        .replace_scores(&[score("alice", 0.6), score("bob", 0.4)])
        .await
        .unwrap();
    assert!(store.get_score("carol").await.unwrap().is_none());
    assert_eq!(store.get_score("alice").await.unwrap().unwrap().score, 0.6);
    assert_eq!(store.top_scores(10).await.unwrap().len(), 2);
}

pub async fn fingerprints_and_alerts(store: &impl WatchdogStore) {
    assert!(store.latest_snapshot_id().await.unwrap().is_none());

    let t0 = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
    let fp = |snapshot: &str, path: &str, hash: &str, at: DateTime<Utc>| RepoFingerprint {
        snapshot_id: snapshot.to_string(),
        path: path.to_string(),
        hash_algo: HashAlgorithm::Sha256,
        hash: hash.to_string(),
        size_bytes: 4,
        recorded_at: at,
    };

    let marker = |snapshot: &str, files: u64, at: DateTime<Utc>| WatchdogSnapshot {
        snapshot_id: snapshot.to_string(),
        file_count: files,
        hash_algo: HashAlgorithm::Sha256,
        recorded_at: at,
    };

    store
        .record_snapshot(
            &marker("S1", 2, t0),
            &[fp("S1", "b.txt", "h2", t0), fp("S1", "a.txt", "h1", t0)],
        )
        .await
        .unwrap();
    assert_eq!(store.latest_snapshot_id().await.unwrap().as_deref(), Some("S1"));

    // Same timestamp: the larger snapshot id is the latest.
    store
        .record_snapshot(&marker("S2", 1, t0), &[fp("S2", "a.txt", "h1", t0)])
        .await
        .unwrap();
    assert_eq!(store.latest_snapshot_id().await.unwrap().as_deref(), Some("S2"));

    // A snapshot of an empty tree still becomes the latest.
    let t1 = t0 + Duration::seconds(1);
    store.record_snapshot(&marker("S3", 0, t1), &[]).await.unwrap();
    assert_eq!(store.latest_snapshot_id().await.unwrap().as_deref(), Some("S3"));
    assert!(store.get_snapshot("S3").await.unwrap().is_empty());

    let snapshot = store.get_snapshot("S1").await.unwrap();
    let paths: Vec<&str> = snapshot.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(paths, vec!["a.txt", "b.txt"]);
    assert!(store.get_snapshot("missing").await.unwrap().is_empty());

    let alert = |id: &str, offset: i64| WatchdogAlert {
        alert_id: id.to_string(),
        severity: Severity::Medium,
        message: "Watchdog detected changes: +1 ~0 -0".to_string(),
        diff: SnapshotDiff {
            added: vec!["c.txt".to_string()],
            removed: vec![],
            changed: vec![],
        },
        created_at: t0 + Duration::seconds(offset),
    };

    store.insert_alert(&alert("A1", 0)).await.unwrap();
    store.insert_alert(&alert("A2", 1)).await.unwrap();

    let alerts = store.list_alerts(10).await.unwrap();
    assert_eq!(alerts.len(), 2);
    assert_eq!(alerts[0], alert("A2", 1));
    assert_eq!(alerts[1].alert_id, "A1");
    assert_eq!(store.list_alerts(1).await.unwrap().len(), 1);
}

pub async fn metrics(store: &impl MetricsSink) {
    assert!(store.get_metric("vector.events").await.unwrap().is_none());

    store
        .record_metric("vector.events", json!({"lastEventId": "01A"}))
        .await
        .unwrap();
    store
        .record_metric("vector.events", json!({"lastEventId": "01B"}))
        .await
        .unwrap();

    let record = store.get_metric("vector.events").await.unwrap().unwrap();
    assert_eq!(record.metric_id, "vector.events");
    assert_eq!(record.payload["lastEventId"], "01B");
}
