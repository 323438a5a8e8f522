//! Snapshot comparison.

use std::collections::BTreeMap;

use trust_core::SnapshotDiff;

/// Compare two `path -> hash` maps.
///
/// Paths only in `current` are added, paths only in `previous` are
/// removed, and paths in both with different hashes are changed. Each
/// list comes out sorted because the maps iterate in key order.
pub fn diff_snapshots(
    previous: &BTreeMap<String, String>,
    current: &BTreeMap<String, String>,
) -> SnapshotDiff {
    let mut diff = SnapshotDiff::default();

    for (path, hash) in current {
        match previous.get(path) {
            None => diff.added.push(path.clone()),
            Some(old) if old != hash => diff.changed.push(path.clone()),
            Some(_) => {}
        }
    }

    diff.removed = previous
        .keys()
        .filter(|path| !current.contains_key(*path))
        .cloned()
        .collect();

    diff
}
