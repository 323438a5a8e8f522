//! trust-watchdog - Filesystem integrity snapshots for trust-ledger
//!
//! This crate fingerprints every file under a watch root, diffs the result
//! against the previous snapshot and raises an alert when anything changed.

mod diff;
mod notifier;
mod snapshotter;
mod walker;

pub use diff::diff_snapshots;
pub use notifier::WebhookNotifier;
pub use snapshotter::Snapshotter;
pub use walker::{scan_tree, ScannedFile, WalkOptions, DEFAULT_IGNORED_DIRS};
