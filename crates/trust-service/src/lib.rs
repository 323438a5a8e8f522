//! trust-service - Composition root for trust-ledger
//!
//! This crate builds every component once over a shared store and hands
//! out the handles.
//!
//! # Components
//!
//! - `VectorLedger` - log and verify vector hash commitments
//! - `RollupBatcher` - seal each UTC day under a Merkle root
//! - `ReputationScorer` - trust graph and score propagation
//! - `Snapshotter` - filesystem fingerprints and change alerts

mod service;

pub use service::{ServiceInfo, TrustService};
