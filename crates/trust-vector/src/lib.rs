//! trust-vector - Vector event ledger for trust-ledger
//!
//! This crate records hash commitments of embedding vectors and their
//! payloads, verifies content against them, and seals each UTC day's
//! events under a Merkle root.

mod ledger;
pub mod merkle;
mod rollup;

pub use ledger::VectorLedger;
pub use merkle::{leaf_hash, merkle_root, merkle_root_hex};
pub use rollup::RollupBatcher;
