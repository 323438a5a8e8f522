//! trust-reputation - Reputation graph scoring for trust-ledger
//!
//! This crate maintains a weighted directed graph of identities and
//! computes trust scores over it by power iteration.

mod propagate;
mod scorer;

pub use propagate::propagate;
pub use scorer::ReputationScorer;
