//! trust-core - Core types and traits for the trust ledger
//!
//! This crate provides the hashing engine, domain types, capability traits
//! and error handling shared by every trust-ledger component.

pub mod config;
pub mod error;
pub mod events;
pub mod hash;
pub mod traits;
pub mod types;

pub use config::*;
pub use error::{Result, TrustError};
pub use events::{BroadcastPublisher, LedgerEvent, NullPublisher, Topic, TracingPublisher};
pub use hash::{HashAlgorithm, HashEngine};
pub use traits::*;
pub use types::*;
