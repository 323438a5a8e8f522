//! trust-store - Storage backends for the trust ledger
//!
//! This crate provides two interchangeable implementations of the
//! `trust-core` store traits: [`SqliteStore`] for durable state and
//! [`MemoryStore`] for tests and ephemeral runs. A process picks one at
//! construction and never branches on the backend afterwards.

mod memory;
mod schema;
mod sqlite;

#[cfg(test)]
mod conformance;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

// Re-export schema for testing/migrations
pub use schema::{SCHEMA, SCHEMA_VERSION};
