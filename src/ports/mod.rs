//! Ports Layer - Trait definitions for external collaborators
//!
//! Following hexagonal architecture, these traits abstract:
//! - The observation store (latest row lookup, history reads, atomic bulk insert)
//! - The raw row source (scraped weekly valuation tables)
//!
//! `mocks` holds in-memory implementations for tests and dry runs.

pub mod mocks;
pub mod source;
pub mod storage;

pub use mocks::{InMemoryStore, StaticRowSource};
pub use source::{RowSource, SourceError};
pub use storage::{StorageError, StoragePort};
#[cfg(test)]
pub use storage::MockStoragePort;
