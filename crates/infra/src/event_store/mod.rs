//! Append-only event store boundary.
//!
//! Tenant-scoped event streams behind a storage-agnostic trait; the in-memory
//! implementation backs both tests and the single-process server.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryEventStore;
pub use r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};
