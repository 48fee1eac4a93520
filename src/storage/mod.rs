//! Conflict record store.
//!
//! [`RecordStore`] is the contract; [`InMemoryRecordStore`] is the backend
//! the workspace runs on. Durability is handled separately by snapshots.

mod memory;
mod traits;

pub use memory::InMemoryRecordStore;
pub use traits::{RecordStore, ResolveOutcome, StorageError, StoreExport};
