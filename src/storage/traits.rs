//! Abstract storage contract for the conflict record store.
//!
//! The store owns documents, conflicts and the history log. Every method is
//! logically atomic: readers never observe a half-applied mutation.

use thiserror::Error;

use crate::conflict::{Conflict, ConflictId, DocumentPair, Resolution};
use crate::document::{Document, DocumentId};
use crate::history::HistoryEvent;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Document not found.
    #[error("Document not found: {0}")]
    DocumentNotFound(DocumentId),

    /// Conflict not found.
    #[error("Conflict not found: {0}")]
    ConflictNotFound(ConflictId),

    /// Key already exists.
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    /// A record violates a store invariant.
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// Backend error.
    #[error("Storage backend error: {0}")]
    BackendError(String),
}

/// Result of a `resolve` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveOutcome {
    /// The conflict changed; a history event was written.
    Updated {
        /// What was in place before.
        previous: Option<Resolution>,
    },
    /// The conflict already carried this resolution. Nothing was written.
    Unchanged,
}

/// Documents, conflicts and history read under one guard.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreExport {
    /// Documents in store order.
    pub documents: Vec<Document>,
    /// Conflicts in insertion order.
    pub conflicts: Vec<Conflict>,
    /// History, newest first.
    pub history: Vec<HistoryEvent>,
}

/// Storage trait for the conflict record store.
///
/// # Ordering
/// - `documents()` returns documents in insertion ("store") order.
/// - `conflicts()` returns conflicts in insertion order.
/// - `history()` returns events newest first.
pub trait RecordStore: Send + Sync {
    /// Append documents. Fails with `DuplicateKey` if any id collides with
    /// a stored document or with another document in the same call; in that
    /// case nothing is inserted.
    fn upsert_documents(&self, documents: Vec<Document>) -> Result<(), StorageError>;

    /// Replace a document's content. Appends a `document_saved` event.
    fn save_document(&self, id: &DocumentId, content: String) -> Result<Document, StorageError>;

    /// Purge every conflict belonging to one of `pairs` (order-insensitive),
    /// then insert `conflicts`. Returns the number of purged conflicts.
    ///
    /// # Errors
    /// - `DocumentNotFound`: a new conflict references an unknown document
    /// - `InvalidRecord`: a new conflict is a self pair or has an inconsistent status
    /// - `DuplicateKey`: a new conflict id is already taken
    ///
    /// On error the store is unchanged.
    fn replace_conflicts_for_pairs(
        &self,
        pairs: &[DocumentPair],
        conflicts: Vec<Conflict>,
    ) -> Result<usize, StorageError>;

    /// Set status/resolution of a conflict. Appends a `conflict_resolved`
    /// event unless the conflict already had this resolution.
    fn resolve(&self, id: &ConflictId, resolution: Resolution) -> Result<ResolveOutcome, StorageError>;

    /// Insert an event at the head of the history log.
    fn append_history(&self, event: HistoryEvent) -> Result<(), StorageError>;

    /// Get a document by ID.
    fn document(&self, id: &DocumentId) -> Result<Option<Document>, StorageError>;

    /// All documents in store order.
    fn documents(&self) -> Result<Vec<Document>, StorageError>;

    /// Get a conflict by ID.
    fn conflict(&self, id: &ConflictId) -> Result<Option<Conflict>, StorageError>;

    /// All conflicts in insertion order.
    fn conflicts(&self) -> Result<Vec<Conflict>, StorageError>;

    /// Conflicts belonging to one unordered pair.
    fn conflicts_for_pair(&self, pair: &DocumentPair) -> Result<Vec<Conflict>, StorageError>;

    /// The history log, newest first.
    fn history(&self) -> Result<Vec<HistoryEvent>, StorageError>;

    /// Everything the store holds, as one consistent view. No write lands
    /// between reading the documents and reading the conflicts.
    fn export(&self) -> Result<StoreExport, StorageError>;

    /// Counter that changes on every successful write.
    fn revision(&self) -> Result<u64, StorageError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Compile-time test: ensure the trait is object-safe
    fn _assert_record_store_object_safe(_: &dyn RecordStore) {}

    #[test]
    fn test_storage_error_display() {
        let err = StorageError::DocumentNotFound(DocumentId::from("d1"));
        assert!(err.to_string().contains("Document not found: d1"));

        let err = StorageError::BackendError("poisoned lock".to_string());
        assert!(err.to_string().contains("poisoned lock"));
    }
}
