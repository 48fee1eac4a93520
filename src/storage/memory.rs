//! In-memory storage backend.
//!
//! Thread-safe implementation of [`RecordStore`] behind a single `RwLock`,
//! so every operation (including purge + insert) is applied under one write
//! guard. The persisted snapshot is loaded into and exported from this store.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, RwLock};

use crate::conflict::{Conflict, ConflictId, DocumentPair, Resolution};
use crate::document::{Document, DocumentId};
use crate::history::{HistoryEvent, HistoryEventType};
use crate::ids::IdGenerator;
use crate::storage::traits::{RecordStore, ResolveOutcome, StorageError, StoreExport};
use crate::time::Clock;

fn lock_err(context: &'static str) -> StorageError {
    StorageError::BackendError(format!("poisoned lock: {context}"))
}

#[derive(Debug, Default)]
struct RecordState {
    documents: Vec<Document>,
    doc_index: HashMap<DocumentId, usize>,
    conflicts: Vec<Conflict>,
    history: VecDeque<HistoryEvent>,
    revision: u64,
}

impl RecordState {
    fn bump(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }

    fn validate_conflict(&self, conflict: &Conflict) -> Result<(), StorageError> {
        let [a, b] = &conflict.document_ids;
        if a == b {
            return Err(StorageError::InvalidRecord(format!(
                "conflict {} pairs document {a} with itself",
                conflict.id
            )));
        }
        for id in [a, b] {
            if !self.doc_index.contains_key(id) {
                return Err(StorageError::DocumentNotFound(id.clone()));
            }
        }
        if !conflict.is_consistent() {
            return Err(StorageError::InvalidRecord(format!(
                "conflict {} has status {} with resolution {:?}",
                conflict.id, conflict.status, conflict.resolution
            )));
        }
        Ok(())
    }
}

/// Thread-safe in-memory record store.
pub struct InMemoryRecordStore {
    state: RwLock<RecordState>,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for InMemoryRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryRecordStore")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl InMemoryRecordStore {
    /// Create a new empty store. `ids` and `clock` stamp the history events
    /// the store writes itself.
    #[must_use]
    pub fn new(ids: Arc<dyn IdGenerator>, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: RwLock::new(RecordState::default()),
            ids,
            clock,
        }
    }

    /// Rebuild a store from previously exported parts, checking every
    /// invariant. `history` is expected newest first.
    ///
    /// # Errors
    /// Returns the first violated invariant; no partially built store escapes.
    pub fn from_parts(
        documents: Vec<Document>,
        conflicts: Vec<Conflict>,
        history: Vec<HistoryEvent>,
        ids: Arc<dyn IdGenerator>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, StorageError> {
        let mut state = RecordState::default();

        for doc in documents {
            if state.doc_index.contains_key(&doc.id) {
                return Err(StorageError::DuplicateKey(doc.id.to_string()));
            }
            state.doc_index.insert(doc.id.clone(), state.documents.len());
            state.documents.push(doc);
        }

        let mut seen = HashSet::new();
        for conflict in &conflicts {
            if !seen.insert(conflict.id.clone()) {
                return Err(StorageError::DuplicateKey(conflict.id.to_string()));
            }
            state.validate_conflict(conflict)?;
        }
        state.conflicts = conflicts;

        let mut seen_events = HashSet::new();
        for event in &history {
            if !seen_events.insert(event.id.as_str()) {
                return Err(StorageError::DuplicateKey(event.id.clone()));
            }
        }
        state.history = history.into();

        Ok(Self {
            state: RwLock::new(state),
            ids,
            clock,
        })
    }

    fn event(&self, event_type: HistoryEventType, details: String) -> HistoryEvent {
        HistoryEvent::new(self.ids.new_id(), event_type, details, self.clock.now())
    }
}

impl RecordStore for InMemoryRecordStore {
    fn upsert_documents(&self, documents: Vec<Document>) -> Result<(), StorageError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| lock_err("record.upsert_documents"))?;

        let mut incoming = HashSet::with_capacity(documents.len());
        for doc in &documents {
            if state.doc_index.contains_key(&doc.id) || !incoming.insert(&doc.id) {
                return Err(StorageError::DuplicateKey(doc.id.to_string()));
            }
        }
        drop(incoming);

        let count = documents.len();
        for doc in documents {
            let idx = state.documents.len();
            state.doc_index.insert(doc.id.clone(), idx);
            state.documents.push(doc);
        }
        state.bump();

        tracing::debug!(count, total = state.documents.len(), "documents ingested");
        Ok(())
    }

    fn save_document(&self, id: &DocumentId, content: String) -> Result<Document, StorageError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| lock_err("record.save_document"))?;

        let idx = *state
            .doc_index
            .get(id)
            .ok_or_else(|| StorageError::DocumentNotFound(id.clone()))?;

        let saved = {
            let doc = &mut state.documents[idx];
            doc.content = content;
            doc.clone()
        };

        let event = self.event(
            HistoryEventType::DocumentSaved,
            format!("Saved document \"{}\"", saved.title),
        );
        state.history.push_front(event);
        state.bump();
        Ok(saved)
    }

    fn replace_conflicts_for_pairs(
        &self,
        pairs: &[DocumentPair],
        conflicts: Vec<Conflict>,
    ) -> Result<usize, StorageError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| lock_err("record.replace_conflicts_for_pairs"))?;

        let keys: HashSet<_> = pairs.iter().map(DocumentPair::key).collect();
        let surviving: HashSet<&ConflictId> = state
            .conflicts
            .iter()
            .filter(|c| !keys.contains(&c.pair_key()))
            .map(|c| &c.id)
            .collect();

        // Validate everything before touching the state.
        let mut incoming = HashSet::with_capacity(conflicts.len());
        for conflict in &conflicts {
            state.validate_conflict(conflict)?;
            if surviving.contains(&conflict.id) || !incoming.insert(&conflict.id) {
                return Err(StorageError::DuplicateKey(conflict.id.to_string()));
            }
        }
        drop(incoming);
        drop(surviving);

        let before = state.conflicts.len();
        state.conflicts.retain(|c| !keys.contains(&c.pair_key()));
        let purged = before - state.conflicts.len();

        let inserted = conflicts.len();
        state.conflicts.extend(conflicts);
        state.bump();

        tracing::debug!(pairs = pairs.len(), purged, inserted, "conflicts replaced");
        Ok(purged)
    }

    fn resolve(&self, id: &ConflictId, resolution: Resolution) -> Result<ResolveOutcome, StorageError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| lock_err("record.resolve"))?;

        let conflict = state
            .conflicts
            .iter_mut()
            .find(|c| c.id == *id)
            .ok_or_else(|| StorageError::ConflictNotFound(id.clone()))?;

        let previous = conflict.resolution;
        if !conflict.apply_resolution(resolution) {
            return Ok(ResolveOutcome::Unchanged);
        }

        let details = format!(
            "Conflict between \"{}\" and \"{}\" marked {} ({resolution})",
            conflict.document_titles[0], conflict.document_titles[1], conflict.status
        );
        let event = self.event(HistoryEventType::ConflictResolved, details);
        state.history.push_front(event);
        state.bump();

        Ok(ResolveOutcome::Updated { previous })
    }

    fn append_history(&self, event: HistoryEvent) -> Result<(), StorageError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| lock_err("record.append_history"))?;
        state.history.push_front(event);
        state.bump();
        Ok(())
    }

    fn document(&self, id: &DocumentId) -> Result<Option<Document>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("record.document"))?;
        Ok(state
            .doc_index
            .get(id)
            .and_then(|idx| state.documents.get(*idx))
            .cloned())
    }

    fn documents(&self) -> Result<Vec<Document>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("record.documents"))?;
        Ok(state.documents.clone())
    }

    fn conflict(&self, id: &ConflictId) -> Result<Option<Conflict>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("record.conflict"))?;
        Ok(state.conflicts.iter().find(|c| c.id == *id).cloned())
    }

    fn conflicts(&self) -> Result<Vec<Conflict>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("record.conflicts"))?;
        Ok(state.conflicts.clone())
    }

    fn conflicts_for_pair(&self, pair: &DocumentPair) -> Result<Vec<Conflict>, StorageError> {
        let state = self
            .state
            .read()
            .map_err(|_| lock_err("record.conflicts_for_pair"))?;
        Ok(state
            .conflicts
            .iter()
            .filter(|c| c.belongs_to(pair))
            .cloned()
            .collect())
    }

    fn history(&self) -> Result<Vec<HistoryEvent>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("record.history"))?;
        Ok(state.history.iter().cloned().collect())
    }

    fn export(&self) -> Result<StoreExport, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("record.export"))?;
        Ok(StoreExport {
            documents: state.documents.clone(),
            conflicts: state.conflicts.clone(),
            history: state.history.iter().cloned().collect(),
        })
    }

    fn revision(&self) -> Result<u64, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("record.revision"))?;
        Ok(state.revision)
    }
}
