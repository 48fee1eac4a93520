//! Snapshot persistence.
//!
//! The whole workspace is saved as one framed record:
//!
//! ```text
//! [magic "DSNC"][version: 1 byte][length: 4 bytes LE][JSON body][crc32: 4 bytes LE]
//! ```
//!
//! Persistence is best effort. A snapshot that fails any check on load is
//! discarded wholesale and the workspace starts from defaults.

mod autosave;
mod codec;
mod file;

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::conflict::Conflict;
use crate::document::Document;
use crate::error::PersistenceError;
use crate::history::HistoryEvent;
use crate::ids::IdGenerator;
use crate::profile::UserProfile;
use crate::storage::{InMemoryRecordStore, RecordStore, StoreExport};
use crate::time::Clock;

pub use autosave::{spawn_autosave, AutosaveHandle, Debouncer};
pub use codec::{decode_snapshot, encode_snapshot, MAGIC};
pub use file::FileSnapshotStore;

/// Current snapshot schema version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Everything that survives a restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Schema version of the body.
    pub version: u32,
    /// Documents in store order.
    pub documents: Vec<Document>,
    /// Conflicts in store order.
    pub conflicts: Vec<Conflict>,
    /// History, newest first.
    pub history: Vec<HistoryEvent>,
    /// The user profile.
    #[serde(default)]
    pub profile: UserProfile,
    /// Number of reports exported so far.
    #[serde(default)]
    pub report_counter: u32,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            documents: Vec::new(),
            conflicts: Vec::new(),
            history: Vec::new(),
            profile: UserProfile::default(),
            report_counter: 0,
        }
    }
}

impl Snapshot {
    /// Captures the contents of a record store from one consistent export.
    ///
    /// # Errors
    /// Returns `PersistenceError::Serialization` if the store cannot be read.
    pub fn capture(
        store: &dyn RecordStore,
        profile: UserProfile,
        report_counter: u32,
    ) -> Result<Self, PersistenceError> {
        let StoreExport {
            documents,
            conflicts,
            history,
        } = store.export().map_err(|e| PersistenceError::Serialization {
            message: format!("could not read store: {e}"),
        })?;
        Ok(Self {
            version: SNAPSHOT_VERSION,
            documents,
            conflicts,
            history,
            profile,
            report_counter,
        })
    }

    /// Rebuilds a record store, checking every record invariant.
    ///
    /// # Errors
    /// Returns `PersistenceError::Corrupt` for an unknown version, an invalid
    /// profile or any record that breaks a store invariant.
    pub fn restore(
        self,
        ids: Arc<dyn IdGenerator>,
        clock: Arc<dyn Clock>,
    ) -> Result<(InMemoryRecordStore, UserProfile, u32), PersistenceError> {
        if self.version != SNAPSHOT_VERSION {
            return Err(PersistenceError::Corrupt {
                reason: format!(
                    "unsupported snapshot version {} (expected {SNAPSHOT_VERSION})",
                    self.version
                ),
            });
        }
        self.profile.validate().map_err(|e| PersistenceError::Corrupt {
            reason: format!("profile: {e}"),
        })?;

        let store = InMemoryRecordStore::from_parts(self.documents, self.conflicts, self.history, ids, clock)
            .map_err(|e| PersistenceError::Corrupt { reason: e.to_string() })?;
        Ok((store, self.profile, self.report_counter))
    }
}

/// Where snapshots live.
///
/// Called at startup (`load`) and on debounced saves only.
pub trait SnapshotPort: Send + Sync {
    /// Returns the stored snapshot, or `None` if nothing was saved yet.
    ///
    /// # Errors
    /// I/O failures and malformed frames.
    fn load(&self) -> Result<Option<Snapshot>, PersistenceError>;

    /// Replaces the stored snapshot.
    ///
    /// # Errors
    /// I/O or serialization failures.
    fn save(&self, snapshot: &Snapshot) -> Result<(), PersistenceError>;

    /// Removes the stored snapshot. Removing nothing is not an error.
    ///
    /// # Errors
    /// I/O failures.
    fn clear(&self) -> Result<(), PersistenceError>;
}

/// Keeps the encoded frame in memory. Used in tests and for throwaway
/// sessions.
#[derive(Debug, Default)]
pub struct InMemorySnapshotStore {
    frame: Mutex<Option<Vec<u8>>>,
}

impl InMemorySnapshotStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding raw bytes, valid or not.
    #[must_use]
    pub fn with_frame(bytes: Vec<u8>) -> Self {
        Self {
            frame: Mutex::new(Some(bytes)),
        }
    }

    /// The raw bytes currently stored.
    #[must_use]
    pub fn frame(&self) -> Option<Vec<u8>> {
        match self.frame.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<Vec<u8>>> {
        match self.frame.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl SnapshotPort for InMemorySnapshotStore {
    fn load(&self) -> Result<Option<Snapshot>, PersistenceError> {
        match self.slot().as_deref() {
            Some(bytes) => decode_snapshot(bytes).map(Some),
            None => Ok(None),
        }
    }

    fn save(&self, snapshot: &Snapshot) -> Result<(), PersistenceError> {
        let bytes = encode_snapshot(snapshot)?;
        *self.slot() = Some(bytes);
        Ok(())
    }

    fn clear(&self) -> Result<(), PersistenceError> {
        *self.slot() = None;
        Ok(())
    }
}
