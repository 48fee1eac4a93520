//! Error types for dissonance.
//!
//! All errors are strongly typed using thiserror. Each layer owns its own
//! enum (validation, analyzer, persistence, storage) and everything funnels
//! into [`DissonanceError`] at the public API boundary.

use std::path::PathBuf;

use thiserror::Error;

use crate::storage::StorageError;

/// Validation errors. These are always raised before any side effect.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Analysis batch contains no documents")]
    EmptyBatch,

    #[error("At least two documents are required for analysis, found {count}")]
    NotEnoughDocuments {
        count: usize,
    },

    #[error("A document cannot be compared with itself: {id}")]
    SelfPair {
        id: String,
    },

    #[error("File '{name}' is not a plain-text file: {reason}")]
    NonTextFile {
        name: String,
        reason: String,
    },

    #[error("Field '{field}' cannot be empty")]
    EmptyField {
        field: String,
    },

    #[error("Invalid resolution '{value}' (expected accept_first, accept_second or ignore)")]
    InvalidResolution {
        value: String,
    },

    #[error("Unknown {field} '{value}'")]
    UnknownValue {
        field: &'static str,
        value: String,
    },

    #[error("An analysis run is already in progress")]
    AnalysisInProgress,

    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        reason: String,
    },
}

/// Errors raised by (or about) the external analyzer.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("Analyzer call failed for pair {pair}: {message}")]
    CallFailed {
        pair: String,
        message: String,
    },

    #[error("Analyzer returned malformed data for pair {pair}: {reason}")]
    Malformed {
        pair: String,
        reason: String,
    },

    #[error("Analyzer unavailable: {message}")]
    Unavailable {
        message: String,
    },
}

/// Snapshot read/write failures.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Snapshot I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Snapshot is corrupt: {reason}")]
    Corrupt {
        reason: String,
    },

    #[error("Snapshot serialization failed: {message}")]
    Serialization {
        message: String,
    },
}

/// Top-level error type for dissonance.
#[derive(Debug, Error)]
pub enum DissonanceError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("{kind} not found: {id}")]
    NotFound {
        kind: &'static str,
        id: String,
    },

    #[error("Duplicate id: {id}")]
    DuplicateId {
        id: String,
    },

    #[error("Analyzer error: {0}")]
    Analyzer(#[from] AnalyzerError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Storage error: {message}")]
    Storage {
        message: String,
    },

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl DissonanceError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if an id lookup failed.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns true if an insert collided with an existing id.
    #[must_use]
    pub const fn is_duplicate_id(&self) -> bool {
        matches!(self, Self::DuplicateId { .. })
    }

    /// Returns true if the analyzer failed.
    #[must_use]
    pub const fn is_analyzer(&self) -> bool {
        matches!(self, Self::Analyzer(_))
    }

    /// Returns true if this is a persistence error.
    #[must_use]
    pub const fn is_persistence(&self) -> bool {
        matches!(self, Self::Persistence(_))
    }

    /// Returns true if the same request may succeed when issued again.
    ///
    /// Nothing is retried automatically; this only informs the caller.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Validation(e) => matches!(e, ValidationError::AnalysisInProgress),
            Self::Analyzer(e) => !matches!(e, AnalyzerError::Malformed { .. }),
            Self::Persistence(e) => matches!(e, PersistenceError::Io { .. }),
            Self::NotFound { .. }
            | Self::DuplicateId { .. }
            | Self::Storage { .. }
            | Self::Internal { .. } => false,
        }
    }
}

impl From<StorageError> for DissonanceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::DocumentNotFound(id) => Self::NotFound {
                kind: "Document",
                id: id.to_string(),
            },
            StorageError::ConflictNotFound(id) => Self::NotFound {
                kind: "Conflict",
                id: id.to_string(),
            },
            StorageError::DuplicateKey(id) => Self::DuplicateId { id },
            other @ (StorageError::InvalidRecord(_) | StorageError::BackendError(_)) => {
                Self::Storage {
                    message: other.to_string(),
                }
            }
        }
    }
}

/// Result type alias for dissonance operations.
pub type DissonanceResult<T> = Result<T, DissonanceError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conflict::ConflictId;
    use crate::document::DocumentId;

    #[test]
    fn test_validation_error_not_enough_documents() {
        let err = ValidationError::NotEnoughDocuments { count: 1 };
        let msg = format!("{err}");
        assert!(msg.contains("two documents"));
        assert!(msg.contains('1'));
    }

    #[test]
    fn test_validation_error_invalid_resolution() {
        let err = ValidationError::InvalidResolution {
            value: "merge".to_string(),
        };
        assert!(err.to_string().contains("merge"));
    }

    #[test]
    fn test_storage_not_found_maps_to_not_found() {
        let err: DissonanceError = StorageError::ConflictNotFound(ConflictId::from("c9")).into();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("Conflict not found: c9"));

        let err: DissonanceError = StorageError::DocumentNotFound(DocumentId::from("d9")).into();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("Document"));
    }

    #[test]
    fn test_storage_duplicate_maps_to_duplicate_id() {
        let err: DissonanceError = StorageError::DuplicateKey("d1".to_string()).into();
        assert!(err.is_duplicate_id());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_storage_backend_maps_to_storage() {
        let err: DissonanceError = StorageError::BackendError("poisoned".to_string()).into();
        assert!(matches!(err, DissonanceError::Storage { .. }));
    }

    #[test]
    fn test_retryable() {
        let busy: DissonanceError = ValidationError::AnalysisInProgress.into();
        assert!(busy.is_retryable());

        let empty: DissonanceError = ValidationError::EmptyBatch.into();
        assert!(!empty.is_retryable());

        let failed: DissonanceError = AnalyzerError::CallFailed {
            pair: "a<->b".to_string(),
            message: "timeout".to_string(),
        }
        .into();
        assert!(failed.is_analyzer());
        assert!(failed.is_retryable());

        let malformed: DissonanceError = AnalyzerError::Malformed {
            pair: "a<->b".to_string(),
            reason: "bad ids".to_string(),
        }
        .into();
        assert!(!malformed.is_retryable());
    }

    #[test]
    fn test_internal() {
        let err = DissonanceError::internal("unexpected state");
        assert!(err.to_string().contains("unexpected state"));
        assert!(!err.is_retryable());
    }
}
