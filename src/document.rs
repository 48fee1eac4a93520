//! Documents and plain-text file ingestion.
//!
//! Documents are the unit of comparison. They are created on ingestion,
//! replaced wholesale on save, and never deleted.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// File extensions accepted as plain text when no MIME type is supplied.
const TEXT_EXTENSIONS: &[&str] = &["txt", "text", "md", "markdown", "csv", "log"];

/// Opaque unique identifier for a document.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    /// Wraps an externally generated token.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the raw token.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for DocumentId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A document under analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Unique identifier.
    pub id: DocumentId,
    /// Display title.
    pub title: String,
    /// Full text content.
    pub content: String,
}

impl Document {
    /// Creates a document.
    #[must_use]
    pub fn new(id: impl Into<DocumentId>, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            content: content.into(),
        }
    }

    /// Builds a document from an accepted text file. The title is the file
    /// name without its extension.
    #[must_use]
    pub fn from_text_file(id: DocumentId, file: TextFile) -> Self {
        let title = Path::new(&file.name)
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .map_or_else(|| file.name.clone(), str::to_string);

        Self {
            id,
            title,
            content: file.text_content,
        }
    }
}

/// A file handed over by the ingestion layer, not yet checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Original file name.
    pub name: String,
    /// MIME type reported by the uploader, if any.
    pub mime_type: Option<String>,
    /// Raw file bytes.
    pub bytes: Vec<u8>,
}

impl SourceFile {
    /// Creates a source file.
    #[must_use]
    pub fn new(name: impl Into<String>, mime_type: Option<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type,
            bytes,
        }
    }

    /// Convenience constructor for a `text/plain` file.
    #[must_use]
    pub fn plain_text(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(name, Some("text/plain".to_string()), content.into().into_bytes())
    }

    /// Accepts the file if it is plain text.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::NonTextFile` when the MIME type or extension
    /// is not a text type, or when the bytes are not valid UTF-8.
    pub fn into_text(self) -> Result<TextFile, ValidationError> {
        let declared_text = match self.mime_type.as_deref() {
            Some(mime) if !mime.trim().is_empty() => mime.trim().starts_with("text/"),
            _ => has_text_extension(&self.name),
        };

        if !declared_text {
            return Err(ValidationError::NonTextFile {
                reason: format!(
                    "unsupported type {}",
                    self.mime_type.as_deref().unwrap_or("(unknown)")
                ),
                name: self.name,
            });
        }

        match String::from_utf8(self.bytes) {
            Ok(text_content) => Ok(TextFile {
                name: self.name,
                text_content,
            }),
            Err(e) => Err(ValidationError::NonTextFile {
                name: self.name,
                reason: format!("content is not valid UTF-8: {e}"),
            }),
        }
    }
}

fn has_text_extension(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| TEXT_EXTENSIONS.iter().any(|t| t.eq_ignore_ascii_case(ext)))
}

/// A file that passed the plain-text check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextFile {
    /// Original file name.
    pub name: String,
    /// Decoded text.
    pub text_content: String,
}
