//! Error types for the CharacterBook core library.

use thiserror::Error;

use crate::core::entity::EntityKind;

/// All errors that can occur within the CharacterBook core library.
#[derive(Debug, Error)]
pub enum CharacterBookError {
    /// The database file could not be opened, created or reopened.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// An entity ID was requested that does not exist in its table.
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    /// An attachment ID was requested that does not exist.
    #[error("Attachment not found: {0}")]
    AttachmentNotFound(String),

    /// A required field was empty when trying to save an entity.
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// An external file could not be classified, or its type cannot be ingested.
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    /// Copying an external file into the import cache failed.
    #[error("Failed to copy {uri}: {source}")]
    CopyFailed {
        uri: String,
        #[source]
        source: std::io::Error,
    },

    /// The user aborted the external pick/share operation.
    #[error("Import cancelled")]
    Cancelled,

    /// A staged file parsed as JSON but is not a valid export document.
    #[error("Invalid import document: {0}")]
    InvalidImport(String),

    /// A SQLite operation failed.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// An I/O operation on the filesystem failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored or imported data could not be (de)serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias that pins the error type to [`CharacterBookError`].
pub type Result<T> = std::result::Result<T, CharacterBookError>;

impl CharacterBookError {
    /// Returns a short, human-readable message suitable for display to the end user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::StorageUnavailable(_) => "Storage is unavailable, please try again later".to_string(),
            Self::NotFound { kind, .. } => format!("{kind} no longer exists"),
            Self::AttachmentNotFound(_) => "Image no longer exists".to_string(),
            Self::ValidationFailed(msg) => msg.clone(),
            Self::UnsupportedFileType(name) => format!("This file type is not supported: {name}"),
            Self::CopyFailed { source, .. } => format!("Could not copy the file: {source}"),
            Self::Cancelled => "Import cancelled".to_string(),
            Self::InvalidImport(msg) => format!("The file could not be read: {msg}"),
            Self::Database(e) => format!("Failed to save: {e}"),
            Self::Io(e) => format!("File error: {e}"),
            Self::Json(e) => format!("Data format error: {e}"),
        }
    }

    /// Returns `true` for the "requested record is absent" variants.
    ///
    /// Callers that expect an optional result can map these to `None`.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::AttachmentNotFound(_))
    }
}
