//! Core library for CharacterBook: local storage for characters and notes.
//!
//! The primary entry point is [`EntityStore`], which owns the SQLite database
//! and exposes CRUD, favourites, search and attachments. Files opened or
//! shared from outside the app go through an [`ImportPipeline`], which
//! classifies and stages them before handing them to an [`ImportSink`];
//! [`EntityStore::ingest`] turns a staged file into stored entities.
//!
//! Types are re-exported from their respective sub-modules for convenience;
//! consumers should import from the crate root rather than the `core` module.

pub mod core;

// Re-export commonly used types.
#[doc(inline)]
pub use crate::core::{
    attachment::Attachment,
    delete::DeleteResult,
    entity::{Entity, EntityKind, EntityRef, FieldValue, CONTENT_FIELD, UNTITLED},
    error::{CharacterBookError, Result},
    export::{
        parse_import_document, ExportDocument, ExportedAttachment, ExportedEntity, APP_VERSION,
        FORMAT_VERSION,
    },
    import::{
        classify, staged_file_name, ContentSource, FileSystemSource, FileType, ImportEvent,
        ImportPipeline, ImportRequest, ImportSink, PendingImports, StagedImport, Stager,
    },
    search::{filter_entities, sort_entities, SearchSettings, SortKey},
    settings::{
        load_settings, load_settings_from, save_settings, save_settings_to, settings_file_path,
        StoreSettings, DEFAULT_DATABASE_FILENAME,
    },
    storage::{Storage, StorageLocation},
    store::EntityStore,
};
