//! Internal domain modules for the CharacterBook core library.
//!
//! All public types from these modules are re-exported at the crate root
//! with `#[doc(inline)]`; import from there in preference to this module.

pub mod attachment;
pub mod delete;
pub mod entity;
pub mod error;
pub mod export;
pub mod import;
pub mod search;
pub mod settings;
pub mod storage;
pub mod store;

#[doc(inline)]
pub use attachment::Attachment;
#[doc(inline)]
pub use delete::DeleteResult;
#[doc(inline)]
pub use entity::{Entity, EntityKind, EntityRef, FieldValue};
#[doc(inline)]
pub use error::{CharacterBookError, Result};
#[doc(inline)]
pub use export::{parse_import_document, ExportDocument, ExportedEntity, APP_VERSION};
#[doc(inline)]
pub use import::{classify, FileType, ImportEvent, ImportPipeline, ImportRequest, ImportSink, StagedImport};
#[doc(inline)]
pub use search::{sort_entities, SearchSettings, SortKey};
#[doc(inline)]
pub use settings::StoreSettings;
#[doc(inline)]
pub use storage::Storage;
#[doc(inline)]
pub use store::EntityStore;
