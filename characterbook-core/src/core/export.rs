//! JSON export documents and ingestion of staged import files.
//!
//! A `.character`, `.chax` or `.json` file carries either a full
//! [`ExportDocument`] or a single bare [`ExportedEntity`]. Binary data
//! (images, attachments) is base64-encoded.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::store::{insert_attachment, insert_entity, prepare_for_write};
use crate::{
    CharacterBookError, Entity, EntityKind, EntityRef, EntityStore, FieldValue, FileType, Result,
    StagedImport,
};

/// Crate version written into every export.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Newest export format this build can read.
pub const FORMAT_VERSION: u32 = 1;

/// Top-level JSON structure of an export file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub version: u32,
    pub app_version: String,
    pub entities: Vec<ExportedEntity>,
}

/// One entity inside an [`ExportDocument`]. IDs and timestamps are not
/// exported; importing always creates new records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedEntity {
    pub kind: EntityKind,
    pub title: String,
    #[serde(default)]
    pub fields: BTreeMap<String, FieldValue>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_favorite: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default)]
    pub attachments: Vec<ExportedAttachment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedAttachment {
    pub content_type: String,
    pub data: String,
}

/// Either shape accepted in an import file.
#[derive(Deserialize)]
#[serde(untagged)]
enum ImportPayload {
    Document(ExportDocument),
    Single(ExportedEntity),
}

/// Parses the text of an import file.
///
/// # Errors
///
/// Returns [`CharacterBookError::Json`] if `text` is neither an export
/// document nor a single exported entity, and
/// [`CharacterBookError::InvalidImport`] if the document was written by a
/// newer format version.
pub fn parse_import_document(text: &str) -> Result<ExportDocument> {
    let document = match serde_json::from_str::<ImportPayload>(text)? {
        ImportPayload::Document(doc) => doc,
        ImportPayload::Single(entity) => ExportDocument {
            version: FORMAT_VERSION,
            app_version: APP_VERSION.to_string(),
            entities: vec![entity],
        },
    };
    if document.version > FORMAT_VERSION {
        return Err(CharacterBookError::InvalidImport(format!(
            "format version {} is newer than supported version {FORMAT_VERSION}",
            document.version
        )));
    }
    Ok(document)
}

impl ExportDocument {
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// A decoded entity ready to be inserted.
struct PreparedImport {
    entity: Entity,
    attachments: Vec<(String, Vec<u8>)>,
}

fn decode(data: &str, what: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(data.trim())
        .map_err(|e| CharacterBookError::InvalidImport(format!("{what}: {e}")))
}

fn prepare(exported: ExportedEntity) -> Result<PreparedImport> {
    let mut entity = Entity::new(exported.kind, exported.title);
    entity.fields = exported.fields;
    entity.tags = exported.tags;
    entity.is_favorite = exported.is_favorite;
    prepare_for_write(&mut entity)?;

    let image = exported
        .image
        .as_deref()
        .map(|data| decode(data, "image"))
        .transpose()?;
    let attachments = exported
        .attachments
        .into_iter()
        .map(|a| -> Result<(String, Vec<u8>)> {
            Ok((a.content_type, decode(&a.data, "attachment")?))
        })
        .collect::<Result<Vec<_>>>()?;

    entity.image = image;
    Ok(PreparedImport { entity, attachments })
}

impl EntityStore {
    /// Builds an export document for the referenced entities, in the given order.
    ///
    /// # Errors
    ///
    /// Returns [`CharacterBookError::NotFound`] if any reference is missing.
    pub fn export_entities(&mut self, refs: &[EntityRef]) -> Result<ExportDocument> {
        let mut entities = Vec::with_capacity(refs.len());
        for entity_ref in refs {
            let entity = self.get_by_id(entity_ref.kind, &entity_ref.id)?;
            let attachments = self
                .get_attachments(entity_ref)?
                .into_iter()
                .map(|a| ExportedAttachment {
                    content_type: a.content_type,
                    data: STANDARD.encode(a.data),
                })
                .collect();
            entities.push(ExportedEntity {
                kind: entity.kind,
                title: entity.title,
                fields: entity.fields,
                tags: entity.tags,
                is_favorite: entity.is_favorite,
                image: entity.image.map(|bytes| STANDARD.encode(bytes)),
                attachments,
            });
        }
        Ok(ExportDocument {
            version: FORMAT_VERSION,
            app_version: APP_VERSION.to_string(),
            entities,
        })
    }

    /// Inserts every entity of `document` as a new record, with its attachments.
    ///
    /// All entries are decoded and validated before anything is written, and
    /// the inserts run in a single transaction.
    ///
    /// # Errors
    ///
    /// Returns [`CharacterBookError::ValidationFailed`] if any entry has a
    /// blank name/title, or [`CharacterBookError::InvalidImport`] if binary
    /// data is not valid base64. Nothing is written in either case.
    pub fn import_document(&mut self, document: ExportDocument) -> Result<Vec<Entity>> {
        let prepared = document
            .entities
            .into_iter()
            .map(prepare)
            .collect::<Result<Vec<_>>>()?;

        let imported = self.with_transaction(|tx| {
            let mut saved = Vec::with_capacity(prepared.len());
            for item in &prepared {
                let mut entity = item.entity.clone();
                entity.id = uuid::Uuid::new_v4().to_string();
                let now = chrono::Utc::now().timestamp_millis();
                entity.created_at = now;
                entity.modified_at = now;
                insert_entity(tx, &entity)?;
                for (content_type, data) in &item.attachments {
                    insert_attachment(tx, &entity.entity_ref(), data, content_type)?;
                }
                saved.push(entity);
            }
            Ok(saved)
        })?;

        log::info!("imported {} entities", imported.len());
        Ok(imported)
    }

    /// Ingests a file delivered by the import pipeline.
    ///
    /// Character, chax and json files are parsed as export documents and
    /// imported. On success the staged file is deleted. On failure it is
    /// left in place; the caller still holds `staged` and decides whether
    /// to [`discard`](StagedImport::discard) it.
    ///
    /// # Errors
    ///
    /// Returns [`CharacterBookError::UnsupportedFileType`] for race and
    /// unknown files, plus any error from reading, parsing or
    /// [`import_document`](Self::import_document).
    pub fn ingest(&mut self, staged: &StagedImport) -> Result<Vec<Entity>> {
        match staged.file_type {
            FileType::Character | FileType::Chax | FileType::Json => {}
            FileType::Race | FileType::Unknown => {
                return Err(CharacterBookError::UnsupportedFileType(format!(
                    "{} files cannot be stored as characters or notes",
                    staged.file_type
                )));
            }
        }

        let text = std::fs::read_to_string(&staged.path)?;
        let document = parse_import_document(&text)?;
        let imported = self.import_document(document)?;
        staged.remove_file()?;
        Ok(imported)
    }
}
