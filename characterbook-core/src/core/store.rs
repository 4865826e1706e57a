//! CRUD, favourites, search and attachments over the CharacterBook database.

use crate::core::entity::normalize_tags;
use crate::{
    filter_entities, sort_entities, Attachment, CharacterBookError, DeleteResult, Entity,
    EntityKind, EntityRef, FieldValue, Result, SearchSettings, SortKey, Storage, StoreSettings,
};
use rusqlite::{Connection, OptionalExtension, Transaction};
use std::collections::BTreeMap;
use std::path::Path;
use uuid::Uuid;

const ENTITY_COLUMNS: &str =
    "id, title, fields_json, tags_json, is_favorite, image, created_at, modified_at";

/// Durable storage for characters, notes and their attachments.
///
/// `EntityStore` exclusively owns the one [`Storage`] handle to the database;
/// every method takes `&mut self`, so storage mutations are serialized by
/// construction. Hosts that share a store between callers wrap it in a
/// `Mutex`.
///
/// Partial updates such as [`toggle_favorite`](Self::toggle_favorite) are
/// read-modify-write inside one transaction on this handle. Edits made
/// through a second, independent handle to the same file follow
/// last-writer-wins.
pub struct EntityStore {
    storage: Storage,
    search: SearchSettings,
}

impl EntityStore {
    /// Creates a store for the database file at `path`. Nothing is opened
    /// until the first operation.
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        Self::with_storage(Storage::file(path))
    }

    /// Creates a store backed by a private in-memory database.
    pub fn in_memory() -> Self {
        Self::with_storage(Storage::in_memory())
    }

    pub fn with_storage(storage: Storage) -> Self {
        Self {
            storage,
            search: SearchSettings::default(),
        }
    }

    /// Creates a store for the database path and search scope in `settings`.
    pub fn from_settings(settings: &StoreSettings) -> Self {
        let mut store = Self::open(settings.database_path());
        store.search = settings.search.clone();
        store
    }

    /// Releases the database handle. The next call reopens it.
    pub fn close(&mut self) -> Result<()> {
        self.storage.close()
    }

    pub fn search_settings(&self) -> &SearchSettings {
        &self.search
    }

    /// Replaces the fields [`search`](Self::search) inspects for `kind`.
    pub fn set_search_fields(&mut self, kind: EntityKind, fields: Vec<String>) {
        self.search.set_fields_for(kind, fields);
    }

    /// Returns every entity of `kind`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`CharacterBookError::StorageUnavailable`] if the database
    /// cannot be opened, or [`CharacterBookError::Json`] if a stored row is
    /// corrupt. An empty table yields an empty vec.
    pub fn get_all(&mut self, kind: EntityKind) -> Result<Vec<Entity>> {
        let sql = format!(
            "SELECT {ENTITY_COLUMNS} FROM {} ORDER BY created_at ASC, rowid ASC",
            kind.table()
        );
        self.storage.with_connection(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], map_entity_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows.into_iter()
                .map(|row| entity_from_row_tuple(kind, row))
                .collect()
        })
    }

    /// Fetches a single entity.
    ///
    /// # Errors
    ///
    /// Returns [`CharacterBookError::NotFound`] if no entity of `kind` has `id`.
    pub fn get_by_id(&mut self, kind: EntityKind, id: &str) -> Result<Entity> {
        self.find_by_id(kind, id)?
            .ok_or_else(|| CharacterBookError::NotFound { kind, id: id.to_string() })
    }

    /// Like [`get_by_id`](Self::get_by_id), but absence is `Ok(None)`.
    pub fn find_by_id(&mut self, kind: EntityKind, id: &str) -> Result<Option<Entity>> {
        self.storage
            .with_connection(|conn| fetch_entity(conn, kind, id))
    }

    pub fn count(&mut self, kind: EntityKind) -> Result<usize> {
        let sql = format!("SELECT COUNT(*) FROM {}", kind.table());
        let count: i64 = self
            .storage
            .with_connection(|conn| Ok(conn.query_row(&sql, [], |row| row.get(0))?))?;
        Ok(count as usize)
    }

    /// Inserts or fully replaces `entity` and returns the persisted record.
    ///
    /// An entity with a blank `id` receives a fresh UUID and is inserted.
    /// A non-blank `id` updates the matching row in place, replacing every
    /// field; if no row has that ID it is inserted under the caller's ID.
    /// `created_at` is set only on insert. `modified_at` is set on every
    /// path and always moves forward on update.
    ///
    /// # Errors
    ///
    /// Returns [`CharacterBookError::ValidationFailed`] before any write if
    /// the name/title is blank, or [`CharacterBookError::StorageUnavailable`]
    /// if the database cannot be reached.
    pub fn save(&mut self, entity: Entity) -> Result<Entity> {
        let mut entity = entity;
        prepare_for_write(&mut entity)?;
        let table = entity.kind.table();

        let (id, created_at, modified_at, inserted) = self.storage.with_connection(|conn| {
            let tx = conn.transaction()?;
            let now = chrono::Utc::now().timestamp_millis();

            let existing: Option<(i64, i64)> = if entity.is_new() {
                None
            } else {
                tx.query_row(
                    &format!("SELECT created_at, modified_at FROM {table} WHERE id = ?1"),
                    [&entity.id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?
            };

            let outcome = match existing {
                Some((created_at, previous_modified)) => {
                    let modified_at = now.max(previous_modified + 1);
                    tx.execute(
                        &format!(
                            "UPDATE {table} SET title = ?1, fields_json = ?2, tags_json = ?3,
                                    is_favorite = ?4, image = ?5, modified_at = ?6
                             WHERE id = ?7"
                        ),
                        rusqlite::params![
                            entity.title,
                            serde_json::to_string(&entity.fields)?,
                            serde_json::to_string(&entity.tags)?,
                            entity.is_favorite,
                            entity.image,
                            modified_at,
                            entity.id,
                        ],
                    )?;
                    (entity.id.clone(), created_at, modified_at, false)
                }
                None => {
                    let mut fresh = entity.clone();
                    if fresh.is_new() {
                        fresh.id = Uuid::new_v4().to_string();
                    }
                    fresh.created_at = now;
                    fresh.modified_at = now;
                    insert_entity(&tx, &fresh)?;
                    (fresh.id, now, now, true)
                }
            };

            tx.commit()?;
            Ok(outcome)
        })?;

        entity.id = id;
        entity.created_at = created_at;
        entity.modified_at = modified_at;
        log::info!(
            "{} {} {}",
            if inserted { "inserted" } else { "updated" },
            entity.kind.as_str(),
            entity.id
        );
        Ok(entity)
    }

    /// Deletes an entity together with all of its attachments.
    ///
    /// Both deletions run in one transaction; if the entity does not exist
    /// the transaction is rolled back and nothing is removed.
    ///
    /// # Errors
    ///
    /// Returns [`CharacterBookError::NotFound`] if no entity of `kind` has `id`.
    pub fn delete(&mut self, kind: EntityKind, id: &str) -> Result<DeleteResult> {
        let result = self.storage.with_connection(|conn| {
            let tx = conn.transaction()?;
            let attachments_removed = tx.execute(
                "DELETE FROM attachments WHERE parent_kind = ?1 AND parent_id = ?2",
                rusqlite::params![kind.as_str(), id],
            )?;
            tx.execute(
                &format!("DELETE FROM {} WHERE id = ?1", kind.table()),
                [id],
            )?;

            // DELETE on a missing row succeeds with zero changes; dropping
            // `tx` here rolls the attachment delete back as well.
            if tx.changes() == 0 {
                return Err(CharacterBookError::NotFound { kind, id: id.to_string() });
            }

            tx.commit()?;
            Ok(DeleteResult {
                entity_id: id.to_string(),
                attachments_removed,
            })
        })?;
        log::info!(
            "deleted {} {} with {} attachment(s)",
            kind.as_str(),
            id,
            result.attachments_removed
        );
        Ok(result)
    }

    /// Flips `is_favorite` on one entity and returns the updated record.
    ///
    /// Only the flag and `modified_at` are written; all other columns are
    /// left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`CharacterBookError::NotFound`] if no entity of `kind` has `id`.
    pub fn toggle_favorite(&mut self, kind: EntityKind, id: &str) -> Result<Entity> {
        let table = kind.table();
        let updated = self.storage.with_connection(|conn| {
            let tx = conn.transaction()?;
            let current: Option<(bool, i64)> = tx
                .query_row(
                    &format!("SELECT is_favorite, modified_at FROM {table} WHERE id = ?1"),
                    [id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            let Some((is_favorite, previous_modified)) = current else {
                return Err(CharacterBookError::NotFound { kind, id: id.to_string() });
            };

            let modified_at = chrono::Utc::now().timestamp_millis().max(previous_modified + 1);
            tx.execute(
                &format!("UPDATE {table} SET is_favorite = ?1, modified_at = ?2 WHERE id = ?3"),
                rusqlite::params![!is_favorite, modified_at, id],
            )?;
            let updated = fetch_entity(&tx, kind, id)?;
            tx.commit()?;
            Ok(updated)
        })?;
        updated.ok_or_else(|| CharacterBookError::NotFound { kind, id: id.to_string() })
    }

    /// Returns favourite entities of `kind`, sorted by name.
    pub fn get_favorites(&mut self, kind: EntityKind) -> Result<Vec<Entity>> {
        let favorites = self
            .get_all(kind)?
            .into_iter()
            .filter(|e| e.is_favorite)
            .collect();
        Ok(sort_entities(favorites, SortKey::Name))
    }

    /// Case-insensitive substring search over the configured fields of `kind`.
    ///
    /// A blank query returns exactly [`get_all`](Self::get_all). Matches keep
    /// the `get_all` order; there is no ranking.
    pub fn search(&mut self, kind: EntityKind, query: &str) -> Result<Vec<Entity>> {
        let all = self.get_all(kind)?;
        Ok(filter_entities(all, query, self.search.fields_for(kind)))
    }

    /// Stores `data` as a new attachment of `parent`.
    ///
    /// # Errors
    ///
    /// Returns [`CharacterBookError::NotFound`] if the parent entity does not exist.
    pub fn add_attachment(
        &mut self,
        parent: &EntityRef,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<Attachment> {
        let attachment = self.storage.with_connection(|conn| {
            let tx = conn.transaction()?;
            let attachment = insert_attachment(&tx, parent, &data, content_type)?;
            tx.commit()?;
            Ok(attachment)
        })?;
        log::info!(
            "added attachment {} ({}, {} bytes) to {} {}",
            attachment.id,
            attachment.content_type,
            attachment.data.len(),
            parent.kind.as_str(),
            parent.id
        );
        Ok(attachment)
    }

    /// Returns the attachments of `parent`, oldest first.
    pub fn get_attachments(&mut self, parent: &EntityRef) -> Result<Vec<Attachment>> {
        self.storage.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, content_type, data, created_at FROM attachments
                 WHERE parent_kind = ?1 AND parent_id = ?2
                 ORDER BY created_at ASC, rowid ASC",
            )?;
            let attachments = stmt
                .query_map(rusqlite::params![parent.kind.as_str(), parent.id], |row| {
                    Ok(Attachment {
                        id: row.get(0)?,
                        parent: parent.clone(),
                        content_type: row.get(1)?,
                        data: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(attachments)
        })
    }

    /// Removes a single attachment.
    ///
    /// # Errors
    ///
    /// Returns [`CharacterBookError::AttachmentNotFound`] if no attachment has `attachment_id`.
    pub fn remove_attachment(&mut self, attachment_id: &str) -> Result<()> {
        let removed = self.storage.with_connection(|conn| {
            Ok(conn.execute("DELETE FROM attachments WHERE id = ?1", [attachment_id])?)
        })?;
        if removed == 0 {
            return Err(CharacterBookError::AttachmentNotFound(attachment_id.to_string()));
        }
        log::info!("removed attachment {attachment_id}");
        Ok(())
    }

    /// Runs `op` inside one write transaction on the store's handle.
    pub(crate) fn with_transaction<T, F>(&mut self, mut op: F) -> Result<T>
    where
        F: FnMut(&Transaction) -> Result<T>,
    {
        self.storage.with_connection(|conn| {
            let tx = conn.transaction()?;
            let value = op(&tx)?;
            tx.commit()?;
            Ok(value)
        })
    }
}

/// Trims and validates `entity` ahead of a write.
///
/// # Errors
///
/// Returns [`CharacterBookError::ValidationFailed`] if the name/title is blank.
pub(crate) fn prepare_for_write(entity: &mut Entity) -> Result<()> {
    entity.title = entity.title.trim().to_string();
    if entity.title.is_empty() {
        return Err(CharacterBookError::ValidationFailed(format!(
            "{} {} is required",
            entity.kind,
            entity.kind.title_label()
        )));
    }
    entity.id = entity.id.trim().to_string();
    entity.tags = normalize_tags(&entity.tags);
    Ok(())
}

/// Inserts `entity` as a new row, with its ID and timestamps as given.
pub(crate) fn insert_entity(tx: &Transaction, entity: &Entity) -> Result<()> {
    tx.execute(
        &format!(
            "INSERT INTO {} ({ENTITY_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            entity.kind.table()
        ),
        rusqlite::params![
            entity.id,
            entity.title,
            serde_json::to_string(&entity.fields)?,
            serde_json::to_string(&entity.tags)?,
            entity.is_favorite,
            entity.image,
            entity.created_at,
            entity.modified_at,
        ],
    )?;
    Ok(())
}

/// Inserts an attachment row after checking that `parent` exists.
pub(crate) fn insert_attachment(
    tx: &Transaction,
    parent: &EntityRef,
    data: &[u8],
    content_type: &str,
) -> Result<Attachment> {
    let parent_exists: bool = tx
        .query_row(
            &format!("SELECT 1 FROM {} WHERE id = ?1", parent.kind.table()),
            [&parent.id],
            |_| Ok(()),
        )
        .optional()?
        .is_some();
    if !parent_exists {
        return Err(CharacterBookError::NotFound {
            kind: parent.kind,
            id: parent.id.clone(),
        });
    }

    let attachment = Attachment {
        id: Uuid::new_v4().to_string(),
        parent: parent.clone(),
        content_type: content_type.trim().to_string(),
        data: data.to_vec(),
        created_at: chrono::Utc::now().timestamp_millis(),
    };
    tx.execute(
        "INSERT INTO attachments (id, parent_kind, parent_id, content_type, data, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            attachment.id,
            parent.kind.as_str(),
            parent.id,
            attachment.content_type,
            attachment.data,
            attachment.created_at,
        ],
    )?;
    Ok(attachment)
}

fn fetch_entity(conn: &Connection, kind: EntityKind, id: &str) -> Result<Option<Entity>> {
    let row = conn
        .query_row(
            &format!("SELECT {ENTITY_COLUMNS} FROM {} WHERE id = ?1", kind.table()),
            [id],
            map_entity_row,
        )
        .optional()?;
    row.map(|row| entity_from_row_tuple(kind, row)).transpose()
}

/// Raw 8-column tuple extracted from an entity table row.
type EntityRow = (String, String, String, String, bool, Option<Vec<u8>>, i64, i64);

/// Row-mapping closure for `rusqlite::Row` → raw tuple.
fn map_entity_row(row: &rusqlite::Row) -> rusqlite::Result<EntityRow> {
    Ok((
        row.get::<_, String>(0)?,
        row.get::<_, String>(1)?,
        row.get::<_, String>(2)?,
        row.get::<_, String>(3)?,
        row.get::<_, bool>(4)?,
        row.get::<_, Option<Vec<u8>>>(5)?,
        row.get::<_, i64>(6)?,
        row.get::<_, i64>(7)?,
    ))
}

/// Converts a raw tuple into an [`Entity`], parsing the JSON columns.
fn entity_from_row_tuple(
    kind: EntityKind,
    (id, title, fields_json, tags_json, is_favorite, image, created_at, modified_at): EntityRow,
) -> Result<Entity> {
    let fields: BTreeMap<String, FieldValue> = serde_json::from_str(&fields_json)?;
    let tags: Vec<String> = serde_json::from_str(&tags_json)?;
    Ok(Entity {
        id,
        kind,
        title,
        fields,
        tags,
        is_favorite,
        image,
        created_at,
        modified_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tempfile::NamedTempFile;

    fn store() -> (NamedTempFile, EntityStore) {
        let temp = NamedTempFile::new().unwrap();
        let store = EntityStore::open(temp.path());
        (temp, store)
    }

    #[test]
    fn test_get_all_on_empty_store() {
        let (_temp, mut store) = store();
        assert!(store.get_all(EntityKind::Character).unwrap().is_empty());
        assert!(store.get_all(EntityKind::Note).unwrap().is_empty());
    }

    #[test]
    fn test_save_new_assigns_unique_ids() {
        let (_temp, mut store) = store();
        let mut ids = HashSet::new();
        for i in 0..20 {
            let saved = store.save(Entity::character(format!("Hero {i}"))).unwrap();
            assert!(!saved.id.is_empty());
            assert!(Uuid::parse_str(&saved.id).is_ok());
            assert!(ids.insert(saved.id));
        }
        assert_eq!(store.count(EntityKind::Character).unwrap(), 20);
    }

    #[test]
    fn test_save_sets_timestamps_on_insert() {
        let (_temp, mut store) = store();
        let mut draft = Entity::note("Hello");
        draft.created_at = 42;
        draft.modified_at = 7;
        let saved = store.save(draft).unwrap();
        assert_eq!(saved.created_at, saved.modified_at);
        assert!(saved.created_at > 42);

        let fetched = store.get_by_id(EntityKind::Note, &saved.id).unwrap();
        assert_eq!(fetched, saved);
    }

    #[test]
    fn test_update_replaces_in_place() {
        let (_temp, mut store) = store();
        let saved = store
            .save(Entity::character("Aria").with_field("age", 20).with_field("gender", "f"))
            .unwrap();

        let mut edited = saved.clone();
        edited.fields.clear();
        edited.fields.insert("age".to_string(), FieldValue::Integer(21));
        edited.created_at = 0;
        let updated = store.save(edited).unwrap();

        assert_eq!(updated.id, saved.id);
        assert_eq!(updated.created_at, saved.created_at);
        assert!(updated.modified_at > saved.modified_at);
        assert_eq!(store.count(EntityKind::Character).unwrap(), 1);

        let fetched = store.get_by_id(EntityKind::Character, &saved.id).unwrap();
        assert_eq!(fetched.field("age"), Some(&FieldValue::Integer(21)));
        assert!(fetched.field("gender").is_none());
    }

    #[test]
    fn test_save_with_unknown_id_inserts_under_that_id() {
        let (_temp, mut store) = store();
        let mut draft = Entity::note("Imported");
        draft.id = "custom-id".to_string();
        let saved = store.save(draft.clone()).unwrap();
        assert_eq!(saved.id, "custom-id");

        store.save(draft).unwrap();
        assert_eq!(store.count(EntityKind::Note).unwrap(), 1);
    }

    #[test]
    fn test_save_rejects_blank_title_before_writing() {
        let (_temp, mut store) = store();
        let err = store.save(Entity::character("   ")).unwrap_err();
        assert!(matches!(err, CharacterBookError::ValidationFailed(ref m) if m.contains("name")));
        assert_eq!(store.count(EntityKind::Character).unwrap(), 0);

        let err = store.save(Entity::note("")).unwrap_err();
        assert!(matches!(err, CharacterBookError::ValidationFailed(ref m) if m.contains("title")));
    }

    #[test]
    fn test_save_trims_title_and_normalises_tags() {
        let (_temp, mut store) = store();
        let saved = store
            .save(Entity::note("  Groceries ").with_tags(["Home", " home", "Errands"]))
            .unwrap();
        assert_eq!(saved.title, "Groceries");
        assert_eq!(saved.tags, vec!["errands", "home"]);
    }

    #[test]
    fn test_kinds_are_stored_separately() {
        let (_temp, mut store) = store();
        let character = store.save(Entity::character("Aria")).unwrap();
        store.save(Entity::note("Plot ideas")).unwrap();

        assert_eq!(store.count(EntityKind::Character).unwrap(), 1);
        assert_eq!(store.count(EntityKind::Note).unwrap(), 1);
        assert!(store.find_by_id(EntityKind::Note, &character.id).unwrap().is_none());
    }

    #[test]
    fn test_get_all_is_in_creation_order() {
        let (_temp, mut store) = store();
        for name in ["Zed", "Amy", "Mo"] {
            store.save(Entity::character(name)).unwrap();
        }
        let names: Vec<String> = store
            .get_all(EntityKind::Character)
            .unwrap()
            .into_iter()
            .map(|e| e.title)
            .collect();
        assert_eq!(names, vec!["Zed", "Amy", "Mo"]);
    }

    #[test]
    fn test_get_by_id_missing_is_not_found() {
        let (_temp, mut store) = store();
        let err = store.get_by_id(EntityKind::Note, "nope").unwrap_err();
        assert!(err.is_not_found());
        assert!(store.find_by_id(EntityKind::Note, "nope").unwrap().is_none());
    }

    #[test]
    fn test_toggle_favorite_twice_restores_state() {
        let (_temp, mut store) = store();
        let saved = store
            .save(
                Entity::character("Aria")
                    .with_field("description", "Ranger")
                    .with_tags(["elf"])
                    .with_image(vec![1, 2, 3]),
            )
            .unwrap();

        let once = store.toggle_favorite(EntityKind::Character, &saved.id).unwrap();
        assert!(once.is_favorite);
        assert!(once.modified_at > saved.modified_at);

        let twice = store.toggle_favorite(EntityKind::Character, &saved.id).unwrap();
        assert!(!twice.is_favorite);
        assert_eq!(twice.title, saved.title);
        assert_eq!(twice.fields, saved.fields);
        assert_eq!(twice.tags, saved.tags);
        assert_eq!(twice.image, saved.image);
        assert_eq!(twice.created_at, saved.created_at);
    }

    #[test]
    fn test_toggle_favorite_missing_is_not_found() {
        let (_temp, mut store) = store();
        let err = store.toggle_favorite(EntityKind::Character, "ghost").unwrap_err();
        assert!(matches!(err, CharacterBookError::NotFound { kind: EntityKind::Character, .. }));
    }

    #[test]
    fn test_get_favorites_sorted_by_name() {
        let (_temp, mut store) = store();
        let zed = store.save(Entity::character("Zed")).unwrap();
        store.save(Entity::character("Bob")).unwrap();
        let amy = store.save(Entity::character("amy")).unwrap();
        store.toggle_favorite(EntityKind::Character, &zed.id).unwrap();
        store.toggle_favorite(EntityKind::Character, &amy.id).unwrap();

        let names: Vec<String> = store
            .get_favorites(EntityKind::Character)
            .unwrap()
            .into_iter()
            .map(|e| e.title)
            .collect();
        assert_eq!(names, vec!["amy", "Zed"]);
    }

    #[test]
    fn test_search_empty_query_equals_get_all() {
        let (_temp, mut store) = store();
        for name in ["Zed", "Amy", "Mo"] {
            store.save(Entity::character(name)).unwrap();
        }
        let all = store.get_all(EntityKind::Character).unwrap();
        assert_eq!(store.search(EntityKind::Character, "").unwrap(), all);
        assert_eq!(store.search(EntityKind::Character, "  \t").unwrap(), all);
    }

    #[test]
    fn test_search_matches_name_and_description_only() {
        let (_temp, mut store) = store();
        store
            .save(Entity::character("Gandalf").with_field("description", "Grey wizard"))
            .unwrap();
        store
            .save(Entity::character("Bilbo").with_field("biography", "Met a wizard"))
            .unwrap();
        store
            .save(Entity::character("Saruman").with_field("description", "White WIZARD"))
            .unwrap();

        let names: Vec<String> = store
            .search(EntityKind::Character, "wizard")
            .unwrap()
            .into_iter()
            .map(|e| e.title)
            .collect();
        assert_eq!(names, vec!["Gandalf", "Saruman"]);

        store.set_search_fields(EntityKind::Character, vec!["biography".to_string()]);
        let names: Vec<String> = store
            .search(EntityKind::Character, "wizard")
            .unwrap()
            .into_iter()
            .map(|e| e.title)
            .collect();
        assert_eq!(names, vec!["Bilbo"]);
    }

    #[test]
    fn test_attachments_round_trip_and_cascade() {
        let (_temp, mut store) = store();
        let hero = store.save(Entity::character("Aria")).unwrap();
        let other = store.save(Entity::character("Bran")).unwrap();

        store.add_attachment(&hero.entity_ref(), vec![0xFF, 0xD8], "image/jpeg").unwrap();
        store.add_attachment(&hero.entity_ref(), vec![0x89, 0x50], "image/png").unwrap();
        store.add_attachment(&other.entity_ref(), vec![1], "image/png").unwrap();

        let attachments = store.get_attachments(&hero.entity_ref()).unwrap();
        assert_eq!(attachments.len(), 2);
        assert_eq!(attachments[0].content_type, "image/jpeg");
        assert_eq!(attachments[1].data, vec![0x89, 0x50]);

        let result = store.delete(EntityKind::Character, &hero.id).unwrap();
        assert_eq!(result.attachments_removed, 2);
        assert!(store.get_attachments(&hero.entity_ref()).unwrap().is_empty());
        assert_eq!(store.get_attachments(&other.entity_ref()).unwrap().len(), 1);
        assert!(store.find_by_id(EntityKind::Character, &hero.id).unwrap().is_none());
    }

    #[test]
    fn test_delete_missing_rolls_back_attachment_delete() {
        let (_temp, mut store) = store();
        let hero = store.save(Entity::character("Aria")).unwrap();
        store.add_attachment(&hero.entity_ref(), vec![1, 2], "image/png").unwrap();

        // Orphan row with the parent's ID under a different kind.
        let orphan_parent = EntityRef::new(EntityKind::Note, hero.id.clone());
        store
            .with_transaction(|tx| {
                tx.execute(
                    "INSERT INTO attachments (id, parent_kind, parent_id, content_type, data, created_at)
                     VALUES ('a-orphan', 'note', ?1, 'image/png', x'00', 0)",
                    [&orphan_parent.id],
                )?;
                Ok(())
            })
            .unwrap();

        let err = store.delete(EntityKind::Note, &hero.id).unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(store.get_attachments(&orphan_parent).unwrap().len(), 1);
        assert_eq!(store.get_attachments(&hero.entity_ref()).unwrap().len(), 1);
    }

    #[test]
    fn test_add_attachment_requires_parent() {
        let (_temp, mut store) = store();
        let err = store
            .add_attachment(&EntityRef::new(EntityKind::Character, "ghost"), vec![1], "image/png")
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_remove_attachment() {
        let (_temp, mut store) = store();
        let hero = store.save(Entity::character("Aria")).unwrap();
        let attachment = store.add_attachment(&hero.entity_ref(), vec![1], "image/png").unwrap();

        store.remove_attachment(&attachment.id).unwrap();
        assert!(store.get_attachments(&hero.entity_ref()).unwrap().is_empty());
        assert!(matches!(
            store.remove_attachment(&attachment.id),
            Err(CharacterBookError::AttachmentNotFound(_))
        ));
    }

    #[test]
    fn test_data_survives_close_and_reopen() {
        let (temp, mut store) = store();
        let saved = store.save(Entity::note("Persistent").with_image(vec![9, 9])).unwrap();
        store.close().unwrap();

        assert_eq!(store.get_by_id(EntityKind::Note, &saved.id).unwrap(), saved);

        let mut reopened = EntityStore::open(temp.path());
        assert_eq!(reopened.get_all(EntityKind::Note).unwrap(), vec![saved]);
    }

    #[test]
    fn test_unreachable_database_is_storage_unavailable() {
        let mut store = EntityStore::open("/nonexistent-characterbook-dir/db.db3");
        assert!(matches!(
            store.get_all(EntityKind::Character),
            Err(CharacterBookError::StorageUnavailable(_))
        ));
        assert!(matches!(
            store.save(Entity::character("Aria")),
            Err(CharacterBookError::StorageUnavailable(_))
        ));
    }
}
