//! Sorting and search scoping for entity listings.

use serde::{Deserialize, Serialize};

use crate::core::entity::{Entity, EntityKind};

/// Sort key accepted by [`sort_entities`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortKey {
    /// Name/title, case-insensitive.
    Name,
    CreatedDate,
}

/// Reorders `entities` ascending by `key`.
///
/// The sort is stable: entities with equal keys keep their relative order.
pub fn sort_entities(mut entities: Vec<Entity>, key: SortKey) -> Vec<Entity> {
    match key {
        SortKey::Name => entities.sort_by_cached_key(|e| e.title.to_lowercase()),
        SortKey::CreatedDate => entities.sort_by_key(|e| e.created_at),
    }
    entities
}

/// Fields searched per entity kind.
///
/// `name`/`title` refer to the entity title and `tags` to its tags; any
/// other name is a key into the entity's fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchSettings {
    pub character: Vec<String>,
    pub note: Vec<String>,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            character: vec!["name".to_string(), "description".to_string()],
            note: vec!["title".to_string(), "content".to_string()],
        }
    }
}

impl SearchSettings {
    pub fn fields_for(&self, kind: EntityKind) -> &[String] {
        match kind {
            EntityKind::Character => &self.character,
            EntityKind::Note => &self.note,
        }
    }

    pub fn set_fields_for(&mut self, kind: EntityKind, fields: Vec<String>) {
        match kind {
            EntityKind::Character => self.character = fields,
            EntityKind::Note => self.note = fields,
        }
    }
}

/// Filters `entities` to those whose scoped fields contain `query`.
///
/// A blank query returns `entities` unchanged. Order is preserved.
pub fn filter_entities(entities: Vec<Entity>, query: &str, fields: &[String]) -> Vec<Entity> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return entities;
    }
    entities
        .into_iter()
        .filter(|e| e.matches(&needle, fields))
        .collect()
}
