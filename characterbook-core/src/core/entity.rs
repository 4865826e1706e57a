//! Entity records stored by the [`EntityStore`](super::store::EntityStore).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Title given to notes whose content has no non-blank line.
pub const UNTITLED: &str = "Untitled";

/// Field key under which a note's body text is stored.
pub const CONTENT_FIELD: &str = "content";

/// The kinds of entity the store persists. Each kind has its own table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Character,
    Note,
}

impl EntityKind {
    /// Every kind, in table-creation order.
    pub const ALL: [EntityKind; 2] = [EntityKind::Character, EntityKind::Note];

    /// Name of the SQLite table holding this kind.
    pub fn table(self) -> &'static str {
        match self {
            Self::Character => "characters",
            Self::Note => "notes",
        }
    }

    /// Name of the required field, as shown in validation messages.
    pub fn title_label(self) -> &'static str {
        match self {
            Self::Character => "name",
            Self::Note => "title",
        }
    }

    /// Stable lowercase identifier, used in the attachments table.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Character => "character",
            Self::Note => "note",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "character" => Some(Self::Character),
            "note" => Some(Self::Note),
            _ => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Character => "Character",
            Self::Note => "Note",
        })
    }
}

/// A scalar attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Boolean(bool),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

/// Strongly-typed reference to a stored entity.
///
/// Passed between screens and into attachment calls in place of loose
/// key-value parameter maps.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: String,
}

impl EntityRef {
    pub fn new(kind: EntityKind, id: impl Into<String>) -> Self {
        Self { kind, id: id.into() }
    }
}

/// A character or note record.
///
/// An empty `id` marks the entity as new; the store assigns one on first save.
/// Timestamps are Unix milliseconds and are owned by the store: values set by
/// the caller are ignored on save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub id: String,
    pub kind: EntityKind,
    /// The character's name or the note's title. Must be non-blank to save.
    pub title: String,
    pub fields: BTreeMap<String, FieldValue>,
    pub tags: Vec<String>,
    pub is_favorite: bool,
    pub image: Option<Vec<u8>>,
    pub created_at: i64,
    pub modified_at: i64,
}

impl Entity {
    /// Creates an unsaved entity of `kind` with the given name/title.
    pub fn new(kind: EntityKind, title: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            kind,
            title: title.into(),
            fields: BTreeMap::new(),
            tags: Vec::new(),
            is_favorite: false,
            image: None,
            created_at: 0,
            modified_at: 0,
        }
    }

    pub fn character(name: impl Into<String>) -> Self {
        Self::new(EntityKind::Character, name)
    }

    pub fn note(title: impl Into<String>) -> Self {
        Self::new(EntityKind::Note, title)
    }

    /// Builds a note whose title is the first non-blank line of `content`.
    pub fn note_from_content(content: &str) -> Self {
        let title = content
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or(UNTITLED);
        Self::note(title).with_field(CONTENT_FIELD, content)
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_image(mut self, image: Vec<u8>) -> Self {
        self.image = Some(image);
        self
    }

    /// Returns `true` if this entity has never been saved.
    pub fn is_new(&self) -> bool {
        self.id.trim().is_empty()
    }

    pub fn field(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    /// Returns the text value of `key`, or `None` if absent or not text.
    pub fn text(&self, key: &str) -> Option<&str> {
        self.field(key).and_then(FieldValue::as_text)
    }

    pub fn entity_ref(&self) -> EntityRef {
        EntityRef::new(self.kind, self.id.clone())
    }

    /// Case-insensitive containment test over the named fields.
    ///
    /// `needle` must already be lowercased. The pseudo-field names `name` and
    /// `title` match the entity's title, `tags` matches any tag; every other
    /// name is looked up in `fields` and only text values are considered.
    pub fn matches(&self, needle: &str, search_fields: &[String]) -> bool {
        search_fields.iter().any(|name| match name.as_str() {
            "name" | "title" => self.title.to_lowercase().contains(needle),
            "tags" => self.tags.iter().any(|t| t.to_lowercase().contains(needle)),
            other => self
                .text(other)
                .is_some_and(|text| text.to_lowercase().contains(needle)),
        })
    }
}

/// Normalises tags: trimmed, lowercased, de-duplicated and sorted.
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut normalised: Vec<String> = tags
        .iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();
    normalised.sort();
    normalised.dedup();
    normalised
}
