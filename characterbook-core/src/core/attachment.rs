use serde::{Deserialize, Serialize};

use crate::core::entity::EntityRef;

/// A binary blob (usually an image) owned by an entity.
///
/// Attachments have no lifecycle of their own: deleting the parent entity
/// deletes them in the same transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id: String,
    pub parent: EntityRef,
    pub content_type: String,
    pub data: Vec<u8>,
    pub created_at: i64,
}
