//! Result type for entity removal.
//!
//! Deleting an entity removes the entity row and every attachment owned by
//! it in a single transaction. [`DeleteResult`] reports what went.
//!
//! `DeleteResult` fields serialize in camelCase (`entityId`,
//! `attachmentsRemoved`), consistent with all other return types in this
//! crate.
//!
//! ```rust
//! use characterbook_core::DeleteResult;
//!
//! let result = DeleteResult {
//!     entity_id: "c0ffee".to_string(),
//!     attachments_removed: 2,
//! };
//! let json = serde_json::to_string(&result).unwrap();
//! assert!(json.contains("entityId"));
//! assert!(json.contains("attachmentsRemoved"));
//! ```

use serde::{Deserialize, Serialize};

/// The outcome of [`EntityStore::delete`](super::store::EntityStore::delete).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResult {
    /// ID of the entity that was removed.
    pub entity_id: String,

    /// Number of attachment rows removed along with it.
    pub attachments_removed: usize,
}
