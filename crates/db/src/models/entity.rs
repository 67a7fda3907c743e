//! Entity row model.

use canopy_core::populate::EntityRecord;
use canopy_core::types::{DbId, Timestamp};
use serde_json::Value;
use sqlx::FromRow;

/// A row from the `entities` table.
#[derive(Debug, Clone, FromRow)]
pub struct EntityRow {
    pub id: DbId,
    pub content_type: String,
    pub document: Value,
    pub published_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl EntityRow {
    /// Convert into the record shape the core walker consumes. A non-object
    /// document column (impossible under our writers) degrades to empty.
    pub fn into_record(self) -> EntityRecord {
        let document = match self.document {
            Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        EntityRecord {
            id: self.id,
            document,
            published_at: self.published_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}
