// src/schema/history.rs

use super::{
    CollectionSchema, FieldSchema, IndexParams, MAX_TEXT_LENGTH, PRIMARY_FIELD, SchemaDescriptor,
    VECTOR_FIELD,
};

/// Conversation history: one row per chat message
#[derive(Debug, Clone)]
pub struct HistorySchema {
    collection: String,
    descriptor: SchemaDescriptor,
}

impl HistorySchema {
    pub fn new(collection: impl Into<String>, dim: usize) -> Self {
        let descriptor = SchemaDescriptor {
            fields: vec![
                FieldSchema::primary(PRIMARY_FIELD, 64, "message id"),
                FieldSchema::varchar("session_id", 128, "session id"),
                FieldSchema::varchar("role", 20, "user or assistant"),
                FieldSchema::varchar("text", MAX_TEXT_LENGTH, "message text"),
                FieldSchema::vector(VECTOR_FIELD, dim, "text embedding"),
                FieldSchema::int64("timestamp", "message time (unix seconds)"),
            ],
            description: "conversation history",
            enable_dynamic_field: false,
            index: IndexParams::ivf_flat(128),
        };

        Self {
            collection: collection.into(),
            descriptor,
        }
    }
}

impl CollectionSchema for HistorySchema {
    fn collection_name(&self) -> &str {
        &self.collection
    }

    fn descriptor(&self) -> &SchemaDescriptor {
        &self.descriptor
    }
}
