// src/schema/faq.rs

use super::{
    CollectionSchema, FieldSchema, IndexParams, MAX_TEXT_LENGTH, PRIMARY_FIELD, SchemaDescriptor,
    VECTOR_FIELD,
};

/// FAQ entries. `text` is the rendered question/answer pair; `metadata` keeps the raw
/// `question`, `answer`, `language`, `category`, `text_template` and `embedding_source`.
#[derive(Debug, Clone)]
pub struct FaqSchema {
    collection: String,
    descriptor: SchemaDescriptor,
}

impl FaqSchema {
    pub fn new(collection: impl Into<String>, dim: usize) -> Self {
        let descriptor = SchemaDescriptor {
            fields: vec![
                FieldSchema::primary(PRIMARY_FIELD, 64, "faq id"),
                FieldSchema::varchar("text", MAX_TEXT_LENGTH, "rendered question and answer"),
                FieldSchema::vector(VECTOR_FIELD, dim, "text embedding"),
                FieldSchema::json("metadata", "raw faq data"),
                FieldSchema::int64("created_at", "creation time (unix seconds)"),
            ],
            description: "faq knowledge base",
            enable_dynamic_field: false,
            index: IndexParams::ivf_flat(128),
        };

        Self {
            collection: collection.into(),
            descriptor,
        }
    }
}

impl CollectionSchema for FaqSchema {
    fn collection_name(&self) -> &str {
        &self.collection
    }

    fn descriptor(&self) -> &SchemaDescriptor {
        &self.descriptor
    }
}
