// src/schema/knowledge.rs

use super::{
    CollectionSchema, FieldSchema, IndexParams, MAX_TEXT_LENGTH, PRIMARY_FIELD, SchemaDescriptor,
    VECTOR_FIELD,
};

/// Website knowledge base: text chunks with JSON metadata
#[derive(Debug, Clone)]
pub struct KnowledgeSchema {
    collection: String,
    descriptor: SchemaDescriptor,
}

impl KnowledgeSchema {
    pub fn new(collection: impl Into<String>, dim: usize) -> Self {
        let descriptor = SchemaDescriptor {
            fields: vec![
                FieldSchema::primary(PRIMARY_FIELD, 64, "document chunk id"),
                FieldSchema::varchar("text", MAX_TEXT_LENGTH, "document text"),
                FieldSchema::vector(VECTOR_FIELD, dim, "text embedding"),
                FieldSchema::json("metadata", "document metadata"),
                FieldSchema::int64("created_at", "creation time (unix seconds)"),
            ],
            description: "website knowledge base",
            enable_dynamic_field: false,
            index: IndexParams::ivf_flat(128),
        };

        Self {
            collection: collection.into(),
            descriptor,
        }
    }
}

impl CollectionSchema for KnowledgeSchema {
    fn collection_name(&self) -> &str {
        &self.collection
    }

    fn descriptor(&self) -> &SchemaDescriptor {
        &self.descriptor
    }
}
