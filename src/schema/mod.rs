// src/schema/mod.rs

//! Collection schema registry.
//!
//! Each logical collection (knowledge base, FAQ, conversation history) is described by a
//! static `SchemaDescriptor`: ordered fields, a human description and the vector index
//! parameters. The repository layer hands the descriptor to the engine at creation time
//! and uses it to validate rows before insert.

mod faq;
mod history;
mod knowledge;

pub use faq::FaqSchema;
pub use history::HistorySchema;
pub use knowledge::KnowledgeSchema;

use serde::Serialize;

/// Name of the vector field shared by every collection
pub const VECTOR_FIELD: &str = "embedding";

/// Name of the primary key field shared by every collection
pub const PRIMARY_FIELD: &str = "id";

/// Maximum stored text length (characters) for `text` fields
pub const MAX_TEXT_LENGTH: usize = 10000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FieldType {
    VarChar,
    Int64,
    Json,
    FloatVector,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSchema {
    pub name: &'static str,
    pub field_type: FieldType,
    /// Character limit for `VarChar` fields
    pub max_length: Option<usize>,
    /// Dimension for `FloatVector` fields
    pub dim: Option<usize>,
    pub is_primary: bool,
    pub description: &'static str,
}

impl FieldSchema {
    pub fn varchar(name: &'static str, max_length: usize, description: &'static str) -> Self {
        Self {
            name,
            field_type: FieldType::VarChar,
            max_length: Some(max_length),
            dim: None,
            is_primary: false,
            description,
        }
    }

    pub fn primary(name: &'static str, max_length: usize, description: &'static str) -> Self {
        Self {
            is_primary: true,
            ..Self::varchar(name, max_length, description)
        }
    }

    pub fn int64(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            field_type: FieldType::Int64,
            max_length: None,
            dim: None,
            is_primary: false,
            description,
        }
    }

    pub fn json(name: &'static str, description: &'static str) -> Self {
        Self {
            field_type: FieldType::Json,
            ..Self::int64(name, description)
        }
    }

    pub fn vector(name: &'static str, dim: usize, description: &'static str) -> Self {
        Self {
            name,
            field_type: FieldType::FloatVector,
            max_length: None,
            dim: Some(dim),
            is_primary: false,
            description,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MetricType {
    Cosine,
}

impl MetricType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::Cosine => "COSINE",
        }
    }
}

/// Vector index parameters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexParams {
    pub field_name: &'static str,
    pub metric_type: MetricType,
    pub index_type: &'static str,
    pub nlist: u32,
}

impl IndexParams {
    /// COSINE / IVF_FLAT on the shared vector field
    pub fn ivf_flat(nlist: u32) -> Self {
        Self {
            field_name: VECTOR_FIELD,
            metric_type: MetricType::Cosine,
            index_type: "IVF_FLAT",
            nlist,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaDescriptor {
    pub fields: Vec<FieldSchema>,
    pub description: &'static str,
    pub enable_dynamic_field: bool,
    pub index: IndexParams,
}

impl SchemaDescriptor {
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn vector_field(&self) -> Option<&FieldSchema> {
        self.fields
            .iter()
            .find(|f| f.field_type == FieldType::FloatVector)
    }

    pub fn primary_field(&self) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.is_primary)
    }

    /// Declared vector dimension
    pub fn dimension(&self) -> Option<usize> {
        self.vector_field().and_then(|f| f.dim)
    }
}

/// Capability bounding the generic repository: a named collection with a fixed layout.
pub trait CollectionSchema: Send + Sync + 'static {
    fn collection_name(&self) -> &str;

    fn descriptor(&self) -> &SchemaDescriptor;
}
