// src/engine/milvus.rs
// Milvus RESTful API (v2) client

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Map, Value, json};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use super::{CollectionStats, EngineHit, Entity, QueryRequest, SearchRequest, VectorEngine};
use crate::config::Settings;
use crate::error::{RecallError, Result};
use crate::schema::{FieldType, SchemaDescriptor};

const API_PREFIX: &str = "v2/vectordb/";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Milvus client speaking the `/v2/vectordb` REST API.
///
/// Cloning is cheap; the underlying `reqwest::Client` pools connections and is shared.
#[derive(Debug, Clone)]
pub struct MilvusClient {
    client: Client,
    base_url: Url,
    database: String,
    token: Option<String>,
}

impl MilvusClient {
    pub fn new(
        uri: &str,
        database: &str,
        token: Option<String>,
        connect_timeout: Duration,
    ) -> Result<Self> {
        // Url::join drops the last path segment unless it ends with '/'
        let normalized = if uri.ends_with('/') {
            uri.to_string()
        } else {
            format!("{uri}/")
        };
        let base_url = Url::parse(&normalized)
            .map_err(|e| RecallError::Config(format!("invalid Milvus URI '{uri}': {e}")))?;

        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| RecallError::Connection(format!("failed to build HTTP client: {e}")))?;

        info!(uri = %base_url, database, "Milvus client configured");

        Ok(Self {
            client,
            base_url,
            database: database.to_string(),
            token,
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::new(
            &settings.milvus_uri(),
            &settings.milvus_database,
            settings.milvus_credential(),
            settings.milvus_connect_timeout(),
        )
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(API_PREFIX)
            .and_then(|u| u.join(path))
            .map_err(|e| RecallError::Config(format!("invalid endpoint '{path}': {e}")))
    }

    /// POST a request body and unwrap the `{code, message, data}` envelope.
    async fn post(&self, path: &str, mut body: Value) -> Result<Value> {
        if let Some(obj) = body.as_object_mut() {
            obj.insert("dbName".to_string(), json!(self.database));
        }

        let url = self.endpoint(path)?;
        let mut request = self.client.post(url).json(&body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RecallError::Engine {
                code: i64::from(status.as_u16()),
                message,
            });
        }

        let envelope: Value = response.json().await?;
        let code = envelope.get("code").and_then(Value::as_i64).unwrap_or(0);
        // Older proxies report success as 200 instead of 0
        if code != 0 && code != 200 {
            let message = envelope
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string();
            return Err(RecallError::Engine { code, message });
        }

        Ok(envelope.get("data").cloned().unwrap_or(Value::Null))
    }
}

fn data_type(field_type: FieldType) -> &'static str {
    match field_type {
        FieldType::VarChar => "VarChar",
        FieldType::Int64 => "Int64",
        FieldType::Json => "JSON",
        FieldType::FloatVector => "FloatVector",
    }
}

fn schema_payload(schema: &SchemaDescriptor) -> Value {
    let fields: Vec<Value> = schema
        .fields
        .iter()
        .map(|field| {
            let mut params = Map::new();
            if let Some(max_length) = field.max_length {
                params.insert("max_length".to_string(), json!(max_length.to_string()));
            }
            if let Some(dim) = field.dim {
                params.insert("dim".to_string(), json!(dim.to_string()));
            }
            json!({
                "fieldName": field.name,
                "dataType": data_type(field.field_type),
                "isPrimary": field.is_primary,
                "description": field.description,
                "elementTypeParams": params,
            })
        })
        .collect();

    json!({
        "autoId": false,
        "enableDynamicField": schema.enable_dynamic_field,
        "fields": fields,
    })
}

fn index_payload(schema: &SchemaDescriptor) -> Value {
    let index = &schema.index;
    json!([{
        "fieldName": index.field_name,
        "indexName": format!("{}_idx", index.field_name),
        "metricType": index.metric_type.as_str(),
        "indexType": index.index_type,
        "params": { "nlist": index.nlist },
    }])
}

// Search rows come back flattened: `distance` next to the output fields.
fn parse_hits(data: Value) -> Vec<EngineHit> {
    let Value::Array(rows) = data else {
        return Vec::new();
    };

    rows.into_iter()
        .filter_map(|row| {
            let Value::Object(mut entity) = row else {
                return None;
            };
            match entity.remove("distance").and_then(|d| d.as_f64()) {
                Some(distance) => Some(EngineHit {
                    distance: distance as f32,
                    entity,
                }),
                None => {
                    warn!("Milvus search row without distance, skipping");
                    None
                }
            }
        })
        .collect()
}

fn parse_entities(data: Value) -> Vec<Entity> {
    match data {
        Value::Array(rows) => rows
            .into_iter()
            .filter_map(|row| match row {
                Value::Object(entity) => Some(entity),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

// rowCount arrives as a number or as a decimal string depending on the server version
fn parse_row_count(data: &Value) -> u64 {
    match data.get("rowCount") {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(Value::String(s)) => s.parse().unwrap_or(0),
        _ => 0,
    }
}

#[async_trait]
impl VectorEngine for MilvusClient {
    async fn has_collection(&self, collection: &str) -> Result<bool> {
        let data = self
            .post("collections/has", json!({ "collectionName": collection }))
            .await?;
        Ok(data.get("has").and_then(Value::as_bool).unwrap_or(false))
    }

    async fn create_collection(&self, collection: &str, schema: &SchemaDescriptor) -> Result<()> {
        let body = json!({
            "collectionName": collection,
            "description": schema.description,
            "schema": schema_payload(schema),
            "indexParams": index_payload(schema),
        });
        self.post("collections/create", body).await?;
        info!(collection, "Created Milvus collection");
        Ok(())
    }

    async fn load_collection(&self, collection: &str) -> Result<()> {
        self.post("collections/load", json!({ "collectionName": collection }))
            .await?;
        debug!(collection, "Loaded Milvus collection");
        Ok(())
    }

    async fn search(&self, collection: &str, request: &SearchRequest) -> Result<Vec<EngineHit>> {
        let mut body = json!({
            "collectionName": collection,
            "data": [request.vector],
            "annsField": request.anns_field,
            "limit": request.limit,
            "outputFields": request.output_fields,
            "searchParams": {
                "metricType": request.metric_type.as_str(),
                "params": { "nprobe": request.nprobe },
            },
        });
        if let Some(filter) = &request.filter {
            body["filter"] = json!(filter);
        }

        let data = self.post("entities/search", body).await?;
        let hits = parse_hits(data);
        debug!(collection, hits = hits.len(), limit = request.limit, "Milvus search");
        Ok(hits)
    }

    async fn query(&self, collection: &str, request: &QueryRequest) -> Result<Vec<Entity>> {
        let mut body = json!({
            "collectionName": collection,
            "filter": request.filter,
            "outputFields": request.output_fields,
            "limit": request.limit,
        });
        if let Some(offset) = request.offset {
            body["offset"] = json!(offset);
        }

        let data = self.post("entities/query", body).await?;
        let rows = parse_entities(data);
        debug!(collection, rows = rows.len(), "Milvus query");
        Ok(rows)
    }

    async fn insert(&self, collection: &str, rows: Vec<Entity>) -> Result<usize> {
        let submitted = rows.len();
        let body = json!({
            "collectionName": collection,
            "data": rows,
        });

        let data = self.post("entities/insert", body).await?;
        let inserted = data
            .get("insertCount")
            .and_then(Value::as_u64)
            .map(|n| n as usize)
            .unwrap_or(submitted);
        Ok(inserted)
    }

    async fn delete(&self, collection: &str, filter: &str) -> Result<()> {
        self.post(
            "entities/delete",
            json!({ "collectionName": collection, "filter": filter }),
        )
        .await?;
        Ok(())
    }

    async fn get_collection_stats(&self, collection: &str) -> Result<CollectionStats> {
        let data = self
            .post("collections/get_stats", json!({ "collectionName": collection }))
            .await?;
        Ok(CollectionStats {
            row_count: parse_row_count(&data),
        })
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        let data = self.post("collections/list", json!({})).await?;
        Ok(data
            .as_array()
            .map(|names| {
                names
                    .iter()
                    .filter_map(|n| n.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default())
    }
}
