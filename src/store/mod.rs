pub mod curation;
pub mod ids;
pub mod memory;
pub mod qdrant;

use crate::config::VectorStoreConfig;
use crate::llm::LlmError;
use crate::llm::embedding::Embedder;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    Unavailable(String),

    #[error("{0}")]
    Validation(String),

    #[error("mismatch between number of records ({records}) and identifiers ({ids}) in batch")]
    Consistency { records: usize, ids: usize },

    #[error("vector store error: {0}")]
    Backend(String),

    #[error("embedding failed: {0}")]
    Embedding(#[from] LlmError),

    #[error("failed to delete point {id}: status {status}")]
    DeleteNotConfirmed { id: PointId, status: DeleteStatus },
}

/// Identifier of a stored example: an unsigned integer or a UUID string.
/// The two spaces are disjoint; integers order before UUIDs.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PointId {
    Num(u64),
    Uuid(String),
}

impl fmt::Display for PointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PointId::Num(n) => write!(f, "{}", n),
            PointId::Uuid(u) => write!(f, "{}", u),
        }
    }
}

/// Metadata stored next to the question text. Legacy key names are accepted on read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExampleMetadata {
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        alias = "user_id",
        alias = "user_id_from_file"
    )]
    pub source_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tables: Option<Vec<String>>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub query_type: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        alias = "qdrant_point_id_ref"
    )]
    pub point_id_ref: Option<String>,
}

/// The stored form of an example; also the payload layout written to the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExampleRecord {
    #[serde(rename = "page_content")]
    pub nl: String,
    #[serde(default)]
    pub metadata: ExampleMetadata,
}

/// A retrieved example as handed to prompt assembly and returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Example {
    pub nl: String,
    pub id: Option<String>,
    pub sql: Option<String>,
    pub tables: Option<Vec<String>>,
    #[serde(rename = "type")]
    pub query_type: Option<String>,
}

impl From<ExampleRecord> for Example {
    fn from(record: ExampleRecord) -> Self {
        let ExampleRecord { nl, metadata } = record;
        Self {
            nl,
            id: metadata.point_id_ref,
            sql: metadata.sql,
            tables: metadata.tables,
            query_type: metadata.query_type,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StoredPoint {
    pub id: PointId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector: Option<serde_json::Value>,
}

#[derive(Debug, Clone)]
pub struct ScrollRequest {
    pub limit: usize,
    pub offset: Option<PointId>,
    pub with_payload: bool,
    pub with_vectors: bool,
}

/// One page of an enumeration; `next_offset` is `None` at the end of the collection.
#[derive(Debug, Clone)]
pub struct ScrollPage {
    pub points: Vec<StoredPoint>,
    pub next_offset: Option<PointId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteStatus {
    Completed,
    Acknowledged,
    NotFound,
}

impl fmt::Display for DeleteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeleteStatus::Completed => write!(f, "completed"),
            DeleteStatus::Acknowledged => write!(f, "acknowledged"),
            DeleteStatus::NotFound => write!(f, "not found"),
        }
    }
}

/// Vector-indexed collection of curated examples. Embeddings are managed by the store.
#[async_trait]
pub trait ExampleStore: Send + Sync {
    /// Up to `k` records, nearest first.
    async fn similarity_search(&self, text: &str, k: usize)
        -> Result<Vec<ExampleRecord>, StoreError>;

    /// Inserts the batch in a single call; nothing is written if it fails.
    async fn add(&self, records: Vec<ExampleRecord>, ids: Vec<PointId>)
        -> Result<usize, StoreError>;

    async fn scroll(&self, request: ScrollRequest) -> Result<ScrollPage, StoreError>;

    /// Waits for the backend to acknowledge before returning.
    async fn delete(&self, id: &PointId) -> Result<DeleteStatus, StoreError>;

    fn collection(&self) -> &str;
}

pub fn build_store(
    config: Option<&VectorStoreConfig>,
    embedder: Arc<dyn Embedder>,
) -> Result<Option<Arc<dyn ExampleStore>>, StoreError> {
    let Some(config) = config else {
        info!("No vector store configured; example retrieval is disabled");
        return Ok(None);
    };

    info!(
        "Initializing {} vector store for collection {}",
        config.backend, config.collection
    );

    let store: Arc<dyn ExampleStore> = match config.backend.as_str() {
        "qdrant" => Arc::new(qdrant::QdrantStore::new(config, embedder)?),
        "memory" => Arc::new(memory::InMemoryStore::new(&config.collection, embedder)),
        other => {
            return Err(StoreError::Unavailable(format!(
                "Unsupported vector store backend: {}",
                other
            )));
        }
    };

    Ok(Some(store))
}
