use crate::config::VectorStoreConfig;
use crate::llm::embedding::Embedder;
use crate::store::{
    DeleteStatus, ExampleRecord, ExampleStore, PointId, ScrollPage, ScrollRequest, StoreError,
    StoredPoint,
};
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Example store backed by a Qdrant collection, spoken to over its REST API.
pub struct QdrantStore {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    collection: String,
    embedder: Arc<dyn Embedder>,
}

#[derive(Deserialize)]
struct QdrantResponse<T> {
    result: Option<T>,
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    vector: &'a [f32],
    limit: usize,
    with_payload: bool,
}

#[derive(Deserialize)]
struct ScoredPoint {
    id: PointId,
    score: f32,
    payload: Option<Value>,
}

#[derive(Serialize)]
struct UpsertRequest {
    points: Vec<UpsertPoint>,
}

#[derive(Serialize)]
struct UpsertPoint {
    id: PointId,
    vector: Vec<f32>,
    payload: ExampleRecord,
}

#[derive(Serialize)]
struct ScrollBody<'a> {
    limit: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<&'a PointId>,
    with_payload: bool,
    with_vector: bool,
}

#[derive(Deserialize)]
struct ScrollResult {
    points: Vec<RawPoint>,
    next_page_offset: Option<PointId>,
}

#[derive(Deserialize)]
struct RawPoint {
    id: PointId,
    payload: Option<Value>,
    vector: Option<Value>,
}

#[derive(Serialize)]
struct DeleteBody<'a> {
    points: [&'a PointId; 1],
}

#[derive(Deserialize)]
struct UpdateResult {
    status: String,
}

impl QdrantStore {
    pub fn new(
        config: &VectorStoreConfig,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Ok(Self::with_client(config, embedder, client))
    }

    pub fn with_client(
        config: &VectorStoreConfig,
        embedder: Arc<dyn Embedder>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            collection: config.collection.clone(),
            embedder,
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/collections/{}/{}", self.base_url, self.collection, path);
        let request = self.client.request(method, url);
        match &self.api_key {
            Some(key) => request.header("api-key", key),
            None => request,
        }
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, StoreError> {
        let response = request
            .send()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let response = check_status(response).await?;

        let parsed: QdrantResponse<T> = response
            .json()
            .await
            .map_err(|e| StoreError::Backend(format!("Failed to parse Qdrant response: {}", e)))?;

        parsed
            .result
            .ok_or_else(|| StoreError::Backend("Qdrant response has no result".to_string()))
    }

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, StoreError> {
        self.embedder
            .embed(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Backend("embedder returned no vector".to_string()))
    }
}

async fn check_status(response: Response) -> Result<Response, StoreError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    error!("Qdrant responded with status code: {} - {}", status, body);
    Err(StoreError::Backend(format!(
        "Qdrant responded with status code: {} - {}",
        status, body
    )))
}

fn parse_update_status(status: &str) -> DeleteStatus {
    match status {
        "completed" => DeleteStatus::Completed,
        _ => DeleteStatus::Acknowledged,
    }
}

#[async_trait]
impl ExampleStore for QdrantStore {
    async fn similarity_search(
        &self,
        text: &str,
        k: usize,
    ) -> Result<Vec<ExampleRecord>, StoreError> {
        let vector = self.embed_one(text).await?;

        let hits: Vec<ScoredPoint> = self
            .send(self.request(Method::POST, "points/search").json(&SearchRequest {
                vector: &vector,
                limit: k,
                with_payload: true,
            }))
            .await?;

        let mut records = Vec::with_capacity(hits.len());
        for hit in hits {
            let Some(payload) = hit.payload else {
                warn!("Point {} has no payload; skipping", hit.id);
                continue;
            };
            match serde_json::from_value::<ExampleRecord>(payload) {
                Ok(record) => {
                    debug!("Matched point {} (score {:.3})", hit.id, hit.score);
                    records.push(record);
                }
                Err(e) => warn!("Point {} has an unreadable payload: {}", hit.id, e),
            }
        }

        Ok(records)
    }

    async fn add(
        &self,
        records: Vec<ExampleRecord>,
        ids: Vec<PointId>,
    ) -> Result<usize, StoreError> {
        if records.len() != ids.len() {
            return Err(StoreError::Consistency {
                records: records.len(),
                ids: ids.len(),
            });
        }

        let texts: Vec<String> = records.iter().map(|r| r.nl.clone()).collect();
        let vectors = self.embedder.embed(&texts).await?;
        if vectors.len() != records.len() {
            return Err(StoreError::Backend(format!(
                "embedder returned {} vectors for {} records",
                vectors.len(),
                records.len()
            )));
        }

        let points: Vec<UpsertPoint> = ids
            .into_iter()
            .zip(records)
            .zip(vectors)
            .map(|((id, payload), vector)| UpsertPoint {
                id,
                vector,
                payload,
            })
            .collect();
        let count = points.len();

        let result: UpdateResult = self
            .send(
                self.request(Method::PUT, "points?wait=true")
                    .json(&UpsertRequest { points }),
            )
            .await?;

        debug!("Qdrant upsert of {} points finished with status {}", count, result.status);
        Ok(count)
    }

    async fn scroll(&self, request: ScrollRequest) -> Result<ScrollPage, StoreError> {
        let result: ScrollResult = self
            .send(self.request(Method::POST, "points/scroll").json(&ScrollBody {
                limit: request.limit,
                offset: request.offset.as_ref(),
                with_payload: request.with_payload,
                with_vector: request.with_vectors,
            }))
            .await?;

        let points = result
            .points
            .into_iter()
            .map(|p| StoredPoint {
                id: p.id,
                payload: p.payload,
                vector: if request.with_vectors { p.vector } else { None },
            })
            .collect();

        Ok(ScrollPage {
            points,
            next_offset: result.next_page_offset,
        })
    }

    async fn delete(&self, id: &PointId) -> Result<DeleteStatus, StoreError> {
        // Qdrant reports success for unknown ids, so check existence first
        let existing = self
            .request(Method::GET, &format!("points/{}", id))
            .send()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        if existing.status() == StatusCode::NOT_FOUND {
            return Ok(DeleteStatus::NotFound);
        }
        check_status(existing).await?;

        let result: UpdateResult = self
            .send(
                self.request(Method::POST, "points/delete?wait=true")
                    .json(&DeleteBody { points: [id] }),
            )
            .await?;

        Ok(parse_update_status(&result.status))
    }

    fn collection(&self) -> &str {
        &self.collection
    }
}
