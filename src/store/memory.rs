use crate::llm::embedding::Embedder;
use crate::store::{
    DeleteStatus, ExampleRecord, ExampleStore, PointId, ScrollPage, ScrollRequest, StoreError,
    StoredPoint,
};
use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

struct MemoryPoint {
    record: ExampleRecord,
    vector: Vec<f32>,
}

/// Process-local store with exact cosine search. Points are kept in identifier order.
pub struct InMemoryStore {
    collection: String,
    embedder: Arc<dyn Embedder>,
    points: RwLock<BTreeMap<PointId, MemoryPoint>>,
}

impl InMemoryStore {
    pub fn new(collection: &str, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            collection: collection.to_string(),
            embedder,
            points: RwLock::new(BTreeMap::new()),
        }
    }

    #[cfg(test)]
    pub async fn point_count(&self) -> usize {
        self.points.read().await.len()
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// UUID keys are held in lowercase hyphenated form so that any spelling of
/// the same UUID finds the same point, as it does in Qdrant.
fn storage_key(id: PointId) -> PointId {
    match id {
        PointId::Uuid(raw) => match uuid::Uuid::parse_str(&raw) {
            Ok(parsed) => PointId::Uuid(parsed.to_string()),
            Err(_) => PointId::Uuid(raw),
        },
        num => num,
    }
}

#[async_trait]
impl ExampleStore for InMemoryStore {
    async fn similarity_search(
        &self,
        text: &str,
        k: usize,
    ) -> Result<Vec<ExampleRecord>, StoreError> {
        let query = self
            .embedder
            .embed(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Backend("embedder returned no vector".to_string()))?;

        let points = self.points.read().await;
        let mut scored: Vec<(f32, &MemoryPoint)> = points
            .values()
            .map(|p| (cosine_similarity(&query, &p.vector), p))
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(_, p)| p.record.clone())
            .collect())
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

        // every vector is computed before the first write
        let texts: Vec<String> = records.iter().map(|r| r.nl.clone()).collect();
        let vectors = self.embedder.embed(&texts).await?;
        if vectors.len() != records.len() {
            return Err(StoreError::Backend(format!(
                "embedder returned {} vectors for {} records",
                vectors.len(),
                records.len()
            )));
        }

        let count = records.len();
        let mut points = self.points.write().await;
        for ((id, record), vector) in ids.into_iter().zip(records).zip(vectors) {
            points.insert(storage_key(id), MemoryPoint { record, vector });
        }

        debug!("Upserted {} points into {}", count, self.collection);
        Ok(count)
    }

    async fn scroll(&self, request: ScrollRequest) -> Result<ScrollPage, StoreError> {
        let points = self.points.read().await;

        let mut window: Vec<(&PointId, &MemoryPoint)> = match &request.offset {
            Some(offset) => points
                .range(storage_key(offset.clone())..)
                .take(request.limit + 1)
                .collect(),
            None => points.iter().take(request.limit + 1).collect(),
        };

        let next_offset = if window.len() > request.limit {
            window.pop().map(|(id, _)| id.clone())
        } else {
            None
        };

        let mut page = Vec::with_capacity(window.len());
        for (id, point) in window {
            let payload = if request.with_payload {
                Some(
                    serde_json::to_value(&point.record)
                        .map_err(|e| StoreError::Backend(e.to_string()))?,
                )
            } else {
                None
            };
            let vector = request
                .with_vectors
                .then(|| serde_json::Value::from(point.vector.clone()));

            page.push(StoredPoint {
                id: id.clone(),
                payload,
                vector,
            });
        }

        Ok(ScrollPage {
            points: page,
            next_offset,
        })
    }

    async fn delete(&self, id: &PointId) -> Result<DeleteStatus, StoreError> {
        match self.points.write().await.remove(&storage_key(id.clone())) {
            Some(_) => Ok(DeleteStatus::Completed),
            None => Ok(DeleteStatus::NotFound),
        }
    }

    fn collection(&self) -> &str {
        &self.collection
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::embedding::HashingEmbedder;
    use crate::store::ExampleMetadata;

    fn store() -> InMemoryStore {
        InMemoryStore::new("test", Arc::new(HashingEmbedder::new(128).unwrap()))
    }

    fn record(nl: &str) -> ExampleRecord {
        ExampleRecord {
            nl: nl.to_string(),
            metadata: ExampleMetadata::default(),
        }
    }

    #[tokio::test]
    async fn search_returns_nearest_first() {
        let store = store();
        store
            .add(
                vec![
                    record("total sales per country"),
                    record("list all albums by an artist"),
                    record("employees hired after 2003"),
                ],
                vec![PointId::Num(1), PointId::Num(2), PointId::Num(3)],
            )
            .await
            .unwrap();

        let hits = store.similarity_search("albums by artist", 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].nl, "list all albums by an artist");
    }

    #[tokio::test]
    async fn mismatched_batch_writes_nothing() {
        let store = store();
        let err = store
            .add(vec![record("a"), record("b")], vec![PointId::Num(1)])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Consistency { records: 2, ids: 1 }));
        assert_eq!(store.point_count().await, 0);
    }

    #[tokio::test]
    async fn scroll_orders_integers_before_uuids() {
        let store = store();
        let uuid = "00000000-0000-4000-8000-000000000001".to_string();
        store
            .add(
                vec![record("u"), record("ten"), record("two")],
                vec![PointId::Uuid(uuid.clone()), PointId::Num(10), PointId::Num(2)],
            )
            .await
            .unwrap();

        let page = store
            .scroll(ScrollRequest {
                limit: 10,
                offset: None,
                with_payload: false,
                with_vectors: true,
            })
            .await
            .unwrap();

        let ids: Vec<PointId> = page.points.iter().map(|p| p.id.clone()).collect();
        assert_eq!(ids, vec![PointId::Num(2), PointId::Num(10), PointId::Uuid(uuid)]);
        assert!(page.points[0].payload.is_none());
        assert!(page.points[0].vector.is_some());
        assert!(page.next_offset.is_none());
    }

    #[tokio::test]
    async fn uuid_keys_match_regardless_of_case() {
        let store = store();
        let upper = "9A1F0C3E-2B4D-4E6F-8A0B-1C2D3E4F5A6B";
        let lower = upper.to_lowercase();
        store
            .add(vec![record("u")], vec![PointId::Uuid(upper.to_string())])
            .await
            .unwrap();

        let page = store
            .scroll(ScrollRequest {
                limit: 10,
                offset: Some(PointId::Uuid(upper.to_string())),
                with_payload: false,
                with_vectors: false,
            })
            .await
            .unwrap();
        assert_eq!(page.points[0].id, PointId::Uuid(lower.clone()));

        assert_eq!(
            store.delete(&PointId::Uuid(lower.clone())).await.unwrap(),
            DeleteStatus::Completed
        );
        assert_eq!(
            store.delete(&PointId::Uuid(upper.to_string())).await.unwrap(),
            DeleteStatus::NotFound
        );
    }

    #[test]
    fn cosine_handles_degenerate_vectors() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 1.0], &[2.0, 2.0]) - 1.0).abs() < 1e-6);
    }
}
