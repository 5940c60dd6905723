use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
};

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

use crate::pipeline::models::PipelineResult;
use crate::store::curation::{self, AddedExample, NewExample};
use crate::store::ids::parse_offset;
use crate::store::{ExampleStore, PointId, ScrollRequest, StoreError, StoredPoint};
use crate::web::state::AppState;

pub const MAX_PAGE_SIZE: usize = 1000;

// Health

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub database_status: String,
    pub vector_store_status: String,
    pub collection: Option<String>,
    pub uptime_seconds: i64,
}

// Question answering

#[derive(Debug, Deserialize)]
pub struct ProcessQueryRequest {
    pub user_question: String,
}

// Example curation

#[derive(Debug, Serialize, Deserialize)]
pub struct ImportResponse {
    pub message: String,
    pub added: usize,
}

#[derive(Debug, Serialize)]
pub struct AddSingleResponse {
    pub message: String,
    pub added_document_info: AddedExample,
}

#[derive(Debug, Deserialize)]
pub struct ListExamplesParams {
    #[serde(default = "default_limit")]
    pub limit: usize,
    pub offset: Option<String>,
    #[serde(default = "default_true")]
    pub with_payload: bool,
    #[serde(default)]
    pub with_vectors: bool,
}

fn default_limit() -> usize {
    10
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct ListExamplesResponse {
    pub points: Vec<StoredPoint>,
    pub next_offset: Option<String>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub message: String,
    pub point_id_deleted: PointId,
    pub details: Option<String>,
}

fn store_rejection(e: StoreError) -> (StatusCode, String) {
    let status = match &e {
        StoreError::Validation(_) => StatusCode::BAD_REQUEST,
        StoreError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!("Example store operation failed: {}", e);
    }
    (status, e.to_string())
}

fn require_store<'a>(
    state: &'a AppState,
    message: &str,
) -> Result<&'a dyn ExampleStore, (StatusCode, String)> {
    state
        .store
        .as_deref()
        .ok_or_else(|| (StatusCode::SERVICE_UNAVAILABLE, message.to_string()))
}

pub async fn health(state: State<Arc<AppState>>) -> Json<HealthResponse> {
    let database_status = if state.pipeline.has_database() {
        "connected"
    } else {
        "not connected"
    };
    let vector_store_status = if state.store.is_some() {
        "available"
    } else {
        "not available"
    };

    Json(HealthResponse {
        status: "ok".to_string(),
        database_status: database_status.to_string(),
        vector_store_status: vector_store_status.to_string(),
        collection: state.store.as_ref().map(|s| s.collection().to_string()),
        uptime_seconds: state.uptime_seconds(),
    })
}

/// Runs the full pipeline. Failures are reported inside the result, never as an HTTP error.
pub async fn process_query(
    state: State<Arc<AppState>>,
    Json(payload): Json<ProcessQueryRequest>,
) -> Json<PipelineResult> {
    info!("Processing question: {}", payload.user_question);
    Json(state.pipeline.process(&payload.user_question).await)
}

pub async fn add_examples(
    state: State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<ImportResponse>, (StatusCode, String)> {
    let store = require_store(&state, "Vector store is not available.")?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?
    {
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };

        if !file_name.ends_with(".json") {
            return Err((
                StatusCode::BAD_REQUEST,
                "Invalid file type. Please upload a JSON file.".to_string(),
            ));
        }

        let data = field
            .bytes()
            .await
            .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

        let items = curation::parse_examples_document(&data).map_err(store_rejection)?;
        let summary = curation::import_examples(store, items)
            .await
            .map_err(store_rejection)?;

        return Ok(Json(ImportResponse {
            message: format!(
                "Successfully processed file '{}'. Added {} documents to the vector store.",
                file_name, summary.added
            ),
            added: summary.added,
        }));
    }

    Err((
        StatusCode::BAD_REQUEST,
        "No file provided in the request".to_string(),
    ))
}

pub async fn add_single_example(
    state: State<Arc<AppState>>,
    Json(example): Json<NewExample>,
) -> Result<Json<AddSingleResponse>, (StatusCode, String)> {
    let store = require_store(&state, "Vector store is not available for adding examples.")?;

    let added = curation::add_single_example(store, example)
        .await
        .map_err(store_rejection)?;

    Ok(Json(AddSingleResponse {
        message: "Successfully added single example to the vector store.".to_string(),
        added_document_info: added,
    }))
}

pub async fn get_all_examples(
    state: State<Arc<AppState>>,
    Query(params): Query<ListExamplesParams>,
) -> Result<Json<ListExamplesResponse>, (StatusCode, String)> {
    let store = require_store(&state, "Vector store is not available.")?;

    if params.limit == 0 || params.limit > MAX_PAGE_SIZE {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("limit must be between 1 and {}", MAX_PAGE_SIZE),
        ));
    }

    let offset = match params.offset.as_deref().filter(|o| !o.is_empty()) {
        Some(raw) => Some(parse_offset(raw).map_err(store_rejection)?),
        None => None,
    };

    let page = curation::list_examples(
        store,
        ScrollRequest {
            limit: params.limit,
            offset,
            with_payload: params.with_payload,
            with_vectors: params.with_vectors,
        },
    )
    .await
    .map_err(store_rejection)?;

    Ok(Json(ListExamplesResponse {
        count: page.points.len(),
        next_offset: page.next_offset.map(|id| id.to_string()),
        points: page.points,
    }))
}

pub async fn delete_example(
    state: State<Arc<AppState>>,
    Path(point_id): Path<String>,
) -> Result<Json<DeleteResponse>, (StatusCode, String)> {
    let store = require_store(&state, "Vector store is not available.")?;

    let deleted = curation::delete_example(store, &point_id)
        .await
        .map_err(store_rejection)?;

    Ok(Json(DeleteResponse {
        message: format!("Deleted point with ID '{}'.", point_id),
        point_id_deleted: deleted.id,
        details: Some(format!("status: {}", deleted.status)),
    }))
}
