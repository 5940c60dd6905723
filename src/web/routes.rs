use axum::{
    Router,
    routing::{delete, get, post},
};
use std::sync::Arc;

use super::handlers;
use super::state::AppState;

pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(handlers::api::health))
        // Question answering
        .route("/process-query", post(handlers::api::process_query))
        // Example curation
        .route("/add-examples", post(handlers::api::add_examples))
        .route("/add-single-example", post(handlers::api::add_single_example))
        .route("/get-all-examples", get(handlers::api::get_all_examples))
        .route("/delete-example/{point_id}", delete(handlers::api::delete_example))
}
