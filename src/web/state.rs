use crate::pipeline::Pipeline;
use crate::store::ExampleStore;
use std::sync::Arc;
use tracing::info;

/// Shared application state for the web server
pub struct AppState {
    pub pipeline: Pipeline,
    pub store: Option<Arc<dyn ExampleStore>>,
    pub startup_time: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    pub fn new(pipeline: Pipeline, store: Option<Arc<dyn ExampleStore>>) -> Self {
        info!(
            "Application state ready (database: {}, vector store: {})",
            pipeline.has_database(),
            store.is_some()
        );

        Self {
            pipeline,
            store,
            startup_time: chrono::Utc::now(),
        }
    }

    pub fn uptime_seconds(&self) -> i64 {
        chrono::Utc::now()
            .signed_duration_since(self.startup_time)
            .num_seconds()
    }
}
