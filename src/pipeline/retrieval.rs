use crate::store::{Example, ExampleStore};
use std::sync::Arc;
use tracing::{debug, warn};

/// Best-effort few-shot lookup. Never fails; problems degrade to an empty list.
pub struct ExampleRetriever {
    store: Option<Arc<dyn ExampleStore>>,
    k: usize,
}

impl ExampleRetriever {
    pub fn new(store: Option<Arc<dyn ExampleStore>>, k: usize) -> Self {
        Self { store, k }
    }

    pub async fn retrieve(&self, text: &str) -> Vec<Example> {
        let Some(store) = &self.store else {
            return Vec::new();
        };
        if text.trim().is_empty() {
            return Vec::new();
        }

        match store.similarity_search(text, self.k).await {
            Ok(records) => {
                debug!("Retrieved {} similar examples", records.len());
                records.into_iter().map(Example::from).collect()
            }
            Err(e) => {
                warn!("Example retrieval failed, continuing without examples: {}", e);
                Vec::new()
            }
        }
    }
}
