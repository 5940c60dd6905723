use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};

mod config;
mod db;
mod llm;
mod pipeline;
mod schema;
mod store;
mod util;
mod web;

use crate::config::{AppConfig, CliArgs};
use crate::db::Database;
use crate::db::db_pool::DuckDbDatabase;
use crate::llm::ModelRoles;
use crate::llm::embedding::build_embedder;
use crate::pipeline::Pipeline;
use crate::schema::SchemaCatalog;
use crate::store::build_store;
use crate::util::logging::init_tracing;
use crate::web::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    init_tracing();

    // Parse command line arguments
    let args = CliArgs::parse();

    // Load configuration
    let config = match AppConfig::new(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    let catalog = SchemaCatalog::load(config.schema.path.as_deref())?;
    info!("Schema catalog has {} tables", catalog.tables().len());

    let models = ModelRoles::from_config(&config)?;

    let embedder = build_embedder(&config.embedding)?;
    let store = build_store(config.vector_store.as_ref(), embedder)?;

    let database: Option<Arc<dyn Database>> = match &config.database {
        Some(db_config) => Some(Arc::new(DuckDbDatabase::new(db_config)?)),
        None => {
            info!("No database configured; generated SQL will not be executed");
            None
        }
    };

    let pipeline = Pipeline::new(
        &catalog,
        models,
        store.clone(),
        database,
        &config.pipeline,
    );
    let app_state = Arc::new(AppState::new(pipeline, store));

    // Start the web server
    info!("Starting NL-SQL server on {}:{}", config.web.host, config.web.port);
    match web::run_server(config.web.clone(), app_state).await {
        Ok(_) => info!("Server stopped gracefully"),
        Err(e) => {
            error!("Server error: {}", e);
            return Err(e.into());
        }
    }

    Ok(())
}
