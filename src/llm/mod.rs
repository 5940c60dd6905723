pub mod embedding;
pub mod providers;

use crate::config::{AppConfig, LlmConfig};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM connection error: {0}")]
    ConnectionError(String),
    #[error("LLM response error: {0}")]
    ResponseError(String),
    #[error("LLM configuration error: {0}")]
    ConfigError(String),
}

/// A text-completion backend. `Ok(None)` means the backend answered without an output field.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<Option<String>, LlmError>;

    fn name(&self) -> &str;
}

/// The three model roles the pipeline calls; any of them may share a backend.
#[derive(Clone)]
pub struct ModelRoles {
    pub analysis: Arc<dyn LanguageModel>,
    pub sql: Arc<dyn LanguageModel>,
    pub answer: Arc<dyn LanguageModel>,
}

impl ModelRoles {
    pub fn from_config(config: &AppConfig) -> Result<Self, LlmError> {
        let analysis = build_model(&config.llm)?;

        let sql = match &config.sql_llm {
            Some(sql_config) => build_model(sql_config)?,
            None => Arc::clone(&analysis),
        };
        let answer = match &config.answer_llm {
            Some(answer_config) => build_model(answer_config)?,
            None => Arc::clone(&analysis),
        };

        info!(
            "Model roles: analysis={}, sql={}, answer={}",
            analysis.name(),
            sql.name(),
            answer.name()
        );

        Ok(Self {
            analysis,
            sql,
            answer,
        })
    }
}

pub fn build_model(config: &LlmConfig) -> Result<Arc<dyn LanguageModel>, LlmError> {
    let model: Arc<dyn LanguageModel> = match config.backend.as_str() {
        "remote" => Arc::new(providers::remote::RemoteLlmProvider::new(config)?),
        "ollama" => Arc::new(providers::ollama::OllamaProvider::new(config)?),
        _ => {
            return Err(LlmError::ConfigError(format!(
                "Unsupported LLM backend: {}",
                config.backend
            )));
        }
    };

    Ok(model)
}
