use crate::config::EmbeddingConfig;
use crate::llm::LlmError;
use crate::llm::providers::remote::AuthScheme;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_OLLAMA_EMBEDDINGS_URL: &str = "http://localhost:11434/api/embeddings";

#[async_trait]
pub trait Embedder: Send + Sync {
    /// One vector per input text, in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError>;
}

pub fn build_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>, LlmError> {
    info!("Initializing embedder with backend: {}", config.backend);

    let embedder: Arc<dyn Embedder> = match config.backend.as_str() {
        "hashing" => Arc::new(HashingEmbedder::new(config.dimension)?),
        "ollama" => Arc::new(OllamaEmbedder::new(config)),
        "remote" => Arc::new(RemoteEmbedder::new(config)?),
        other => {
            return Err(LlmError::ConfigError(format!(
                "Unsupported embedding backend: {}",
                other
            )));
        }
    };

    Ok(embedder)
}

/// Offline embedder: hashes lowercase word tokens into a fixed number of buckets.
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Result<Self, LlmError> {
        if dimension == 0 {
            return Err(LlmError::ConfigError(
                "Hashing embedder dimension must be positive".to_string(),
            ));
        }
        Ok(Self { dimension })
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let hash = fnv1a(token.to_lowercase().as_bytes());
            let bucket = (hash % self.dimension as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in bytes {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

pub struct OllamaEmbedder {
    client: reqwest::Client,
    api_url: String,
    model: String,
}

#[derive(Serialize)]
struct OllamaEmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct OllamaEmbeddingResponse {
    embedding: Vec<f32>,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: config
                .api_url
                .clone()
                .unwrap_or_else(|| DEFAULT_OLLAMA_EMBEDDINGS_URL.to_string()),
            model: config.model.clone(),
        }
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        let mut vectors = Vec::with_capacity(texts.len());

        // the endpoint takes a single prompt per call
        for text in texts {
            let response = self
                .client
                .post(&self.api_url)
                .json(&OllamaEmbeddingRequest {
                    model: &self.model,
                    prompt: text,
                })
                .send()
                .await
                .map_err(|e| LlmError::ConnectionError(e.to_string()))?;

            if !response.status().is_success() {
                return Err(LlmError::ResponseError(format!(
                    "Ollama embeddings API responded with status code: {}",
                    response.status()
                )));
            }

            let parsed: OllamaEmbeddingResponse = response
                .json()
                .await
                .map_err(|e| LlmError::ResponseError(e.to_string()))?;
            vectors.push(parsed.embedding);
        }

        debug!("Embedded {} texts with Ollama model {}", vectors.len(), self.model);
        Ok(vectors)
    }
}

/// OpenAI-compatible `/embeddings` endpoint.
pub struct RemoteEmbedder {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    auth: AuthScheme,
    model: String,
}

#[derive(Serialize)]
struct RemoteEmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct RemoteEmbeddingResponse {
    data: Vec<RemoteEmbedding>,
}

#[derive(Deserialize)]
struct RemoteEmbedding {
    embedding: Vec<f32>,
    index: usize,
}

impl RemoteEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, LlmError> {
        let api_url = config.api_url.clone().ok_or_else(|| {
            LlmError::ConfigError("API URL is required for remote embeddings".to_string())
        })?;
        let api_key = config.api_key.clone().ok_or_else(|| {
            LlmError::ConfigError("API key is required for remote embeddings".to_string())
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| LlmError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            api_url,
            api_key,
            auth: AuthScheme::parse(&config.auth_scheme)?,
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl Embedder for RemoteEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .auth
            .apply(self.client.post(&self.api_url), &self.api_key)
            .json(&RemoteEmbeddingRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .await
            .map_err(|e| LlmError::ConnectionError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(LlmError::ResponseError(format!(
                "Embeddings API responded with status code: {}",
                response.status()
            )));
        }

        let mut parsed: RemoteEmbeddingResponse = response
            .json()
            .await
            .map_err(|e| LlmError::ResponseError(e.to_string()))?;

        if parsed.data.len() != texts.len() {
            return Err(LlmError::ResponseError(format!(
                "Expected {} embeddings, received {}",
                texts.len(),
                parsed.data.len()
            )));
        }

        parsed.data.sort_by_key(|e| e.index);
        Ok(parsed.data.into_iter().map(|e| e.embedding).collect())
    }
}
