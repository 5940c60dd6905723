use crate::config::LlmConfig;
use crate::llm::{LanguageModel, LlmError};
use async_trait::async_trait;
use reqwest::RequestBuilder;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

/// How the API key travels: `Authorization: Bearer` (OpenAI) or an `api-key` header (Azure).
#[derive(Debug, Clone)]
pub enum AuthScheme {
    Bearer,
    ApiKeyHeader,
}

impl AuthScheme {
    pub fn parse(value: &str) -> Result<Self, LlmError> {
        match value {
            "bearer" => Ok(Self::Bearer),
            "api-key" => Ok(Self::ApiKeyHeader),
            other => Err(LlmError::ConfigError(format!("Unsupported auth scheme: {}", other))),
        }
    }

    pub fn apply(&self, request: RequestBuilder, api_key: &str) -> RequestBuilder {
        match self {
            Self::Bearer => request.header("Authorization", format!("Bearer {}", api_key)),
            Self::ApiKeyHeader => request.header("api-key", api_key),
        }
    }
}

/// OpenAI-compatible chat completions endpoint (including Azure OpenAI deployments).
pub struct RemoteLlmProvider {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    auth: AuthScheme,
    model: String,
    temperature: f32,
}

#[derive(Serialize)]
struct PromptRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
    max_tokens: usize,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct PromptResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl RemoteLlmProvider {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_url = config.api_url.clone().ok_or_else(|| {
            LlmError::ConfigError("API URL is required for remote LLM provider".to_string())
        })?;

        let api_key = config.api_key.clone().ok_or_else(|| {
            LlmError::ConfigError("API key is required for remote LLM provider".to_string())
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
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl LanguageModel for RemoteLlmProvider {
    async fn complete(&self, prompt: &str) -> Result<Option<String>, LlmError> {
        let request = PromptRequest {
            model: &self.model,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
            max_tokens: 2000,
        };

        debug!("Sending {} prompt chars to remote model {}", prompt.len(), self.model);

        let response = self
            .auth
            .apply(self.client.post(&self.api_url), &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::ConnectionError(e.to_string()))?;

        if !response.status().is_success() {
            error!("Remote LLM API responded with status code: {}", response.status());
            return Err(LlmError::ResponseError(format!(
                "API responded with status code: {}",
                response.status()
            )));
        }

        let prompt_response: PromptResponse = response
            .json()
            .await
            .map_err(|e| LlmError::ResponseError(e.to_string()))?;

        let choice = prompt_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::ResponseError("No choices in response".to_string()))?;

        Ok(choice.message.content)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_scheme_parses_known_values() {
        assert!(matches!(AuthScheme::parse("bearer"), Ok(AuthScheme::Bearer)));
        assert!(matches!(AuthScheme::parse("api-key"), Ok(AuthScheme::ApiKeyHeader)));
        assert!(AuthScheme::parse("basic").is_err());
    }

    #[test]
    fn response_without_content_is_none() {
        let body = r#"{"choices":[{"message":{"role":"assistant"}}]}"#;
        let parsed: PromptResponse = serde_json::from_str(body).unwrap();
        assert!(parsed.choices[0].message.content.is_none());
    }
}
