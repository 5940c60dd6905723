use clap::Parser;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    pub connection_string: String,
    pub pool_size: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            connection_string: "chinook.duckdb".to_string(),
            pool_size: 5,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LlmConfig {
    pub backend: String, // "remote" or "ollama"
    pub model: String,
    pub api_key: Option<String>,
    pub api_url: Option<String>,
    pub auth_scheme: String, // "bearer" or "api-key"
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            backend: "ollama".to_string(),
            model: "llama3.1".to_string(),
            api_key: None,
            api_url: None,
            auth_scheme: "bearer".to_string(),
            temperature: 0.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub backend: String, // "ollama", "remote" or "hashing"
    pub model: String,
    pub api_key: Option<String>,
    pub api_url: Option<String>,
    pub auth_scheme: String,
    pub dimension: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: "hashing".to_string(),
            model: "nomic-embed-text".to_string(),
            api_key: None,
            api_url: None,
            auth_scheme: "bearer".to_string(),
            dimension: 256,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct VectorStoreConfig {
    pub backend: String, // "qdrant" or "memory"
    pub url: String,
    pub api_key: Option<String>,
    pub collection: String,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            backend: "memory".to_string(),
            url: "http://localhost:6333".to_string(),
            api_key: None,
            collection: "nl_sql_examples".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct SchemaConfig {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PipelineConfig {
    pub top_k: usize,
    pub prompt_preview_chars: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            top_k: 3,
            prompt_preview_chars: 1000,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub web: WebConfig,
    pub llm: LlmConfig,
    pub sql_llm: Option<LlmConfig>,
    pub answer_llm: Option<LlmConfig>,
    pub embedding: EmbeddingConfig,
    pub vector_store: Option<VectorStoreConfig>,
    pub database: Option<DatabaseConfig>,
    pub schema: SchemaConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Commented schema file used instead of the built-in catalog
    #[arg(long, value_name = "FILE")]
    pub schema: Option<PathBuf>,
}

impl AppConfig {
    pub fn new(args: &CliArgs) -> Result<Self, ConfigError> {
        let mut config_builder = Config::builder();

        if let Some(config_path) = &args.config {
            config_builder = config_builder.add_source(File::from(config_path.as_path()));
        } else {
            let default_locations = [
                "config.toml",
                "config/config.toml",
                "/etc/nl-sql/config.toml",
            ];

            if let Some(location) = default_locations.iter().find(|l| Path::new(l).exists()) {
                config_builder =
                    config_builder.add_source(File::new(location, config::FileFormat::Toml));
            }
        }

        // NL_SQL_LLM__API_KEY=... overrides llm.api_key, and so on
        config_builder = config_builder.add_source(
            Environment::with_prefix("NL_SQL")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let mut config: AppConfig = config_builder.build()?.try_deserialize()?;

        if let Some(host) = &args.host {
            config.web.host = host.clone();
        }
        if let Some(port) = args.port {
            config.web.port = port;
        }
        if let Some(schema) = &args.schema {
            config.schema.path = Some(schema.clone());
        }

        Ok(config)
    }
}
