//! Text generation service used for titles and composed pieces.
//!
//! [`GenerationService`] is the narrow interface the pipeline consumes;
//! providers mirror the embedding ones (OpenAI chat completions, Ollama
//! `/api/chat`, disabled).

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::Value;

use crate::config::GenerationConfig;
use crate::error::ServiceError;
use crate::http;

const SERVICE: &str = "generation";

/// One chat-style generation call.
#[derive(Debug, Clone)]
pub struct TextRequest<'a> {
    pub model: &'a str,
    pub system_prompt: &'a str,
    pub user_prompt: &'a str,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[async_trait]
pub trait GenerationService: Send + Sync {
    async fn generate_text(&self, request: &TextRequest<'_>) -> Result<String, ServiceError>;
}

pub fn create_generator(config: &GenerationConfig) -> Result<Box<dyn GenerationService>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledGenerator)),
        "openai" => Ok(Box::new(OpenAIGenerator::new(config)?)),
        "ollama" => Ok(Box::new(OllamaGenerator::new(config)?)),
        other => bail!("Unknown generation provider: {}", other),
    }
}

/// Always fails; titles fall back to the filename stem.
pub struct DisabledGenerator;

#[async_trait]
impl GenerationService for DisabledGenerator {
    async fn generate_text(&self, _request: &TextRequest<'_>) -> Result<String, ServiceError> {
        Err(ServiceError::Unavailable {
            service: SERVICE,
            reason: "generation provider is disabled; set [generation] provider in config"
                .to_string(),
        })
    }
}

/// OpenAI `POST /v1/chat/completions`. Requires `OPENAI_API_KEY`.
pub struct OpenAIGenerator {
    endpoint: String,
    api_key: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OpenAIGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
        let base = config.url.as_deref().unwrap_or("https://api.openai.com");
        Ok(Self {
            endpoint: format!("{}/v1/chat/completions", base.trim_end_matches('/')),
            api_key,
            max_retries: config.max_retries,
            client: http::build_client(SERVICE, config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl GenerationService for OpenAIGenerator {
    async fn generate_text(&self, request: &TextRequest<'_>) -> Result<String, ServiceError> {
        let body = serde_json::json!({
            "model": request.model,
            "messages": [
                { "role": "system", "content": request.system_prompt },
                { "role": "user", "content": request.user_prompt },
            ],
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
        });
        let json = http::post_json(
            &self.client,
            SERVICE,
            &self.endpoint,
            Some(&self.api_key),
            &body,
            self.max_retries,
        )
        .await?;
        extract_content(&json, "/choices/0/message/content")
    }
}

/// Ollama `POST /api/chat` with streaming off.
pub struct OllamaGenerator {
    endpoint: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OllamaGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let url = config.url.as_deref().unwrap_or("http://localhost:11434");
        Ok(Self {
            endpoint: format!("{}/api/chat", url.trim_end_matches('/')),
            max_retries: config.max_retries,
            client: http::build_client(SERVICE, config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl GenerationService for OllamaGenerator {
    async fn generate_text(&self, request: &TextRequest<'_>) -> Result<String, ServiceError> {
        let body = serde_json::json!({
            "model": request.model,
            "stream": false,
            "messages": [
                { "role": "system", "content": request.system_prompt },
                { "role": "user", "content": request.user_prompt },
            ],
            "options": {
                "temperature": request.temperature,
                "num_predict": request.max_tokens,
            },
        });
        let json = http::post_json(
            &self.client,
            SERVICE,
            &self.endpoint,
            None,
            &body,
            self.max_retries,
        )
        .await?;
        extract_content(&json, "/message/content")
    }
}

fn extract_content(json: &Value, pointer: &str) -> Result<String, ServiceError> {
    json.pointer(pointer)
        .and_then(|c| c.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| ServiceError::InvalidResponse {
            service: SERVICE,
            reason: format!("missing {}", pointer),
        })
}
