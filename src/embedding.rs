//! Embedding provider abstraction and implementations.
//!
//! Defines the [`EmbeddingProvider`] trait and concrete implementations:
//! - **[`DisabledProvider`]**: returns errors; used when embeddings are not configured.
//! - **[`OpenAIProvider`]**: calls the OpenAI embeddings API with retry and backoff.
//! - **[`OllamaProvider`]**: calls a local Ollama instance's `/api/embed` endpoint.
//!
//! Also provides vector utilities for the SQLite vector store:
//! - [`l2_distance`]: Euclidean distance between two embedding vectors
//! - [`vec_to_blob`]: encode a `Vec<f32>` as little-endian bytes for SQLite BLOB storage
//! - [`blob_to_vec`]: decode a SQLite BLOB back into a `Vec<f32>`
//!
//! Every provider returns vectors of exactly [`EmbeddingProvider::dims`]
//! elements; a response of any other length is an
//! [`ServiceError::InvalidResponse`].

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::Value;

use crate::config::EmbeddingConfig;
use crate::error::ServiceError;
use crate::http;

const SERVICE: &str = "embedding";

/// Trait for embedding providers.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality (e.g. `1536`).
    fn dims(&self) -> usize;
    /// Embed one text. One call to the external service.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ServiceError>;
}

/// Create the provider selected by `embedding.provider`.
pub fn create_provider(config: &EmbeddingConfig) -> Result<Box<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledProvider)),
        "openai" => Ok(Box::new(OpenAIProvider::new(config)?)),
        "ollama" => Ok(Box::new(OllamaProvider::new(config)?)),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

// ============ Disabled Provider ============

/// A no-op embedding provider that always returns errors.
pub struct DisabledProvider;

#[async_trait]
impl EmbeddingProvider for DisabledProvider {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, ServiceError> {
        Err(ServiceError::Unavailable {
            service: SERVICE,
            reason: "embedding provider is disabled; set [embedding] provider in config".to_string(),
        })
    }
}

// ============ OpenAI Provider ============

/// Embedding provider using the OpenAI API.
///
/// Calls `POST {url}/v1/embeddings` (default `https://api.openai.com`).
/// Requires the `OPENAI_API_KEY` environment variable to be set.
pub struct OpenAIProvider {
    model: String,
    dims: usize,
    endpoint: String,
    api_key: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OpenAIProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for OpenAI provider"))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow::anyhow!("embedding.dims required for OpenAI provider"))?;

        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;

        let base = config.url.as_deref().unwrap_or("https://api.openai.com");
        let client = http::build_client(SERVICE, config.timeout_secs)?;

        Ok(Self {
            model,
            dims,
            endpoint: format!("{}/v1/embeddings", base.trim_end_matches('/')),
            api_key,
            max_retries: config.max_retries,
            client,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ServiceError> {
        let body = serde_json::json!({
            "model": self.model,
            "input": [text],
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
        let vec = parse_openai_response(&json)?;
        check_dims(self.dims, vec)
    }
}

/// Extract `data[0].embedding` from an OpenAI embeddings response.
fn parse_openai_response(json: &Value) -> Result<Vec<f32>, ServiceError> {
    let embedding = json
        .get("data")
        .and_then(|d| d.as_array())
        .and_then(|d| d.first())
        .and_then(|item| item.get("embedding"))
        .ok_or_else(|| invalid("missing data[0].embedding"))?;
    parse_vector(embedding)
}

// ============ Ollama Provider ============

/// Embedding provider using a local Ollama instance.
///
/// Calls `POST /api/embed` on the configured Ollama URL (default: `http://localhost:11434`).
pub struct OllamaProvider {
    model: String,
    dims: usize,
    endpoint: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for Ollama provider"))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow::anyhow!("embedding.dims required for Ollama provider"))?;
        let url = config.url.as_deref().unwrap_or("http://localhost:11434");
        let client = http::build_client(SERVICE, config.timeout_secs)?;

        Ok(Self {
            model,
            dims,
            endpoint: format!("{}/api/embed", url.trim_end_matches('/')),
            max_retries: config.max_retries,
            client,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ServiceError> {
        let body = serde_json::json!({
            "model": self.model,
            "input": [text],
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
        let vec = parse_ollama_response(&json)?;
        check_dims(self.dims, vec)
    }
}

fn parse_ollama_response(json: &Value) -> Result<Vec<f32>, ServiceError> {
    let embedding = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .and_then(|e| e.first())
        .ok_or_else(|| invalid("missing embeddings[0]"))?;
    parse_vector(embedding)
}

// ============ Shared helpers ============

fn invalid(reason: &str) -> ServiceError {
    ServiceError::InvalidResponse {
        service: SERVICE,
        reason: reason.to_string(),
    }
}

fn parse_vector(value: &Value) -> Result<Vec<f32>, ServiceError> {
    let items = value
        .as_array()
        .ok_or_else(|| invalid("embedding is not an array"))?;
    items
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| invalid("embedding contains a non-numeric value"))
        })
        .collect()
}

fn check_dims(expected: usize, vec: Vec<f32>) -> Result<Vec<f32>, ServiceError> {
    if vec.len() != expected {
        return Err(ServiceError::InvalidResponse {
            service: SERVICE,
            reason: format!("expected {} dimensions, got {}", expected, vec.len()),
        });
    }
    Ok(vec)
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// # Example
///
/// ```rust
/// use style_corpus::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12); // 3 × 4 bytes
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Euclidean (L2) distance between two vectors of equal length.
///
/// Callers check lengths first; mismatched lengths compare only the
/// common prefix.
pub fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum::<f32>()
        .sqrt()
}
