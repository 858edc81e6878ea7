use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorpusConfig {
    #[serde(default = "default_source_dir")]
    pub source_dir: PathBuf,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            source_dir: default_source_dir(),
            output_dir: default_output_dir(),
            include_globs: default_include_globs(),
            concurrency: default_concurrency(),
        }
    }
}

fn default_source_dir() -> PathBuf {
    PathBuf::from("./corpus")
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("./processed_corpus")
}
fn default_include_globs() -> Vec<String> {
    vec!["*.txt".to_string()]
}
fn default_concurrency() -> usize {
    1
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_title_model")]
    pub title_model: String,
    #[serde(default = "default_compose_model")]
    pub compose_model: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_title_max_tokens")]
    pub title_max_tokens: u32,
    #[serde(default = "default_title_temperature")]
    pub title_temperature: f32,
    #[serde(default = "default_compose_max_tokens")]
    pub compose_max_tokens: u32,
    #[serde(default = "default_compose_temperature")]
    pub compose_temperature: f32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            title_model: default_title_model(),
            compose_model: default_compose_model(),
            url: None,
            title_max_tokens: default_title_max_tokens(),
            title_temperature: default_title_temperature(),
            compose_max_tokens: default_compose_max_tokens(),
            compose_temperature: default_compose_temperature(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl GenerationConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_title_model() -> String {
    "gpt-3.5-turbo".to_string()
}
fn default_compose_model() -> String {
    "gpt-4o".to_string()
}
fn default_title_max_tokens() -> u32 {
    50
}
fn default_title_temperature() -> f32 {
    0.3
}
fn default_compose_max_tokens() -> u32 {
    1024
}
fn default_compose_temperature() -> f32 {
    0.7
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_char_budget")]
    pub char_budget: usize,
    #[serde(default = "default_sample_char_budget")]
    pub sample_char_budget: usize,
    #[serde(default = "default_snippet_min_len")]
    pub snippet_min_len: usize,
    #[serde(default = "default_separator")]
    pub separator: String,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            collection: default_collection(),
            top_k: default_top_k(),
            char_budget: default_char_budget(),
            sample_char_budget: default_sample_char_budget(),
            snippet_min_len: default_snippet_min_len(),
            separator: default_separator(),
        }
    }
}

fn default_collection() -> String {
    "blog_style".to_string()
}
fn default_top_k() -> usize {
    5
}
fn default_char_budget() -> usize {
    8000
}
fn default_sample_char_budget() -> usize {
    1200
}
fn default_snippet_min_len() -> usize {
    200
}
fn default_separator() -> String {
    "\n---\n".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    // Validate corpus
    if config.corpus.concurrency == 0 {
        anyhow::bail!("corpus.concurrency must be >= 1");
    }
    if config.corpus.include_globs.is_empty() {
        anyhow::bail!("corpus.include_globs must not be empty");
    }

    // Validate retrieval
    if config.retrieval.top_k < 1 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }
    if config.retrieval.snippet_min_len < 1 {
        anyhow::bail!("retrieval.snippet_min_len must be >= 1");
    }
    if config.retrieval.sample_char_budget < config.retrieval.snippet_min_len {
        anyhow::bail!(
            "retrieval.sample_char_budget ({}) must be >= retrieval.snippet_min_len ({})",
            config.retrieval.sample_char_budget,
            config.retrieval.snippet_min_len
        );
    }
    if config.retrieval.collection.trim().is_empty() {
        anyhow::bail!("retrieval.collection must not be empty");
    }

    // Validate embedding
    if config.embedding.is_enabled() {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.batch_size == 0 {
            anyhow::bail!("embedding.batch_size must be > 0");
        }
    }

    for (section, provider) in [
        ("embedding", config.embedding.provider.as_str()),
        ("generation", config.generation.provider.as_str()),
    ] {
        match provider {
            "disabled" | "openai" | "ollama" => {}
            other => anyhow::bail!(
                "Unknown {} provider: '{}'. Must be disabled, openai, or ollama.",
                section,
                other
            ),
        }
    }

    Ok(())
}
