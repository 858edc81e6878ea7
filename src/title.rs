//! Title enrichment.
//!
//! Asks the generation service for a short title from the filename and the
//! leading content. Any failure degrades to the filename stem so the record
//! can still be written with a valid digest.

use tracing::warn;

use crate::config::GenerationConfig;
use crate::error::ServiceError;
use crate::generation::{GenerationService, TextRequest};
use crate::models::file_stem;

/// Characters of content shown to the model.
pub const TITLE_CONTEXT_CHARS: usize = 1000;

const SYSTEM_PROMPT: &str =
    "You are a helpful assistant that generates concise, descriptive titles for documents.";

/// A title and whether it came from the model or the fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Title {
    Generated(String),
    Fallback(String),
}

impl Title {
    pub fn into_string(self) -> String {
        match self {
            Title::Generated(s) | Title::Fallback(s) => s,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Title::Fallback(_))
    }
}

pub struct TitleEnricher<'a> {
    generator: &'a dyn GenerationService,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl<'a> TitleEnricher<'a> {
    pub fn new(generator: &'a dyn GenerationService, config: &GenerationConfig) -> Self {
        Self {
            generator,
            model: config.title_model.clone(),
            max_tokens: config.title_max_tokens,
            temperature: config.title_temperature,
        }
    }

    /// One generation call; an empty reply counts as a failure.
    pub async fn generate(&self, filename: &str, content: &str) -> Result<String, ServiceError> {
        let user_prompt = title_prompt(filename, content);
        let reply = self
            .generator
            .generate_text(&TextRequest {
                model: &self.model,
                system_prompt: SYSTEM_PROMPT,
                user_prompt: &user_prompt,
                max_tokens: self.max_tokens,
                temperature: self.temperature,
            })
            .await?;

        let title = clean_title(&reply);
        if title.is_empty() {
            return Err(ServiceError::InvalidResponse {
                service: "generation",
                reason: "empty title".to_string(),
            });
        }
        Ok(title)
    }

    /// Never fails: falls back to [`fallback_title`] and logs why.
    pub async fn title_for(&self, filename: &str, content: &str) -> Title {
        match self.generate(filename, content).await {
            Ok(title) => Title::Generated(title),
            Err(e) => {
                warn!(filename, error = %e, "title generation failed, using filename");
                Title::Fallback(fallback_title(filename))
            }
        }
    }
}

/// Filename without extension.
pub fn fallback_title(filename: &str) -> String {
    file_stem(filename)
}

fn title_prompt(filename: &str, content: &str) -> String {
    let head: String = content.chars().take(TITLE_CONTEXT_CHARS).collect();
    format!(
        "Given this filename: \"{}\" and the following content, generate a concise, descriptive \
         title (max 10 words) that captures the main topic or theme:\n\nContent:\n{}...\n\n\
         Please provide only the title, nothing else.",
        filename, head
    )
}

fn clean_title(reply: &str) -> String {
    reply
        .trim()
        .trim_matches('"')
        .trim_matches('\'')
        .trim()
        .to_string()
}
