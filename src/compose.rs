//! Style-grounded generation.
//!
//! Builds a context of the user's own writing, either by retrieving the
//! snippets nearest to the prompt or by sampling random windows from the
//! enriched corpus, and asks the generation service for a new piece in
//! that style.

use rand::Rng;
use tracing::{info, warn};

use crate::app::AppContext;
use crate::assemble::ContextAssembler;
use crate::config::{GenerationConfig, RetrievalConfig};
use crate::error::{Error, Result, ServiceError};
use crate::generation::{GenerationService, TextRequest};
use crate::records::{self, RecordStore};
use crate::retriever::SimilarityRetriever;
use crate::store::VectorStore;

const SYSTEM_PREAMBLE: &str = "You are a writing assistant that writes in the user's style. \
Below are snippets of the user's writing. When given a prompt, write a new piece in their \
style. Be authentic to their tone, structure, and voice.\n\nUSER'S WRITING SNIPPETS:\n";

/// How grounding context is gathered.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ContextMode {
    /// Nearest snippets to the prompt.
    Retrieval,
    /// Random windows from the enriched corpus.
    Sampling,
    /// Retrieval when an index is available, otherwise sampling.
    Auto,
}

impl ContextMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "retrieval" => Some(ContextMode::Retrieval),
            "sampling" => Some(ContextMode::Sampling),
            "auto" => Some(ContextMode::Auto),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContextMode::Retrieval => "retrieval",
            ContextMode::Sampling => "sampling",
            ContextMode::Auto => "auto",
        }
    }
}

pub fn system_prompt(context: &str) -> String {
    format!("{}{}", SYSTEM_PREAMBLE, context)
}

/// Context that was assembled and the mode that produced it.
#[derive(Debug, Clone)]
pub struct GroundingContext {
    pub mode: ContextMode,
    pub text: String,
}

pub struct StyleComposer<'a> {
    retriever: SimilarityRetriever<'a>,
    store: &'a dyn VectorStore,
    records: &'a dyn RecordStore,
    generator: &'a dyn GenerationService,
    retrieval: &'a RetrievalConfig,
    generation: &'a GenerationConfig,
    index_enabled: bool,
}

impl<'a> StyleComposer<'a> {
    pub fn new(
        retriever: SimilarityRetriever<'a>,
        store: &'a dyn VectorStore,
        records: &'a dyn RecordStore,
        generator: &'a dyn GenerationService,
        retrieval: &'a RetrievalConfig,
        generation: &'a GenerationConfig,
        index_enabled: bool,
    ) -> Self {
        Self {
            retriever,
            store,
            records,
            generator,
            retrieval,
            generation,
            index_enabled,
        }
    }

    pub async fn build_context<R: Rng + ?Sized>(
        &self,
        prompt: &str,
        mode: ContextMode,
        rng: &mut R,
    ) -> Result<GroundingContext> {
        if prompt.trim().is_empty() {
            return Err(Error::EmptyPrompt);
        }

        match mode {
            ContextMode::Retrieval => self.retrieval_context(prompt).await,
            ContextMode::Sampling => self.sampling_context(rng),
            ContextMode::Auto => {
                if self.index_enabled && self.store.count().await? > 0 {
                    match self.retrieval_context(prompt).await {
                        Err(Error::NoContextAvailable { reason }) => {
                            warn!(reason = %reason, "retrieval gave no context, sampling instead");
                            self.sampling_context(rng)
                        }
                        other => other,
                    }
                } else {
                    self.sampling_context(rng)
                }
            }
        }
    }

    /// Build context, then generate.
    pub async fn compose<R: Rng + ?Sized>(
        &self,
        prompt: &str,
        mode: ContextMode,
        rng: &mut R,
    ) -> Result<(GroundingContext, String)> {
        let context = self.build_context(prompt, mode, rng).await?;
        info!(
            mode = context.mode.as_str(),
            chars = context.text.chars().count(),
            "context assembled"
        );

        let system = system_prompt(&context.text);
        let reply = self
            .generator
            .generate_text(&TextRequest {
                model: &self.generation.compose_model,
                system_prompt: &system,
                user_prompt: prompt,
                max_tokens: self.generation.compose_max_tokens,
                temperature: self.generation.compose_temperature,
            })
            .await?;

        let text = reply.trim().to_string();
        if text.is_empty() {
            return Err(ServiceError::InvalidResponse {
                service: "generation",
                reason: "empty completion".to_string(),
            }
            .into());
        }
        Ok((context, text))
    }

    async fn retrieval_context(&self, prompt: &str) -> Result<GroundingContext> {
        let snippets = self
            .retriever
            .retrieve(prompt, self.retrieval.top_k)
            .await?;
        let assembler =
            ContextAssembler::new(self.retrieval.char_budget, self.retrieval.separator.as_str());
        Ok(GroundingContext {
            mode: ContextMode::Retrieval,
            text: assembler.assemble(&snippets)?,
        })
    }

    fn sampling_context<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<GroundingContext> {
        let texts: Vec<String> = records::load_records(self.records)?
            .into_iter()
            .map(|r| r.text)
            .collect();
        let assembler = ContextAssembler::new(
            self.retrieval.sample_char_budget,
            self.retrieval.separator.as_str(),
        )
        .with_min_snippet_len(self.retrieval.snippet_min_len);
        Ok(GroundingContext {
            mode: ContextMode::Sampling,
            text: assembler.sample(&texts, rng)?,
        })
    }
}

pub async fn run_compose(
    app: &AppContext,
    prompt: &str,
    mode: ContextMode,
    context_only: bool,
) -> anyhow::Result<()> {
    let composer = app.composer();
    let mut rng = rand::rng();

    if context_only {
        let context = composer.build_context(prompt, mode, &mut rng).await?;
        println!("{}", context.text);
        return Ok(());
    }

    if !app.config.generation.is_enabled() {
        anyhow::bail!("Generation provider is disabled. Set [generation] provider in config.");
    }

    let (context, text) = composer.compose(prompt, mode, &mut rng).await?;
    eprintln!(
        "compose: {} context, {} chars",
        context.mode.as_str(),
        context.text.chars().count()
    );
    println!("{}", text);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::EmbeddingProvider;
    use crate::models::{EnrichedRecord, NewEmbeddingRow};
    use crate::records::FsRecordStore;
    use crate::store::InMemoryStore;
    use async_trait::async_trait;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::Mutex;

    struct UnitEmbedder;

    #[async_trait]
    impl EmbeddingProvider for UnitEmbedder {
        fn model_name(&self) -> &str {
            "unit"
        }
        fn dims(&self) -> usize {
            1
        }
        async fn embed(&self, _text: &str) -> std::result::Result<Vec<f32>, ServiceError> {
            Ok(vec![0.0])
        }
    }

    struct Echo {
        systems: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl GenerationService for Echo {
        async fn generate_text(
            &self,
            request: &TextRequest<'_>,
        ) -> std::result::Result<String, ServiceError> {
            self.systems
                .lock()
                .unwrap()
                .push(request.system_prompt.to_string());
            Ok(format!("  piece about {}  ", request.user_prompt))
        }
    }

    struct Fixture {
        _tmp: tempfile::TempDir,
        records: FsRecordStore,
        store: InMemoryStore,
        generator: Echo,
        retrieval: RetrievalConfig,
        generation: GenerationConfig,
    }

    impl Fixture {
        fn new() -> Self {
            let tmp = tempfile::tempdir().unwrap();
            let records = FsRecordStore::new(tmp.path().join("processed"));
            Self {
                _tmp: tmp,
                records,
                store: InMemoryStore::new(1),
                generator: Echo {
                    systems: Mutex::new(Vec::new()),
                },
                retrieval: RetrievalConfig::default(),
                generation: GenerationConfig::default(),
            }
        }

        fn composer(&self, index_enabled: bool) -> StyleComposer<'_> {
            StyleComposer::new(
                SimilarityRetriever::new(&UnitEmbedder, &self.store),
                &self.store,
                &self.records,
                &self.generator,
                &self.retrieval,
                &self.generation,
                index_enabled,
            )
        }

        fn add_record(&self, name: &str, text: &str) {
            self.records
                .write(
                    &format!("{}.json", name),
                    &EnrichedRecord {
                        title: name.to_string(),
                        text: text.to_string(),
                        filename: format!("{}.txt", name),
                        content_hash: "h".to_string(),
                    },
                )
                .unwrap();
        }
    }

    #[test]
    fn test_parse_modes() {
        assert_eq!(ContextMode::parse("auto"), Some(ContextMode::Auto));
        assert_eq!(ContextMode::parse("sampling"), Some(ContextMode::Sampling));
        assert_eq!(ContextMode::parse("random"), None);
    }

    #[tokio::test]
    async fn test_empty_prompt_rejected() {
        let fx = Fixture::new();
        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(
            fx.composer(true)
                .build_context("  ", ContextMode::Sampling, &mut rng)
                .await,
            Err(Error::EmptyPrompt)
        ));
    }

    #[tokio::test]
    async fn test_auto_samples_when_index_is_empty() {
        let fx = Fixture::new();
        fx.add_record("a", "Hello world, this is a test document about gardening.");
        fx.add_record("b", &"We sailed past the lighthouse at dawn. ".repeat(25));

        let mut rng = StdRng::seed_from_u64(3);
        let context = fx
            .composer(true)
            .build_context("write about boats", ContextMode::Auto, &mut rng)
            .await
            .unwrap();
        assert_eq!(context.mode, ContextMode::Sampling);
        assert_eq!(context.text.chars().count(), 200);
        assert!(!context.text.contains("gardening"));
    }

    #[tokio::test]
    async fn test_sampling_without_long_text_has_no_context() {
        let fx = Fixture::new();
        fx.add_record("a", "too short");
        let mut rng = StdRng::seed_from_u64(3);
        assert!(matches!(
            fx.composer(false)
                .build_context("prompt", ContextMode::Sampling, &mut rng)
                .await,
            Err(Error::NoContextAvailable { .. })
        ));
    }

    #[tokio::test]
    async fn test_compose_uses_retrieved_context() {
        let fx = Fixture::new();
        fx.store
            .insert_batch(&[NewEmbeddingRow {
                text: "my salty sea prose".to_string(),
                vector: vec![0.0],
            }])
            .await
            .unwrap();

        let mut rng = StdRng::seed_from_u64(0);
        let (context, text) = fx
            .composer(true)
            .compose("storm", ContextMode::Auto, &mut rng)
            .await
            .unwrap();
        assert_eq!(context.mode, ContextMode::Retrieval);
        assert_eq!(text, "piece about storm");

        let systems = fx.generator.systems.lock().unwrap();
        assert!(systems[0].starts_with("You are a writing assistant"));
        assert!(systems[0].ends_with("USER'S WRITING SNIPPETS:\nmy salty sea prose"));
    }
}
