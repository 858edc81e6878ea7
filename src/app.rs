//! Application context.
//!
//! Everything a command needs (configuration, record store, service
//! clients, vector store) is built once by [`AppContext::open`] and lent to
//! each component. [`AppContext::close`] releases the database pool.

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tracing::debug;

use crate::compose::StyleComposer;
use crate::config::Config;
use crate::db;
use crate::embedding::{self, EmbeddingProvider};
use crate::generation::{self, GenerationService};
use crate::indexer::EmbeddingIndexer;
use crate::migrate;
use crate::processor::IncrementalProcessor;
use crate::records::FsRecordStore;
use crate::retriever::SimilarityRetriever;
use crate::store::{SqliteStore, VectorStore};
use crate::title::TitleEnricher;

pub struct AppContext {
    pub config: Config,
    pub records: FsRecordStore,
    pub embedder: Box<dyn EmbeddingProvider>,
    pub generator: Box<dyn GenerationService>,
    pub store: Box<dyn VectorStore>,
    pool: Option<SqlitePool>,
}

impl AppContext {
    /// Connect to the database, ensure the schema, and build the service
    /// clients named in `config`.
    pub async fn open(config: Config) -> Result<Self> {
        let embedder =
            embedding::create_provider(&config.embedding).context("creating embedding provider")?;
        let generator = generation::create_generator(&config.generation)
            .context("creating generation provider")?;

        let pool = db::connect(&config)
            .await
            .with_context(|| format!("opening database {}", config.db.path.display()))?;
        migrate::run_migrations(&pool).await?;

        let store = SqliteStore::new(
            pool.clone(),
            config.retrieval.collection.clone(),
            embedder.dims(),
        );
        debug!(
            db = %config.db.path.display(),
            collection = %config.retrieval.collection,
            embedding_model = embedder.model_name(),
            "application context opened"
        );

        Ok(Self {
            records: FsRecordStore::new(config.corpus.output_dir.clone()),
            config,
            embedder,
            generator,
            store: Box::new(store),
            pool: Some(pool),
        })
    }

    /// Assemble a context from existing parts, with no database pool.
    pub fn from_parts(
        config: Config,
        embedder: Box<dyn EmbeddingProvider>,
        generator: Box<dyn GenerationService>,
        store: Box<dyn VectorStore>,
    ) -> Self {
        Self {
            records: FsRecordStore::new(config.corpus.output_dir.clone()),
            config,
            embedder,
            generator,
            store,
            pool: None,
        }
    }

    pub async fn close(self) {
        if let Some(pool) = self.pool {
            pool.close().await;
        }
    }

    pub fn title_enricher(&self) -> TitleEnricher<'_> {
        TitleEnricher::new(self.generator.as_ref(), &self.config.generation)
    }

    pub fn processor(&self) -> IncrementalProcessor<'_> {
        IncrementalProcessor::new(&self.records, self.title_enricher())
            .with_concurrency(self.config.corpus.concurrency)
    }

    pub fn indexer(&self) -> EmbeddingIndexer<'_> {
        EmbeddingIndexer::new(
            self.embedder.as_ref(),
            self.store.as_ref(),
            self.config.embedding.batch_size,
        )
    }

    pub fn retriever(&self) -> SimilarityRetriever<'_> {
        SimilarityRetriever::new(self.embedder.as_ref(), self.store.as_ref())
    }

    pub fn composer(&self) -> StyleComposer<'_> {
        StyleComposer::new(
            self.retriever(),
            self.store.as_ref(),
            &self.records,
            self.generator.as_ref(),
            &self.config.retrieval,
            &self.config.generation,
            self.config.embedding.is_enabled(),
        )
    }
}
