//! Similarity retrieval over the vector store.

use tracing::{debug, warn};

use crate::app::AppContext;
use crate::embedding::EmbeddingProvider;
use crate::error::RetrievalError;
use crate::models::Neighbor;
use crate::store::VectorStore;

pub struct SimilarityRetriever<'a> {
    embedder: &'a dyn EmbeddingProvider,
    store: &'a dyn VectorStore,
}

impl<'a> SimilarityRetriever<'a> {
    pub fn new(embedder: &'a dyn EmbeddingProvider, store: &'a dyn VectorStore) -> Self {
        Self { embedder, store }
    }

    /// Texts of the `k` nearest rows, nearest first.
    ///
    /// An empty store gives an empty result. A blank query or `k == 0`
    /// returns empty without calling the embedding service.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<String>, RetrievalError> {
        Ok(self
            .retrieve_scored(query, k)
            .await?
            .into_iter()
            .map(|n| n.text)
            .collect())
    }

    /// Like [`retrieve`](Self::retrieve) but keeps ids and distances.
    pub async fn retrieve_scored(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<Neighbor>, RetrievalError> {
        if query.trim().is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let vector = self.embedder.embed(query).await.map_err(|source| {
            warn!(query, error = %source, "query embedding failed");
            RetrievalError::Embedding {
                query: query.to_string(),
                source,
            }
        })?;

        let neighbors = self.store.nearest(&vector, k).await.map_err(|source| {
            warn!(query, error = %source, "nearest-neighbor query failed");
            RetrievalError::Store {
                query: query.to_string(),
                source,
            }
        })?;

        debug!(query, k, hits = neighbors.len(), "retrieved");
        Ok(neighbors)
    }
}

pub async fn run_retrieve(app: &AppContext, query: &str, k: usize) -> anyhow::Result<()> {
    if !app.config.embedding.is_enabled() {
        anyhow::bail!("Embedding provider is disabled. Set [embedding] provider in config.");
    }

    let neighbors = app.retriever().retrieve_scored(query, k).await?;

    println!("retrieve {:?}", query);
    println!("  hits: {}", neighbors.len());
    for (rank, n) in neighbors.iter().enumerate() {
        let preview: String = n.text.chars().take(80).collect();
        println!(
            "  {}. [{:.4}] #{} {}",
            rank + 1,
            n.distance,
            n.id,
            preview.replace('\n', " ")
        );
    }
    println!("ok");
    Ok(())
}
