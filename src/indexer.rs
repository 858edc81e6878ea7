//! Embedding indexer.
//!
//! Embeds each enriched record's text (one service call per record) and
//! appends `(text, vector)` rows to the vector store, one transaction per
//! batch. Rows are never deduplicated against earlier runs; `--reset`
//! clears the collection first when a clean rebuild is wanted.

use tracing::{info, warn};

use crate::app::AppContext;
use crate::embedding::EmbeddingProvider;
use crate::error::{Error, Result, StoreError};
use crate::models::{EnrichedRecord, IndexSummary, NewEmbeddingRow};
use crate::progress::{NoProgress, ProgressEvent, ProgressReporter};
use crate::records;
use crate::store::VectorStore;

static NO_PROGRESS: NoProgress = NoProgress;

pub struct EmbeddingIndexer<'a> {
    embedder: &'a dyn EmbeddingProvider,
    store: &'a dyn VectorStore,
    batch_size: usize,
    progress: &'a dyn ProgressReporter,
}

impl<'a> EmbeddingIndexer<'a> {
    pub fn new(
        embedder: &'a dyn EmbeddingProvider,
        store: &'a dyn VectorStore,
        batch_size: usize,
    ) -> Self {
        Self {
            embedder,
            store,
            batch_size: batch_size.max(1),
            progress: &NO_PROGRESS,
        }
    }

    pub fn with_progress(mut self, progress: &'a dyn ProgressReporter) -> Self {
        self.progress = progress;
        self
    }

    /// Embed and upload every record with non-empty text.
    ///
    /// A service or store failure aborts the run. Batches committed before
    /// the failure stay in the store; the failing batch leaves nothing.
    pub async fn index_all(&self, records: &[EnrichedRecord]) -> Result<IndexSummary> {
        let mut summary = IndexSummary::default();

        let eligible: Vec<&EnrichedRecord> = records
            .iter()
            .filter(|r| {
                let keep = !r.text.is_empty();
                if !keep {
                    warn!(filename = %r.filename, "record has no text, not indexing");
                }
                keep
            })
            .collect();
        summary.skipped_empty = (records.len() - eligible.len()) as u64;

        let total = eligible.len() as u64;
        let mut embedded = 0u64;

        for (i, batch) in eligible.chunks(self.batch_size).enumerate() {
            let batch_no = i + 1;
            let mut rows = Vec::with_capacity(batch.len());
            for record in batch {
                let vector = self.embedder.embed(&record.text).await.map_err(|source| {
                    warn!(filename = %record.filename, batch = batch_no, error = %source, "embedding failed");
                    Error::IndexEmbedding {
                        batch: batch_no,
                        filename: record.filename.clone(),
                        source,
                    }
                })?;
                rows.push(NewEmbeddingRow {
                    text: record.text.clone(),
                    vector,
                });
                embedded += 1;
                self.progress.report(ProgressEvent::Indexing {
                    n: embedded,
                    total,
                });
            }

            let inserted = self.store.insert_batch(&rows).await.map_err(|e| {
                warn!(batch = batch_no, rows = rows.len(), error = %e, "batch insert rolled back");
                StoreError::Batch {
                    batch: batch_no,
                    rows: rows.len(),
                    reason: e.to_string(),
                }
            })?;

            info!(batch = batch_no, rows = inserted, "batch committed");
            summary.uploaded += inserted;
            summary.batches += 1;
        }

        Ok(summary)
    }
}

/// Load every enriched record and index it into the configured collection.
pub async fn run_index(
    app: &AppContext,
    reset: bool,
    progress: &dyn ProgressReporter,
) -> anyhow::Result<IndexSummary> {
    if !app.config.embedding.is_enabled() {
        anyhow::bail!("Embedding provider is disabled. Set [embedding] provider in config.");
    }

    let collection = &app.config.retrieval.collection;
    let mut cleared = 0;
    if reset {
        cleared = app.store.clear().await?;
        info!(collection = %collection, rows = cleared, "collection cleared");
    }

    let records = records::load_records(&app.records)?;
    let summary = app
        .indexer()
        .with_progress(progress)
        .index_all(&records)
        .await?;

    println!("index {}", collection);
    if reset {
        println!("  cleared: {}", cleared);
    }
    println!("  records: {}", records.len());
    println!("  uploaded: {}", summary.uploaded);
    println!("  skipped empty: {}", summary.skipped_empty);
    println!("  batches: {}", summary.batches);
    println!("ok");

    Ok(summary)
}
