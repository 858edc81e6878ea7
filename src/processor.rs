//! Incremental corpus processing.
//!
//! Walks the corpus and brings every enriched record up to date with its
//! source document, calling the title service only for documents whose
//! bytes changed since the last successful enrichment. The persisted
//! `source_hash` is the only signal used to decide; a record without one,
//! or one that cannot be parsed, is always reprocessed.
//!
//! Per-document failures are collected in the [`ProcessSummary`] and never
//! stop the pass.

use std::collections::HashMap;
use std::path::Path;

use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::app::AppContext;
use crate::corpus;
use crate::error::{Error, Result, StoreError};
use crate::hasher;
use crate::models::{
    file_stem, BackfillSummary, DocumentFailure, EnrichedRecord, ProcessSummary, SourceDocument,
};
use crate::progress::{NoProgress, ProgressEvent, ProgressReporter};
use crate::records::RecordStore;
use crate::title::TitleEnricher;

static NO_PROGRESS: NoProgress = NoProgress;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Skipped,
    Processed { fallback_title: bool },
}

pub struct IncrementalProcessor<'a> {
    records: &'a dyn RecordStore,
    titles: TitleEnricher<'a>,
    concurrency: usize,
    progress: &'a dyn ProgressReporter,
}

impl<'a> IncrementalProcessor<'a> {
    pub fn new(records: &'a dyn RecordStore, titles: TitleEnricher<'a>) -> Self {
        Self {
            records,
            titles,
            concurrency: 1,
            progress: &NO_PROGRESS,
        }
    }

    /// Documents enriched at the same time. Identities are unique per pass,
    /// so no two in-flight documents write the same record.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_progress(mut self, progress: &'a dyn ProgressReporter) -> Self {
        self.progress = progress;
        self
    }

    pub async fn process_corpus(&self, documents: &[SourceDocument]) -> ProcessSummary {
        let mut summary = ProcessSummary::default();
        let total = documents.len() as u64;

        // One writer per record identity.
        let mut owners: HashMap<String, &str> = HashMap::new();
        let mut unique = Vec::with_capacity(documents.len());
        for doc in documents {
            let key = doc.record_key();
            if let Some(owner) = owners.get(&key) {
                warn!(filename = %doc.filename, record = %key, owner, "record identity already claimed");
                summary.failed.push(DocumentFailure {
                    filename: doc.filename.clone(),
                    reason: format!("record {} already belongs to {}", key, owner),
                });
                continue;
            }
            owners.insert(key, &doc.filename);
            unique.push(doc);
        }

        let mut done = summary.failed.len() as u64;
        let mut results = stream::iter(unique)
            .map(|doc| async move { (doc, self.process_document(doc).await) })
            .buffer_unordered(self.concurrency);

        while let Some((doc, result)) = results.next().await {
            match result {
                Ok(Outcome::Skipped) => {
                    debug!(filename = %doc.filename, "unchanged, skipping");
                    summary.skipped += 1;
                }
                Ok(Outcome::Processed { fallback_title }) => {
                    info!(filename = %doc.filename, fallback_title, "processed");
                    summary.processed += 1;
                    if fallback_title {
                        summary.fallback_titles += 1;
                    }
                }
                Err(e) => {
                    warn!(filename = %doc.filename, error = %e, "failed to process document");
                    summary.failed.push(DocumentFailure {
                        filename: doc.filename.clone(),
                        reason: e.to_string(),
                    });
                }
            }
            done += 1;
            self.progress
                .report(ProgressEvent::Processing { n: done, total });
        }

        summary.failed.sort_by(|a, b| a.filename.cmp(&b.filename));
        summary
    }

    /// True when a record exists and its digest equals the source's digest.
    pub fn is_unchanged(&self, doc: &SourceDocument) -> Result<bool> {
        let key = doc.record_key();
        if !self.records.exists(&key)? {
            return Ok(false);
        }

        let stored = match self.records.read(&key) {
            Ok(Some(stored)) => stored,
            Ok(None) => return Ok(false),
            Err(e @ StoreError::RecordDecode { .. }) => {
                warn!(filename = %doc.filename, error = %e, "existing record unreadable, reprocessing");
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        };

        if stored.source_hash.is_none() {
            debug!(filename = %doc.filename, "record has no source_hash, reprocessing");
            return Ok(false);
        }

        let current = hasher::hash_file(&doc.path)?;
        Ok(stored.is_current(&current))
    }

    async fn process_document(&self, doc: &SourceDocument) -> Result<Outcome> {
        if self.is_unchanged(doc)? {
            return Ok(Outcome::Skipped);
        }

        // Hash and text come from the same bytes.
        let bytes = std::fs::read(&doc.path).map_err(|source| Error::HashIo {
            path: doc.path.clone(),
            source,
        })?;
        let content_hash = hasher::hash_bytes(&bytes);
        let text = String::from_utf8(bytes).map_err(|e| Error::HashIo {
            path: doc.path.clone(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        })?;

        let title = self.titles.title_for(&doc.filename, &text).await;
        let fallback_title = title.is_fallback();

        let record = EnrichedRecord {
            title: title.into_string(),
            text,
            filename: doc.filename.clone(),
            content_hash,
        };
        self.records.write(&doc.record_key(), &record)?;

        Ok(Outcome::Processed { fallback_title })
    }
}

/// Add `source_hash` to records written before hashing existed.
///
/// The record is trusted to match the current `<stem>.txt` in
/// `source_dir`; records that already carry a digest are left alone.
pub fn backfill_hashes(records: &dyn RecordStore, source_dir: &Path) -> Result<BackfillSummary> {
    let mut summary = BackfillSummary::default();

    for key in records.keys()? {
        let stored = match records.read(&key) {
            Ok(Some(stored)) => stored,
            Ok(None) => continue,
            Err(e) => {
                warn!(record = %key, error = %e, "cannot read record");
                summary.failed.push(DocumentFailure {
                    filename: key.clone(),
                    reason: e.to_string(),
                });
                continue;
            }
        };

        if stored.source_hash.is_some() {
            summary.already_hashed += 1;
            continue;
        }

        let stem = file_stem(&key);
        let source_name = format!("{}.txt", stem);
        let source_path = source_dir.join(&source_name);
        if !source_path.is_file() {
            warn!(record = %key, source = %source_path.display(), "no source document for record");
            summary.orphaned += 1;
            continue;
        }

        let result = hasher::hash_file(&source_path).and_then(|content_hash| {
            let record = EnrichedRecord {
                title: stored.title.clone().unwrap_or_else(|| stem.clone()),
                text: stored.text.clone().unwrap_or_default(),
                filename: stored.filename.clone().unwrap_or(source_name.clone()),
                content_hash,
            };
            records.write(&key, &record).map_err(Error::from)
        });

        match result {
            Ok(()) => {
                info!(record = %key, "added source hash");
                summary.updated += 1;
            }
            Err(e) => {
                warn!(record = %key, error = %e, "failed to add source hash");
                summary.failed.push(DocumentFailure {
                    filename: key.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    Ok(summary)
}

/// Scan the configured corpus and run one incremental pass.
pub async fn run_process(
    app: &AppContext,
    progress: &dyn ProgressReporter,
) -> anyhow::Result<ProcessSummary> {
    let corpus_config = &app.config.corpus;
    progress.report(ProgressEvent::Scanning {
        source: corpus_config.source_dir.display().to_string(),
    });
    let documents = corpus::scan_corpus(corpus_config)?;

    let summary = app
        .processor()
        .with_concurrency(corpus_config.concurrency)
        .with_progress(progress)
        .process_corpus(&documents)
        .await;

    println!("process {}", corpus_config.source_dir.display());
    println!("  documents: {}", summary.total());
    println!("  processed: {}", summary.processed);
    println!("  skipped: {}", summary.skipped);
    println!("  fallback titles: {}", summary.fallback_titles);
    println!("  failed: {}", summary.failed.len());
    for failure in &summary.failed {
        println!("    {}: {}", failure.filename, failure.reason);
    }
    println!("ok");

    Ok(summary)
}

pub fn run_backfill(app: &AppContext) -> anyhow::Result<BackfillSummary> {
    let summary = backfill_hashes(&app.records, &app.config.corpus.source_dir)?;

    println!("stamp {}", app.config.corpus.output_dir.display());
    println!("  updated: {}", summary.updated);
    println!("  already hashed: {}", summary.already_hashed);
    println!("  orphaned: {}", summary.orphaned);
    println!("  failed: {}", summary.failed.len());
    println!("ok");

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GenerationConfig;
    use crate::error::ServiceError;
    use crate::generation::{GenerationService, TextRequest};
    use crate::records::FsRecordStore;
    use async_trait::async_trait;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts calls; fails for filenames containing "flaky".
    struct CountingTitles {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl GenerationService for CountingTitles {
        async fn generate_text(&self, request: &TextRequest<'_>) -> Result<String, ServiceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if request.user_prompt.contains("flaky") {
                return Err(ServiceError::Api {
                    service: "generation",
                    status: 429,
                    body: "quota".to_string(),
                });
            }
            Ok("\"A Generated Title\"".to_string())
        }
    }

    struct Fixture {
        _tmp: tempfile::TempDir,
        source_dir: std::path::PathBuf,
        records: FsRecordStore,
        titles: CountingTitles,
        generation: GenerationConfig,
    }

    impl Fixture {
        fn new() -> Self {
            let tmp = tempfile::tempdir().unwrap();
            let source_dir = tmp.path().join("corpus");
            fs::create_dir_all(&source_dir).unwrap();
            let records = FsRecordStore::new(tmp.path().join("processed"));
            Self {
                _tmp: tmp,
                source_dir,
                records,
                titles: CountingTitles {
                    calls: AtomicUsize::new(0),
                },
                generation: GenerationConfig::default(),
            }
        }

        fn write(&self, name: &str, body: &[u8]) -> SourceDocument {
            let path = self.source_dir.join(name);
            fs::write(&path, body).unwrap();
            SourceDocument::new(&path)
        }

        async fn run(&self, docs: &[SourceDocument]) -> ProcessSummary {
            IncrementalProcessor::new(
                &self.records,
                TitleEnricher::new(&self.titles, &self.generation),
            )
            .with_concurrency(2)
            .process_corpus(docs)
            .await
        }

        fn calls(&self) -> usize {
            self.titles.calls.load(Ordering::SeqCst)
        }
    }

    #[tokio::test]
    async fn test_second_pass_skips_everything() {
        let fx = Fixture::new();
        let docs = vec![fx.write("a.txt", b"alpha"), fx.write("b.txt", b"beta")];

        let first = fx.run(&docs).await;
        assert_eq!((first.processed, first.skipped), (2, 0));

        let hash_before = fx.records.read("a.json").unwrap().unwrap().source_hash;

        let second = fx.run(&docs).await;
        assert_eq!((second.processed, second.skipped), (0, 2));
        assert_eq!(fx.calls(), 2, "no title calls on unchanged corpus");
        assert_eq!(
            fx.records.read("a.json").unwrap().unwrap().source_hash,
            hash_before
        );
    }

    #[tokio::test]
    async fn test_one_byte_change_reprocesses_only_that_document() {
        let fx = Fixture::new();
        let docs = vec![fx.write("a.txt", b"alpha"), fx.write("b.txt", b"beta")];
        fx.run(&docs).await;

        fx.write("b.txt", b"betb");
        let summary = fx.run(&docs).await;
        assert_eq!((summary.processed, summary.skipped), (1, 1));

        let stored = fx.records.read("b.json").unwrap().unwrap();
        assert_eq!(stored.source_hash.unwrap(), hasher::hash_bytes(b"betb"));
        assert_eq!(stored.text.as_deref(), Some("betb"));
    }

    #[tokio::test]
    async fn test_legacy_record_without_hash_is_reprocessed() {
        let fx = Fixture::new();
        let docs = vec![fx.write("a.txt", b"alpha")];
        fs::create_dir_all(fx.records.dir()).unwrap();
        fs::write(
            fx.records.dir().join("a.json"),
            r#"{"title": "Old", "text": "alpha", "filename": "a.txt"}"#,
        )
        .unwrap();

        let summary = fx.run(&docs).await;
        assert_eq!(summary.processed, 1);
        assert_eq!(
            fx.records.read("a.json").unwrap().unwrap().source_hash.unwrap(),
            hasher::hash_bytes(b"alpha")
        );
    }

    #[tokio::test]
    async fn test_corrupt_record_is_treated_as_absent() {
        let fx = Fixture::new();
        let docs = vec![fx.write("a.txt", b"alpha")];
        fs::create_dir_all(fx.records.dir()).unwrap();
        fs::write(fx.records.dir().join("a.json"), "{\"title\": ").unwrap();

        let summary = fx.run(&docs).await;
        assert_eq!(summary.processed, 1);
        assert!(summary.failed.is_empty());
    }

    #[tokio::test]
    async fn test_title_failure_writes_stem_and_valid_hash() {
        let fx = Fixture::new();
        let docs = vec![fx.write("flaky-notes.txt", b"some words")];

        let summary = fx.run(&docs).await;
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.fallback_titles, 1);

        let stored = fx.records.read("flaky-notes.json").unwrap().unwrap();
        assert_eq!(stored.title.as_deref(), Some("flaky-notes"));
        assert_eq!(stored.source_hash.unwrap(), hasher::hash_bytes(b"some words"));

        // Fallback record is memoized like any other.
        let again = fx.run(&docs).await;
        assert_eq!(again.skipped, 1);
    }

    #[tokio::test]
    async fn test_unreadable_document_does_not_abort_pass() {
        let fx = Fixture::new();
        let good = fx.write("good.txt", b"fine");
        let bad = fx.write("bad.txt", &[0xff, 0xfe, 0x00, 0x80]);
        let missing = SourceDocument::new(&fx.source_dir.join("gone.txt"));

        let summary = fx.run(&[bad, good, missing]).await;
        assert_eq!(summary.processed, 1);
        let failed: Vec<&str> = summary.failed.iter().map(|f| f.filename.as_str()).collect();
        assert_eq!(failed, vec!["bad.txt", "gone.txt"]);
        assert!(!fx.records.exists("bad.json").unwrap());
    }

    #[tokio::test]
    async fn test_identity_collision_reported() {
        let fx = Fixture::new();
        let docs = vec![fx.write("a.md", b"markdown"), fx.write("a.txt", b"text")];

        let summary = fx.run(&docs).await;
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].filename, "a.txt");
        assert_eq!(
            fx.records.read("a.json").unwrap().unwrap().filename.as_deref(),
            Some("a.md")
        );
    }

    #[test]
    fn test_backfill_hashes() {
        let fx = Fixture::new();
        fx.write("old.txt", b"old body");
        fs::create_dir_all(fx.records.dir()).unwrap();
        fs::write(
            fx.records.dir().join("old.json"),
            r#"{"title": "Old", "text": "old body", "filename": "old.txt"}"#,
        )
        .unwrap();
        fs::write(
            fx.records.dir().join("orphan.json"),
            r#"{"title": "Orphan", "text": "x", "filename": "orphan.txt"}"#,
        )
        .unwrap();
        fx.records
            .write(
                "done.json",
                &EnrichedRecord {
                    title: "Done".to_string(),
                    text: "d".to_string(),
                    filename: "done.txt".to_string(),
                    content_hash: "abc".to_string(),
                },
            )
            .unwrap();

        let summary = backfill_hashes(&fx.records, &fx.source_dir).unwrap();
        assert_eq!(summary.updated, 1);
        assert_eq!(summary.already_hashed, 1);
        assert_eq!(summary.orphaned, 1);

        let old = fx.records.read("old.json").unwrap().unwrap();
        assert_eq!(old.title.as_deref(), Some("Old"));
        assert_eq!(old.source_hash.unwrap(), hasher::hash_bytes(b"old body"));
    }
}
