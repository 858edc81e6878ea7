//! Core data models used throughout the corpus pipeline.
//!
//! These types represent the source documents, enriched records, and
//! embedding rows that flow from the corpus directory to the vector store.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// A raw document in the corpus directory, identified by its filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    pub filename: String,
    pub path: PathBuf,
}

impl SourceDocument {
    pub fn new(path: &Path) -> Self {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        Self {
            filename,
            path: path.to_path_buf(),
        }
    }

    /// Filename without its final extension.
    pub fn stem(&self) -> String {
        file_stem(&self.filename)
    }

    /// Key of the enriched record this document owns (`a.txt` -> `a.json`).
    pub fn record_key(&self) -> String {
        format!("{}.json", self.stem())
    }
}

/// `notes.v2.txt` -> `notes.v2`; a name without extension is returned as is.
pub fn file_stem(filename: &str) -> String {
    Path::new(filename)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| filename.to_string())
}

/// Enriched, persisted view of a source document.
///
/// Always written whole. `content_hash` is serialized as `source_hash`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichedRecord {
    pub title: String,
    pub text: String,
    pub filename: String,
    #[serde(rename = "source_hash")]
    pub content_hash: String,
}

/// A record as found on disk, which may predate content hashing.
///
/// Every field is optional so legacy records parse; a missing
/// `source_hash` marks the record as stale.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct StoredRecord {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub source_hash: Option<String>,
}

impl StoredRecord {
    /// True only when a digest is present and equals `current_hash`.
    pub fn is_current(&self, current_hash: &str) -> bool {
        self.source_hash.as_deref() == Some(current_hash)
    }
}

impl From<EnrichedRecord> for StoredRecord {
    fn from(r: EnrichedRecord) -> Self {
        Self {
            title: Some(r.title),
            text: Some(r.text),
            filename: Some(r.filename),
            source_hash: Some(r.content_hash),
        }
    }
}

/// A (text, vector) pair waiting to be inserted into the vector store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEmbeddingRow {
    pub text: String,
    pub vector: Vec<f32>,
}

/// A stored row returned by a nearest-neighbor query.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    /// Store-assigned key; breaks distance ties.
    pub id: i64,
    pub text: String,
    /// Euclidean distance to the query vector.
    pub distance: f32,
}

/// A document the incremental pass could not update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentFailure {
    pub filename: String,
    pub reason: String,
}

/// Outcome of one incremental corpus pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessSummary {
    pub processed: u64,
    pub skipped: u64,
    /// Records written with the filename-stem title after a title failure.
    pub fallback_titles: u64,
    pub failed: Vec<DocumentFailure>,
}

impl ProcessSummary {
    pub fn total(&self) -> u64 {
        self.processed + self.skipped + self.failed.len() as u64
    }
}

/// Outcome of one indexing run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexSummary {
    pub uploaded: u64,
    pub skipped_empty: u64,
    pub batches: u64,
}

/// Outcome of a legacy hash backfill.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackfillSummary {
    pub updated: u64,
    pub already_hashed: u64,
    pub orphaned: u64,
    pub failed: Vec<DocumentFailure>,
}
