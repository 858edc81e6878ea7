//! Error taxonomy for the corpus pipeline.
//!
//! Library code returns these typed errors so callers can tell an external
//! service failure apart from a store failure or an empty corpus. The CLI
//! wraps them in `anyhow` for reporting.

use std::path::PathBuf;

use thiserror::Error;

/// Failure of an external service (title/generation LLM or embedding API).
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The provider is disabled or missing required settings/credentials.
    #[error("{service} unavailable: {reason}")]
    Unavailable {
        service: &'static str,
        reason: String,
    },

    /// The API answered with a non-success status.
    #[error("{service} API error {status}: {body}")]
    Api {
        service: &'static str,
        status: u16,
        body: String,
    },

    /// Network or timeout failure after all retries.
    #[error("{service} request failed: {message}")]
    Transport {
        service: &'static str,
        message: String,
    },

    /// The API answered 2xx but the payload was not usable.
    #[error("{service} returned an invalid response: {reason}")]
    InvalidResponse {
        service: &'static str,
        reason: String,
    },
}

/// Failure of the vector store or the enriched-record store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sql(#[from] sqlx::Error),

    #[error("batch {batch} ({rows} rows) rolled back: {reason}")]
    Batch {
        batch: usize,
        rows: usize,
        reason: String,
    },

    #[error("vector has {actual} dimensions, store expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("record {key}: {source}")]
    RecordIo {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("record {key} is not a valid enriched record: {source}")]
    RecordDecode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("store backend failure: {0}")]
    Backend(String),
}

/// Failure while answering a similarity query.
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("embedding query {query:?} failed: {source}")]
    Embedding {
        query: String,
        #[source]
        source: ServiceError,
    },

    #[error("nearest-neighbor query for {query:?} failed: {source}")]
    Store {
        query: String,
        #[source]
        source: StoreError,
    },
}

/// Crate-level error.
#[derive(Debug, Error)]
pub enum Error {
    /// Source bytes could not be read; fatal for that document only.
    #[error("cannot read source document {}: {source}", path.display())]
    HashIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    /// Embedding a record failed during indexing; earlier batches are kept.
    #[error("embedding {filename} (batch {batch}) failed: {source}")]
    IndexEmbedding {
        batch: usize,
        filename: String,
        #[source]
        source: ServiceError,
    },

    /// No snippet could be assembled; generation cannot proceed.
    #[error("no context available: {reason}")]
    NoContextAvailable { reason: String },

    #[error("prompt is empty")]
    EmptyPrompt,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
