//! Vector storage for corpus embeddings.
//!
//! The [`VectorStore`] trait is everything the indexer and the retriever
//! need: append a batch of `(text, vector)` rows, find the nearest rows to
//! a query vector, count, and clear. Two backends:
//!
//! - [`sqlite::SqliteStore`] persists rows in the `embedding_rows` table.
//! - [`memory::InMemoryStore`] keeps rows in a `Vec` for tests.
//!
//! Distance is Euclidean ([`l2_distance`](crate::embedding::l2_distance))
//! in both backends, so they return the same order for the same data.

pub mod memory;
pub mod sqlite;

use std::cmp::Ordering;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::{Neighbor, NewEmbeddingRow};

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

/// Append-only store of embedded snippets.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`insert_batch`](VectorStore::insert_batch) | Append rows; all or nothing |
/// | [`nearest`](VectorStore::nearest) | Up to `limit` rows by ascending distance |
/// | [`count`](VectorStore::count) | Rows in the collection |
/// | [`clear`](VectorStore::clear) | Remove every row in the collection |
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Vector length every row must have.
    fn dims(&self) -> usize;

    /// Insert all rows or none. Returns the number inserted.
    async fn insert_batch(&self, rows: &[NewEmbeddingRow]) -> Result<u64, StoreError>;

    /// Ascending by distance; ties go to the lower id.
    async fn nearest(&self, query: &[f32], limit: usize) -> Result<Vec<Neighbor>, StoreError>;

    async fn count(&self) -> Result<u64, StoreError>;

    /// Returns the number of rows removed.
    async fn clear(&self) -> Result<u64, StoreError>;
}

pub(crate) fn check_dims(expected: usize, actual: usize) -> Result<(), StoreError> {
    if expected != actual {
        return Err(StoreError::DimensionMismatch { expected, actual });
    }
    Ok(())
}

/// Sort by distance then id and keep the first `limit`.
pub(crate) fn rank(mut neighbors: Vec<Neighbor>, limit: usize) -> Vec<Neighbor> {
    neighbors.sort_by(|a, b| match a.distance.total_cmp(&b.distance) {
        Ordering::Equal => a.id.cmp(&b.id),
        other => other,
    });
    neighbors.truncate(limit);
    neighbors
}
