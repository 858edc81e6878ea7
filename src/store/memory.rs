//! In-memory [`VectorStore`] for tests.
//!
//! Rows live in a `Vec` behind `std::sync::RwLock`. Search is brute force.

use std::sync::RwLock;

use async_trait::async_trait;

use crate::embedding::l2_distance;
use crate::error::StoreError;
use crate::models::{Neighbor, NewEmbeddingRow};

use super::{check_dims, rank, VectorStore};

struct StoredRow {
    id: i64,
    text: String,
    vector: Vec<f32>,
}

#[derive(Default)]
struct Rows {
    next_id: i64,
    rows: Vec<StoredRow>,
}

pub struct InMemoryStore {
    dims: usize,
    inner: RwLock<Rows>,
}

impl InMemoryStore {
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            inner: RwLock::new(Rows {
                next_id: 1,
                rows: Vec::new(),
            }),
        }
    }
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Backend("in-memory store lock poisoned".to_string())
}

#[async_trait]
impl VectorStore for InMemoryStore {
    fn dims(&self) -> usize {
        self.dims
    }

    async fn insert_batch(&self, rows: &[NewEmbeddingRow]) -> Result<u64, StoreError> {
        for row in rows {
            check_dims(self.dims, row.vector.len())?;
        }
        let mut inner = self.inner.write().map_err(poisoned)?;
        for row in rows {
            let id = inner.next_id;
            inner.next_id += 1;
            inner.rows.push(StoredRow {
                id,
                text: row.text.clone(),
                vector: row.vector.clone(),
            });
        }
        Ok(rows.len() as u64)
    }

    async fn nearest(&self, query: &[f32], limit: usize) -> Result<Vec<Neighbor>, StoreError> {
        check_dims(self.dims, query.len())?;
        if limit == 0 {
            return Ok(Vec::new());
        }
        let inner = self.inner.read().map_err(poisoned)?;
        let scored = inner
            .rows
            .iter()
            .map(|row| Neighbor {
                id: row.id,
                text: row.text.clone(),
                distance: l2_distance(query, &row.vector),
            })
            .collect();
        Ok(rank(scored, limit))
    }

    async fn count(&self) -> Result<u64, StoreError> {
        let inner = self.inner.read().map_err(poisoned)?;
        Ok(inner.rows.len() as u64)
    }

    async fn clear(&self) -> Result<u64, StoreError> {
        let mut inner = self.inner.write().map_err(poisoned)?;
        let removed = inner.rows.len() as u64;
        inner.rows.clear();
        Ok(removed)
    }
}
