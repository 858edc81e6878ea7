//! SQLite-backed [`VectorStore`].
//!
//! Rows live in `embedding_rows`, scoped by collection name, with the
//! vector as a little-endian f32 BLOB. Nearest-neighbor search loads the
//! collection's vectors and ranks them in Rust.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::embedding::{blob_to_vec, l2_distance, vec_to_blob};
use crate::error::StoreError;
use crate::models::{Neighbor, NewEmbeddingRow};

use super::{check_dims, rank, VectorStore};

pub struct SqliteStore {
    pool: SqlitePool,
    collection: String,
    dims: usize,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool, collection: impl Into<String>, dims: usize) -> Self {
        Self {
            pool,
            collection: collection.into(),
            dims,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }
}

#[async_trait]
impl VectorStore for SqliteStore {
    fn dims(&self) -> usize {
        self.dims
    }

    async fn insert_batch(&self, rows: &[NewEmbeddingRow]) -> Result<u64, StoreError> {
        for row in rows {
            check_dims(self.dims, row.vector.len())?;
        }

        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;
        for row in rows {
            sqlx::query(
                "INSERT INTO embedding_rows (collection, text, embedding, dims, created_at) \
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&self.collection)
            .bind(&row.text)
            .bind(vec_to_blob(&row.vector))
            .bind(self.dims as i64)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(rows.len() as u64)
    }

    async fn nearest(&self, query: &[f32], limit: usize) -> Result<Vec<Neighbor>, StoreError> {
        check_dims(self.dims, query.len())?;
        if limit == 0 {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            "SELECT id, text, embedding FROM embedding_rows WHERE collection = ? AND dims = ?",
        )
        .bind(&self.collection)
        .bind(self.dims as i64)
        .fetch_all(&self.pool)
        .await?;

        let scored = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                Neighbor {
                    id: row.get("id"),
                    text: row.get("text"),
                    distance: l2_distance(query, &blob_to_vec(&blob)),
                }
            })
            .collect();

        Ok(rank(scored, limit))
    }

    async fn count(&self) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM embedding_rows WHERE collection = ?")
            .bind(&self.collection)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn clear(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM embedding_rows WHERE collection = ?")
            .bind(&self.collection)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
