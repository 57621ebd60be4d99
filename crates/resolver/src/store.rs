//! Sharded reverse-index store
//!
//! Sixteen append-only tables, one per shard key, each holding
//! `(search, seq)` rows: the fixed-length search key of a generated
//! fingerprint and the sequence index it was generated at. Rows are only
//! ever inserted by the generation worker; no update or delete is issued
//! against these tables.

use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use std::collections::HashMap;
use tracing::debug;

use crate::codec::ShardKey;
use crate::error::ResolverError;

/// Rows per INSERT statement; keeps bind counts well under SQLite's
/// variable limit.
const INSERT_CHUNK_ROWS: usize = 400;

/// One stored reverse-index row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRow {
    pub search_key: String,
    pub sequence: u64,
}

pub struct ReverseIndexStore {
    pool: SqlitePool,
    table_prefix: String,
}

impl ReverseIndexStore {
    pub fn new(pool: SqlitePool, table_prefix: String) -> Self {
        Self { pool, table_prefix }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn table_name(&self, shard: ShardKey) -> String {
        format!("{}_{}", self.table_prefix, shard.as_char())
    }

    /// Creates the 16 shard tables if they do not exist. Idempotent.
    ///
    /// No secondary index on the search column: sharding by first
    /// character already bounds per-query scans.
    pub async fn ensure_schema(&self) -> Result<(), ResolverError> {
        for shard in ShardKey::all() {
            let sql = format!(
                "CREATE TABLE IF NOT EXISTS {} (search TEXT NOT NULL, seq INTEGER NOT NULL)",
                self.table_name(shard)
            );
            sqlx::query(&sql).execute(&self.pool).await?;
        }
        debug!(prefix = %self.table_prefix, "reverse-index schema ensured");
        Ok(())
    }

    /// Row count per shard. Used only to derive the generation high-water
    /// mark: each shard's count is the number of generated sequence indices
    /// that hash into it.
    pub async fn row_counts(&self) -> Result<HashMap<ShardKey, u64>, ResolverError> {
        let mut counts = HashMap::with_capacity(ShardKey::COUNT);
        for shard in ShardKey::all() {
            let sql = format!("SELECT COUNT(*) FROM {}", self.table_name(shard));
            let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
            counts.insert(shard, count as u64);
        }
        Ok(counts)
    }

    /// Fetches all rows in one shard whose search key matches any of the
    /// given keys, in a single round trip.
    pub async fn lookup_batch(
        &self,
        shard: ShardKey,
        search_keys: &[&str],
    ) -> Result<Vec<IndexRow>, ResolverError> {
        if search_keys.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; search_keys.len()].join(",");
        let sql = format!(
            "SELECT search, seq FROM {} WHERE search IN ({placeholders})",
            self.table_name(shard)
        );

        let mut query = sqlx::query(&sql);
        for key in search_keys {
            query = query.bind(*key);
        }

        let rows = query.fetch_all(&self.pool).await?;
        let mut result = Vec::with_capacity(rows.len());
        for row in rows {
            result.push(IndexRow {
                search_key: row.try_get::<String, _>("search")?,
                sequence: row.try_get::<i64, _>("seq")? as u64,
            });
        }
        debug!(
            shard = %shard,
            keys = search_keys.len(),
            candidates = result.len(),
            "reverse-index batch lookup"
        );
        Ok(result)
    }

    /// Bulk-inserts rows into one shard table, chunked. The only mutation
    /// ever issued against the store.
    pub async fn append(&self, shard: ShardKey, rows: &[IndexRow]) -> Result<(), ResolverError> {
        if rows.is_empty() {
            return Ok(());
        }

        let table = self.table_name(shard);
        for chunk in rows.chunks(INSERT_CHUNK_ROWS) {
            let mut builder: QueryBuilder<Sqlite> =
                QueryBuilder::new(format!("INSERT INTO {table} (search, seq) "));
            builder.push_values(chunk, |mut b, row| {
                b.push_bind(&row.search_key);
                b.push_bind(row.sequence as i64);
            });
            builder.build().execute(&self.pool).await?;
        }
        debug!(shard = %shard, rows = rows.len(), "appended reverse-index rows");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_store() -> ReverseIndexStore {
        // A single connection so every query sees the same in-memory
        // database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = ReverseIndexStore::new(pool, "guid_reverse".to_string());
        store.ensure_schema().await.unwrap();
        store
    }

    fn row(search: &str, sequence: u64) -> IndexRow {
        IndexRow {
            search_key: search.to_string(),
            sequence,
        }
    }

    #[tokio::test]
    async fn schema_is_idempotent() {
        let store = memory_store().await;
        store.ensure_schema().await.unwrap();

        let counts = store.row_counts().await.unwrap();
        assert_eq!(counts.len(), ShardKey::COUNT);
        assert!(counts.values().all(|&c| c == 0));
    }

    #[tokio::test]
    async fn append_and_lookup_round_trip() {
        let store = memory_store().await;
        let shard = ShardKey::from_index(10); // 'a'

        store
            .append(shard, &[row("bcdef01234", 0), row("0123456789", 1)])
            .await
            .unwrap();

        let hits = store
            .lookup_batch(shard, &["bcdef01234", "feedfacefe"])
            .await
            .unwrap();
        assert_eq!(hits, vec![row("bcdef01234", 0)]);

        let both = store
            .lookup_batch(shard, &["bcdef01234", "0123456789"])
            .await
            .unwrap();
        assert_eq!(both.len(), 2);
    }

    #[tokio::test]
    async fn lookup_with_no_keys_issues_no_query() {
        let store = memory_store().await;
        let hits = store
            .lookup_batch(ShardKey::from_index(0), &[])
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn rows_are_partitioned_per_shard() {
        let store = memory_store().await;
        store
            .append(ShardKey::from_index(0), &[row("aaaaaaaaaa", 3)])
            .await
            .unwrap();

        // Same search key in another shard is invisible.
        let hits = store
            .lookup_batch(ShardKey::from_index(1), &["aaaaaaaaaa"])
            .await
            .unwrap();
        assert!(hits.is_empty());

        let counts = store.row_counts().await.unwrap();
        assert_eq!(counts[&ShardKey::from_index(0)], 1);
        assert_eq!(counts[&ShardKey::from_index(1)], 0);
        assert_eq!(counts.values().sum::<u64>(), 1);
    }

    #[tokio::test]
    async fn append_chunks_large_batches() {
        let store = memory_store().await;
        let shard = ShardKey::from_index(15);
        let rows: Vec<IndexRow> = (0..1000).map(|i| row("same_key__", i)).collect();

        store.append(shard, &rows).await.unwrap();

        let counts = store.row_counts().await.unwrap();
        assert_eq!(counts[&shard], 1000);
    }
}
