//! GUID resolver library
//!
//! Converts 64-bit account identifiers to 32-character hash fingerprints
//! and answers the reverse direction through a sharded, incrementally
//! generated reverse index with a coherent lookup cache.

pub mod cache;
pub mod cli;
pub mod codec;
pub mod config;
pub mod error;
pub mod generator;
pub mod service;
pub mod store;

pub use config::ResolverConfig;
pub use error::ResolverError;

use sqlx::migrate::MigrateDatabase;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Sqlite, SqlitePool};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use cache::LookupCache;
use codec::GuidCodec;
use config::DatabaseConfig;
use generator::RangeGenerator;
use service::LookupService;
use store::ReverseIndexStore;

/// Fully wired resolver: pool, store, cache, lookup service and generator.
pub struct ResolverState {
    pub config: ResolverConfig,
    pub store: Arc<ReverseIndexStore>,
    pub cache: Arc<LookupCache>,
    pub service: Arc<LookupService>,
    pub generator: Arc<RangeGenerator>,
}

impl ResolverState {
    pub async fn new(config: ResolverConfig) -> Result<Self, ResolverError> {
        config.validate()?;

        let pool = connect(&config.database).await?;
        let store = Arc::new(ReverseIndexStore::new(
            pool,
            config.index.table_prefix.clone(),
        ));
        store.ensure_schema().await?;

        let cache = Arc::new(LookupCache::new());
        let codec = GuidCodec::new(config.codec.magic);
        let service = Arc::new(LookupService::new(
            Arc::clone(&store),
            Arc::clone(&cache),
            codec,
            config.index.search_key_len,
            config.generator.sequence_offset,
        ));
        let generator = Arc::new(RangeGenerator::new(
            Arc::clone(&store),
            Arc::clone(&cache),
            codec,
            config.index.search_key_len,
            config.generator.clone(),
        ));
        generator.initialize().await?;

        Ok(Self {
            config,
            store,
            cache,
            service,
            generator,
        })
    }
}

async fn connect(config: &DatabaseConfig) -> Result<SqlitePool, ResolverError> {
    if let Some(db_path) = config.url.strip_prefix("sqlite:") {
        if !db_path.starts_with(':') && !Path::new(db_path).exists() {
            info!(path = db_path, "creating new SQLite database");
            Sqlite::create_database(&config.url).await?;
        }
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.url)
        .await?;

    // Concurrent lookups during a generation run share this file.
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA busy_timeout = 30000")
        .execute(&pool)
        .await?;

    info!(url = %config.url, "database connection established");
    Ok(pool)
}
