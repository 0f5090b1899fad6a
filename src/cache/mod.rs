//! Cache store for resolved streams
//!
//! A cache store maps an episode key to at most one [`StreamRecord`]. Reads
//! only ever return live records (`expires_at` strictly after the supplied
//! instant), so an expired row is indistinguishable from a missing one.
//! Writes replace the whole record for the key; concurrent writers for the
//! same key resolve as last-writer-wins.
//!
//! Backends:
//!
//! - [`MemoryCacheStore`]: process-local map, for tests and ephemeral runs
//! - [`SqliteCacheStore`]: single-node file database
//! - [`PgCacheStore`]: the shared `streaming_cache` table used in deployment

mod memory;
mod postgres;
mod sqlite;

pub use memory::MemoryCacheStore;
pub use postgres::{create_pool, PgCacheStore, PgSettings};
pub use sqlite::SqliteCacheStore;

use crate::error::CacheError;
use crate::models::StreamRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Table name shared by every persistent backend
pub const CACHE_TABLE: &str = "streaming_cache";

#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Live record for `episode_key` as of `now`, if any
    async fn get(
        &self,
        episode_key: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<StreamRecord>, CacheError>;

    /// Insert or wholesale replace the record for `record.episode_key`
    async fn upsert(&self, record: &StreamRecord) -> Result<(), CacheError>;

    /// Backend name for logs and health output
    fn backend(&self) -> &'static str;
}
