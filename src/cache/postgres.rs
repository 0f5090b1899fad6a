use super::{CacheStore, CACHE_TABLE};
use crate::error::CacheError;
use crate::models::{CacheRow, StreamRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_postgres::{Config, ManagerConfig, Pool, RecyclingMethod, Runtime};
use log::info;
use tokio_postgres::{NoTls, Row};

/// Connection settings for the shared cache table
#[derive(Debug, Clone)]
pub struct PgSettings {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: String,
}

/// PostgreSQL-backed cache store over the deployed `streaming_cache` table
pub struct PgCacheStore {
    pool: Pool,
}

/// Creates a PostgreSQL connection pool. Connections are opened lazily.
pub fn create_pool(settings: &PgSettings) -> Result<Pool, CacheError> {
    info!(
        "Creating PostgreSQL connection pool for {}:{}/{}...",
        settings.host, settings.port, settings.dbname
    );

    let mut cfg = Config::new();
    cfg.host = Some(settings.host.clone());
    cfg.port = Some(settings.port);
    cfg.dbname = Some(settings.dbname.clone());
    cfg.user = Some(settings.user.clone());
    cfg.password = Some(settings.password.clone());
    cfg.manager = Some(ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    });

    cfg.create_pool(Some(Runtime::Tokio1), NoTls)
        .map_err(|e| CacheError::Connection(e.to_string()))
}

impl PgCacheStore {
    /// Connect once at start-up and make sure the table exists
    pub async fn connect(settings: &PgSettings) -> Result<Self, CacheError> {
        let store = Self::from_pool(create_pool(settings)?);
        store.create_tables().await?;
        info!("PostgreSQL cache store ready");
        Ok(store)
    }

    pub fn from_pool(pool: Pool) -> Self {
        Self { pool }
    }

    pub async fn create_tables(&self) -> Result<(), CacheError> {
        let client = self.pool.get().await?;
        client
            .batch_execute(&format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    episode_slug TEXT PRIMARY KEY,
                    embed_url TEXT NOT NULL,
                    stream_url TEXT NOT NULL,
                    quality TEXT NOT NULL,
                    provider TEXT NOT NULL,
                    expires_at TIMESTAMPTZ NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_{table}_expires_at ON {table} (expires_at);",
                table = CACHE_TABLE
            ))
            .await?;
        Ok(())
    }
}

fn row_to_record(row: &Row) -> Result<StreamRecord, CacheError> {
    let cache_row = CacheRow {
        episode_slug: row.try_get(0)?,
        embed_url: row.try_get(1)?,
        stream_url: row.try_get(2)?,
        quality: row.try_get(3)?,
        provider: row.try_get(4)?,
        expires_at: row.try_get(5)?,
    };
    StreamRecord::try_from(cache_row).map_err(CacheError::Decode)
}

#[async_trait]
impl CacheStore for PgCacheStore {
    async fn get(
        &self,
        episode_key: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<StreamRecord>, CacheError> {
        let client = self.pool.get().await?;
        let sql = format!(
            "SELECT episode_slug, embed_url, stream_url, quality, provider, expires_at
             FROM {} WHERE episode_slug = $1 AND expires_at > $2",
            CACHE_TABLE
        );
        let row = client.query_opt(&sql, &[&episode_key, &now]).await?;
        row.as_ref().map(row_to_record).transpose()
    }

    async fn upsert(&self, record: &StreamRecord) -> Result<(), CacheError> {
        let client = self.pool.get().await?;
        let sql = format!(
            "INSERT INTO {} (episode_slug, embed_url, stream_url, quality, provider, expires_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (episode_slug) DO UPDATE SET
                embed_url = EXCLUDED.embed_url,
                stream_url = EXCLUDED.stream_url,
                quality = EXCLUDED.quality,
                provider = EXCLUDED.provider,
                expires_at = EXCLUDED.expires_at",
            CACHE_TABLE
        );
        client
            .execute(
                &sql,
                &[
                    &record.episode_key,
                    &record.embed_url,
                    &record.stream_url,
                    &record.quality.as_str(),
                    &record.provider.as_str(),
                    &record.expires_at,
                ],
            )
            .await?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}
