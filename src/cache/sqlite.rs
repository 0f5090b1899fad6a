use super::{CacheStore, CACHE_TABLE};
use crate::error::CacheError;
use crate::models::{CacheRow, StreamRecord};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use log::info;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// SQLite-backed cache store. Timestamps are stored as RFC 3339 UTC text.
pub struct SqliteCacheStore {
    conn: Mutex<Connection>,
}

impl SqliteCacheStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        let conn = Connection::open(path.as_ref())
            .map_err(|e| CacheError::Connection(e.to_string()))?;
        info!("Opened SQLite cache at {}", path.as_ref().display());
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, CacheError> {
        let conn =
            Connection::open_in_memory().map_err(|e| CacheError::Connection(e.to_string()))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, CacheError> {
        create_tables(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, CacheError> {
        self.conn
            .lock()
            .map_err(|e| CacheError::Connection(e.to_string()))
    }
}

pub fn create_tables(conn: &Connection) -> Result<(), CacheError> {
    conn.execute(
        &format!(
            "CREATE TABLE IF NOT EXISTS {} (
                episode_slug TEXT PRIMARY KEY,
                embed_url TEXT NOT NULL,
                stream_url TEXT NOT NULL,
                quality TEXT NOT NULL,
                provider TEXT NOT NULL,
                expires_at TEXT NOT NULL
            )",
            CACHE_TABLE
        ),
        [],
    )?;
    Ok(())
}

fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>, CacheError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| CacheError::Decode(format!("expires_at '{}': {}", raw, e)))
}

#[async_trait]
impl CacheStore for SqliteCacheStore {
    async fn get(
        &self,
        episode_key: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<StreamRecord>, CacheError> {
        let raw = {
            let conn = self.conn()?;
            conn.query_row(
                &format!(
                    "SELECT episode_slug, embed_url, stream_url, quality, provider, expires_at
                     FROM {} WHERE episode_slug = ?1",
                    CACHE_TABLE
                ),
                params![episode_key],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                },
            )
            .optional()?
        };

        let Some((episode_slug, embed_url, stream_url, quality, provider, expires_at)) = raw else {
            return Ok(None);
        };

        let row = CacheRow {
            episode_slug,
            embed_url,
            stream_url,
            quality,
            provider,
            expires_at: parse_ts(&expires_at)?,
        };
        let record = StreamRecord::try_from(row).map_err(CacheError::Decode)?;
        Ok(Some(record).filter(|r| r.is_live(now)))
    }

    async fn upsert(&self, record: &StreamRecord) -> Result<(), CacheError> {
        let conn = self.conn()?;
        conn.execute(
            &format!(
                "INSERT INTO {} (episode_slug, embed_url, stream_url, quality, provider, expires_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(episode_slug) DO UPDATE SET
                    embed_url = excluded.embed_url,
                    stream_url = excluded.stream_url,
                    quality = excluded.quality,
                    provider = excluded.provider,
                    expires_at = excluded.expires_at",
                CACHE_TABLE
            ),
            params![
                record.episode_key,
                record.embed_url,
                record.stream_url,
                record.quality.as_str(),
                record.provider.as_str(),
                format_ts(&record.expires_at),
            ],
        )?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "sqlite"
    }
}
