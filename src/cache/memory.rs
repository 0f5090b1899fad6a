use super::CacheStore;
use crate::error::CacheError;
use crate::models::StreamRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

/// In-process cache store. Contents are lost on restart.
#[derive(Default)]
pub struct MemoryCacheStore {
    records: Mutex<HashMap<String, StreamRecord>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records, live or expired
    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw stored record regardless of expiry
    pub fn stored(&self, episode_key: &str) -> Option<StreamRecord> {
        self.records
            .lock()
            .ok()
            .and_then(|r| r.get(episode_key).cloned())
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(
        &self,
        episode_key: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<StreamRecord>, CacheError> {
        let records = self
            .records
            .lock()
            .map_err(|e| CacheError::Connection(e.to_string()))?;
        Ok(records
            .get(episode_key)
            .filter(|r| r.is_live(now))
            .cloned())
    }

    async fn upsert(&self, record: &StreamRecord) -> Result<(), CacheError> {
        let mut records = self
            .records
            .lock()
            .map_err(|e| CacheError::Connection(e.to_string()))?;
        records.insert(record.episode_key.clone(), record.clone());
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
