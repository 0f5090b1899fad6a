//! Episode stream resolution
//!
//! Each call runs the same fixed sequence, with no state carried between
//! calls other than what lives in the cache store:
//!
//! 1. cache check (skipped when a refresh is forced); a live record ends the
//!    call as a cache hit
//! 2. upstream fetch of the episode page; failure ends the call
//! 3. extraction; no candidates ends the call as "no content"
//! 4. selection of the first candidate
//! 5. best-effort cache write with a fresh expiry
//! 6. fresh response carrying every candidate
//!
//! Cache failures never surface to the caller. A failed read is routed as a
//! miss; a failed write is reported on the [`Resolution`] and otherwise ignored.
//!
//! Concurrent calls for the same uncached episode may each fetch and write;
//! the last write wins and every caller still gets a consistent answer.

use crate::cache::CacheStore;
use crate::error::{CacheError, ResolveError};
use crate::extractor::EmbedExtractor;
use crate::http_client::PageFetcher;
use crate::metrics::{track_request, MetricsTracker};
use crate::models::{CandidateStream, StreamData, StreamRecord, StreamResponse};
use crate::throttle::FetchThrottle;
use chrono::{Duration, Utc};
use log::{error, info, warn};
use std::sync::Arc;

pub const DEFAULT_UPSTREAM_BASE: &str = "https://otakudesu.cloud/episode";
pub const DEFAULT_TTL_HOURS: i64 = 24;

/// Outcome of the best-effort cache write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheWrite {
    /// Served from cache, nothing written
    NotAttempted,
    Stored,
    Failed(String),
}

/// A successful resolution
#[derive(Debug, Clone)]
pub struct Resolution {
    pub record: StreamRecord,
    /// Every extracted candidate in preference order; only on fresh resolutions
    pub all_embeds: Option<Vec<CandidateStream>>,
    pub cached: bool,
    pub cache_write: CacheWrite,
}

impl Resolution {
    pub fn to_response(&self) -> StreamResponse {
        StreamResponse {
            success: true,
            cached: Some(self.cached),
            data: Some(StreamData {
                embed_url: self.record.embed_url.clone(),
                stream_url: self.record.stream_url.clone(),
                quality: self.record.quality.to_string(),
                provider: self.record.provider.to_string(),
                all_embeds: self.all_embeds.clone(),
                expires_at: self.record.expires_at,
            }),
            error: None,
            hint: None,
        }
    }
}

pub struct Resolver {
    store: Arc<dyn CacheStore>,
    fetcher: Arc<dyn PageFetcher>,
    extractor: Arc<dyn EmbedExtractor>,
    metrics: Arc<MetricsTracker>,
    throttle: Option<FetchThrottle>,
    upstream_base: String,
    ttl: Duration,
}

impl Resolver {
    pub fn new(
        store: Arc<dyn CacheStore>,
        fetcher: Arc<dyn PageFetcher>,
        extractor: Arc<dyn EmbedExtractor>,
    ) -> Self {
        Self {
            store,
            fetcher,
            extractor,
            metrics: Arc::new(MetricsTracker::new()),
            throttle: None,
            upstream_base: DEFAULT_UPSTREAM_BASE.to_string(),
            ttl: Duration::hours(DEFAULT_TTL_HOURS),
        }
    }

    pub fn with_upstream_base(mut self, base: impl Into<String>) -> Self {
        self.upstream_base = base.into();
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsTracker>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Space upstream fetches for the same episode; zero disables
    pub fn with_min_fetch_interval(mut self, interval: std::time::Duration) -> Self {
        self.throttle = if interval.is_zero() {
            None
        } else {
            Some(FetchThrottle::new(interval))
        };
        self
    }

    pub fn metrics(&self) -> &Arc<MetricsTracker> {
        &self.metrics
    }

    pub fn cache_backend(&self) -> &'static str {
        self.store.backend()
    }

    pub fn extractor_name(&self) -> &'static str {
        self.extractor.name()
    }

    /// Canonical episode page URL for a key
    pub fn episode_url(&self, episode_key: &str) -> String {
        format!("{}/{}", self.upstream_base.trim_end_matches('/'), episode_key)
    }

    /// Live cached record without touching the upstream
    pub async fn cached(&self, episode_key: &str) -> Result<Option<StreamRecord>, CacheError> {
        self.store.get(episode_key, Utc::now()).await
    }

    pub async fn resolve(
        &self,
        episode_key: &str,
        force_refresh: bool,
    ) -> Result<Resolution, ResolveError> {
        if episode_key.trim().is_empty() {
            return Err(ResolveError::Internal("Episode key must not be empty".to_string()));
        }

        if force_refresh {
            self.metrics.record_forced_refresh();
        } else {
            match self.store.get(episode_key, Utc::now()).await {
                Ok(Some(record)) => {
                    self.metrics.record_cache_hit();
                    info!("[{}] Served from cache ({})", episode_key, record.provider);
                    return Ok(Resolution {
                        record,
                        all_embeds: None,
                        cached: true,
                        cache_write: CacheWrite::NotAttempted,
                    });
                }
                Ok(None) => self.metrics.record_cache_miss(),
                Err(e) => self.metrics.record_cache_read_failure(&e.to_string()),
            }
        }

        let url = self.episode_url(episode_key);
        if let Some(throttle) = &self.throttle {
            throttle.wait_turn(episode_key).await;
        }

        let html = track_request(&self.metrics, self.fetcher.fetch_html(&url))
            .await
            .map_err(|e| {
                error!("[{}] Fetch failed: {}", episode_key, e);
                ResolveError::UpstreamUnavailable(e)
            })?;

        let candidates = self.extractor.extract(&html);
        if candidates.is_empty() {
            self.metrics.record_no_content();
            warn!(
                "[{}] No embeds found in {} ({} extractor)",
                episode_key,
                url,
                self.extractor.name()
            );
            return Err(ResolveError::NoContentFound {
                episode_key: episode_key.to_string(),
            });
        }
        // Preference is extraction order; the first candidate wins
        let record = StreamRecord::from_candidate(episode_key, &candidates[0], Utc::now() + self.ttl);

        let cache_write = match self.store.upsert(&record).await {
            Ok(()) => CacheWrite::Stored,
            Err(e) => {
                let message = e.to_string();
                self.metrics.record_cache_write_failure(&message);
                CacheWrite::Failed(message)
            }
        };

        info!(
            "[{}] Resolved fresh: {} ({}, {} candidates)",
            episode_key,
            record.embed_url,
            record.provider,
            candidates.len()
        );

        Ok(Resolution {
            record,
            all_embeds: Some(candidates),
            cached: false,
            cache_write,
        })
    }
}
