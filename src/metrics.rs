/// Metrics for the stream resolver
///
/// Tracks cache effectiveness, upstream fetch health and best-effort cache failures

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolverMetrics {
    pub total_resolutions: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub forced_refreshes: u64,
    pub cache_read_failures: u64,
    pub cache_write_failures: u64,
    pub upstream_fetches: u64,
    pub upstream_failures: u64,
    pub no_content: u64,
    pub last_success: Option<DateTime<Utc>>,
    pub last_failure: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub average_fetch_time_ms: f64,
    pub total_fetch_time_ms: u64,
    pub rate_limit_hits: u64,
    pub timeout_count: u64,
}

impl ResolverMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Share of cache-first lookups served from the cache
    pub fn cache_hit_rate(&self) -> f64 {
        let lookups = self.cache_hits + self.cache_misses;
        if lookups == 0 {
            0.0
        } else {
            (self.cache_hits as f64 / lookups as f64) * 100.0
        }
    }

    pub fn fetch_success_rate(&self) -> f64 {
        if self.upstream_fetches == 0 {
            0.0
        } else {
            let ok = self.upstream_fetches - self.upstream_failures;
            (ok as f64 / self.upstream_fetches as f64) * 100.0
        }
    }

    pub fn record_fetch_success(&mut self, response_time: Duration) {
        self.upstream_fetches += 1;
        self.last_success = Some(Utc::now());

        let response_ms = response_time.as_millis() as u64;
        self.total_fetch_time_ms += response_ms;
        let ok = self.upstream_fetches - self.upstream_failures;
        self.average_fetch_time_ms = self.total_fetch_time_ms as f64 / ok as f64;
    }

    pub fn record_fetch_failure(&mut self, error: String) {
        self.upstream_fetches += 1;
        self.upstream_failures += 1;
        self.last_failure = Some(Utc::now());

        // Categorize errors
        if error.contains("429") || error.to_lowercase().contains("rate limit") {
            self.rate_limit_hits += 1;
        } else if error.to_lowercase().contains("timed out") {
            self.timeout_count += 1;
        }
        self.last_error = Some(error);
    }
}

/// Shared metrics tracker
pub struct MetricsTracker {
    metrics: Arc<Mutex<ResolverMetrics>>,
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self {
            metrics: Arc::new(Mutex::new(ResolverMetrics::new())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ResolverMetrics> {
        self.metrics.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn record_cache_hit(&self) {
        let mut m = self.lock();
        m.total_resolutions += 1;
        m.cache_hits += 1;
    }

    pub fn record_cache_miss(&self) {
        let mut m = self.lock();
        m.total_resolutions += 1;
        m.cache_misses += 1;
    }

    pub fn record_forced_refresh(&self) {
        let mut m = self.lock();
        m.total_resolutions += 1;
        m.forced_refreshes += 1;
    }

    /// A failed read counts as a miss for routing purposes
    pub fn record_cache_read_failure(&self, error: &str) {
        let mut m = self.lock();
        m.total_resolutions += 1;
        m.cache_misses += 1;
        m.cache_read_failures += 1;
        log::warn!("[cache] Read failed, treating as miss: {}", error);
    }

    pub fn record_cache_write_failure(&self, error: &str) {
        let mut m = self.lock();
        m.cache_write_failures += 1;
        log::warn!(
            "[cache] Write failed ({} so far): {}",
            m.cache_write_failures,
            error
        );
    }

    pub fn record_no_content(&self) {
        self.lock().no_content += 1;
    }

    pub fn record_fetch_success(&self, response_time: Duration) {
        let mut m = self.lock();
        m.record_fetch_success(response_time);

        log::info!(
            "[upstream] Success - Response time: {}ms - Success rate: {:.2}%",
            response_time.as_millis(),
            m.fetch_success_rate()
        );
    }

    pub fn record_fetch_failure(&self, error: String) {
        let mut m = self.lock();
        m.record_fetch_failure(error.clone());

        log::warn!(
            "[upstream] Failure - Error: {} - Success rate: {:.2}%",
            error,
            m.fetch_success_rate()
        );
    }

    pub fn snapshot(&self) -> ResolverMetrics {
        self.lock().clone()
    }

    pub fn export_json(&self) -> String {
        let m = self.lock();
        serde_json::to_string_pretty(&*m).unwrap_or_else(|_| "{}".to_string())
    }
}

impl Default for MetricsTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Time an upstream fetch and record the outcome
pub async fn track_request<F, T, E>(tracker: &MetricsTracker, operation: F) -> Result<T, E>
where
    F: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let start = Instant::now();
    let result = operation.await;
    let duration = start.elapsed();

    match &result {
        Ok(_) => tracker.record_fetch_success(duration),
        Err(e) => tracker.record_fetch_failure(e.to_string()),
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = ResolverMetrics::new();
        assert_eq!(metrics.total_resolutions, 0);
        assert_eq!(metrics.cache_hit_rate(), 0.0);
        assert_eq!(metrics.fetch_success_rate(), 0.0);
    }

    #[test]
    fn test_record_fetch_success() {
        let mut metrics = ResolverMetrics::new();
        metrics.record_fetch_success(Duration::from_millis(100));

        assert_eq!(metrics.upstream_fetches, 1);
        assert_eq!(metrics.fetch_success_rate(), 100.0);
        assert_eq!(metrics.average_fetch_time_ms, 100.0);
        assert!(metrics.last_success.is_some());
    }

    #[test]
    fn test_record_fetch_failure_categorised() {
        let mut metrics = ResolverMetrics::new();
        metrics.record_fetch_failure("Upstream returned HTTP 429 for x".to_string());
        metrics.record_fetch_failure("Upstream request to x timed out".to_string());

        assert_eq!(metrics.upstream_failures, 2);
        assert_eq!(metrics.rate_limit_hits, 1);
        assert_eq!(metrics.timeout_count, 1);
        assert_eq!(metrics.fetch_success_rate(), 0.0);
    }

    #[test]
    fn test_average_ignores_failures() {
        let mut metrics = ResolverMetrics::new();
        metrics.record_fetch_success(Duration::from_millis(100));
        metrics.record_fetch_failure("boom".to_string());
        metrics.record_fetch_success(Duration::from_millis(300));

        assert_eq!(metrics.average_fetch_time_ms, 200.0);
        assert!((metrics.fetch_success_rate() - 66.66).abs() < 0.1);
    }

    #[test]
    fn test_tracker_cache_counters() {
        let tracker = MetricsTracker::new();
        tracker.record_cache_hit();
        tracker.record_cache_miss();
        tracker.record_cache_read_failure("down");
        tracker.record_forced_refresh();

        let m = tracker.snapshot();
        assert_eq!(m.total_resolutions, 4);
        assert_eq!(m.cache_hits, 1);
        assert_eq!(m.cache_misses, 2);
        assert_eq!(m.cache_read_failures, 1);
        assert_eq!(m.forced_refreshes, 1);
        assert!((m.cache_hit_rate() - 33.33).abs() < 0.1);
    }

    #[tokio::test]
    async fn test_track_request_records_outcome() {
        let tracker = MetricsTracker::new();
        let ok: Result<u8, String> = track_request(&tracker, async { Ok(1) }).await;
        let err: Result<u8, String> = track_request(&tracker, async { Err("nope".to_string()) }).await;

        assert!(ok.is_ok());
        assert!(err.is_err());
        let m = tracker.snapshot();
        assert_eq!(m.upstream_fetches, 2);
        assert_eq!(m.upstream_failures, 1);
        assert_eq!(m.last_error.as_deref(), Some("nope"));
    }

    #[test]
    fn test_export_json() {
        let tracker = MetricsTracker::new();
        tracker.record_cache_hit();
        let json: serde_json::Value = serde_json::from_str(&tracker.export_json()).unwrap();
        assert_eq!(json["cache_hits"], 1);
    }
}
