//! Test doubles shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use episode_stream_proxy::cache::{CacheStore, MemoryCacheStore};
use episode_stream_proxy::error::{CacheError, FetchError};
use episode_stream_proxy::extractor::RegexExtractor;
use episode_stream_proxy::http_client::PageFetcher;
use episode_stream_proxy::models::StreamRecord;
use episode_stream_proxy::resolver::Resolver;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const PRIMARY_HOST: &str = "primary.example";
pub const UPSTREAM_BASE: &str = "https://upstream.example/episode";

/// Memory store that counts calls and can be told to fail
#[derive(Default)]
pub struct CountingStore {
    pub inner: MemoryCacheStore,
    pub gets: AtomicUsize,
    pub upserts: AtomicUsize,
    pub fail_reads: AtomicBool,
    pub fail_writes: AtomicBool,
}

impl CountingStore {
    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn upserts(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CacheStore for CountingStore {
    async fn get(
        &self,
        episode_key: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<StreamRecord>, CacheError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(CacheError::Connection("store offline".to_string()));
        }
        self.inner.get(episode_key, now).await
    }

    async fn upsert(&self, record: &StreamRecord) -> Result<(), CacheError> {
        self.upserts.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CacheError::Query("write rejected".to_string()));
        }
        self.inner.upsert(record).await
    }

    fn backend(&self) -> &'static str {
        "counting"
    }
}

/// What the fake upstream answers with
#[derive(Clone)]
pub enum Upstream {
    Page(String),
    Status(u16),
    Timeout,
}

/// Upstream fake that records every requested URL
pub struct FakeUpstream {
    pub response: Mutex<Upstream>,
    pub requests: Mutex<Vec<String>>,
}

impl FakeUpstream {
    pub fn page(html: &str) -> Self {
        Self::with(Upstream::Page(html.to_string()))
    }

    pub fn with(response: Upstream) -> Self {
        Self {
            response: Mutex::new(response),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn set(&self, response: Upstream) {
        *self.response.lock().unwrap() = response;
    }

    pub fn fetches(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requested(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageFetcher for FakeUpstream {
    async fn fetch_html(&self, url: &str) -> Result<String, FetchError> {
        self.requests.lock().unwrap().push(url.to_string());
        let response = self.response.lock().unwrap().clone();
        match response {
            Upstream::Page(html) => Ok(html),
            Upstream::Status(status) => Err(FetchError::Status {
                url: url.to_string(),
                status,
            }),
            Upstream::Timeout => Err(FetchError::Timeout { url: url.to_string() }),
        }
    }
}

pub struct Harness {
    pub store: Arc<CountingStore>,
    pub upstream: Arc<FakeUpstream>,
    pub resolver: Resolver,
}

pub fn harness(upstream: FakeUpstream) -> Harness {
    let store = Arc::new(CountingStore::default());
    let upstream = Arc::new(upstream);
    let extractor = RegexExtractor::new(&[PRIMARY_HOST.to_string()], "mirror").unwrap();
    let resolver = Resolver::new(store.clone(), upstream.clone(), Arc::new(extractor))
        .with_upstream_base(UPSTREAM_BASE);
    Harness {
        store,
        upstream,
        resolver,
    }
}

pub fn iframe(url: &str) -> String {
    format!(r#"<iframe src="{}" frameborder="0" allowfullscreen></iframe>"#, url)
}

pub fn page(body: &str) -> String {
    format!(
        "<!DOCTYPE html><html><head><title>Episode</title></head><body><div id=\"lightsVideo\">{}</div></body></html>",
        body
    )
}
