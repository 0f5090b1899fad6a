use crate::cache::{CacheStore, MemoryCacheStore, PgCacheStore, PgSettings, SqliteCacheStore};
use crate::error::ConfigError;
use crate::extractor::{DomExtractor, EmbedExtractor, RegexExtractor};
use crate::http_client::{HttpClientConfig, UpstreamClient};
use crate::metrics::MetricsTracker;
use crate::resolver::{Resolver, DEFAULT_TTL_HOURS, DEFAULT_UPSTREAM_BASE};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Upper bound on `cache.ttl_hours` (one year)
pub const MAX_TTL_HOURS: i64 = 24 * 365;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub extractor: ExtractorConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// How many successive ports to try when the first is taken
    #[serde(default = "default_port_range")]
    pub port_range: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UpstreamConfig {
    /// Episode pages live at `{base_url}/{slug}`
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Upper bound on one upstream fetch, exceeding it is a fetch failure
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Minimum spacing between fetches of the same episode (0 disables)
    #[serde(default)]
    pub min_fetch_interval_ms: u64,

    #[serde(default = "default_true")]
    pub rotate_user_agent: bool,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExtractorStrategy {
    #[default]
    Regex,
    Dom,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExtractorConfig {
    #[serde(default)]
    pub strategy: ExtractorStrategy,
    #[serde(default = "default_primary_hosts")]
    pub primary_hosts: Vec<String>,
    #[serde(default = "default_mirror_marker")]
    pub mirror_marker: String,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    #[default]
    Sqlite,
    Postgres,
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default)]
    pub backend: CacheBackend,
    #[serde(default = "default_ttl_hours")]
    pub ttl_hours: i64,
    #[serde(default = "default_sqlite_path")]
    pub sqlite_path: String,
    #[serde(default = "default_pg_host")]
    pub host: String,
    #[serde(default = "default_pg_port")]
    pub port: u16,
    #[serde(default = "default_pg_dbname")]
    pub dbname: String,
    #[serde(default = "default_pg_user")]
    pub user: String,
    #[serde(default)]
    pub password: String,
}

fn default_true() -> bool { true }
fn default_host() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16 { 8080 }
fn default_port_range() -> u16 { 10 }
fn default_base_url() -> String { DEFAULT_UPSTREAM_BASE.to_string() }
fn default_timeout() -> u64 { 10 }
fn default_primary_hosts() -> Vec<String> {
    vec!["desustream.me".to_string(), "desustream.info".to_string()]
}
fn default_mirror_marker() -> String { "mirror".to_string() }
fn default_ttl_hours() -> i64 { DEFAULT_TTL_HOURS }
fn default_sqlite_path() -> String { "stream_cache.db".to_string() }
fn default_pg_host() -> String { "localhost".to_string() }
fn default_pg_port() -> u16 { 5432 }
fn default_pg_dbname() -> String { "stream_proxy".to_string() }
fn default_pg_user() -> String { "stream_proxy".to_string() }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            port_range: default_port_range(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
            min_fetch_interval_ms: 0,
            rotate_user_agent: true,
        }
    }
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            strategy: ExtractorStrategy::Regex,
            primary_hosts: default_primary_hosts(),
            mirror_marker: default_mirror_marker(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::Sqlite,
            ttl_hours: default_ttl_hours(),
            sqlite_path: default_sqlite_path(),
            host: default_pg_host(),
            port: default_pg_port(),
            dbname: default_pg_dbname(),
            user: default_pg_user(),
            password: String::new(),
        }
    }
}

impl Config {
    /// Load `config.toml` from the working directory, falling back to defaults
    pub fn load() -> Self {
        Self::load_from(Path::new("config.toml"))
    }

    pub fn load_from(path: &Path) -> Self {
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(content) => match Self::from_toml_str(&content) {
                    Ok(cfg) => return cfg,
                    Err(e) => log::warn!("Ignoring invalid {}: {}", path.display(), e),
                },
                Err(e) => log::warn!("Could not read {}: {}", path.display(), e),
            }
        }
        Self::default()
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str::<Config>(content)
    }

    /// Reject values that would make the service misbehave once running
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.cache.ttl()?;
        Ok(())
    }

    /// Wire the resolver and its collaborators. Called once at start-up.
    pub async fn create_resolver(
        &self,
        metrics: Arc<MetricsTracker>,
    ) -> Result<Resolver, Box<dyn std::error::Error>> {
        let ttl = self.cache.ttl()?;
        let store = self.cache.create_store().await?;
        let fetcher = Arc::new(self.upstream.create_http_client()?);
        let extractor = self.extractor.create_extractor()?;

        Ok(Resolver::new(store, fetcher, extractor)
            .with_upstream_base(self.upstream.base_url.clone())
            .with_ttl(ttl)
            .with_min_fetch_interval(Duration::from_millis(self.upstream.min_fetch_interval_ms))
            .with_metrics(metrics))
    }
}

impl UpstreamConfig {
    /// Create the upstream HTTP client from this configuration
    pub fn create_http_client(&self) -> Result<UpstreamClient, reqwest::Error> {
        let config = HttpClientConfig {
            timeout: Duration::from_secs(self.timeout_secs),
            rotate_user_agent: self.rotate_user_agent,
            ..HttpClientConfig::default()
        };
        UpstreamClient::with_config(config)
    }
}

impl ExtractorConfig {
    pub fn create_extractor(&self) -> Result<Arc<dyn EmbedExtractor>, Box<dyn std::error::Error>> {
        let extractor: Arc<dyn EmbedExtractor> = match self.strategy {
            ExtractorStrategy::Regex => {
                Arc::new(RegexExtractor::new(&self.primary_hosts, &self.mirror_marker)?)
            }
            ExtractorStrategy::Dom => {
                Arc::new(DomExtractor::new(&self.primary_hosts, &self.mirror_marker)?)
            }
        };
        Ok(extractor)
    }
}

impl CacheConfig {
    /// Record lifetime, checked against `1..=MAX_TTL_HOURS`
    pub fn ttl(&self) -> Result<chrono::Duration, ConfigError> {
        if !(1..=MAX_TTL_HOURS).contains(&self.ttl_hours) {
            return Err(ConfigError::InvalidTtl {
                hours: self.ttl_hours,
                max: MAX_TTL_HOURS,
            });
        }
        Ok(chrono::Duration::hours(self.ttl_hours))
    }

    pub fn pg_settings(&self) -> PgSettings {
        PgSettings {
            host: self.host.clone(),
            port: self.port,
            dbname: self.dbname.clone(),
            user: self.user.clone(),
            password: self.password.clone(),
        }
    }

    pub async fn create_store(&self) -> Result<Arc<dyn CacheStore>, crate::error::CacheError> {
        let store: Arc<dyn CacheStore> = match self.backend {
            CacheBackend::Memory => Arc::new(MemoryCacheStore::new()),
            CacheBackend::Sqlite => Arc::new(SqliteCacheStore::open(&self.sqlite_path)?),
            CacheBackend::Postgres => Arc::new(PgCacheStore::connect(&self.pg_settings()).await?),
        };
        Ok(store)
    }
}
