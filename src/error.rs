//! Error types for upstream fetching, cache access and resolution

/// Errors from fetching the upstream episode page
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Upstream returned HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Upstream request to {url} timed out")]
    Timeout { url: String },

    #[error("Upstream request to {url} failed: {reason}")]
    Transport { url: String, reason: String },
}

impl FetchError {
    pub fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout { url: url.to_string() }
        } else if let Some(status) = err.status() {
            FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            }
        } else {
            FetchError::Transport {
                url: url.to_string(),
                reason: err.to_string(),
            }
        }
    }
}

/// Errors from the cache store. Always recovered by the resolver.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Cache connection error: {0}")]
    Connection(String),

    #[error("Cache query error: {0}")]
    Query(String),

    #[error("Cache row could not be decoded: {0}")]
    Decode(String),
}

impl From<rusqlite::Error> for CacheError {
    fn from(err: rusqlite::Error) -> Self {
        CacheError::Query(err.to_string())
    }
}

impl From<tokio_postgres::Error> for CacheError {
    fn from(err: tokio_postgres::Error) -> Self {
        CacheError::Query(err.to_string())
    }
}

impl From<deadpool_postgres::PoolError> for CacheError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        CacheError::Connection(err.to_string())
    }
}

/// User-visible failure outcomes of a resolution
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("Failed to fetch episode page: {0}")]
    UpstreamUnavailable(#[from] FetchError),

    #[error("No embed URLs found")]
    NoContentFound { episode_key: String },

    #[error("{0}")]
    Internal(String),
}

impl ResolveError {
    /// Guidance shown to the user alongside the error
    pub fn hint(&self) -> &'static str {
        match self {
            ResolveError::NoContentFound { .. } => "Episode might not be available yet",
            ResolveError::UpstreamUnavailable(_) => "Streaming source is unreachable, try again later",
            ResolveError::Internal(_) => "Unexpected server error",
        }
    }
}

/// Configuration values rejected at start-up
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cache.ttl_hours must be between 1 and {max}, got {hours}")]
    InvalidTtl { hours: i64, max: i64 },
}

/// Errors raised by the caller-side client
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Request to stream proxy failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Stream proxy returned an unreadable body (HTTP {status}): {reason}")]
    Decode { status: u16, reason: String },

    #[error("{error}")]
    Unsuccessful { error: String, hint: Option<String> },
}
