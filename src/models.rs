use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Quality label assigned by the pattern family that matched.
/// Not verified against the actual media.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quality {
    #[serde(rename = "720p")]
    P720,
    #[serde(rename = "480p")]
    P480,
}

impl Quality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Quality::P720 => "720p",
            Quality::P480 => "480p",
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Quality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "720p" => Ok(Quality::P720),
            "480p" => Ok(Quality::P480),
            other => Err(format!("unknown quality label '{}'", other)),
        }
    }
}

/// Which extraction pattern produced a candidate
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    #[serde(rename = "primary-host")]
    PrimaryHost,
    #[serde(rename = "mirror-host")]
    MirrorHost,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::PrimaryHost => "primary-host",
            Provider::MirrorHost => "mirror-host",
        }
    }

    /// Every provider is bound to exactly one quality label
    pub fn quality(&self) -> Quality {
        match self {
            Provider::PrimaryHost => Quality::P720,
            Provider::MirrorHost => Quality::P480,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "primary-host" => Ok(Provider::PrimaryHost),
            "mirror-host" => Ok(Provider::MirrorHost),
            other => Err(format!("unknown provider label '{}'", other)),
        }
    }
}

/// One extracted player reference, before selection
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct CandidateStream {
    pub url: String,
    pub quality: Quality,
    pub provider: Provider,
}

impl CandidateStream {
    pub fn new(url: impl Into<String>, provider: Provider) -> Self {
        Self {
            url: url.into(),
            quality: provider.quality(),
            provider,
        }
    }
}

/// One cached resolution result, keyed by episode
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct StreamRecord {
    pub episode_key: String,
    pub embed_url: String,
    pub stream_url: String,
    pub quality: Quality,
    pub provider: Provider,
    pub expires_at: DateTime<Utc>,
}

impl StreamRecord {
    /// Build the record for a winning candidate. Embeds are served as-is,
    /// so the stream URL is the embed URL.
    pub fn from_candidate(
        episode_key: &str,
        candidate: &CandidateStream,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            episode_key: episode_key.to_string(),
            embed_url: candidate.url.clone(),
            stream_url: candidate.url.clone(),
            quality: candidate.quality,
            provider: candidate.provider,
            expires_at,
        }
    }

    /// Live means `expires_at` is strictly after `now`
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// Row shape of the `streaming_cache` table, as exposed by the cache peek endpoint
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct CacheRow {
    pub episode_slug: String,
    pub embed_url: String,
    pub stream_url: String,
    pub quality: String,
    pub provider: String,
    pub expires_at: DateTime<Utc>,
}

impl From<&StreamRecord> for CacheRow {
    fn from(record: &StreamRecord) -> Self {
        Self {
            episode_slug: record.episode_key.clone(),
            embed_url: record.embed_url.clone(),
            stream_url: record.stream_url.clone(),
            quality: record.quality.to_string(),
            provider: record.provider.to_string(),
            expires_at: record.expires_at,
        }
    }
}

impl TryFrom<CacheRow> for StreamRecord {
    type Error = String;

    fn try_from(row: CacheRow) -> Result<Self, Self::Error> {
        Ok(Self {
            quality: row.quality.parse()?,
            provider: row.provider.parse()?,
            episode_key: row.episode_slug,
            embed_url: row.embed_url,
            stream_url: row.stream_url,
            expires_at: row.expires_at,
        })
    }
}

/// `data` object of a successful response
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StreamData {
    pub embed_url: String,
    pub stream_url: String,
    pub quality: String,
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub all_embeds: Option<Vec<CandidateStream>>,
    pub expires_at: DateTime<Utc>,
}

/// Body returned by the stream endpoint, success or failure
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct StreamResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cached: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<StreamData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}
