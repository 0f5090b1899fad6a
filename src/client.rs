//! Caller-side client for the stream endpoint
//!
//! Mirrors what the web UI does: call `/stream`, fail on an unsuccessful
//! payload, and reshape the data for display.

use crate::error::ClientError;
use crate::models::{CacheRow, CandidateStream, StreamResponse};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

const DEFAULT_FAILURE: &str = "Failed to fetch streaming URL";

/// Stream details as consumed by the player UI
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamingUrl {
    pub embed_url: String,
    pub stream_url: String,
    pub quality: String,
    pub provider: String,
    pub all_embeds: Vec<CandidateStream>,
    pub cached: bool,
    pub expires_at: DateTime<Utc>,
}

impl StreamingUrl {
    /// Reshape a decoded response body. Unsuccessful bodies become errors
    /// carrying the server's message and hint verbatim.
    pub fn from_response(payload: StreamResponse) -> Result<Self, ClientError> {
        if !payload.success {
            return Err(ClientError::Unsuccessful {
                error: payload.error.unwrap_or_else(|| DEFAULT_FAILURE.to_string()),
                hint: payload.hint,
            });
        }
        let data = payload.data.ok_or_else(|| ClientError::Unsuccessful {
            error: DEFAULT_FAILURE.to_string(),
            hint: None,
        })?;

        Ok(Self {
            embed_url: data.embed_url,
            stream_url: data.stream_url,
            quality: data.quality,
            provider: data.provider,
            all_embeds: data.all_embeds.unwrap_or_default(),
            cached: payload.cached.unwrap_or(false),
            expires_at: data.expires_at,
        })
    }
}

pub struct StreamingClient {
    http: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl StreamingClient {
    /// `endpoint` is the full URL of the stream route, e.g. `http://host:8080/stream`
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> Result<Self, ClientError> {
        let http = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
            api_key,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    pub async fn get_streaming_url(
        &self,
        episode_slug: &str,
        force_refresh: bool,
    ) -> Result<StreamingUrl, ClientError> {
        let mut params = vec![("slug", episode_slug)];
        if force_refresh {
            params.push(("refresh", "true"));
        }

        let request = self.authorize(self.http.get(&self.endpoint).query(&params));
        let response = request.send().await.map_err(|e| {
            log::error!("Error fetching streaming URL: {}", e);
            ClientError::Transport(e)
        })?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        let payload: StreamResponse =
            serde_json::from_str(&body).map_err(|e| ClientError::Decode {
                status,
                reason: e.to_string(),
            })?;

        StreamingUrl::from_response(payload).map_err(|e| {
            log::error!("Error fetching streaming URL: {}", e);
            e
        })
    }

    /// Live cache rows for a slug. Failures are logged and yield an empty list.
    pub async fn get_cached_streams(&self, episode_slug: &str) -> Vec<CacheRow> {
        let url = format!("{}/{}/cached", self.endpoint.trim_end_matches('/'), episode_slug);
        let result = async {
            let response = self.authorize(self.http.get(&url)).send().await?;
            response.error_for_status()?.json::<Vec<CacheRow>>().await
        }
        .await;

        match result {
            Ok(rows) => rows,
            Err(e) => {
                log::error!("Error getting cached streams: {}", e);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode(value: serde_json::Value) -> Result<StreamingUrl, ClientError> {
        StreamingUrl::from_response(serde_json::from_value(value).unwrap())
    }

    #[test]
    fn test_fresh_payload() {
        let url = decode(json!({
            "success": true,
            "cached": false,
            "data": {
                "embedUrl": "https://primary.example/abc",
                "streamUrl": "https://primary.example/abc",
                "quality": "720p",
                "provider": "primary-host",
                "allEmbeds": [{"url": "https://primary.example/abc", "quality": "720p", "provider": "primary-host"}],
                "expiresAt": "2030-01-01T00:00:00Z"
            }
        }))
        .unwrap();

        assert_eq!(url.embed_url, "https://primary.example/abc");
        assert!(!url.cached);
        assert_eq!(url.all_embeds.len(), 1);
    }

    #[test]
    fn test_cached_payload_defaults_embeds() {
        let url = decode(json!({
            "success": true,
            "cached": true,
            "data": {
                "embedUrl": "u", "streamUrl": "u", "quality": "480p", "provider": "mirror-host",
                "expiresAt": "2030-01-01T00:00:00Z"
            }
        }))
        .unwrap();

        assert!(url.cached);
        assert!(url.all_embeds.is_empty());
    }

    #[test]
    fn test_not_found_keeps_hint() {
        let err = decode(json!({
            "success": false,
            "error": "No embed URLs found",
            "hint": "Episode might not be available yet"
        }))
        .unwrap_err();

        match err {
            ClientError::Unsuccessful { error, hint } => {
                assert_eq!(error, "No embed URLs found");
                assert_eq!(hint.as_deref(), Some("Episode might not be available yet"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_missing_slug_body_is_unsuccessful() {
        // The 400 body has no `success` field
        let err = decode(json!({"error": "Missing 'slug' parameter"})).unwrap_err();
        assert_eq!(err.to_string(), "Missing 'slug' parameter");
    }

    #[test]
    fn test_success_without_data_is_error() {
        let err = decode(json!({"success": true})).unwrap_err();
        assert_eq!(err.to_string(), DEFAULT_FAILURE);
    }

    #[test]
    fn test_serializes_camel_case_for_ui() {
        let url = decode(json!({
            "success": true, "cached": true,
            "data": {"embedUrl": "u", "streamUrl": "u", "quality": "720p", "provider": "primary-host",
                     "expiresAt": "2030-01-01T00:00:00Z"}
        }))
        .unwrap();
        let json = serde_json::to_value(&url).unwrap();
        assert_eq!(json["embedUrl"], "u");
        assert_eq!(json["allEmbeds"], json!([]));
    }
}
