// Library interface for episode_stream_proxy
// The binary and the integration tests both build on these modules

pub mod api;
pub mod app_state;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod extractor;
pub mod http_client;
pub mod metrics;
pub mod models;
pub mod resolver;
pub mod throttle;
