//! Application state for the Actix-web server
//!
//! `AppState` is wrapped in `web::Data` and shared by every handler. The
//! resolver and its cache store are built once at start-up and reused across
//! requests; nothing else is shared between requests.

use crate::metrics::MetricsTracker;
use crate::resolver::Resolver;
use std::sync::Arc;

pub struct AppState {
    pub resolver: Resolver,
    /// Same tracker the resolver records into
    pub metrics: Arc<MetricsTracker>,
}

impl AppState {
    pub fn new(resolver: Resolver) -> Self {
        let metrics = resolver.metrics().clone();
        Self { resolver, metrics }
    }
}
