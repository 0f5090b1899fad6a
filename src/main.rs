use actix_web::{web, App, HttpServer};
use episode_stream_proxy::api;
use episode_stream_proxy::app_state::AppState;
use episode_stream_proxy::config::Config;
use episode_stream_proxy::metrics::MetricsTracker;
use std::sync::Arc;

fn init_logging() {
    if let Err(e) = log4rs::init_file("log4rs.yml", Default::default()) {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
        log::warn!("log4rs.yml not loaded ({}), using env_logger", e);
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    init_logging();

    let cfg = Config::load();
    let metrics = Arc::new(MetricsTracker::new());

    let resolver = match cfg.create_resolver(metrics).await {
        Ok(r) => r,
        Err(e) => {
            log::error!("Failed to initialise resolver: {}", e);
            return Err(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()));
        }
    };

    log::info!("Stream proxy initialized:");
    log::info!("  Upstream: {}", cfg.upstream.base_url);
    log::info!("  Timeout: {}s", cfg.upstream.timeout_secs);
    log::info!("  Extractor: {}", resolver.extractor_name());
    log::info!("  Cache: {} (ttl {}h)", resolver.cache_backend(), cfg.cache.ttl_hours);

    let data = web::Data::new(AppState::new(resolver));

    // Try to bind to an available port starting at the configured one
    let mut last_err: Option<std::io::Error> = None;
    let first = cfg.server.port;
    let last = first.saturating_add(cfg.server.port_range);
    for port in first..=last {
        let data_clone = data.clone();
        let addr = format!("{}:{}", cfg.server.host, port);
        match HttpServer::new(move || {
            App::new()
                .app_data(data_clone.clone())
                .configure(api::configure)
        })
        .bind(&addr)
        {
            Ok(server) => {
                log::info!("Listening on http://{}", addr);
                return server.run().await;
            }
            Err(e) => {
                log::warn!("Port {} unavailable: {}", port, e);
                last_err = Some(e);
            }
        }
    }

    Err(last_err.unwrap_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::AddrInUse, "no port available")
    }))
}
