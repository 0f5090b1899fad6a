//! HTTP entry points
//!
//! `GET /stream?slug=..&refresh=true` resolves an episode. A missing or blank
//! slug is rejected with 400 before the resolver runs. Every response carries
//! permissive CORS headers and `OPTIONS` preflights get an empty 200.

use crate::app_state::AppState;
use crate::error::ResolveError;
use crate::models::CacheRow;
use actix_web::error::InternalError;
use actix_web::http::StatusCode;
use actix_web::middleware::DefaultHeaders;
use actix_web::{get, options, web, HttpResponse, Responder};
use log::{error, warn};
use serde_json::json;

#[derive(Debug, Default)]
pub struct StreamQuery {
    pub slug: Option<String>,
    pub refresh: Option<String>,
}

impl StreamQuery {
    /// Repeated parameters keep their first value
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut query = Self::default();
        for (name, value) in pairs {
            match name.as_str() {
                "slug" if query.slug.is_none() => query.slug = Some(value),
                "refresh" if query.refresh.is_none() => query.refresh = Some(value),
                _ => {}
            }
        }
        query
    }

    /// Only the literal `"true"` forces a refresh
    pub fn force_refresh(&self) -> bool {
        self.refresh.as_deref() == Some("true")
    }
}

pub fn cors_headers() -> DefaultHeaders {
    DefaultHeaders::new()
        .add(("Access-Control-Allow-Origin", "*"))
        .add(("Access-Control-Allow-Methods", "GET, POST, OPTIONS"))
        .add((
            "Access-Control-Allow-Headers",
            "Content-Type, Authorization, X-Client-Info, Apikey",
        ))
}

/// Register every route, wrapped in the CORS headers
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("")
            .wrap(cors_headers())
            .app_data(web::QueryConfig::default().error_handler(|err, _req| {
                let body = json!({"success": false, "error": err.to_string()});
                InternalError::from_response(err, HttpResponse::BadRequest().json(body)).into()
            }))
            .service(get_stream)
            .service(preflight_stream)
            .service(get_cached_stream)
            .service(preflight_cached_stream)
            .service(get_metrics)
            .service(health),
    );
}

fn resolve_error_response(err: &ResolveError) -> HttpResponse {
    let status = match err {
        ResolveError::NoContentFound { .. } => StatusCode::NOT_FOUND,
        ResolveError::UpstreamUnavailable(_) | ResolveError::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    HttpResponse::build(status).json(json!({
        "success": false,
        "error": err.to_string(),
        "hint": err.hint(),
    }))
}

#[get("/stream")]
async fn get_stream(
    data: web::Data<AppState>,
    pairs: web::Query<Vec<(String, String)>>,
) -> impl Responder {
    let query = StreamQuery::from_pairs(pairs.into_inner());
    // Blank check only; the key itself is passed through untouched
    let slug = match query.slug.as_deref() {
        Some(s) if !s.trim().is_empty() => s,
        _ => {
            return HttpResponse::BadRequest().json(json!({"error": "Missing 'slug' parameter"}));
        }
    };

    match data.resolver.resolve(slug, query.force_refresh()).await {
        Ok(resolution) => HttpResponse::Ok().json(resolution.to_response()),
        Err(e) => {
            error!("Error resolving stream for {}: {}", slug, e);
            resolve_error_response(&e)
        }
    }
}

#[options("/stream")]
async fn preflight_stream() -> impl Responder {
    HttpResponse::Ok().finish()
}

/// Live cache rows for a slug, without touching the upstream
#[get("/stream/{slug}/cached")]
async fn get_cached_stream(data: web::Data<AppState>, slug: web::Path<String>) -> impl Responder {
    let rows: Vec<CacheRow> = match data.resolver.cached(&slug).await {
        Ok(Some(record)) => vec![CacheRow::from(&record)],
        Ok(None) => Vec::new(),
        Err(e) => {
            warn!("Error reading cached streams for {}: {}", slug.as_str(), e);
            Vec::new()
        }
    };
    HttpResponse::Ok().json(rows)
}

#[options("/stream/{slug}/cached")]
async fn preflight_cached_stream() -> impl Responder {
    HttpResponse::Ok().finish()
}

#[get("/metrics")]
async fn get_metrics(data: web::Data<AppState>) -> impl Responder {
    let m = data.metrics.snapshot();
    HttpResponse::Ok().json(json!({
        "cache_hit_rate": m.cache_hit_rate(),
        "fetch_success_rate": m.fetch_success_rate(),
        "metrics": m,
    }))
}

#[get("/health")]
async fn health(data: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "cache": data.resolver.cache_backend(),
        "extractor": data.resolver.extractor_name(),
    }))
}
