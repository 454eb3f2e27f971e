//! API route handlers.

use axum::extract::{Query, State};
use axum::Json;
use imagecarbon_collect::{validate_site_url, SiteCollection};
use imagecarbon_core::{Collection, MonthlyRequests, ReportOptions, SiteReport};
use tracing::{debug, info, warn};

use crate::error::{ApiError, Result};
use crate::models::{
    AddSiteRequest, AddSiteResponse, CacheResponse, CalculateRequest, CalculateResponse,
    CollectRequest, MessageResponse, ReportQuery, RunRequest, ScrapeRequest, ScrapeResponse,
    SiteEntry, SiteQuery, SitesResponse,
};
use crate::state::AppState;

/// POST /api/collect - Upload and measure a list of images.
pub async fn collect(
    State(state): State<AppState>,
    Json(req): Json<CollectRequest>,
) -> Result<Json<Collection>> {
    let site_url = validate_site_url(&req.site_url)?;
    info!(site_url = %site_url, images = req.images.len(), "Collect request");

    let collection = state
        .collector
        .collect(&site_url, &req.images)
        .await
        .inspect_err(|e| warn!(site_url = %site_url, error = %e, "Failed to collect image assets"))?;

    Ok(Json(collection))
}

/// POST /api/scrape - List a site's images.
pub async fn scrape(
    State(state): State<AppState>,
    Json(req): Json<ScrapeRequest>,
) -> Result<Json<ScrapeResponse>> {
    let images = state.collector.scrape(&req.site_url).await?;
    Ok(Json(ScrapeResponse { images }))
}

/// GET /api/sites/cache - Fresh cached images of a site, or an empty object.
pub async fn get_cache(
    State(state): State<AppState>,
    Query(query): Query<SiteQuery>,
) -> Result<Json<CacheResponse>> {
    let url = require_url(&query.url)?;

    let response = match state.collector.cached(url)? {
        Some(hit) => CacheResponse {
            date_collected: Some(hit.date_collected),
            images: Some(hit.images),
            screenshot: hit.screenshot,
        },
        None => CacheResponse::default(),
    };

    Ok(Json(response))
}

/// GET /api/sites/refresh - Invalidate a site's cache entry.
pub async fn refresh_site(
    State(state): State<AppState>,
    Query(query): Query<SiteQuery>,
) -> Result<Json<MessageResponse>> {
    let url = require_url(&query.url)?;
    state.collector.refresh(url)?;
    debug!(url, "Cache cleared");

    Ok(Json(MessageResponse {
        message: "ok".to_string(),
    }))
}

/// POST /api/sites/add - Store a collected image set.
pub async fn add_site(
    State(state): State<AppState>,
    Json(req): Json<AddSiteRequest>,
) -> Result<Json<AddSiteResponse>> {
    let site_url = validate_site_url(&req.site_url)?;

    let date_collected = state
        .collector
        .add(&site_url, &req.images, req.screenshot.as_deref())
        .inspect_err(|e| warn!(site_url = %site_url, error = %e, "Failed to add site"))?;

    Ok(Json(AddSiteResponse {
        images: req.images,
        date_collected,
    }))
}

/// POST /api/sites/run - Collect a site end to end, using the cache when fresh.
pub async fn run_site(
    State(state): State<AppState>,
    Json(req): Json<RunRequest>,
) -> Result<Json<SiteCollection>> {
    let collection = state.collector.run(&req.site_url, req.refresh).await?;
    Ok(Json(collection))
}

/// GET /api/sites/report - Aggregated report of a cached site.
pub async fn get_report(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<SiteReport>> {
    let url = require_url(&query.url)?;

    let collection = state
        .collector
        .cached(url)?
        .ok_or_else(|| ApiError::NotFound(format!("no fresh collection for {}", url)))?;

    let options = ReportOptions {
        show_all: query.show_all,
        monthly_requests: query
            .monthly_requests
            .map(MonthlyRequests::new)
            .unwrap_or_default(),
    };

    Ok(Json(collection.report(options, &state.report_config)))
}

/// GET /api/sites - Every known site.
pub async fn list_sites(State(state): State<AppState>) -> Result<Json<SitesResponse>> {
    let sites: Vec<SiteEntry> = state
        .db()
        .list_sites()?
        .into_iter()
        .map(|site| SiteEntry {
            site_url: site.site_url,
            date_collected: site.date_collected,
            screenshot: site.screenshot,
        })
        .collect();

    let total = sites.len();
    Ok(Json(SitesResponse { sites, total }))
}

/// POST /api/calculate - Size and CO2 of images as served.
pub async fn calculate(
    State(state): State<AppState>,
    Json(req): Json<CalculateRequest>,
) -> Result<Json<CalculateResponse>> {
    let images = state.collector.calculate(&req.images).await;
    Ok(Json(CalculateResponse { images }))
}

fn require_url(url: &str) -> Result<&str> {
    let url = url.trim();
    if url.is_empty() {
        return Err(ApiError::BadRequest("missing url".to_string()));
    }
    Ok(url)
}
