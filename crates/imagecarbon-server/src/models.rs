//! API request and response models.

use chrono::{DateTime, Utc};
use imagecarbon_collect::CalculatedImage;
use imagecarbon_core::{DiscoveredImage, ImageRecord};
use serde::{Deserialize, Serialize};

/// Request body for POST /api/collect.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectRequest {
    /// Image URLs to upload and measure.
    pub images: Vec<String>,
    pub site_url: String,
}

/// Request body for POST /api/scrape.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeRequest {
    pub site_url: String,
}

/// Response body for POST /api/scrape.
#[derive(Debug, Serialize, Deserialize)]
pub struct ScrapeResponse {
    pub images: Vec<DiscoveredImage>,
}

/// Query parameters naming a site.
#[derive(Debug, Deserialize)]
pub struct SiteQuery {
    pub url: String,
}

/// Response body for GET /api/sites/cache.
///
/// Every field is absent on a miss, leaving an empty object.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_collected: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<ImageRecord>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
}

/// Response body for GET /api/sites/refresh.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Request body for POST /api/sites/add.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddSiteRequest {
    pub images: Vec<ImageRecord>,
    pub site_url: String,
    #[serde(default)]
    pub screenshot: Option<String>,
}

/// Response body for POST /api/sites/add.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddSiteResponse {
    pub images: Vec<ImageRecord>,
    pub date_collected: DateTime<Utc>,
}

/// Request body for POST /api/sites/run.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    pub site_url: String,
    /// Ignore and replace any cached result.
    #[serde(default)]
    pub refresh: bool,
}

/// Query parameters for GET /api/sites/report.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportQuery {
    pub url: String,
    #[serde(default)]
    pub show_all: bool,
    pub monthly_requests: Option<u64>,
}

/// Site entry in GET /api/sites.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteEntry {
    pub site_url: String,
    pub date_collected: Option<DateTime<Utc>>,
    pub screenshot: Option<String>,
}

/// Response body for GET /api/sites.
#[derive(Debug, Serialize)]
pub struct SitesResponse {
    pub sites: Vec<SiteEntry>,
    pub total: usize,
}

/// Request body for POST /api/calculate.
#[derive(Debug, Deserialize)]
pub struct CalculateRequest {
    pub images: Vec<String>,
}

/// Response body for POST /api/calculate.
#[derive(Debug, Serialize)]
pub struct CalculateResponse {
    pub images: Vec<CalculatedImage>,
}
