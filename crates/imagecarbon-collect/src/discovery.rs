//! Image discovery.
//!
//! Page rendering and extraction is delegated to a [`PageExtractor`]. The
//! extractor output is then cleaned up: empty and inline `data:` sources are
//! dropped and relative sources are resolved against the site's origin.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use imagecarbon_core::normalize::restore;
use imagecarbon_core::DiscoveredImage;
use scraper::{Html, Selector};
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use crate::error::{CollectError, Result};

/// Default ceiling for one discovery call.
pub const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Hosted scraping API endpoint.
pub const SCRAPINGBEE_ENDPOINT: &str = "https://app.scrapingbee.com/api/v1/";

/// Text the scraping API returns when the target disallows scraping.
const SCRAPINGBEE_FORBIDDEN_MARKER: &str = "If you wish to scrape";

/// Milliseconds the scraping API waits for the page to settle.
const SCRAPINGBEE_WAIT_MS: &str = "1000";

/// One `img` element as the extractor saw it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RawImage {
    #[serde(default)]
    pub src: Option<String>,
    #[serde(default)]
    pub loading: Option<String>,
}

impl RawImage {
    pub fn new(src: impl Into<String>) -> Self {
        Self {
            src: Some(src.into()),
            loading: None,
        }
    }
}

/// Renders a page and lists its images.
#[async_trait]
pub trait PageExtractor: Send + Sync {
    /// Returns every `img` element on the page at `site_url`.
    ///
    /// Must return [`CollectError::DiscoveryForbidden`] when the target
    /// refuses automated access.
    async fn extract(&self, site_url: &str) -> Result<Vec<RawImage>>;
}

/// Extraction through the ScrapingBee API, which renders JavaScript.
pub struct ScrapingBeeExtractor {
    client: reqwest::Client,
    api_key: String,
}

impl ScrapingBeeExtractor {
    pub fn new(client: reqwest::Client, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
        }
    }

    fn request_url(&self, site_url: &str) -> Result<Url> {
        let rules = serde_json::json!({
            "images": {
                "selector": "img",
                "type": "list",
                "output": {
                    "src": "img@src",
                    "loading": "img@loading"
                }
            }
        });

        Url::parse_with_params(
            SCRAPINGBEE_ENDPOINT,
            &[
                ("api_key", self.api_key.as_str()),
                ("url", site_url),
                ("extract_rules", rules.to_string().as_str()),
                ("wait", SCRAPINGBEE_WAIT_MS),
            ],
        )
        .map_err(|e| CollectError::Pipeline(format!("Bad scraping request: {}", e)))
    }
}

#[derive(Debug, Deserialize)]
struct ExtractResponse {
    #[serde(default)]
    images: Vec<RawImage>,
}

#[async_trait]
impl PageExtractor for ScrapingBeeExtractor {
    async fn extract(&self, site_url: &str) -> Result<Vec<RawImage>> {
        let url = self.request_url(site_url)?;
        let response = self.client.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if body.contains(SCRAPINGBEE_FORBIDDEN_MARKER) {
            return Err(CollectError::DiscoveryForbidden);
        }

        if !status.is_success() {
            return Err(CollectError::Pipeline(format!(
                "Scraping API returned {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let parsed: ExtractResponse = serde_json::from_str(&body)?;
        Ok(parsed.images)
    }
}

/// Extraction by fetching the page and parsing its static HTML.
///
/// Images inserted by scripts are not seen.
pub struct HtmlExtractor {
    client: reqwest::Client,
}

impl HtmlExtractor {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageExtractor for HtmlExtractor {
    async fn extract(&self, site_url: &str) -> Result<Vec<RawImage>> {
        let response = self.client.get(site_url).send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::FORBIDDEN || status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(CollectError::DiscoveryForbidden);
        }

        if !status.is_success() {
            return Err(CollectError::Pipeline(format!(
                "Page returned {}",
                status
            )));
        }

        let body = response.text().await?;
        Ok(parse_img_tags(&body))
    }
}

/// Lists the `src` and `loading` attributes of every `img` in a document.
pub fn parse_img_tags(html: &str) -> Vec<RawImage> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("img") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .map(|element| RawImage {
            src: element.value().attr("src").map(str::to_string),
            loading: element.value().attr("loading").map(str::to_string),
        })
        .collect()
}

/// Turns extractor output into absolute image URLs.
///
/// Order is preserved and nothing is deduplicated.
pub fn resolve_sources(site_url: &str, raw: Vec<RawImage>) -> Vec<DiscoveredImage> {
    let base = match Url::parse(&restore(site_url)) {
        Ok(base) => base,
        Err(e) => {
            warn!(site_url, error = %e, "Cannot resolve image sources");
            return Vec::new();
        }
    };
    let origin = base.origin().ascii_serialization();

    raw.into_iter()
        .filter_map(|image| {
            let src = image.src.as_deref().map(str::trim).unwrap_or_default();
            let url = resolve_source(&base, &origin, src)?;
            Some(DiscoveredImage {
                url,
                loading: image.loading,
            })
        })
        .collect()
}

fn resolve_source(base: &Url, origin: &str, src: &str) -> Option<String> {
    if src.is_empty() || src.starts_with("data:") {
        return None;
    }

    if let Some(rest) = src.strip_prefix("//") {
        return Some(format!("{}://{}", base.scheme(), rest));
    }

    // Schemes are case-insensitive in markup; the parser lowercases them
    if let Ok(absolute) = Url::parse(src) {
        if matches!(absolute.scheme(), "http" | "https") {
            return Some(absolute.to_string());
        }
        debug!(src, scheme = absolute.scheme(), "Skipping non-HTTP image source");
        return None;
    }

    Some(format!("{}/{}", origin, src.trim_start_matches('/')))
}

/// Discovery with a deadline.
#[derive(Clone)]
pub struct ImageDiscovery {
    extractor: Arc<dyn PageExtractor>,
    timeout: Duration,
}

impl ImageDiscovery {
    pub fn new(extractor: Arc<dyn PageExtractor>) -> Self {
        Self {
            extractor,
            timeout: DEFAULT_DISCOVERY_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Lists the images of a site.
    ///
    /// The extractor call is abandoned once the timeout fires.
    pub async fn discover(&self, site_url: &str) -> Result<Vec<DiscoveredImage>> {
        let target = restore(site_url);

        let raw = match tokio::time::timeout(self.timeout, self.extractor.extract(&target)).await {
            Ok(result) => result?,
            Err(_) => return Err(CollectError::DiscoveryTimeout(self.timeout)),
        };

        let found = raw.len();
        let images = resolve_sources(site_url, raw);
        debug!(site_url, found, kept = images.len(), "Discovered images");

        Ok(images)
    }
}
