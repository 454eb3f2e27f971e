//! Site collector: the whole flow for one site.
//!
//! ```text
//! raw URL → validate → normalize → cache fresh? ──yes──→ cached images
//!                                        │ no
//!                                        ▼
//!                         discover → upload & measure → cache write
//! ```

use chrono::{DateTime, Utc};
use imagecarbon_core::{
    is_valid_url, normalize_site, restore, Collection, DiscoveredImage, ImageRecord,
    ReportConfig, ReportOptions, SiteReport,
};
use imagecarbon_storage::{CachedSite, SiteCache};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::discovery::ImageDiscovery;
use crate::error::{CollectError, Result};
use crate::pipeline::{CalculatedImage, CollectionPipeline};

/// Images of a site plus where they came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteCollection {
    pub site_url: String,
    pub date_collected: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
    pub images: Vec<ImageRecord>,
    /// True when served from the cache without collecting.
    pub from_cache: bool,
    /// Images dropped during this run.
    #[serde(default)]
    pub failed: usize,
}

impl SiteCollection {
    fn from_cache(hit: CachedSite) -> Self {
        Self {
            site_url: hit.site_url,
            date_collected: hit.date_collected,
            screenshot: hit.screenshot,
            images: hit.images,
            from_cache: true,
            failed: 0,
        }
    }

    /// Aggregates the images into a report.
    pub fn report(&self, options: ReportOptions, config: &ReportConfig) -> SiteReport {
        SiteReport::build(
            &self.site_url,
            Some(self.date_collected),
            self.screenshot.clone(),
            &self.images,
            options,
            config,
        )
    }
}

/// Rejects input that is not a site URL and returns its cache key.
pub fn validate_site_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || !is_valid_url(&restore(trimmed)) {
        return Err(CollectError::InvalidUrl(raw.to_string()));
    }
    Ok(normalize_site(trimmed))
}

/// Entry point for every site operation.
#[derive(Clone)]
pub struct SiteCollector {
    discovery: ImageDiscovery,
    pipeline: CollectionPipeline,
    cache: SiteCache,
}

impl SiteCollector {
    pub fn new(discovery: ImageDiscovery, pipeline: CollectionPipeline, cache: SiteCache) -> Self {
        Self {
            discovery,
            pipeline,
            cache,
        }
    }

    pub fn cache(&self) -> &SiteCache {
        &self.cache
    }

    /// Returns the site's images, collecting them unless a fresh copy is cached.
    ///
    /// With `refresh` set the cache entry is invalidated first.
    pub async fn run(&self, raw_url: &str, refresh: bool) -> Result<SiteCollection> {
        let site_url = validate_site_url(raw_url)?;

        if refresh {
            self.cache.invalidate(&site_url)?;
        } else if let Some(hit) = self.cache.read(&site_url)? {
            info!(site_url = %site_url, images = hit.images.len(), "Serving cached collection");
            return Ok(SiteCollection::from_cache(hit));
        }

        match self.collect_fresh(&site_url).await {
            Ok(collection) => Ok(collection),
            Err(e) => {
                warn!(site_url = %site_url, error = %e, "Site collection failed");
                Err(e)
            }
        }
    }

    async fn collect_fresh(&self, site_url: &str) -> Result<SiteCollection> {
        let discovered = self.discovery.discover(site_url).await?;
        let collection = self.pipeline.collect(site_url, &discovered).await?;
        let date_collected = self.cache.write(site_url, &collection.images, None)?;

        Ok(SiteCollection {
            site_url: site_url.to_string(),
            date_collected,
            screenshot: None,
            images: collection.images,
            from_cache: false,
            failed: collection.failed,
        })
    }

    /// Lists a site's images without uploading anything.
    pub async fn scrape(&self, raw_url: &str) -> Result<Vec<DiscoveredImage>> {
        let site_url = validate_site_url(raw_url)?;
        self.discovery.discover(&site_url).await.inspect_err(|e| {
            warn!(site_url = %site_url, error = %e, "Failed to scrape website");
        })
    }

    /// Uploads and measures a given list of image URLs. Nothing is cached.
    pub async fn collect(&self, raw_url: &str, urls: &[String]) -> Result<Collection> {
        let site_url = normalize_site(raw_url);
        let images: Vec<DiscoveredImage> = urls.iter().map(DiscoveredImage::new).collect();
        self.pipeline.collect(&site_url, &images).await
    }

    /// Sizes and CO2 of a list of URLs as they are served.
    pub async fn calculate(&self, urls: &[String]) -> Vec<CalculatedImage> {
        self.pipeline.calculate(urls).await
    }

    /// Stores an externally produced image set for a site.
    pub fn add(
        &self,
        raw_url: &str,
        images: &[ImageRecord],
        screenshot: Option<&str>,
    ) -> Result<DateTime<Utc>> {
        let site_url = normalize_site(raw_url);
        Ok(self.cache.write(&site_url, images, screenshot)?)
    }

    /// The cached collection, if fresh.
    pub fn cached(&self, raw_url: &str) -> Result<Option<SiteCollection>> {
        Ok(self.cache.read(raw_url)?.map(SiteCollection::from_cache))
    }

    /// Forces the next run for the site to collect again.
    pub fn refresh(&self, raw_url: &str) -> Result<()> {
        Ok(self.cache.invalidate(raw_url)?)
    }
}
