//! Builds a [`SiteCollector`] from the production collaborators.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use imagecarbon_collect::{
    http_client, CloudinaryBackend, CloudinaryCredentials, CollectionPipeline, GreenWebFoundation,
    HtmlExtractor, HttpSizeProbe, ImageDiscovery, PageExtractor, PipelineConfig,
    ScrapingBeeExtractor, SiteCollector,
};
use imagecarbon_storage::{CacheConfig, Database, SiteCache};
use tracing::{info, warn};

/// Everything needed to assemble a collector.
#[derive(Debug, Clone, Default)]
pub struct CollectorSettings {
    /// SQLite file (None = platform data directory).
    pub db_path: Option<PathBuf>,
    /// Transform backend account. Required.
    pub cloudinary: Option<CloudinaryCredentials>,
    /// Hosted scraping API key. Pages are fetched directly without one.
    pub scrapingbee_api_key: Option<String>,
    pub pipeline: PipelineConfig,
    pub cache: CacheConfig,
}

impl CollectorSettings {
    pub fn with_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_path = Some(path.into());
        self
    }

    pub fn with_cloudinary(mut self, credentials: CloudinaryCredentials) -> Self {
        self.cloudinary = Some(credentials);
        self
    }

    pub fn with_scrapingbee_api_key(mut self, key: impl Into<String>) -> Self {
        self.scrapingbee_api_key = Some(key.into());
        self
    }

    pub fn with_pipeline(mut self, pipeline: PipelineConfig) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }
}

/// Opens the database at `path`, or in the platform data directory.
pub fn open_database(path: Option<&PathBuf>) -> anyhow::Result<Database> {
    let db = match path {
        Some(path) => Database::with_path(path),
        None => Database::new(),
    };
    db.context("Failed to open database")
}

/// Wires discovery, transform, probe and hosting lookups over one HTTP client.
pub fn build_collector(settings: &CollectorSettings) -> anyhow::Result<SiteCollector> {
    let Some(credentials) = settings.cloudinary.clone() else {
        bail!("Cloudinary credentials are required (CLOUDINARY_CLOUD_NAME, CLOUDINARY_API_KEY, CLOUDINARY_API_SECRET)");
    };

    let client = http_client().context("Failed to build HTTP client")?;

    let extractor: Arc<dyn PageExtractor> = match settings.scrapingbee_api_key.as_deref() {
        Some(key) if !key.trim().is_empty() => {
            info!("Discovering images through ScrapingBee");
            Arc::new(ScrapingBeeExtractor::new(client.clone(), key.trim()))
        }
        _ => {
            warn!("No ScrapingBee key set, fetching pages directly");
            Arc::new(HtmlExtractor::new(client.clone()))
        }
    };

    let discovery =
        ImageDiscovery::new(extractor).with_timeout(settings.pipeline.discovery_timeout);
    let pipeline = CollectionPipeline::new(
        Arc::new(CloudinaryBackend::new(client.clone(), credentials)),
        Arc::new(HttpSizeProbe::new(client.clone())),
        Arc::new(GreenWebFoundation::new(client)),
    )
    .with_config(settings.pipeline.clone());

    let db = open_database(settings.db_path.as_ref())?;
    let cache = SiteCache::new(db, settings.cache);

    Ok(SiteCollector::new(discovery, pipeline, cache))
}
