//! Asset transform pipeline.
//!
//! Turns discovered image URLs into measured [`ImageRecord`]s:
//!
//! 1. Upload every image to the transform backend, at most `concurrency` at once.
//! 2. For each successful upload, probe the optimized variant's size and look
//!    up both hosts' green status (all concurrently, no cap).
//! 3. Estimate CO2 for both variants.
//!
//! A failure on one image drops that image and bumps [`Collection::failed`];
//! it never fails the batch.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use imagecarbon_core::normalize::host_of;
use imagecarbon_core::{
    Collection, DiscoveredImage, EmissionsModel, ImageRecord, OptimizedImage, OriginalImage,
    UploadedImage,
};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::discovery::DEFAULT_DISCOVERY_TIMEOUT;
use crate::error::{CollectError, Result};
use crate::hosting::{GreenHostResolver, HostingDirectory};
use crate::probe::SizeProbe;
use crate::transform::{TransformBackend, UploadRequest, UploadedAsset};

/// Default cap on concurrent uploads.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Default format of the optimized variant.
pub const DEFAULT_OPTIMIZED_FORMAT: &str = "avif";

/// Default upload folder, also used as the base tag.
pub const DEFAULT_UPLOAD_FOLDER: &str = "imagecarbon";

/// Pipeline configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Maximum uploads in flight at once.
    pub concurrency: usize,
    /// Ceiling for the discovery stage.
    pub discovery_timeout: Duration,
    /// Format every optimized variant is delivered in.
    pub optimized_format: String,
    /// Backend folder for uploads.
    pub folder: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            discovery_timeout: DEFAULT_DISCOVERY_TIMEOUT,
            optimized_format: DEFAULT_OPTIMIZED_FORMAT.to_string(),
            folder: DEFAULT_UPLOAD_FOLDER.to_string(),
        }
    }
}

impl PipelineConfig {
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_discovery_timeout(mut self, timeout: Duration) -> Self {
        self.discovery_timeout = timeout;
        self
    }

    pub fn with_optimized_format(mut self, format: impl Into<String>) -> Self {
        self.optimized_format = format.into();
        self
    }

    pub fn with_folder(mut self, folder: impl Into<String>) -> Self {
        self.folder = folder.into();
        self
    }
}

/// Size and CO2 of a single URL, without any transformation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculatedImage {
    pub url: String,
    pub size: u64,
    pub co2: f64,
}

/// The upload and measurement stages of a collection run.
#[derive(Clone)]
pub struct CollectionPipeline {
    backend: Arc<dyn TransformBackend>,
    probe: Arc<dyn SizeProbe>,
    directory: Arc<dyn HostingDirectory>,
    model: EmissionsModel,
    config: PipelineConfig,
}

impl CollectionPipeline {
    pub fn new(
        backend: Arc<dyn TransformBackend>,
        probe: Arc<dyn SizeProbe>,
        directory: Arc<dyn HostingDirectory>,
    ) -> Self {
        Self {
            backend,
            probe,
            directory,
            model: EmissionsModel::default(),
            config: PipelineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_model(mut self, model: EmissionsModel) -> Self {
        self.model = model;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Uploads and measures every image of a site.
    pub async fn collect(&self, site_url: &str, images: &[DiscoveredImage]) -> Result<Collection> {
        info!(site_url, images = images.len(), "Collecting image data");

        // Host memo lives for this run only
        let hosts = GreenHostResolver::new(self.directory.clone());
        let delivery_green = hosts.is_green(self.backend.delivery_host()).await;

        let uploads = self.upload_all(site_url, images).await?;
        let uploaded: Vec<_> = uploads.into_iter().flatten().collect();
        let upload_failures = images.len() - uploaded.len();
        info!(
            site_url,
            uploaded = uploaded.len(),
            failed = upload_failures,
            "Uploads complete"
        );

        let measured = join_all(
            uploaded
                .into_iter()
                .map(|(source, asset)| self.measure(site_url, source, asset, &hosts, delivery_green)),
        )
        .await;

        let records: Vec<ImageRecord> = measured.into_iter().flatten().collect();
        let failed = images.len() - records.len();

        debug!(site_url, hosts = hosts.len(), "Resolved hosting");
        info!(site_url, collected = records.len(), failed, "Collection complete");

        Ok(Collection {
            site_url: site_url.to_string(),
            date: Utc::now(),
            images: records,
            failed,
        })
    }

    /// Runs every upload behind the concurrency cap.
    ///
    /// Each slot is `None` when that image failed.
    async fn upload_all(
        &self,
        site_url: &str,
        images: &[DiscoveredImage],
    ) -> Result<Vec<Option<(Source, UploadedAsset)>>> {
        let permits = Semaphore::new(self.config.concurrency.max(1));

        join_all(
            images
                .iter()
                .map(|image| self.upload_one(&permits, site_url, image)),
        )
        .await
        .into_iter()
        .collect()
    }

    /// Uploads one image once a permit is free.
    async fn upload_one(
        &self,
        permits: &Semaphore,
        site_url: &str,
        image: &DiscoveredImage,
    ) -> Result<Option<(Source, UploadedAsset)>> {
        let _permit = permits
            .acquire()
            .await
            .map_err(|e| CollectError::Pipeline(format!("Upload queue closed: {}", e)))?;

        let source = Source {
            url: self
                .backend
                .prepare_source(&image.url, &self.config.optimized_format),
            loading: image.loading.clone(),
        };
        let request = UploadRequest::new(&source.url, site_url, &self.config.folder);

        match self.backend.upload(&request).await {
            Ok(asset) => Ok(Some((source, asset))),
            Err(e) => {
                warn!(site_url, image = %source.url, error = %e, "Failed to upload image");
                Ok(None)
            }
        }
    }

    /// Probes the optimized variant and estimates both variants' CO2.
    async fn measure(
        &self,
        site_url: &str,
        source: Source,
        asset: UploadedAsset,
        hosts: &GreenHostResolver,
        delivery_green: bool,
    ) -> Option<ImageRecord> {
        let format = &self.config.optimized_format;
        let optimized_url = self.backend.delivery_url(&asset.id, format);

        let original_host = host_of(&source.url);

        let (optimized_size, original_green) = futures::join!(
            self.probe.size_of(&optimized_url),
            hosts.is_green(&original_host)
        );

        let optimized_size = match optimized_size {
            Ok(size) => size,
            Err(e) => {
                warn!(site_url, image = %source.url, error = %e, "Failed to measure optimized image");
                return None;
            }
        };

        Some(ImageRecord {
            width: asset.width,
            height: asset.height,
            original: OriginalImage {
                co2: asset
                    .bytes
                    .map(|bytes| self.model.per_visit(bytes, original_green)),
                url: source.url,
                format: asset.format,
                size: asset.bytes,
                loading: source.loading,
            },
            optimized: OptimizedImage {
                format: Some(format.clone()),
                url: Some(optimized_url),
                size: Some(optimized_size),
                co2: Some(self.model.per_visit(optimized_size, delivery_green)),
            },
            uploaded: UploadedImage {
                url: asset.secure_url,
                asset_id: asset.id,
            },
        })
    }

    /// Sizes and per-byte CO2 of untransformed URLs.
    ///
    /// URLs whose size cannot be read are left out.
    pub async fn calculate(&self, urls: &[String]) -> Vec<CalculatedImage> {
        let hosts = GreenHostResolver::new(self.directory.clone());

        let results = join_all(urls.iter().map(|url| {
            let hosts = &hosts;
            async move {
                let host = host_of(url);
                let (size, green) =
                    futures::join!(self.probe.size_of(url), hosts.is_green(&host));
                match size {
                    Ok(size) => Some(CalculatedImage {
                        url: url.clone(),
                        size,
                        co2: self.model.per_byte(size, green),
                    }),
                    Err(e) => {
                        warn!(image = %url, error = %e, "Failed to measure image");
                        None
                    }
                }
            }
        }))
        .await;

        results.into_iter().flatten().collect()
    }
}

/// The URL that was actually uploaded, plus its discovery hint.
#[derive(Debug, Clone)]
struct Source {
    url: String,
    loading: Option<String>,
}
