//! Image Carbon Collect - discovery, upload and measurement of site images.
//!
//! This crate talks to the outside world. Every external service sits behind
//! a trait so runs can be tested with fakes:
//!
//! | Trait | Production implementation |
//! |---|---|
//! | [`PageExtractor`] | [`ScrapingBeeExtractor`], [`HtmlExtractor`] |
//! | [`TransformBackend`] | [`CloudinaryBackend`] |
//! | [`SizeProbe`] | [`HttpSizeProbe`] |
//! | [`HostingDirectory`] | [`GreenWebFoundation`] |
//!
//! ## Architecture
//!
//! ```text
//! SiteCollector::run
//!   ├─ SiteCache::read ─────────────── fresh? return cached images
//!   ├─ ImageDiscovery::discover ────── PageExtractor (30 s ceiling)
//!   ├─ CollectionPipeline::collect
//!   │    ├─ TransformBackend::upload ─ at most 10 in flight
//!   │    ├─ SizeProbe::size_of ─────── optimized variant
//!   │    └─ GreenHostResolver ──────── one lookup per host per run
//!   └─ SiteCache::write
//! ```

pub mod collector;
pub mod discovery;
mod error;
pub mod hosting;
pub mod pipeline;
pub mod probe;
pub mod transform;

pub use collector::{validate_site_url, SiteCollection, SiteCollector};
pub use discovery::{
    HtmlExtractor, ImageDiscovery, PageExtractor, RawImage, ScrapingBeeExtractor,
    DEFAULT_DISCOVERY_TIMEOUT,
};
pub use error::{CollectError, Result, FORBIDDEN_MESSAGE};
pub use hosting::{GreenHostResolver, GreenWebFoundation, HostingDirectory};
pub use pipeline::{CalculatedImage, CollectionPipeline, PipelineConfig, DEFAULT_CONCURRENCY};
pub use probe::{HttpSizeProbe, SizeProbe};
pub use transform::{
    CloudinaryBackend, CloudinaryCredentials, TransformBackend, UploadRequest, UploadedAsset,
};

/// User agent sent with every outgoing request.
pub const USER_AGENT: &str = concat!("ImageCarbon/", env!("CARGO_PKG_VERSION"));

/// Builds the HTTP client shared by the production collaborators.
pub fn http_client() -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder().user_agent(USER_AGENT).build()?)
}
