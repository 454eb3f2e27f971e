//! Shared data models for collected images and sites.
//!
//! These types are the JSON contract between the collection pipeline, the
//! cache store and HTTP clients, so every field that a client might omit is
//! optional and aggregation ignores what is missing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An image reference found on a page, before any measurement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredImage {
    /// Absolute source URL.
    pub url: String,
    /// Value of the `loading` attribute, if any (e.g. `lazy`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loading: Option<String>,
}

impl DiscoveredImage {
    /// Creates a discovered image with no loading hint.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            loading: None,
        }
    }

    /// Sets the loading hint.
    pub fn with_loading(mut self, loading: impl Into<String>) -> Self {
        self.loading = Some(loading.into());
        self
    }
}

/// Measurements of the image as found on the site.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginalImage {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Size in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Estimated grams of CO2 per view.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub co2: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loading: Option<String>,
}

/// Measurements of the transformed variant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizedImage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub co2: Option<f64>,
}

/// Where the transform backend stored the original.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedImage {
    pub url: String,
    pub asset_id: String,
}

/// A fully measured image: one row of a site's collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    pub original: OriginalImage,
    #[serde(default)]
    pub optimized: OptimizedImage,
    #[serde(default)]
    pub uploaded: UploadedImage,
}

impl ImageRecord {
    /// Creates a record that only knows its original URL.
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            original: OriginalImage {
                url: url.into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

/// Which side of the comparison an aggregate refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    Original,
    Optimized,
}

impl Variant {
    /// Size in bytes of this variant of `image`, if known.
    pub fn size_of(&self, image: &ImageRecord) -> Option<u64> {
        match self {
            Variant::Original => image.original.size,
            Variant::Optimized => image.optimized.size,
        }
    }

    /// Estimated CO2 of this variant of `image`, if known.
    pub fn co2_of(&self, image: &ImageRecord) -> Option<f64> {
        match self {
            Variant::Original => image.original.co2,
            Variant::Optimized => image.optimized.co2,
        }
    }
}

/// The result of one collection run for a site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    /// Normalized site URL.
    pub site_url: String,
    /// When the collection finished.
    pub date: DateTime<Utc>,
    pub images: Vec<ImageRecord>,
    /// Number of images dropped because upload or measurement failed.
    #[serde(default)]
    pub failed: usize,
}
