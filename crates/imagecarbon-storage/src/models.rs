//! Data models for storage.

use chrono::{DateTime, Utc};
use imagecarbon_core::ImageRecord;
use serde::{Deserialize, Serialize};

/// A cached site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Site {
    /// Normalized site URL (primary key).
    pub site_url: String,
    /// When the current image set was collected. `None` means no cache entry.
    pub date_collected: Option<DateTime<Utc>>,
    /// Opaque screenshot reference.
    pub screenshot: Option<String>,
    /// Created timestamp.
    pub created_at: DateTime<Utc>,
    /// Updated timestamp.
    pub updated_at: DateTime<Utc>,
}

/// A stored image row.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredImage {
    /// Unique identifier.
    pub id: i64,
    /// Owning site.
    pub site_url: String,
    /// The measured image.
    pub record: ImageRecord,
}

/// A fresh cache hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedSite {
    pub site_url: String,
    pub date_collected: DateTime<Utc>,
    pub screenshot: Option<String>,
    pub images: Vec<ImageRecord>,
}
