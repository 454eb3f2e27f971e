//! Error types for collection.

use std::time::Duration;

use imagecarbon_storage::StorageError;
use thiserror::Error;

/// Message shown when a site refuses automated access.
pub const FORBIDDEN_MESSAGE: &str = "This website does not allow scraping";

/// Collection error type.
#[derive(Debug, Error)]
pub enum CollectError {
    /// The input is not a usable site URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The site refuses automated access.
    #[error("This website does not allow scraping")]
    DiscoveryForbidden,

    /// Discovery did not finish in time.
    #[error("Timed out after {0:?} while looking for images")]
    DiscoveryTimeout(Duration),

    /// The whole run failed.
    #[error("Collection failed: {0}")]
    Pipeline(String),

    /// Cache read or write failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// One image could not be uploaded.
    #[error("Upload failed: {0}")]
    Upload(String),

    /// One image's size could not be read.
    #[error("Size probe failed: {0}")]
    Probe(String),

    /// Transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Unexpected response body.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CollectError {
    /// Returns true for failures that abort a run before anything is stored.
    pub fn is_discovery_failure(&self) -> bool {
        matches!(
            self,
            CollectError::DiscoveryForbidden | CollectError::DiscoveryTimeout(_)
        )
    }
}

/// Result type for collection operations.
pub type Result<T> = std::result::Result<T, CollectError>;
