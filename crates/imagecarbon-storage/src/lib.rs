//! Image Carbon Storage - SQLite persistence layer.
//!
//! This crate stores collection results per site. It handles:
//!
//! - Site records keyed by normalized URL, with collection date and screenshot
//! - The image set of each site, replaced as a whole on every collection
//! - The cache freshness window ([`SiteCache`])
//!
//! # Example
//!
//! ```no_run
//! use imagecarbon_core::ImageRecord;
//! use imagecarbon_storage::{CacheConfig, Database, SiteCache};
//!
//! let cache = SiteCache::new(Database::in_memory().unwrap(), CacheConfig::default());
//!
//! cache
//!     .write("example.com", &[ImageRecord::from_url("https://example.com/a.png")], None)
//!     .unwrap();
//! assert!(cache.read("https://example.com/").unwrap().is_some());
//! ```

mod cache;
mod database;
pub mod error;
pub mod models;
mod pool;
pub mod repository;
mod schema;

pub use cache::{CacheConfig, SiteCache, DEFAULT_TTL_HOURS};
pub use database::Database;
pub use error::{Result, StorageError};
pub use models::{CachedSite, Site, StoredImage};
pub use pool::ConnectionPool;
