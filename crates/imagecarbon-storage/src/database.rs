//! High-level database interface.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use imagecarbon_core::ImageRecord;
use tracing::{debug, info};

use crate::error::{Result, StorageError};
use crate::models::Site;
use crate::pool::ConnectionPool;
use crate::repository::{ImageRepo, SiteRepo};

/// High-level database interface for Image Carbon.
#[derive(Clone)]
pub struct Database {
    pool: ConnectionPool,
}

impl Database {
    /// Create a new database in the default app data directory.
    pub fn new() -> Result<Self> {
        Self::with_path(Self::default_db_path()?)
    }

    /// Create a new database at a specific path.
    pub fn with_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        // Create parent directories if they don't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        info!("Opening database at: {:?}", path);
        let pool = ConnectionPool::new(&path)?;

        Ok(Self { pool })
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        let pool = ConnectionPool::in_memory()?;
        Ok(Self { pool })
    }

    /// Get the default database path.
    pub fn default_db_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "imagecarbon", "imagecarbon")
            .ok_or_else(|| StorageError::Config("Could not determine app data directory".into()))?;

        Ok(proj_dirs.data_dir().join("imagecarbon.db"))
    }

    // === Sites ===

    /// Get a site by its normalized URL.
    pub fn get_site(&self, site_url: &str) -> Result<Option<Site>> {
        let conn = self.pool.get()?;
        SiteRepo::get(&conn, site_url)
    }

    /// List every known site, most recently collected first.
    pub fn list_sites(&self) -> Result<Vec<Site>> {
        let conn = self.pool.get()?;
        SiteRepo::get_all(&conn)
    }

    /// Count known sites.
    pub fn count_sites(&self) -> Result<i64> {
        let conn = self.pool.get()?;
        SiteRepo::count(&conn)
    }

    /// Clear a site's collection date. Its images stay until the next replace.
    pub fn invalidate_site(&self, site_url: &str) -> Result<()> {
        let conn = self.pool.get()?;
        SiteRepo::clear_date_collected(&conn, site_url)
    }

    /// Remove a site and its images entirely.
    pub fn delete_site(&self, site_url: &str) -> Result<()> {
        let conn = self.pool.get()?;
        SiteRepo::delete(&conn, site_url)
    }

    // === Images ===

    /// Get the stored images of a site in collection order.
    pub fn get_site_images(&self, site_url: &str) -> Result<Vec<ImageRecord>> {
        let conn = self.pool.get()?;
        let images = ImageRepo::get_by_site(&conn, site_url)?;
        Ok(images.into_iter().map(|image| image.record).collect())
    }

    /// A site and its stored images, read under one lock.
    ///
    /// The images always belong to the returned site row's generation.
    pub fn get_site_collection(&self, site_url: &str) -> Result<Option<(Site, Vec<ImageRecord>)>> {
        let conn = self.pool.get()?;

        let Some(site) = SiteRepo::get(&conn, site_url)? else {
            return Ok(None);
        };
        let images = ImageRepo::get_by_site(&conn, site_url)?
            .into_iter()
            .map(|image| image.record)
            .collect();

        Ok(Some((site, images)))
    }

    /// Replace a site's image set and collection date in one transaction.
    ///
    /// Readers either see the previous set or the new one, never a mix.
    pub fn replace_site_collection(
        &self,
        site_url: &str,
        images: &[ImageRecord],
        screenshot: Option<&str>,
        date_collected: DateTime<Utc>,
    ) -> Result<()> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;

        SiteRepo::upsert_collected(&tx, site_url, date_collected, screenshot)?;
        let removed = ImageRepo::delete_by_site(&tx, site_url)?;
        for image in images {
            ImageRepo::insert(&tx, site_url, image)?;
        }

        tx.commit()?;

        debug!(
            site = site_url,
            removed,
            inserted = images.len(),
            "Replaced site collection"
        );
        Ok(())
    }
}
