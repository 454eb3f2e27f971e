//! Site cache store.
//!
//! Wraps the [`Database`] with the freshness window. Keys are run through
//! [`normalize_site`] so every raw spelling of a site lands on one record.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use imagecarbon_core::{is_fresh, normalize_site, Clock, ImageRecord, SystemClock};
use tracing::debug;

use crate::database::Database;
use crate::error::Result;
use crate::models::CachedSite;

/// Default cache lifetime.
pub const DEFAULT_TTL_HOURS: i64 = 24;

/// Cache configuration.
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    /// Maximum age of a collection before reads treat it as a miss.
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::hours(DEFAULT_TTL_HOURS),
        }
    }
}

impl CacheConfig {
    /// Set the cache lifetime.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

/// Cache of collection results keyed by normalized site URL.
#[derive(Clone)]
pub struct SiteCache {
    db: Database,
    clock: Arc<dyn Clock>,
    config: CacheConfig,
}

impl SiteCache {
    /// Create a cache over a database using the wall clock.
    pub fn new(db: Database, config: CacheConfig) -> Self {
        Self::with_clock(db, config, Arc::new(SystemClock))
    }

    /// Create a cache with an explicit clock.
    pub fn with_clock(db: Database, config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock, config }
    }

    /// The underlying database.
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// The configured lifetime.
    pub fn ttl(&self) -> Duration {
        self.config.ttl
    }

    /// Current time according to the cache's clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Return the stored collection if one exists and is still fresh.
    pub fn read(&self, site_url: &str) -> Result<Option<CachedSite>> {
        let key = normalize_site(site_url);

        let Some((site, images)) = self.db.get_site_collection(&key)? else {
            debug!(site_url = %key, "Cache miss: unknown site");
            return Ok(None);
        };

        let Some(date_collected) = site.date_collected else {
            debug!(site_url = %key, "Cache miss: invalidated");
            return Ok(None);
        };

        if !is_fresh(date_collected, self.config.ttl, self.clock.now()) {
            debug!(site_url = %key, %date_collected, "Cache miss: stale");
            return Ok(None);
        }

        debug!(site_url = %key, images = images.len(), "Cache hit");

        Ok(Some(CachedSite {
            site_url: key,
            date_collected,
            screenshot: site.screenshot,
            images,
        }))
    }

    /// Replace the site's images and stamp it with the current time.
    ///
    /// Returns the collection timestamp that was stored.
    pub fn write(
        &self,
        site_url: &str,
        images: &[ImageRecord],
        screenshot: Option<&str>,
    ) -> Result<DateTime<Utc>> {
        let key = normalize_site(site_url);
        let now = self.clock.now();

        self.db
            .replace_site_collection(&key, images, screenshot, now)?;

        Ok(now)
    }

    /// Force the next read of this site to miss.
    ///
    /// Invalidating a site that was never collected is not an error.
    pub fn invalidate(&self, site_url: &str) -> Result<()> {
        let key = normalize_site(site_url);

        if self.db.get_site(&key)?.is_none() {
            debug!(site_url = %key, "Nothing to invalidate");
            return Ok(());
        }

        self.db.invalidate_site(&key)?;
        debug!(site_url = %key, "Invalidated cache entry");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use imagecarbon_core::ManualClock;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn setup() -> (SiteCache, ManualClock) {
        let clock = ManualClock::new(t0());
        let cache = SiteCache::with_clock(
            Database::in_memory().unwrap(),
            CacheConfig::default(),
            Arc::new(clock.clone()),
        );
        (cache, clock)
    }

    fn image(url: &str, size: u64) -> ImageRecord {
        let mut record = ImageRecord::from_url(url);
        record.original.size = Some(size);
        record
    }

    #[test]
    fn test_write_then_read() {
        let (cache, _clock) = setup();
        let images = vec![image("https://example.com/a.png", 30_000)];

        let stamped = cache.write("example.com", &images, Some("shot")).unwrap();
        let hit = cache.read("example.com").unwrap().unwrap();

        assert_eq!(stamped, t0());
        assert_eq!(hit.date_collected, t0());
        assert_eq!(hit.images, images);
        assert_eq!(hit.screenshot.as_deref(), Some("shot"));
    }

    #[test]
    fn test_raw_spellings_share_an_entry() {
        let (cache, _clock) = setup();

        cache
            .write("https://Example.com/", &[image("https://example.com/a.png", 1)], None)
            .unwrap();

        let hit = cache.read("http://example.com?utm=1").unwrap().unwrap();
        assert_eq!(hit.site_url, "example.com");
        assert_eq!(hit.images.len(), 1);
    }

    #[test]
    fn test_read_unknown_site_misses() {
        let (cache, _clock) = setup();
        assert!(cache.read("nothing.com").unwrap().is_none());
    }

    #[test]
    fn test_ttl_boundary_is_fresh() {
        let (cache, clock) = setup();
        cache.write("example.com", &[], None).unwrap();

        clock.advance(Duration::hours(DEFAULT_TTL_HOURS));
        assert!(cache.read("example.com").unwrap().is_some());

        clock.advance(Duration::seconds(1));
        assert!(cache.read("example.com").unwrap().is_none());
    }

    #[test]
    fn test_custom_ttl() {
        let clock = ManualClock::new(t0());
        let cache = SiteCache::with_clock(
            Database::in_memory().unwrap(),
            CacheConfig::default().with_ttl(Duration::minutes(5)),
            Arc::new(clock.clone()),
        );

        cache.write("example.com", &[], None).unwrap();
        clock.advance(Duration::minutes(6));
        assert!(cache.read("example.com").unwrap().is_none());
    }

    #[test]
    fn test_invalidate_then_read_misses() {
        let (cache, _clock) = setup();
        cache
            .write("example.com", &[image("https://example.com/a.png", 1)], None)
            .unwrap();

        cache.invalidate("example.com").unwrap();
        assert!(cache.read("example.com").unwrap().is_none());

        // A fresh write brings it back
        cache.write("example.com", &[], None).unwrap();
        assert!(cache.read("example.com").unwrap().is_some());
    }

    #[test]
    fn test_invalidate_unknown_site_is_ok() {
        let (cache, _clock) = setup();
        assert!(cache.invalidate("nothing.com").is_ok());
    }

    #[test]
    fn test_rewrite_replaces_images() {
        let (cache, clock) = setup();

        cache
            .write(
                "example.com",
                &[
                    image("https://example.com/old-1.png", 1),
                    image("https://example.com/old-2.png", 2),
                ],
                None,
            )
            .unwrap();
        clock.advance(Duration::hours(1));
        cache
            .write("example.com", &[image("https://example.com/new.png", 3)], None)
            .unwrap();

        let hit = cache.read("example.com").unwrap().unwrap();
        assert_eq!(hit.images.len(), 1);
        assert_eq!(hit.images[0].original.url, "https://example.com/new.png");
        assert_eq!(hit.date_collected, t0() + Duration::hours(1));
    }

    #[test]
    fn test_concurrent_writers_never_mix_generations() {
        let (cache, _clock) = setup();

        let handles: Vec<_> = (0..8)
            .map(|generation| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    let images: Vec<ImageRecord> = (0..5)
                        .map(|i| image(&format!("https://example.com/g{}-{}.png", generation, i), 1))
                        .collect();
                    cache.write("example.com", &images, None).unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let hit = cache.read("example.com").unwrap().unwrap();
        assert_eq!(hit.images.len(), 5);
        let prefix = &hit.images[0].original.url[..22];
        assert!(hit.images.iter().all(|i| i.original.url.starts_with(prefix)));
    }
}
