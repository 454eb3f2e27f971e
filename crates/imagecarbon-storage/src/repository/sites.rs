//! Site repository.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::{Result, StorageError};
use crate::models::Site;

const SITE_COLUMNS: &str = "site_url, date_collected, screenshot, created_at, updated_at";

/// Repository for site operations.
pub struct SiteRepo;

impl SiteRepo {
    /// Get a site by its normalized URL.
    pub fn get(conn: &Connection, site_url: &str) -> Result<Option<Site>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM sites WHERE site_url = ?1",
            SITE_COLUMNS
        ))?;

        let site = stmt.query_row([site_url], map_site).optional()?;

        Ok(site)
    }

    /// Get all sites, most recently collected first.
    pub fn get_all(conn: &Connection) -> Result<Vec<Site>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM sites ORDER BY date_collected IS NULL, date_collected DESC, site_url ASC",
            SITE_COLUMNS
        ))?;

        let sites = stmt
            .query_map([], map_site)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(sites)
    }

    /// Insert a site or refresh its collection date and screenshot.
    pub fn upsert_collected(
        conn: &Connection,
        site_url: &str,
        date_collected: DateTime<Utc>,
        screenshot: Option<&str>,
    ) -> Result<()> {
        conn.execute(
            "INSERT INTO sites (site_url, date_collected, screenshot)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(site_url) DO UPDATE SET
                date_collected = excluded.date_collected,
                screenshot = excluded.screenshot,
                updated_at = datetime('now')",
            params![site_url, date_collected.to_rfc3339(), screenshot],
        )?;

        Ok(())
    }

    /// Clear the collection date so the next read is a miss.
    pub fn clear_date_collected(conn: &Connection, site_url: &str) -> Result<()> {
        let updated = conn.execute(
            "UPDATE sites SET date_collected = NULL, updated_at = datetime('now') WHERE site_url = ?1",
            [site_url],
        )?;

        if updated == 0 {
            return Err(StorageError::NotFound(format!("Site {}", site_url)));
        }

        Ok(())
    }

    /// Delete a site (its images go with it).
    pub fn delete(conn: &Connection, site_url: &str) -> Result<()> {
        let deleted = conn.execute("DELETE FROM sites WHERE site_url = ?1", [site_url])?;

        if deleted == 0 {
            return Err(StorageError::NotFound(format!("Site {}", site_url)));
        }

        Ok(())
    }

    /// Count total sites.
    pub fn count(conn: &Connection) -> Result<i64> {
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM sites", [], |row| row.get(0))?;
        Ok(count)
    }
}

fn map_site(row: &Row<'_>) -> rusqlite::Result<Site> {
    Ok(Site {
        site_url: row.get(0)?,
        date_collected: row
            .get::<_, Option<String>>(1)?
            .and_then(|s| parse_rfc3339(&s)),
        screenshot: row.get(2)?,
        created_at: parse_datetime(&row.get::<_, String>(3)?),
        updated_at: parse_datetime(&row.get::<_, String>(4)?),
    })
}

/// Parse an RFC 3339 timestamp; anything else counts as absent.
fn parse_rfc3339(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

/// Parse a datetime from SQLite format.
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    parse_rfc3339(s)
        .or_else(|| {
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                .map(|dt| dt.and_utc())
                .ok()
        })
        .unwrap_or_else(Utc::now)
}
