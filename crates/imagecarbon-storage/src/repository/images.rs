//! Image repository.

use imagecarbon_core::ImageRecord;
use rusqlite::{params, Connection, Row};

use crate::error::Result;
use crate::models::StoredImage;

/// Repository for image operations.
pub struct ImageRepo;

impl ImageRepo {
    /// Insert one image for a site.
    pub fn insert(conn: &Connection, site_url: &str, image: &ImageRecord) -> Result<i64> {
        conn.execute(
            "INSERT INTO images (site_url, width, height, original, optimized, uploaded)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                site_url,
                image.width,
                image.height,
                serde_json::to_string(&image.original)?,
                serde_json::to_string(&image.optimized)?,
                serde_json::to_string(&image.uploaded)?,
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    /// Get all images of a site in insertion order.
    pub fn get_by_site(conn: &Connection, site_url: &str) -> Result<Vec<StoredImage>> {
        let mut stmt = conn.prepare(
            "SELECT id, site_url, width, height, original, optimized, uploaded
             FROM images WHERE site_url = ?1 ORDER BY id ASC",
        )?;

        let rows = stmt
            .query_map([site_url], map_row)?
            .collect::<rusqlite::Result<Vec<RawImageRow>>>()?;

        rows.into_iter().map(RawImageRow::decode).collect()
    }

    /// Delete every image of a site. Returns the number removed.
    pub fn delete_by_site(conn: &Connection, site_url: &str) -> Result<usize> {
        let deleted = conn.execute("DELETE FROM images WHERE site_url = ?1", [site_url])?;
        Ok(deleted)
    }

    /// Count images of a site.
    pub fn count_by_site(conn: &Connection, site_url: &str) -> Result<i64> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM images WHERE site_url = ?1",
            [site_url],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

struct RawImageRow {
    id: i64,
    site_url: String,
    width: Option<u32>,
    height: Option<u32>,
    original: String,
    optimized: String,
    uploaded: String,
}

impl RawImageRow {
    fn decode(self) -> Result<StoredImage> {
        Ok(StoredImage {
            id: self.id,
            site_url: self.site_url,
            record: ImageRecord {
                width: self.width,
                height: self.height,
                original: serde_json::from_str(&self.original)?,
                optimized: serde_json::from_str(&self.optimized)?,
                uploaded: serde_json::from_str(&self.uploaded)?,
            },
        })
    }
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<RawImageRow> {
    Ok(RawImageRow {
        id: row.get(0)?,
        site_url: row.get(1)?,
        width: row.get(2)?,
        height: row.get(3)?,
        original: row.get(4)?,
        optimized: row.get(5)?,
        uploaded: row.get(6)?,
    })
}
