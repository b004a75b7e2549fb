//! Coverage metadata and tile storage on SQLite.
//!
//! `raster_coverages` holds one row per coverage. Each coverage then owns
//! five tables named after it: `<name>_sections`, `<name>_tiles`,
//! `<name>_tile_data`, `<name>_levels` and `<name>_section_levels`.
//!
//! Reads go through the pool. Writes that must land together take a
//! connection so callers can run them inside one transaction.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqlitePool, SqlitePoolOptions};
use sqlx::{FromRow, Sqlite, Transaction};

use pyramid::LevelRow;
use raster_common::{
    BoundingBox, Compression, Coverage, CoveragePolicies, Palette, Pixel, PixelType, SampleType,
};
use raster_stats::RasterStatistics;
use tile_codec::EncodedTile;

use crate::error::{Result, StoreError};

/// Database connection pool and catalog operations.
#[derive(Clone)]
pub struct RasterCatalog {
    pool: SqlitePool,
}

impl RasterCatalog {
    /// Open (creating if needed) a database file or URL.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| StoreError::Database(format!("Invalid database URL: {}", e)))?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Database(format!("Connection failed: {}", e)))?;

        Ok(Self { pool })
    }

    /// A private in-memory database.
    ///
    /// Every SQLite in-memory connection is its own database, so the pool
    /// holds exactly one connection and never recycles it.
    pub async fn connect_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| StoreError::Database(format!("Invalid database URL: {}", e)))?
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Database(format!("Connection failed: {}", e)))?;

        Ok(Self { pool })
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create the shared tables.
    pub async fn migrate(&self) -> Result<()> {
        for statement in SCHEMA_SQL.split(';') {
            let trimmed = statement.trim();
            if !trimmed.is_empty() {
                sqlx::query(trimmed)
                    .execute(&self.pool)
                    .await
                    .map_err(|e| StoreError::Database(format!("Migration failed: {}", e)))?;
            }
        }

        Ok(())
    }

    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin().await?)
    }

    /// Register a coverage and create its tables.
    pub async fn register_coverage(&self, coverage: &Coverage) -> Result<()> {
        let tables = CoverageTables::for_coverage(coverage);
        let mut tx = self.begin().await?;

        let exists: Option<(String,)> = sqlx::query_as(&format!(
            "SELECT coverage_name FROM {} WHERE coverage_name = ?",
            tables.coverages
        ))
        .bind(coverage.name())
        .fetch_optional(&mut *tx)
        .await?;
        if exists.is_some() {
            return Err(StoreError::CoverageExists(coverage.name().to_string()));
        }

        let format = coverage.format();
        let policies = coverage.policies();
        let georeference = coverage.georeference();
        let no_data = coverage.no_data().map(Pixel::to_blob).transpose()?;

        sqlx::query(&format!(
            r#"
            INSERT INTO {} (
                coverage_name, sample_type, pixel_type, num_bands,
                compression, quality, tile_width, tile_height,
                srid, horz_resolution, vert_resolution, nodata_pixel,
                strict_resolution, mixed_resolutions, section_paths,
                section_md5, section_summary, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            tables.coverages
        ))
        .bind(coverage.name())
        .bind(format.sample_type.as_sql_str())
        .bind(format.pixel_type.as_sql_str())
        .bind(format.bands as i64)
        .bind(coverage.compression().as_sql_str())
        .bind(coverage.quality() as i64)
        .bind(coverage.tile_width() as i64)
        .bind(coverage.tile_height() as i64)
        .bind(georeference.map(|g| g.srid as i64))
        .bind(georeference.map(|g| g.x_res))
        .bind(georeference.map(|g| g.y_res))
        .bind(no_data)
        .bind(policies.strict_resolution)
        .bind(policies.mixed_resolutions)
        .bind(policies.section_paths)
        .bind(policies.section_md5)
        .bind(policies.section_summary)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::Database(format!("Insert failed: {}", e)))?;

        for statement in tables.schema().split(';') {
            let trimmed = statement.trim();
            if !trimmed.is_empty() {
                sqlx::query(trimmed)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| StoreError::Database(format!("Creating coverage tables failed: {}", e)))?;
            }
        }

        tx.commit().await?;
        Ok(())
    }

    /// Names of all registered coverages.
    pub async fn coverage_names(&self) -> Result<Vec<String>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT coverage_name FROM raster_coverages ORDER BY coverage_name")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    pub async fn stored_coverage(&self, tables: &CoverageTables) -> Result<StoredCoverage> {
        let mut conn = self.pool.acquire().await?;
        fetch_coverage(&mut conn, tables).await
    }

    pub async fn section_count(&self, tables: &CoverageTables) -> Result<u64> {
        let (count,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {}", tables.sections))
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    /// Coverage-wide resolution rows, finest level first.
    pub async fn levels(&self, tables: &CoverageTables) -> Result<Vec<LevelRow>> {
        let rows = sqlx::query_as::<_, LevelDbRow>(&format!(
            "SELECT pyramid_level, x_resolution_1_1, y_resolution_1_1 FROM {} ORDER BY pyramid_level",
            tables.levels
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(LevelRow::try_from).collect()
    }

    /// Resolution rows of one section of a mixed-resolution coverage.
    pub async fn section_levels(&self, tables: &CoverageTables, section_id: i64) -> Result<Vec<LevelRow>> {
        let rows = sqlx::query_as::<_, LevelDbRow>(&format!(
            "SELECT pyramid_level, x_resolution_1_1, y_resolution_1_1 FROM {} \
             WHERE section_id = ? ORDER BY pyramid_level",
            tables.section_levels
        ))
        .bind(section_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(LevelRow::try_from).collect()
    }

    /// Tiles of one level whose extent overlaps `bbox`.
    pub async fn tiles_in_bbox(
        &self,
        tables: &CoverageTables,
        pyramid_level: u32,
        section_id: Option<i64>,
        bbox: &BoundingBox,
    ) -> Result<Vec<TileInfo>> {
        let rows = sqlx::query_as::<_, TileRow>(&format!(
            "SELECT tile_id, section_id, pyramid_level, min_x, min_y, max_x, max_y FROM {} \
             WHERE pyramid_level = ? AND (? IS NULL OR section_id = ?) \
             AND max_x > ? AND min_x < ? AND max_y > ? AND min_y < ? \
             ORDER BY tile_id",
            tables.tiles
        ))
        .bind(pyramid_level as i64)
        .bind(section_id)
        .bind(section_id)
        .bind(bbox.min_x)
        .bind(bbox.max_x)
        .bind(bbox.min_y)
        .bind(bbox.max_y)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(TileInfo::from).collect())
    }

    /// All tiles of one section at one level.
    pub async fn section_tiles(
        &self,
        tables: &CoverageTables,
        section_id: i64,
        pyramid_level: u32,
    ) -> Result<Vec<TileInfo>> {
        let rows = sqlx::query_as::<_, TileRow>(&format!(
            "SELECT tile_id, section_id, pyramid_level, min_x, min_y, max_x, max_y FROM {} \
             WHERE section_id = ? AND pyramid_level = ? ORDER BY tile_id",
            tables.tiles
        ))
        .bind(section_id)
        .bind(pyramid_level as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(TileInfo::from).collect())
    }

    /// The stored odd/even blobs of a tile.
    pub async fn tile_data(&self, tables: &CoverageTables, tile_id: i64) -> Result<EncodedTile> {
        let row = sqlx::query_as::<_, TileDataRow>(&format!(
            "SELECT tile_data_odd, tile_data_even FROM {} WHERE tile_id = ?",
            tables.tile_data
        ))
        .bind(tile_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::corrupt(format!("tile {} has no data row", tile_id)))?;
        Ok(EncodedTile {
            odd: row.tile_data_odd,
            even: row.tile_data_even,
        })
    }

    pub async fn sections(&self, tables: &CoverageTables) -> Result<Vec<SectionInfo>> {
        let rows = sqlx::query_as::<_, SectionRow>(&format!(
            "SELECT {} FROM {} ORDER BY section_id",
            SECTION_COLUMNS, tables.sections
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(SectionInfo::from).collect())
    }

    pub async fn section(&self, tables: &CoverageTables, section_id: i64) -> Result<Option<SectionInfo>> {
        let row = sqlx::query_as::<_, SectionRow>(&format!(
            "SELECT {} FROM {} WHERE section_id = ?",
            SECTION_COLUMNS, tables.sections
        ))
        .bind(section_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(SectionInfo::from))
    }

    pub async fn section_statistics(
        &self,
        tables: &CoverageTables,
        section_id: i64,
    ) -> Result<Option<RasterStatistics>> {
        let row: Option<(Vec<u8>,)> = sqlx::query_as(&format!(
            "SELECT statistics FROM {} WHERE section_id = ?",
            tables.sections
        ))
        .bind(section_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|(blob,)| RasterStatistics::from_blob(&blob).map_err(StoreError::from))
            .transpose()
    }
}

// ============================================================================
// Transactional writes
// ============================================================================

/// Load a coverage row on an open connection.
pub async fn fetch_coverage(conn: &mut SqliteConnection, tables: &CoverageTables) -> Result<StoredCoverage> {
    let row = sqlx::query_as::<_, CoverageRow>(&format!(
        "SELECT coverage_name, sample_type, pixel_type, num_bands, compression, quality, \
         tile_width, tile_height, srid, horz_resolution, vert_resolution, nodata_pixel, \
         palette, statistics, strict_resolution, mixed_resolutions, section_paths, \
         section_md5, section_summary FROM {} WHERE coverage_name = ?",
        tables.coverages
    ))
    .bind(&tables.name)
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| StoreError::Database(format!("Query failed: {}", e)))?
    .ok_or_else(|| StoreError::CoverageNotFound(tables.name.clone()))?;

    let mut stored = StoredCoverage::try_from(row)?;
    if let Some(prefix) = &tables.prefix {
        stored.coverage = stored.coverage.with_db_prefix(prefix.as_str())?;
    }
    Ok(stored)
}

/// A new `_sections` row.
#[derive(Debug)]
pub struct NewSection<'a> {
    pub name: &'a str,
    pub width: u32,
    pub height: u32,
    pub bbox: BoundingBox,
    pub file_path: Option<&'a str>,
    pub md5_checksum: Option<String>,
    pub summary: Option<String>,
    pub statistics: Vec<u8>,
}

pub async fn insert_section(
    conn: &mut SqliteConnection,
    tables: &CoverageTables,
    section: &NewSection<'_>,
) -> Result<i64> {
    let result = sqlx::query(&format!(
        "INSERT INTO {} (section_name, width, height, min_x, min_y, max_x, max_y, \
         file_path, md5_checksum, summary, statistics, ingested_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        tables.sections
    ))
    .bind(section.name)
    .bind(section.width as i64)
    .bind(section.height as i64)
    .bind(section.bbox.min_x)
    .bind(section.bbox.min_y)
    .bind(section.bbox.max_x)
    .bind(section.bbox.max_y)
    .bind(section.file_path)
    .bind(section.md5_checksum.as_deref())
    .bind(section.summary.as_deref())
    .bind(section.statistics.as_slice())
    .bind(Utc::now())
    .execute(&mut *conn)
    .await
    .map_err(|e| match &e {
        sqlx::Error::Database(db) if db.message().contains("UNIQUE") => {
            StoreError::invalid(format!("section '{}' already exists", section.name))
        }
        _ => StoreError::Database(format!("Insert failed: {}", e)),
    })?;
    Ok(result.last_insert_rowid())
}

/// Insert a tile row and its blobs; returns the tile id.
pub async fn insert_tile(
    conn: &mut SqliteConnection,
    tables: &CoverageTables,
    pyramid_level: u32,
    section_id: i64,
    bbox: &BoundingBox,
    tile: &EncodedTile,
) -> Result<i64> {
    let tile_id = sqlx::query(&format!(
        "INSERT INTO {} (pyramid_level, section_id, min_x, min_y, max_x, max_y) \
         VALUES (?, ?, ?, ?, ?, ?)",
        tables.tiles
    ))
    .bind(pyramid_level as i64)
    .bind(section_id)
    .bind(bbox.min_x)
    .bind(bbox.min_y)
    .bind(bbox.max_x)
    .bind(bbox.max_y)
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    sqlx::query(&format!(
        "INSERT INTO {} (tile_id, tile_data_odd, tile_data_even) VALUES (?, ?, ?)",
        tables.tile_data
    ))
    .bind(tile_id)
    .bind(tile.odd.as_slice())
    .bind(tile.even.as_deref())
    .execute(&mut *conn)
    .await?;

    Ok(tile_id)
}

/// Record a coverage-wide level; an existing row for the level is kept.
pub async fn insert_level(
    conn: &mut SqliteConnection,
    tables: &CoverageTables,
    pyramid_level: u32,
    x_res: f64,
    y_res: f64,
) -> Result<()> {
    sqlx::query(&format!(
        "INSERT OR IGNORE INTO {} (pyramid_level, {}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        tables.levels, RESOLUTION_COLUMNS
    ))
    .bind(pyramid_level as i64)
    .bind(x_res)
    .bind(y_res)
    .bind(x_res * 2.0)
    .bind(y_res * 2.0)
    .bind(x_res * 4.0)
    .bind(y_res * 4.0)
    .bind(x_res * 8.0)
    .bind(y_res * 8.0)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Record (or replace) one level of a section.
pub async fn insert_section_level(
    conn: &mut SqliteConnection,
    tables: &CoverageTables,
    section_id: i64,
    pyramid_level: u32,
    x_res: f64,
    y_res: f64,
) -> Result<()> {
    sqlx::query(&format!(
        "INSERT OR REPLACE INTO {} (section_id, pyramid_level, {}) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        tables.section_levels, RESOLUTION_COLUMNS
    ))
    .bind(section_id)
    .bind(pyramid_level as i64)
    .bind(x_res)
    .bind(y_res)
    .bind(x_res * 2.0)
    .bind(y_res * 2.0)
    .bind(x_res * 4.0)
    .bind(y_res * 4.0)
    .bind(x_res * 8.0)
    .bind(y_res * 8.0)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Remove tiles of a section at levels above `keep_through`.
pub async fn delete_section_tiles(
    conn: &mut SqliteConnection,
    tables: &CoverageTables,
    section_id: i64,
    keep_through: Option<u32>,
) -> Result<u64> {
    let min_level = keep_through.map(|l| l as i64 + 1).unwrap_or(0);
    sqlx::query(&format!(
        "DELETE FROM {} WHERE tile_id IN \
         (SELECT tile_id FROM {} WHERE section_id = ? AND pyramid_level >= ?)",
        tables.tile_data, tables.tiles
    ))
    .bind(section_id)
    .bind(min_level)
    .execute(&mut *conn)
    .await?;

    let deleted = sqlx::query(&format!(
        "DELETE FROM {} WHERE section_id = ? AND pyramid_level >= ?",
        tables.tiles
    ))
    .bind(section_id)
    .bind(min_level)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    sqlx::query(&format!(
        "DELETE FROM {} WHERE section_id = ? AND pyramid_level >= ?",
        tables.section_levels
    ))
    .bind(section_id)
    .bind(min_level)
    .execute(&mut *conn)
    .await?;

    Ok(deleted)
}

/// Remove a section row; false when it did not exist.
pub async fn delete_section_row(conn: &mut SqliteConnection, tables: &CoverageTables, section_id: i64) -> Result<bool> {
    let result = sqlx::query(&format!("DELETE FROM {} WHERE section_id = ?", tables.sections))
        .bind(section_id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn clear_levels(conn: &mut SqliteConnection, tables: &CoverageTables) -> Result<()> {
    sqlx::query(&format!("DELETE FROM {}", tables.levels))
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Statistics blobs of every remaining section.
pub async fn all_section_statistics(
    conn: &mut SqliteConnection,
    tables: &CoverageTables,
) -> Result<Vec<RasterStatistics>> {
    let rows: Vec<(Vec<u8>,)> = sqlx::query_as(&format!(
        "SELECT statistics FROM {} ORDER BY section_id",
        tables.sections
    ))
    .fetch_all(&mut *conn)
    .await?;
    rows.iter()
        .map(|(blob,)| RasterStatistics::from_blob(blob).map_err(StoreError::from))
        .collect()
}

pub async fn update_coverage_statistics(
    conn: &mut SqliteConnection,
    tables: &CoverageTables,
    statistics: Option<&RasterStatistics>,
) -> Result<()> {
    sqlx::query(&format!(
        "UPDATE {} SET statistics = ? WHERE coverage_name = ?",
        tables.coverages
    ))
    .bind(statistics.map(RasterStatistics::to_blob))
    .bind(&tables.name)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Fix the coverage SRID and base resolution.
pub async fn update_coverage_georeference(
    conn: &mut SqliteConnection,
    tables: &CoverageTables,
    srid: i32,
    x_res: f64,
    y_res: f64,
) -> Result<()> {
    sqlx::query(&format!(
        "UPDATE {} SET srid = ?, horz_resolution = ?, vert_resolution = ? WHERE coverage_name = ?",
        tables.coverages
    ))
    .bind(srid as i64)
    .bind(x_res)
    .bind(y_res)
    .bind(&tables.name)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn update_palette(conn: &mut SqliteConnection, tables: &CoverageTables, palette: &Palette) -> Result<()> {
    sqlx::query(&format!("UPDATE {} SET palette = ? WHERE coverage_name = ?", tables.coverages))
        .bind(palette.to_blob())
        .bind(&tables.name)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

// ============================================================================
// Table names
// ============================================================================

/// Quoted names of the per-coverage tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverageTables {
    name: String,
    prefix: Option<String>,
    schema: String,
    pub coverages: String,
    pub sections: String,
    pub tiles: String,
    pub tile_data: String,
    pub levels: String,
    pub section_levels: String,
}

impl CoverageTables {
    /// Coverage names are validated identifiers, so quoting them is enough.
    pub fn for_coverage(coverage: &Coverage) -> Self {
        let name = coverage.name();
        let schema = coverage
            .db_prefix()
            .map(|p| format!("\"{}\".", p.replace('"', "\"\"")))
            .unwrap_or_default();
        let table = |suffix: &str| format!("{}\"{}_{}\"", schema, name, suffix);
        Self {
            name: name.to_string(),
            prefix: coverage.db_prefix().map(str::to_string),
            coverages: format!("{}raster_coverages", schema),
            sections: table("sections"),
            tiles: table("tiles"),
            tile_data: table("tile_data"),
            levels: table("levels"),
            section_levels: table("section_levels"),
            schema,
        }
    }

    pub fn coverage_name(&self) -> &str {
        &self.name
    }

    /// DDL for the per-coverage tables.
    pub fn schema(&self) -> String {
        let n = &self.name;
        let s = &self.schema;
        format!(
            r#"
CREATE TABLE IF NOT EXISTS {sections} (
    section_id INTEGER PRIMARY KEY AUTOINCREMENT,
    section_name TEXT NOT NULL UNIQUE,
    width INTEGER NOT NULL,
    height INTEGER NOT NULL,
    min_x DOUBLE NOT NULL,
    min_y DOUBLE NOT NULL,
    max_x DOUBLE NOT NULL,
    max_y DOUBLE NOT NULL,
    file_path TEXT,
    md5_checksum TEXT,
    summary TEXT,
    statistics BLOB NOT NULL,
    ingested_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS {levels} (
    pyramid_level INTEGER PRIMARY KEY,
    x_resolution_1_1 DOUBLE NOT NULL,
    y_resolution_1_1 DOUBLE NOT NULL,
    x_resolution_1_2 DOUBLE NOT NULL,
    y_resolution_1_2 DOUBLE NOT NULL,
    x_resolution_1_4 DOUBLE NOT NULL,
    y_resolution_1_4 DOUBLE NOT NULL,
    x_resolution_1_8 DOUBLE NOT NULL,
    y_resolution_1_8 DOUBLE NOT NULL
);

CREATE TABLE IF NOT EXISTS {section_levels} (
    section_id INTEGER NOT NULL REFERENCES "{n}_sections"(section_id) ON DELETE CASCADE,
    pyramid_level INTEGER NOT NULL,
    x_resolution_1_1 DOUBLE NOT NULL,
    y_resolution_1_1 DOUBLE NOT NULL,
    x_resolution_1_2 DOUBLE NOT NULL,
    y_resolution_1_2 DOUBLE NOT NULL,
    x_resolution_1_4 DOUBLE NOT NULL,
    y_resolution_1_4 DOUBLE NOT NULL,
    x_resolution_1_8 DOUBLE NOT NULL,
    y_resolution_1_8 DOUBLE NOT NULL,
    PRIMARY KEY (section_id, pyramid_level)
);

CREATE TABLE IF NOT EXISTS {tiles} (
    tile_id INTEGER PRIMARY KEY AUTOINCREMENT,
    pyramid_level INTEGER NOT NULL,
    section_id INTEGER NOT NULL REFERENCES "{n}_sections"(section_id) ON DELETE CASCADE,
    min_x DOUBLE NOT NULL,
    min_y DOUBLE NOT NULL,
    max_x DOUBLE NOT NULL,
    max_y DOUBLE NOT NULL
);

CREATE INDEX IF NOT EXISTS {s}"idx_{n}_tiles_level" ON "{n}_tiles"(pyramid_level, section_id);
CREATE INDEX IF NOT EXISTS {s}"idx_{n}_tiles_bbox" ON "{n}_tiles"(min_x, max_x, min_y, max_y);

CREATE TABLE IF NOT EXISTS {tile_data} (
    tile_id INTEGER PRIMARY KEY REFERENCES "{n}_tiles"(tile_id) ON DELETE CASCADE,
    tile_data_odd BLOB NOT NULL,
    tile_data_even BLOB
)
"#,
            sections = self.sections,
            levels = self.levels,
            section_levels = self.section_levels,
            tiles = self.tiles,
            tile_data = self.tile_data,
        )
    }
}

// ============================================================================
// Rows
// ============================================================================

const RESOLUTION_COLUMNS: &str = "x_resolution_1_1, y_resolution_1_1, x_resolution_1_2, y_resolution_1_2, \
     x_resolution_1_4, y_resolution_1_4, x_resolution_1_8, y_resolution_1_8";

const SECTION_COLUMNS: &str = "section_id, section_name, width, height, min_x, min_y, max_x, max_y, \
     file_path, md5_checksum, summary, ingested_at";

/// A coverage as persisted: its descriptor plus the palette and statistics
/// accumulated by ingestion.
#[derive(Debug, Clone)]
pub struct StoredCoverage {
    pub coverage: Coverage,
    pub palette: Option<Palette>,
    pub statistics: Option<RasterStatistics>,
}

/// Stored metadata of one section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionInfo {
    pub section_id: i64,
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub bbox: BoundingBox,
    pub file_path: Option<String>,
    pub md5_checksum: Option<String>,
    /// JSON summary, when the coverage keeps them.
    pub summary: Option<String>,
    pub ingested_at: DateTime<Utc>,
}

/// Location of one stored tile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileInfo {
    pub tile_id: i64,
    pub section_id: i64,
    pub pyramid_level: u32,
    pub bbox: BoundingBox,
}

#[derive(FromRow)]
struct CoverageRow {
    coverage_name: String,
    sample_type: String,
    pixel_type: String,
    num_bands: i64,
    compression: String,
    quality: i64,
    tile_width: i64,
    tile_height: i64,
    srid: Option<i64>,
    horz_resolution: Option<f64>,
    vert_resolution: Option<f64>,
    nodata_pixel: Option<Vec<u8>>,
    palette: Option<Vec<u8>>,
    statistics: Option<Vec<u8>>,
    strict_resolution: bool,
    mixed_resolutions: bool,
    section_paths: bool,
    section_md5: bool,
    section_summary: bool,
}

fn narrow<T: TryFrom<i64>>(value: i64, column: &str) -> Result<T> {
    T::try_from(value).map_err(|_| StoreError::corrupt(format!("{} value {} out of range", column, value)))
}

impl TryFrom<CoverageRow> for StoredCoverage {
    type Error = StoreError;

    fn try_from(row: CoverageRow) -> Result<Self> {
        let sample_type = SampleType::from_sql_str(&row.sample_type)?;
        let pixel_type = PixelType::from_sql_str(&row.pixel_type)?;
        let compression = Compression::from_sql_str(&row.compression)?;
        let no_data = row.nodata_pixel.as_deref().map(Pixel::from_blob).transpose()?;

        let mut coverage = Coverage::create(
            &row.coverage_name,
            sample_type,
            pixel_type,
            narrow(row.num_bands, "num_bands")?,
            compression,
            narrow(row.quality, "quality")?,
            narrow(row.tile_width, "tile_width")?,
            narrow(row.tile_height, "tile_height")?,
            no_data,
        )
        .map_err(|e| StoreError::corrupt(format!("coverage '{}': {}", row.coverage_name, e)))?;

        match (row.srid, row.horz_resolution, row.vert_resolution) {
            (Some(srid), Some(x_res), Some(y_res)) => {
                coverage.set_georeference(narrow(srid, "srid")?, x_res, y_res)?
            }
            (None, None, None) => {}
            _ => {
                return Err(StoreError::corrupt(format!(
                    "coverage '{}' has a partial georeference",
                    row.coverage_name
                )))
            }
        }
        coverage.set_policies(CoveragePolicies {
            strict_resolution: row.strict_resolution,
            mixed_resolutions: row.mixed_resolutions,
            section_paths: row.section_paths,
            section_md5: row.section_md5,
            section_summary: row.section_summary,
        });

        let palette = row.palette.as_deref().map(Palette::from_blob).transpose()?;
        let statistics = row
            .statistics
            .as_deref()
            .map(RasterStatistics::from_blob)
            .transpose()?;

        Ok(StoredCoverage {
            coverage,
            palette,
            statistics,
        })
    }
}

#[derive(FromRow)]
struct LevelDbRow {
    pyramid_level: i64,
    x_resolution_1_1: f64,
    y_resolution_1_1: f64,
}

impl TryFrom<LevelDbRow> for LevelRow {
    type Error = StoreError;

    fn try_from(row: LevelDbRow) -> Result<Self> {
        Ok(LevelRow {
            pyramid_level: narrow(row.pyramid_level, "pyramid_level")?,
            x_res: row.x_resolution_1_1,
            y_res: row.y_resolution_1_1,
        })
    }
}

#[derive(FromRow)]
struct TileRow {
    tile_id: i64,
    section_id: i64,
    pyramid_level: i64,
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
}

impl From<TileRow> for TileInfo {
    fn from(row: TileRow) -> Self {
        TileInfo {
            tile_id: row.tile_id,
            section_id: row.section_id,
            pyramid_level: row.pyramid_level.max(0) as u32,
            bbox: BoundingBox::new(row.min_x, row.min_y, row.max_x, row.max_y),
        }
    }
}

#[derive(FromRow)]
struct TileDataRow {
    tile_data_odd: Vec<u8>,
    tile_data_even: Option<Vec<u8>>,
}

#[derive(FromRow)]
struct SectionRow {
    section_id: i64,
    section_name: String,
    width: i64,
    height: i64,
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
    file_path: Option<String>,
    md5_checksum: Option<String>,
    summary: Option<String>,
    ingested_at: DateTime<Utc>,
}

impl From<SectionRow> for SectionInfo {
    fn from(row: SectionRow) -> Self {
        SectionInfo {
            section_id: row.section_id,
            name: row.section_name,
            width: row.width.max(0) as u32,
            height: row.height.max(0) as u32,
            bbox: BoundingBox::new(row.min_x, row.min_y, row.max_x, row.max_y),
            file_path: row.file_path,
            md5_checksum: row.md5_checksum,
            summary: row.summary,
            ingested_at: row.ingested_at,
        }
    }
}

/// Database schema SQL.
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS raster_coverages (
    coverage_name TEXT NOT NULL PRIMARY KEY,
    sample_type TEXT NOT NULL,
    pixel_type TEXT NOT NULL,
    num_bands INTEGER NOT NULL,
    compression TEXT NOT NULL,
    quality INTEGER NOT NULL,
    tile_width INTEGER NOT NULL,
    tile_height INTEGER NOT NULL,
    srid INTEGER,
    horz_resolution DOUBLE,
    vert_resolution DOUBLE,
    nodata_pixel BLOB,
    palette BLOB,
    statistics BLOB,
    strict_resolution INTEGER NOT NULL DEFAULT 0,
    mixed_resolutions INTEGER NOT NULL DEFAULT 0,
    section_paths INTEGER NOT NULL DEFAULT 0,
    section_md5 INTEGER NOT NULL DEFAULT 0,
    section_summary INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_raster_coverages_srid ON raster_coverages(srid)
"#;
