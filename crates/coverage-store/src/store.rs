//! Coverage store: ingestion, region queries, pyramids and statistics.
//!
//! SQL runs on the async pool; tile encoding and decoding fan out to a
//! bounded rayon pool and the results are merged on the calling task.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use md5::{Digest, Md5};
use metrics::counter;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use compositor::{composite, encode_canvas, ImageLayout, OutputFormat};
use pyramid::{find_best_level, generate_pyramid, DownsampleMethod, LevelRow};
use raster_common::{
    BoundingBox, Compression, Coverage, CoveragePolicies, CoverageGeoreference, Georeference, Palette,
    Pixel, PixelType, Raster, RasterError, Scale, Section, TileSize,
};
use raster_stats::RasterStatistics;
use tile_codec::{EncodedTile, TileCodec};

use crate::cache::{hash_coverage, CacheStats, TileCache};
use crate::catalog::{self, CoverageTables, NewSection, RasterCatalog, SectionInfo, StoredCoverage, TileInfo};
use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::region::{window_size, Mosaic, RegionRequest, RegionResult};

/// Relative resolution difference tolerated when the coverage is not strict.
const RESOLUTION_TOLERANCE: f64 = 0.01;

/// One tile ready to be written.
struct EncodedBlock {
    bbox: BoundingBox,
    tile: EncodedTile,
    statistics: Option<RasterStatistics>,
}

/// JSON kept per section when the coverage asks for summaries.
#[derive(Debug, Serialize)]
struct SectionSummary<'a> {
    width: u32,
    height: u32,
    sample_type: &'a str,
    pixel_type: &'a str,
    bands: u8,
    compression: &'a str,
    srid: i32,
    bbox: BoundingBox,
    x_res: f64,
    y_res: f64,
}

/// Tiled raster coverages in a SQLite database.
pub struct CoverageStore {
    catalog: RasterCatalog,
    codec: TileCodec,
    config: StoreConfig,
    cache: Mutex<TileCache>,
    workers: rayon::ThreadPool,
}

impl CoverageStore {
    /// Wrap a migrated catalog.
    pub fn new(catalog: RasterCatalog, codec: TileCodec, config: StoreConfig) -> Result<Self> {
        config.validate().map_err(StoreError::Config)?;
        let workers = rayon::ThreadPoolBuilder::new()
            .num_threads(config.max_threads)
            .thread_name(|i| format!("raster-worker-{}", i))
            .build()
            .map_err(|e| StoreError::Config(format!("worker pool: {}", e)))?;

        info!(
            max_threads = config.max_threads,
            tile_cache_mb = config.tile_cache_size_mb,
            "Coverage store ready"
        );

        Ok(Self {
            cache: Mutex::new(TileCache::new(config.tile_cache_size_bytes())),
            catalog,
            codec,
            config,
            workers,
        })
    }

    /// Open a database file or URL and create the shared tables.
    pub async fn open(database_url: &str, config: StoreConfig) -> Result<Self> {
        let catalog = RasterCatalog::connect(database_url).await?;
        catalog.migrate().await?;
        Self::new(catalog, TileCodec::default(), config)
    }

    /// A store on a private in-memory database.
    pub async fn open_in_memory(config: StoreConfig) -> Result<Self> {
        let catalog = RasterCatalog::connect_memory().await?;
        catalog.migrate().await?;
        Self::new(catalog, TileCodec::default(), config)
    }

    pub fn catalog(&self) -> &RasterCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.lock_cache().stats()
    }

    fn lock_cache(&self) -> MutexGuard<'_, TileCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ========================================================================
    // Coverages
    // ========================================================================

    /// Persist a coverage definition and create its tables.
    #[instrument(skip(self, coverage), fields(coverage = %coverage.name()))]
    pub async fn create_coverage(&self, coverage: &Coverage) -> Result<()> {
        self.catalog.register_coverage(coverage).await?;
        info!(format = %coverage.format(), compression = %coverage.compression(), "Created coverage");
        Ok(())
    }

    /// Load a coverage definition by name.
    pub async fn load_coverage(&self, name: &str) -> Result<Coverage> {
        raster_common::coverage::check_coverage_name(name)
            .map_err(|_| StoreError::CoverageNotFound(name.to_string()))?;
        let tables = self.tables_for_name(name)?;
        Ok(self.catalog.stored_coverage(&tables).await?.coverage)
    }

    pub async fn coverage_names(&self) -> Result<Vec<String>> {
        self.catalog.coverage_names().await
    }

    fn tables_for_name(&self, name: &str) -> Result<CoverageTables> {
        // Any legal format works here; only the name reaches the table names.
        let named = Coverage::create(
            name,
            raster_common::SampleType::Uint8,
            PixelType::Grayscale,
            1,
            Compression::None,
            0,
            raster_common::coverage::MIN_TILE_SIZE,
            raster_common::coverage::MIN_TILE_SIZE,
            None,
        )?;
        Ok(CoverageTables::for_coverage(&named))
    }

    /// The stored row behind a descriptor; the formats must agree.
    async fn stored(&self, coverage: &Coverage, tables: &CoverageTables) -> Result<StoredCoverage> {
        let stored = self.catalog.stored_coverage(tables).await?;
        if stored.coverage.format() != coverage.format() {
            return Err(RasterError::mismatch(format!(
                "coverage '{}' is stored as {} but was given as {}",
                coverage.name(),
                stored.coverage.format(),
                coverage.format()
            ))
            .into());
        }
        Ok(stored)
    }

    // ========================================================================
    // Ingestion
    // ========================================================================

    /// Tile, encode and store a section; returns its id.
    ///
    /// Everything is written in one transaction: the section row, its tiles,
    /// the level-0 resolution row and the updated coverage statistics.
    #[instrument(skip(self, coverage, section, source_path), fields(coverage = %coverage.name(), section = %section.name()))]
    pub async fn ingest_section(
        &self,
        coverage: &Coverage,
        section: &Section,
        source_path: Option<&str>,
    ) -> Result<i64> {
        let raster = section.raster();
        coverage.check_raster(raster)?;
        if section.compression() != coverage.compression() {
            return Err(StoreError::invalid(format!(
                "section compression {} differs from coverage compression {}",
                section.compression(),
                coverage.compression()
            )));
        }

        let tables = CoverageTables::for_coverage(coverage);
        let stored = self.stored(coverage, &tables).await?;
        let cov = &stored.coverage;
        let georeference = section_georeference(cov, raster)?;

        let (tile_width, tile_height) = match section.tile_size() {
            TileSize::Fixed { width, height } if width == cov.tile_width() && height == cov.tile_height() => {
                (width, height)
            }
            TileSize::Fixed { width, height } => {
                return Err(StoreError::invalid(format!(
                    "section tiles {}x{} differ from coverage tiles {}x{}",
                    width,
                    height,
                    cov.tile_width(),
                    cov.tile_height()
                )))
            }
            TileSize::Undefined => {
                if self.catalog.section_count(&tables).await? > 0 {
                    return Err(StoreError::invalid(
                        "an untiled section must be the only section of its coverage",
                    ));
                }
                (raster.width(), raster.height())
            }
        };

        let no_data = cov.no_data().or(raster.no_data());
        // Tile padding must read as the coverage NoData, not as masked pixels
        let adopted;
        let source = match (cov.no_data(), raster.no_data(), raster.mask()) {
            (Some(pixel), None, None) => {
                adopted = raster.clone().with_no_data(pixel.try_clone()?)?;
                &adopted
            }
            _ => raster,
        };
        let blocks = self.encode_blocks(
            source,
            &georeference,
            (tile_width, tile_height),
            cov.compression(),
            cov.quality(),
            Some(no_data),
        )?;
        let statistics = RasterStatistics::aggregate_all(blocks.iter().filter_map(|b| b.statistics.clone()))?
            .ok_or_else(|| StoreError::invalid("section produced no tiles"))?;

        let policies = cov.policies();
        let new_section = NewSection {
            name: section.name(),
            width: raster.width(),
            height: raster.height(),
            bbox: georeference.bbox,
            file_path: source_path.filter(|_| policies.section_paths),
            md5_checksum: policies.section_md5.then(|| md5_hex(raster.pixels())),
            summary: if policies.section_summary {
                Some(section_summary(raster, &georeference, cov.compression())?)
            } else {
                None
            },
            statistics: statistics.to_blob(),
        };

        let mut tx = self.catalog.begin().await?;
        let current = catalog::fetch_coverage(&mut tx, &tables).await?;
        // A concurrent ingest may have fixed the georeference since `stored` was read
        if current.coverage.georeference() != cov.georeference() {
            section_georeference(&current.coverage, raster)?;
        }

        let new_palette = match (cov.format().pixel_type, raster.palette(), &current.palette) {
            (PixelType::Palette, Some(palette), Some(existing)) if palette != existing => {
                return Err(RasterError::mismatch("section palette differs from the coverage palette").into())
            }
            (PixelType::Palette, Some(palette), None) => Some(palette),
            _ => None,
        };

        let section_id = catalog::insert_section(&mut tx, &tables, &new_section).await?;
        for block in &blocks {
            catalog::insert_tile(&mut tx, &tables, 0, section_id, &block.bbox, &block.tile).await?;
        }

        if policies.mixed_resolutions {
            catalog::insert_section_level(&mut tx, &tables, section_id, 0, georeference.x_res, georeference.y_res)
                .await?;
        } else {
            if current.coverage.georeference().is_none() {
                // The first section fixes SRID and resolution for the rest
                catalog::update_coverage_georeference(
                    &mut tx,
                    &tables,
                    georeference.srid,
                    georeference.x_res,
                    georeference.y_res,
                )
                .await?;
            }
            let (x_res, y_res) = current
                .coverage
                .georeference()
                .map(|g| (g.x_res, g.y_res))
                .unwrap_or((georeference.x_res, georeference.y_res));
            catalog::insert_level(&mut tx, &tables, 0, x_res, y_res).await?;
        }

        if let Some(palette) = new_palette {
            catalog::update_palette(&mut tx, &tables, palette).await?;
        }

        let merged = match current.statistics {
            Some(mut existing) => {
                existing.aggregate(&statistics)?;
                existing
            }
            None => statistics,
        };
        catalog::update_coverage_statistics(&mut tx, &tables, Some(&merged)).await?;
        tx.commit().await?;

        info!(
            section_id,
            tiles = blocks.len(),
            width = raster.width(),
            height = raster.height(),
            "Ingested section"
        );
        Ok(section_id)
    }

    /// Cut `raster` into tiles and encode them on the worker pool.
    ///
    /// `statistics` carries the NoData pixel to compute per-tile statistics
    /// with; `None` skips them.
    fn encode_blocks(
        &self,
        raster: &Raster,
        georeference: &Georeference,
        (tile_width, tile_height): (u32, u32),
        compression: Compression,
        quality: u8,
        statistics: Option<Option<&Pixel>>,
    ) -> Result<Vec<EncodedBlock>> {
        let cols = raster.width().div_ceil(tile_width);
        let rows = raster.height().div_ceil(tile_height);
        let origins: Vec<(u32, u32)> = (0..rows)
            .flat_map(|row| (0..cols).map(move |col| (col * tile_width, row * tile_height)))
            .collect();

        let blocks = self.workers.install(|| {
            origins
                .par_iter()
                .map(|&(x, y)| -> Result<EncodedBlock> {
                    let block = raster.extract_block(x, y, tile_width, tile_height)?;
                    let tile = self.codec.encode(&block, compression, quality)?;
                    let statistics = match statistics {
                        Some(no_data) => Some(RasterStatistics::from_raster(&block, no_data)?),
                        None => None,
                    };
                    Ok(EncodedBlock {
                        bbox: georeference.block_bbox(x, y, tile_width, tile_height),
                        tile,
                        statistics,
                    })
                })
                .collect::<Result<Vec<_>>>()
        })?;

        counter!("raster_tiles_encoded_total").increment(blocks.len() as u64);
        debug!(tiles = blocks.len(), cols, rows, "Encoded tiles");
        Ok(blocks)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Read a window of a coverage at (about) the requested resolution.
    ///
    /// The pyramid level and decode scale come from the stored resolution
    /// rows. The stitched raster is returned as-is, and also composited and
    /// encoded when the request names an output format.
    #[instrument(skip(self, coverage, request), fields(coverage = %coverage.name()))]
    pub async fn query_region(&self, coverage: &Coverage, request: &RegionRequest) -> Result<RegionResult> {
        counter!("raster_queries_total").increment(1);
        request.bbox.validate()?;
        if let Some(OutputFormat::Pdf) = request.output {
            return Err(StoreError::UnsupportedOutputFormat(OutputFormat::Pdf));
        }

        let tables = CoverageTables::for_coverage(coverage);
        let stored = self.stored(coverage, &tables).await?;
        let cov = &stored.coverage;

        let levels = self.level_rows(cov, &tables, request.section_id).await?;
        let level = find_best_level(request.x_res, request.y_res, &levels)?;

        let (width, height) = window_size(&request.bbox, level.x_res, level.y_res);
        let pixels = width.saturating_mul(height);
        if pixels > self.config.max_raster_pixels || width > u32::MAX as u64 || height > u32::MAX as u64 {
            warn!(width, height, level = level.pyramid_level, "Requested raster too large");
            return Err(StoreError::RasterTooLarge {
                width,
                height,
                limit: self.config.max_raster_pixels,
            });
        }
        let (width, height) = (width as u32, height as u32);

        let srid = cov.georeference().map(|g| g.srid).unwrap_or(0);
        let window = Georeference::from_origin(
            srid,
            request.bbox.min_x,
            request.bbox.max_y,
            width,
            height,
            level.x_res,
            level.y_res,
        )?;

        let tiles = self
            .catalog
            .tiles_in_bbox(&tables, level.pyramid_level, request.section_id, &request.bbox)
            .await?;
        let decoded = self
            .load_tiles(&tables, &tiles, level.scale, stored.palette.as_ref())
            .await?;

        let mut mosaic = Mosaic::new(cov.format(), window, width, height, cov.no_data())?;
        for (info, tile) in &decoded {
            mosaic.paste(tile, &info.bbox);
        }
        let raster = mosaic.finish(stored.palette.clone(), cov.no_data())?;

        let image = match request.output {
            Some(format) => {
                let mut options = request.composite.clone();
                if options.background.is_none() {
                    options.background = self.config.output_background;
                }
                let canvas = composite(&raster, ImageLayout::Rgba, &options)?;
                let quality = request.quality.unwrap_or(self.config.default_quality);
                Some(encode_canvas(&canvas, format, quality, options.background)?)
            }
            None => None,
        };

        debug!(
            level = level.pyramid_level,
            scale = %level.scale,
            width,
            height,
            tiles = decoded.len(),
            "Served region"
        );
        Ok(RegionResult {
            raster,
            level,
            tiles: decoded.len(),
            image,
        })
    }

    /// Resolution rows a request resolves against.
    async fn level_rows(
        &self,
        coverage: &Coverage,
        tables: &CoverageTables,
        section_id: Option<i64>,
    ) -> Result<Vec<LevelRow>> {
        if coverage.policies().mixed_resolutions {
            let section_id = section_id.ok_or_else(|| {
                StoreError::invalid(format!(
                    "coverage '{}' has mixed resolutions; a section is required",
                    coverage.name()
                ))
            })?;
            self.catalog.section_levels(tables, section_id).await
        } else {
            self.catalog.levels(tables).await
        }
    }

    /// Decode tiles at `scale`, going through the tile cache.
    async fn load_tiles(
        &self,
        tables: &CoverageTables,
        tiles: &[TileInfo],
        scale: Scale,
        palette: Option<&Palette>,
    ) -> Result<Vec<(TileInfo, Arc<Raster>)>> {
        let coverage_hash = hash_coverage(tables.coverage_name());
        let mut ready = Vec::with_capacity(tiles.len());
        let mut pending = Vec::new();
        {
            let mut cache = self.lock_cache();
            for info in tiles {
                match cache.get(&(coverage_hash, info.tile_id, scale)) {
                    Some(tile) => ready.push((*info, tile)),
                    None => pending.push(*info),
                }
            }
        }

        let mut blobs = Vec::with_capacity(pending.len());
        for info in pending {
            blobs.push((info, self.catalog.tile_data(tables, info.tile_id).await?));
        }

        let decoded = self.workers.install(|| {
            blobs
                .par_iter()
                .map(|(info, blob)| -> Result<(TileInfo, Arc<Raster>)> {
                    let raster = self.codec.decode(scale, &blob.odd, blob.even.as_deref(), palette)?;
                    Ok((*info, Arc::new(raster)))
                })
                .collect::<Result<Vec<_>>>()
        })?;
        counter!("raster_tiles_decoded_total").increment(decoded.len() as u64);

        {
            let mut cache = self.lock_cache();
            for (info, tile) in &decoded {
                cache.insert((coverage_hash, info.tile_id, scale), Arc::clone(tile));
            }
        }
        debug!(cached = ready.len(), decoded = decoded.len(), "Loaded tiles");
        ready.extend(decoded);
        Ok(ready)
    }

    // ========================================================================
    // Pyramids
    // ========================================================================

    /// Build (or rebuild) the pyramid of one section; returns the number of
    /// levels above the base.
    ///
    /// The section is halved until it fits one tile. Levels go to the
    /// coverage-wide table, or to the section's own rows for mixed
    /// resolution coverages.
    #[instrument(skip(self, coverage), fields(coverage = %coverage.name()))]
    pub async fn build_section_pyramid(&self, coverage: &Coverage, section_id: i64) -> Result<u32> {
        let tables = CoverageTables::for_coverage(coverage);
        let stored = self.stored(coverage, &tables).await?;
        let cov = &stored.coverage;
        let section = self.section_info(cov, &tables, section_id).await?;

        let srid = cov.georeference().map(|g| g.srid).unwrap_or(0);
        let x_res = section.bbox.width() / section.width as f64;
        let y_res = section.bbox.height() / section.height as f64;
        let base_georeference = Georeference::from_origin(
            srid,
            section.bbox.min_x,
            section.bbox.max_y,
            section.width,
            section.height,
            x_res,
            y_res,
        )?;

        let tiles = self.catalog.section_tiles(&tables, section_id, 0).await?;
        let decoded = self
            .load_tiles(&tables, &tiles, Scale::X1, stored.palette.as_ref())
            .await?;
        let mut mosaic = Mosaic::new(cov.format(), base_georeference, section.width, section.height, cov.no_data())?;
        for (info, tile) in &decoded {
            mosaic.paste(tile, &info.bbox);
        }
        let base = mosaic.finish(stored.palette.clone(), cov.no_data())?;

        let method = DownsampleMethod::for_pixel_type(cov.format().pixel_type);
        let levels = generate_pyramid(&base, cov.tile_width(), cov.tile_height(), method)?;

        let mut encoded = Vec::with_capacity(levels.len());
        for level in &levels {
            let georeference = level
                .raster
                .georeference()
                .copied()
                .ok_or_else(|| StoreError::corrupt("pyramid level lost its georeference"))?;
            let blocks = self.encode_blocks(
                &level.raster,
                &georeference,
                (cov.tile_width(), cov.tile_height()),
                cov.compression(),
                cov.quality(),
                None,
            )?;
            encoded.push((level.level, georeference, blocks));
        }

        let mut tx = self.catalog.begin().await?;
        let replaced = catalog::delete_section_tiles(&mut tx, &tables, section_id, Some(0)).await?;
        for (level, georeference, blocks) in &encoded {
            for block in blocks {
                catalog::insert_tile(&mut tx, &tables, *level, section_id, &block.bbox, &block.tile).await?;
            }
            if cov.policies().mixed_resolutions {
                catalog::insert_section_level(
                    &mut tx,
                    &tables,
                    section_id,
                    *level,
                    georeference.x_res,
                    georeference.y_res,
                )
                .await?;
            } else {
                catalog::insert_level(&mut tx, &tables, *level, georeference.x_res, georeference.y_res).await?;
            }
        }
        tx.commit().await?;

        info!(
            section_id,
            levels = levels.len(),
            replaced_tiles = replaced,
            "Built section pyramid"
        );
        Ok(levels.len() as u32)
    }

    // ========================================================================
    // Sections
    // ========================================================================

    pub async fn list_sections(&self, coverage: &Coverage) -> Result<Vec<SectionInfo>> {
        let tables = CoverageTables::for_coverage(coverage);
        self.stored(coverage, &tables).await?;
        self.catalog.sections(&tables).await
    }

    async fn section_info(&self, coverage: &Coverage, tables: &CoverageTables, section_id: i64) -> Result<SectionInfo> {
        self.catalog
            .section(tables, section_id)
            .await?
            .ok_or_else(|| StoreError::SectionNotFound {
                coverage: coverage.name().to_string(),
                section_id,
            })
    }

    /// Remove a section with its tiles and levels, then recompute the
    /// coverage statistics from the sections that remain.
    #[instrument(skip(self, coverage), fields(coverage = %coverage.name()))]
    pub async fn delete_section(&self, coverage: &Coverage, section_id: i64) -> Result<()> {
        let tables = CoverageTables::for_coverage(coverage);
        self.stored(coverage, &tables).await?;

        let mut tx = self.catalog.begin().await?;
        let tiles = catalog::delete_section_tiles(&mut tx, &tables, section_id, None).await?;
        if !catalog::delete_section_row(&mut tx, &tables, section_id).await? {
            return Err(StoreError::SectionNotFound {
                coverage: coverage.name().to_string(),
                section_id,
            });
        }

        let remaining = catalog::all_section_statistics(&mut tx, &tables).await?;
        let left = remaining.len();
        let statistics = RasterStatistics::aggregate_all(remaining)?;
        if statistics.is_none() {
            catalog::clear_levels(&mut tx, &tables).await?;
        }
        catalog::update_coverage_statistics(&mut tx, &tables, statistics.as_ref()).await?;
        tx.commit().await?;

        info!(section_id, tiles, remaining_sections = left, "Deleted section");
        Ok(())
    }

    // ========================================================================
    // Statistics
    // ========================================================================

    /// Statistics over every ingested section; `None` before the first ingest.
    pub async fn coverage_statistics(&self, coverage: &Coverage) -> Result<Option<RasterStatistics>> {
        let tables = CoverageTables::for_coverage(coverage);
        Ok(self.stored(coverage, &tables).await?.statistics)
    }

    pub async fn section_statistics(&self, coverage: &Coverage, section_id: i64) -> Result<RasterStatistics> {
        let tables = CoverageTables::for_coverage(coverage);
        self.stored(coverage, &tables).await?;
        self.catalog
            .section_statistics(&tables, section_id)
            .await?
            .ok_or_else(|| StoreError::SectionNotFound {
                coverage: coverage.name().to_string(),
                section_id,
            })
    }
}

/// Georeference a section raster against its coverage.
///
/// Non-georeferenced data lives in pixel space: one unit per pixel with the
/// origin at the lower-left corner.
fn section_georeference(coverage: &Coverage, raster: &Raster) -> Result<Georeference> {
    match (coverage.georeference(), raster.georeference()) {
        (Some(expected), Some(actual)) => {
            if expected.srid != actual.srid {
                return Err(RasterError::mismatch(format!(
                    "section SRID {} differs from coverage SRID {}",
                    actual.srid, expected.srid
                ))
                .into());
            }
            check_resolution(coverage.policies(), expected, actual)?;
            Ok(*actual)
        }
        (Some(expected), None) if is_pixel_space(expected) => pixel_space(raster),
        (Some(_), None) => Err(StoreError::invalid(
            "coverage is georeferenced but the section raster is not",
        )),
        (None, Some(actual)) => Ok(*actual),
        (None, None) => pixel_space(raster),
    }
}

/// Rasters without a georeference sit at SRID 0 with one unit per pixel.
fn pixel_space(raster: &Raster) -> Result<Georeference> {
    Ok(Georeference::from_origin(
        0,
        0.0,
        raster.height() as f64,
        raster.width(),
        raster.height(),
        1.0,
        1.0,
    )?)
}

fn is_pixel_space(georeference: &CoverageGeoreference) -> bool {
    georeference.srid == 0 && georeference.x_res == 1.0 && georeference.y_res == 1.0
}

/// Mixed coverages accept any resolution, strict ones only the exact
/// coverage resolution, others anything within [`RESOLUTION_TOLERANCE`].
fn check_resolution(policies: CoveragePolicies, expected: &CoverageGeoreference, actual: &Georeference) -> Result<()> {
    if policies.mixed_resolutions {
        return Ok(());
    }
    let matches = |want: f64, got: f64| {
        if policies.strict_resolution {
            want == got
        } else {
            ((got - want) / want).abs() <= RESOLUTION_TOLERANCE
        }
    };
    if !(matches(expected.x_res, actual.x_res) && matches(expected.y_res, actual.y_res)) {
        return Err(RasterError::mismatch(format!(
            "section resolution {} x {} does not match coverage resolution {} x {}",
            actual.x_res, actual.y_res, expected.x_res, expected.y_res
        ))
        .into());
    }
    Ok(())
}

fn md5_hex(data: &[u8]) -> String {
    Md5::digest(data).iter().map(|b| format!("{:02x}", b)).collect()
}

fn section_summary(raster: &Raster, georeference: &Georeference, compression: Compression) -> Result<String> {
    let format = raster.format();
    let summary = SectionSummary {
        width: raster.width(),
        height: raster.height(),
        sample_type: format.sample_type.as_sql_str(),
        pixel_type: format.pixel_type.as_sql_str(),
        bands: format.bands,
        compression: compression.as_sql_str(),
        srid: georeference.srid,
        bbox: georeference.bbox,
        x_res: georeference.x_res,
        y_res: georeference.y_res,
    };
    Ok(serde_json::to_string(&summary)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use raster_common::{PixelFormat, SampleType};

    fn geo(srid: i32, res: f64) -> Georeference {
        Georeference::from_origin(srid, 0.0, 100.0, 10, 10, res, res).unwrap()
    }

    fn raster(georeference: Option<Georeference>) -> Raster {
        let format = PixelFormat::new(SampleType::Uint8, PixelType::Grayscale, 1).unwrap();
        let raster = Raster::new(10, 10, format, vec![0; 100], None).unwrap();
        match georeference {
            Some(g) => raster.with_georeference(g),
            None => raster,
        }
    }

    fn coverage(policies: CoveragePolicies) -> Coverage {
        let mut coverage = Coverage::create(
            "ortho",
            SampleType::Uint8,
            PixelType::Grayscale,
            1,
            Compression::Png,
            80,
            256,
            256,
            None,
        )
        .unwrap();
        coverage.set_georeference(32632, 1.0, 1.0).unwrap();
        coverage.set_policies(policies);
        coverage
    }

    #[test]
    fn test_resolution_policies() {
        let loose = coverage(CoveragePolicies::default());
        assert!(section_georeference(&loose, &raster(Some(geo(32632, 1.005)))).is_ok());
        assert!(section_georeference(&loose, &raster(Some(geo(32632, 1.5)))).is_err());

        let strict = coverage(CoveragePolicies {
            strict_resolution: true,
            ..Default::default()
        });
        assert!(section_georeference(&strict, &raster(Some(geo(32632, 1.0)))).is_ok());
        assert!(section_georeference(&strict, &raster(Some(geo(32632, 1.005)))).is_err());

        let mixed = coverage(CoveragePolicies {
            mixed_resolutions: true,
            ..Default::default()
        });
        assert!(section_georeference(&mixed, &raster(Some(geo(32632, 7.0)))).is_ok());
    }

    #[test]
    fn test_srid_and_missing_georeference() {
        let cov = coverage(CoveragePolicies::default());
        let err = section_georeference(&cov, &raster(Some(geo(4326, 1.0)))).unwrap_err();
        assert!(err.is_request_error());
        assert!(matches!(
            section_georeference(&cov, &raster(None)),
            Err(StoreError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_pixel_space_georeference() {
        let cov = Coverage::create(
            "plain",
            SampleType::Uint8,
            PixelType::Grayscale,
            1,
            Compression::None,
            0,
            256,
            256,
            None,
        )
        .unwrap();
        let g = section_georeference(&cov, &raster(None)).unwrap();
        assert_eq!(g.bbox, BoundingBox::new(0.0, 0.0, 10.0, 10.0));
        assert_eq!((g.x_res, g.y_res), (1.0, 1.0));

        let mut adopted = cov.clone();
        adopted.set_georeference(0, 1.0, 1.0).unwrap();
        assert_eq!(section_georeference(&adopted, &raster(None)).unwrap(), g);
        assert!(section_georeference(&adopted, &raster(Some(geo(32632, 1.0)))).is_err());
    }

    #[test]
    fn test_md5_hex() {
        assert_eq!(md5_hex(b""), "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[test]
    fn test_summary_json() {
        let r = raster(Some(geo(32632, 1.0)));
        let json = section_summary(&r, &geo(32632, 1.0), Compression::Png).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["pixel_type"], "GRAYSCALE");
        assert_eq!(value["width"], 10);
        assert_eq!(value["compression"], "PNG");
    }
}
