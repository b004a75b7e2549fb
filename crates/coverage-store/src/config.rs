//! Configuration for the coverage store.

use serde::{Deserialize, Serialize};

/// Configuration for the coverage store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Worker threads used to encode and decode tiles (1-64).
    pub max_threads: usize,

    /// Largest raster, in pixels, a region query may produce.
    pub max_raster_pixels: u64,

    /// Memory budget for decoded tiles in megabytes.
    pub tile_cache_size_mb: usize,

    /// JPEG quality used when a query does not give one.
    pub default_quality: u8,

    /// Colour painted under transparent pixels of output images.
    pub output_background: Option<[u8; 3]>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_threads: 4,
            max_raster_pixels: 64 * 1024 * 1024,
            tile_cache_size_mb: 64,
            default_quality: 80,
            output_background: None,
        }
    }
}

impl StoreConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("RASTER_MAX_THREADS") {
            if let Ok(threads) = val.parse() {
                config.max_threads = threads;
            }
        }

        if let Ok(val) = std::env::var("RASTER_MAX_PIXELS") {
            if let Ok(pixels) = val.parse() {
                config.max_raster_pixels = pixels;
            }
        }

        if let Ok(val) = std::env::var("RASTER_TILE_CACHE_MB") {
            if let Ok(size) = val.parse() {
                config.tile_cache_size_mb = size;
            }
        }

        if let Ok(val) = std::env::var("RASTER_DEFAULT_QUALITY") {
            if let Ok(quality) = val.parse() {
                config.default_quality = quality;
            }
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_threads == 0 || self.max_threads > 64 {
            return Err("max_threads must be 1-64".to_string());
        }

        if self.max_raster_pixels == 0 {
            return Err("max_raster_pixels must be > 0".to_string());
        }

        if self.tile_cache_size_mb == 0 {
            return Err("tile_cache_size_mb must be > 0".to_string());
        }

        if self.default_quality > 100 {
            return Err("default_quality must be 0-100".to_string());
        }

        Ok(())
    }

    /// Get the tile cache size in bytes.
    pub fn tile_cache_size_bytes(&self) -> usize {
        self.tile_cache_size_mb * 1024 * 1024
    }
}
