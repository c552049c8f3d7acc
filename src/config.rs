//! Tunables for the catalog, gesture controller and thumbnailer.
//!
//! Every struct has a `Default` carrying the stock values and consuming
//! setters for overrides. All of them deserialize from JSON with missing
//! fields falling back to the defaults.

use std::time::Duration;

use serde::Deserialize;

/// Number of resolved durations between feed republishes.
const DEFAULT_DURATION_BATCH: usize = 10;

/// Entries kept in the in-process duration cache.
const DEFAULT_DURATION_CACHE_CAPACITY: usize = 512;

/// Distance from the top/bottom edge that triggers auto-scroll, in px.
const DEFAULT_HOT_ZONE: f32 = 56.0;

/// Largest scroll step applied per frame, in px.
const DEFAULT_MAX_SCROLL_STEP: i32 = 16;

/// Reference frame length that scroll steps are expressed against.
const DEFAULT_FRAME_INTERVAL_MS: u64 = 16;

/// Edge length of square grid thumbnails, in px.
const DEFAULT_THUMB_SIZE: u32 = 256;

const DEFAULT_THUMB_CACHE_CAPACITY: usize = 256;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Republish the feed after this many durations are resolved.
    pub duration_batch_size: usize,
    /// Bound on the duration lookup cache.
    pub duration_cache_capacity: usize,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            duration_batch_size: DEFAULT_DURATION_BATCH,
            duration_cache_capacity: DEFAULT_DURATION_CACHE_CAPACITY,
        }
    }
}

impl CatalogConfig {
    pub fn duration_batch_size(mut self, size: usize) -> Self {
        self.duration_batch_size = size.max(1);
        self
    }

    pub fn duration_cache_capacity(mut self, capacity: usize) -> Self {
        self.duration_cache_capacity = capacity.max(1);
        self
    }

    fn clamped(self) -> Self {
        let (batch, capacity) = (self.duration_batch_size, self.duration_cache_capacity);
        self.duration_batch_size(batch).duration_cache_capacity(capacity)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    /// Height of the top and bottom auto-scroll hot-zones.
    pub hot_zone: f32,
    /// Maximum scroll distance per reference frame.
    pub max_scroll_step: i32,
    /// Reference frame length in milliseconds.
    pub frame_interval_ms: u64,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            hot_zone: DEFAULT_HOT_ZONE,
            max_scroll_step: DEFAULT_MAX_SCROLL_STEP,
            frame_interval_ms: DEFAULT_FRAME_INTERVAL_MS,
        }
    }
}

impl GestureConfig {
    pub fn hot_zone(mut self, px: f32) -> Self {
        self.hot_zone = px.max(1.0);
        self
    }

    pub fn max_scroll_step(mut self, px: i32) -> Self {
        self.max_scroll_step = px.max(1);
        self
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms.max(1))
    }

    fn clamped(self) -> Self {
        let (zone, step) = (self.hot_zone, self.max_scroll_step);
        self.hot_zone(zone).max_scroll_step(step)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ThumbnailConfig {
    pub size: u32,
    pub cache_capacity: usize,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            size: DEFAULT_THUMB_SIZE,
            cache_capacity: DEFAULT_THUMB_CACHE_CAPACITY,
        }
    }
}

impl ThumbnailConfig {
    pub fn size(mut self, px: u32) -> Self {
        self.size = px.max(1);
        self
    }

    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity.max(1);
        self
    }

    fn clamped(self) -> Self {
        let (size, capacity) = (self.size, self.cache_capacity);
        self.size(size).cache_capacity(capacity)
    }
}

/// Top-level configuration bundle.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GalleryConfig {
    pub catalog: CatalogConfig,
    pub gesture: GestureConfig,
    pub thumbnails: ThumbnailConfig,
}

impl GalleryConfig {
    /// Parses a config file; out-of-range values are clamped the same way
    /// the setters clamp them.
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        Ok(Self {
            catalog: config.catalog.clamped(),
            gesture: config.gesture.clamped(),
            thumbnails: config.thumbnails.clamped(),
        })
    }
}
