//! Grid cell thumbnails.
//!
//! - Square, center-cropped to the configured edge length
//! - In-memory LRU of decoded thumbnails keyed by uri
//! - Any failure yields the shared placeholder; failures are not cached so
//!   a file that becomes readable later still loads

use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use image::imageops::FilterType;
use image::{Rgba, RgbaImage};
use lru::LruCache;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::config::ThumbnailConfig;
use crate::models::MediaUri;

/// Fill colour of the placeholder tile.
const PLACEHOLDER_RGBA: [u8; 4] = [0x42, 0x42, 0x42, 0xFF];

#[derive(Debug, Clone)]
pub struct Thumbnail {
    pub image: Arc<RgbaImage>,
    pub is_placeholder: bool,
}

/// Renders a grid cell's thumbnail for a uri.
pub trait ThumbnailLoader: Send + Sync {
    fn load(&self, uri: &MediaUri) -> Thumbnail;
}

pub struct CenterCropThumbnailer {
    size: u32,
    cache: Arc<Mutex<LruCache<MediaUri, Arc<RgbaImage>>>>,
    placeholder: Arc<RgbaImage>,
}

impl CenterCropThumbnailer {
    pub fn new(config: &ThumbnailConfig) -> Self {
        let size = config.size.max(1);
        let capacity = NonZeroUsize::new(config.cache_capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            size,
            cache: Arc::new(Mutex::new(LruCache::new(capacity))),
            placeholder: Arc::new(RgbaImage::from_pixel(size, size, Rgba(PLACEHOLDER_RGBA))),
        }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn cached_count(&self) -> usize {
        self.cache.lock().len()
    }

    /// Loads on the blocking pool.
    pub async fn load_async(self: &Arc<Self>, uri: MediaUri) -> Thumbnail {
        let this = Arc::clone(self);
        let placeholder = self.placeholder();
        tokio::task::spawn_blocking(move || this.load(&uri))
            .await
            .unwrap_or(placeholder)
    }

    fn placeholder(&self) -> Thumbnail {
        Thumbnail {
            image: Arc::clone(&self.placeholder),
            is_placeholder: true,
        }
    }

    fn render(&self, path: &Path) -> Result<RgbaImage> {
        let img = image::open(path).with_context(|| format!("Failed to load image: {:?}", path))?;
        Ok(img
            .resize_to_fill(self.size, self.size, FilterType::CatmullRom)
            .to_rgba8())
    }
}

impl ThumbnailLoader for CenterCropThumbnailer {
    fn load(&self, uri: &MediaUri) -> Thumbnail {
        if let Some(image) = self.cache.lock().get(uri) {
            trace!(%uri, "Thumbnail cache hit");
            return Thumbnail {
                image: Arc::clone(image),
                is_placeholder: false,
            };
        }

        let Some(path) = uri.to_file_path() else {
            debug!(%uri, "No local file for thumbnail");
            return self.placeholder();
        };
        match self.render(&path) {
            Ok(image) => {
                let image = Arc::new(image);
                self.cache.lock().put(uri.clone(), Arc::clone(&image));
                Thumbnail {
                    image,
                    is_placeholder: false,
                }
            }
            Err(e) => {
                debug!(%uri, error = ?e, "Thumbnail failed, using placeholder");
                self.placeholder()
            }
        }
    }
}

impl Clone for CenterCropThumbnailer {
    fn clone(&self) -> Self {
        Self {
            size: self.size,
            cache: Arc::clone(&self.cache),
            placeholder: Arc::clone(&self.placeholder),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn thumbnailer(size: u32) -> CenterCropThumbnailer {
        CenterCropThumbnailer::new(&ThumbnailConfig::default().size(size).cache_capacity(2))
    }

    /// 40x20: blue | green | red in 10/20/10 px bands.
    fn banded_png(path: &Path) {
        let img = RgbaImage::from_fn(40, 20, |x, _| match x {
            0..=9 => Rgba([0, 0, 255, 255]),
            10..=29 => Rgba([0, 255, 0, 255]),
            _ => Rgba([255, 0, 0, 255]),
        });
        img.save(path).unwrap();
    }

    #[test]
    fn test_center_crop() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wide.png");
        banded_png(&path);

        let thumbs = thumbnailer(16);
        let thumb = thumbs.load(&MediaUri::new(path.to_string_lossy().to_string()));
        assert!(!thumb.is_placeholder);
        assert_eq!(thumb.image.dimensions(), (16, 16));
        let Rgba([r, g, b, _]) = *thumb.image.get_pixel(8, 8);
        assert!(g > 200 && r < 50 && b < 50);
    }

    #[test]
    fn test_cache_hit_shares_image() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wide.png");
        banded_png(&path);
        let uri = MediaUri::new(format!("file://{}", path.display()));

        let thumbs = thumbnailer(8);
        let first = thumbs.load(&uri);
        let shared = thumbs.clone();
        let second = shared.load(&uri);
        assert!(Arc::ptr_eq(&first.image, &second.image));
        assert_eq!(thumbs.cached_count(), 1);
    }

    #[test]
    fn test_failures_use_placeholder() {
        let dir = tempdir().unwrap();
        let broken = dir.path().join("broken.jpg");
        std::fs::write(&broken, b"not an image").unwrap();

        let thumbs = thumbnailer(8);
        for uri in [
            MediaUri::new(broken.to_string_lossy().to_string()),
            MediaUri::new(dir.path().join("missing.png").to_string_lossy().to_string()),
            MediaUri::from("content://media/external/images/1"),
        ] {
            let thumb = thumbs.load(&uri);
            assert!(thumb.is_placeholder);
            assert_eq!(thumb.image.get_pixel(0, 0), &Rgba(PLACEHOLDER_RGBA));
        }
        assert_eq!(thumbs.cached_count(), 0);
    }

    #[tokio::test]
    async fn test_load_async() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wide.png");
        banded_png(&path);

        let thumbs = Arc::new(thumbnailer(4));
        let thumb = thumbs
            .load_async(MediaUri::new(path.to_string_lossy().to_string()))
            .await;
        assert_eq!(thumb.image.dimensions(), (4, 4));
    }
}
