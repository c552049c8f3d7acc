//! Populates a `SqliteContentStore` from media files on disk.
//!
//! Files are classified by extension; `date_added` and `date_modified`
//! come from the file's mtime. Videos are written without a duration so
//! the catalog resolves them from the files.

use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::sqlite_store::{ImageEntry, SqliteContentStore, VideoEntry};
use crate::models::{Collection, MediaUri};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Whether to descend into subdirectories.
    pub recursive: bool,
    /// Maximum directory depth (0 = unlimited).
    pub max_depth: usize,
    pub follow_symlinks: bool,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            recursive: true,
            max_depth: 0,
            follow_symlinks: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub images: usize,
    pub videos: usize,
    pub skipped: usize,
}

/// Which collection a file belongs in, by extension.
pub fn classify(path: &Path) -> Option<Collection> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" | "png" | "webp" | "gif" | "bmp" | "tiff" | "tif" => {
            Some(Collection::Images)
        }
        "mp4" | "m4v" | "mov" | "3gp" | "mkv" | "webm" => Some(Collection::Videos),
        _ => None,
    }
}

/// Walks `dir` and upserts every media file found.
pub fn import_directory(
    store: &SqliteContentStore,
    dir: &Path,
    config: &ImportConfig,
) -> Result<ImportSummary> {
    let root: PathBuf = dir
        .canonicalize()
        .with_context(|| format!("Failed to resolve import directory: {:?}", dir))?;
    info!(?root, "Importing media");

    let mut walker = WalkDir::new(&root).follow_links(config.follow_symlinks);
    if !config.recursive {
        walker = walker.max_depth(1);
    } else if config.max_depth > 0 {
        walker = walker.max_depth(config.max_depth);
    }

    let mut images = Vec::new();
    let mut videos = Vec::new();
    let mut summary = ImportSummary::default();

    for entry in walker.into_iter().filter_map(|e| e.ok()) {
        if entry.file_type().is_dir() {
            continue;
        }
        let path = entry.path();
        let Some(collection) = classify(path) else {
            summary.skipped += 1;
            continue;
        };
        let metadata = match entry.metadata() {
            Ok(m) => m,
            Err(e) => {
                warn!("Failed to read metadata for {:?}: {}", path, e);
                summary.skipped += 1;
                continue;
            }
        };
        let mtime = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        let uri = MediaUri::new(path.to_string_lossy().into_owned());

        match collection {
            Collection::Images => images.push(ImageEntry::new(uri, mtime)),
            Collection::Videos => {
                videos.push(VideoEntry::new(uri, mtime).file_info(metadata.len() as i64, mtime))
            }
        }
    }

    summary.images = store.upsert_images(&images)?;
    summary.videos = store.upsert_videos(&videos)?;
    debug!(?summary, "Import finished");
    Ok(summary)
}
