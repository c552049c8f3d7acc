//! SQLite-backed content store.
//!
//! This module provides `SqliteContentStore`, a desktop stand-in for the
//! platform media index:
//! - `images` and `videos` tables with the columns the catalog projects
//! - capability flags mirroring platform versions with and without the
//!   `date_taken` and `duration` columns
//! - change notification to registered observers after every write

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use tracing::{debug, info};

use super::store::{
    CancelToken, ChangeCallback, ContentStore, ImageRow, ObserverId, ObserverRegistry,
    StoreCapabilities, VideoColumns, VideoRow,
};
use crate::models::{Collection, MediaUri};

/// A video as written into the store.
#[derive(Debug, Clone)]
pub struct VideoEntry {
    pub uri: MediaUri,
    pub date_taken: Option<i64>,
    pub date_added: i64,
    pub duration_ms: Option<i64>,
    pub size: i64,
    pub date_modified: i64,
}

/// An image as written into the store.
#[derive(Debug, Clone)]
pub struct ImageEntry {
    pub uri: MediaUri,
    pub date_taken: Option<i64>,
    pub date_added: i64,
}

impl ImageEntry {
    pub fn new(uri: impl Into<MediaUri>, date_added: i64) -> Self {
        Self {
            uri: uri.into(),
            date_taken: None,
            date_added,
        }
    }

    pub fn date_taken(mut self, date_taken: i64) -> Self {
        self.date_taken = Some(date_taken);
        self
    }
}

impl VideoEntry {
    pub fn new(uri: impl Into<MediaUri>, date_added: i64) -> Self {
        Self {
            uri: uri.into(),
            date_taken: None,
            date_added,
            duration_ms: None,
            size: 0,
            date_modified: date_added,
        }
    }

    pub fn date_taken(mut self, date_taken: i64) -> Self {
        self.date_taken = Some(date_taken);
        self
    }

    pub fn duration_ms(mut self, duration_ms: i64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn file_info(mut self, size: i64, date_modified: i64) -> Self {
        self.size = size;
        self.date_modified = date_modified;
        self
    }
}

pub struct SqliteContentStore {
    conn: Mutex<Connection>,
    capabilities: StoreCapabilities,
    observers: ObserverRegistry,
}

impl SqliteContentStore {
    /// Opens or creates the store at the default XDG data location.
    pub fn open_default(capabilities: StoreCapabilities) -> Result<Self> {
        let path = Self::default_db_path()?;
        Self::open(&path, capabilities)
    }

    pub fn default_db_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("", "", "gallery-picker")
            .context("Failed to determine project directories")?;
        Ok(proj_dirs.data_dir().join("media.sqlite"))
    }

    pub fn open(path: &Path, capabilities: StoreCapabilities) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create database directory: {:?}", parent))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database at {:?}", path))?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            ",
        )
        .context("Failed to configure SQLite pragmas")?;

        let store = Self::with_connection(conn, capabilities)?;
        info!("Opened content store at {:?}", path);
        Ok(store)
    }

    pub fn open_in_memory(capabilities: StoreCapabilities) -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::with_connection(conn, capabilities)
    }

    fn with_connection(conn: Connection, capabilities: StoreCapabilities) -> Result<Self> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS images (
                uri TEXT PRIMARY KEY NOT NULL,
                date_taken INTEGER,
                date_added INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS videos (
                uri TEXT PRIMARY KEY NOT NULL,
                date_taken INTEGER,
                date_added INTEGER NOT NULL,
                duration_ms INTEGER,
                size INTEGER NOT NULL,
                date_modified INTEGER NOT NULL
            );
            ",
        )
        .context("Failed to create database tables")?;
        debug!("Content store tables created/verified");

        Ok(Self {
            conn: Mutex::new(conn),
            capabilities,
            observers: ObserverRegistry::new(),
        })
    }

    // =========================================================================
    // Writes
    // =========================================================================

    pub fn upsert_image(&self, image: &ImageEntry) -> Result<()> {
        self.upsert_images(std::slice::from_ref(image)).map(|_| ())
    }

    /// Inserts or updates images in one transaction, then notifies observers.
    pub fn upsert_images(&self, images: &[ImageEntry]) -> Result<usize> {
        if images.is_empty() {
            return Ok(0);
        }
        {
            let mut conn = self.conn.lock();
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare_cached(
                    "
                    INSERT INTO images (uri, date_taken, date_added) VALUES (?1, ?2, ?3)
                    ON CONFLICT(uri) DO UPDATE SET
                        date_taken = excluded.date_taken,
                        date_added = excluded.date_added
                    ",
                )?;
                for image in images {
                    stmt.execute(params![image.uri.as_str(), image.date_taken, image.date_added])?;
                }
            }
            tx.commit().context("Failed to upsert images")?;
        }
        debug!(count = images.len(), "Upserted images");
        self.observers.notify(Collection::Images);
        Ok(images.len())
    }

    pub fn upsert_video(&self, video: &VideoEntry) -> Result<()> {
        self.upsert_videos(std::slice::from_ref(video)).map(|_| ())
    }

    /// Inserts or updates videos in one transaction, then notifies observers.
    pub fn upsert_videos(&self, videos: &[VideoEntry]) -> Result<usize> {
        if videos.is_empty() {
            return Ok(0);
        }
        {
            let mut conn = self.conn.lock();
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare_cached(
                    "
                    INSERT INTO videos (
                        uri, date_taken, date_added, duration_ms, size, date_modified
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                    ON CONFLICT(uri) DO UPDATE SET
                        date_taken = excluded.date_taken,
                        date_added = excluded.date_added,
                        duration_ms = excluded.duration_ms,
                        size = excluded.size,
                        date_modified = excluded.date_modified
                    ",
                )?;
                for video in videos {
                    stmt.execute(params![
                        video.uri.as_str(),
                        video.date_taken,
                        video.date_added,
                        video.duration_ms,
                        video.size,
                        video.date_modified,
                    ])?;
                }
            }
            tx.commit().context("Failed to upsert videos")?;
        }
        debug!(count = videos.len(), "Upserted videos");
        self.observers.notify(Collection::Videos);
        Ok(videos.len())
    }

    /// Deletes an item from whichever collection holds it.
    pub fn delete(&self, uri: &MediaUri) -> Result<bool> {
        let (images, videos) = {
            let conn = self.conn.lock();
            let images = conn.execute("DELETE FROM images WHERE uri = ?1", params![uri.as_str()])?;
            let videos = conn.execute("DELETE FROM videos WHERE uri = ?1", params![uri.as_str()])?;
            (images, videos)
        };
        if images > 0 {
            self.observers.notify(Collection::Images);
        }
        if videos > 0 {
            self.observers.notify(Collection::Videos);
        }
        Ok(images + videos > 0)
    }

    fn timestamp_expr(&self) -> &'static str {
        if self.capabilities.date_taken_column {
            "COALESCE(date_taken, date_added)"
        } else {
            "date_added"
        }
    }
}

impl ContentStore for SqliteContentStore {
    fn capabilities(&self) -> StoreCapabilities {
        self.capabilities
    }

    fn query_images(&self, cancel: &CancelToken) -> Result<Vec<ImageRow>> {
        let sql = format!("SELECT uri, {} FROM images", self.timestamp_expr());
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&sql).context("Failed to prepare image query")?;
        let mut rows = stmt.query([])?;

        let mut images = Vec::new();
        while let Some(row) = rows.next()? {
            if cancel.is_cancelled() {
                break;
            }
            images.push(ImageRow {
                uri: MediaUri::new(row.get::<_, String>(0)?),
                created: row.get(1)?,
            });
        }
        Ok(images)
    }

    fn query_videos(&self, cancel: &CancelToken) -> Result<Vec<VideoRow>> {
        let sql = format!(
            "SELECT uri, {}, duration_ms, size, date_modified FROM videos",
            self.timestamp_expr()
        );
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&sql).context("Failed to prepare video query")?;
        let mut rows = stmt.query([])?;

        let mut videos = Vec::new();
        while let Some(row) = rows.next()? {
            if cancel.is_cancelled() {
                break;
            }
            let columns = if self.capabilities.video_duration_column {
                VideoColumns::Duration(
                    row.get::<_, Option<i64>>(2)?
                        .and_then(|ms| u64::try_from(ms).ok()),
                )
            } else {
                VideoColumns::FileInfo {
                    size: row.get(3)?,
                    modified: row.get(4)?,
                }
            };
            videos.push(VideoRow {
                uri: MediaUri::new(row.get::<_, String>(0)?),
                created: row.get(1)?,
                columns,
            });
        }
        Ok(videos)
    }

    fn register_observer(&self, collection: Collection, callback: ChangeCallback) -> ObserverId {
        self.observers.register(collection, callback)
    }

    fn unregister_observer(&self, id: ObserverId) {
        self.observers.unregister(id);
    }
}
