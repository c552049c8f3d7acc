//! Single-item viewer plumbing.
//!
//! - `ImageTileRenderer` / `VideoPlayer`: the external rendering components
//! - `RenderEvent`: what those components report back
//! - `ViewerPages`: drives the components as the pager moves between items
//! - EXIF orientation lookup for images handed to the tile renderer

use std::path::Path;

use anyhow::{Context, Result};
use image::metadata::Orientation as ExifOrientation;
use image::{ImageDecoder, ImageReader};
use tracing::{debug, trace};

use crate::models::{MediaUri, ViewItem};

/// Clockwise rotation to apply when displaying an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Orientation(u16);

impl Orientation {
    pub const NONE: Self = Self(0);

    pub fn degrees(self) -> u16 {
        self.0
    }

    fn from_exif(exif: ExifOrientation) -> Self {
        match exif {
            ExifOrientation::Rotate90 | ExifOrientation::Rotate270FlipH => Self(90),
            ExifOrientation::Rotate180 | ExifOrientation::FlipVertical => Self(180),
            ExifOrientation::Rotate270 | ExifOrientation::Rotate90FlipH => Self(270),
            ExifOrientation::NoTransforms | ExifOrientation::FlipHorizontal => Self(0),
        }
    }
}

/// Reads the EXIF rotation of a local image file.
pub fn read_orientation(path: &Path) -> Result<Orientation> {
    let mut decoder = ImageReader::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?
        .with_guessed_format()
        .context("Failed to sniff image format")?
        .into_decoder()
        .context("Failed to create decoder")?;
    let exif = decoder.orientation().context("Failed to read orientation")?;
    Ok(Orientation::from_exif(exif))
}

/// Orientation for `uri`, read off the async context. Anything unreadable
/// is shown unrotated.
pub async fn load_orientation(uri: &MediaUri) -> Orientation {
    let Some(path) = uri.to_file_path() else {
        return Orientation::NONE;
    };
    match tokio::task::spawn_blocking(move || read_orientation(&path)).await {
        Ok(Ok(orientation)) => orientation,
        Ok(Err(e)) => {
            debug!(%uri, error = ?e, "Orientation unavailable");
            Orientation::NONE
        }
        Err(e) => {
            debug!(%uri, error = %e, "Orientation task failed");
            Orientation::NONE
        }
    }
}

/// Pannable/zoomable image renderer.
pub trait ImageTileRenderer: Send {
    fn show(&mut self, uri: &MediaUri, orientation: Orientation);
    fn reset(&mut self);
}

pub trait VideoPlayer: Send {
    fn prepare(&mut self, uri: &MediaUri);
    fn play(&mut self);
    fn pause(&mut self);
    fn release(&mut self);
}

/// Reported by the renderer and the player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderEvent {
    ImageReady { uri: MediaUri },
    ImageLoaded { uri: MediaUri },
    ImageFailed { uri: MediaUri, reason: String },
    VideoFailed { uri: MediaUri, reason: String },
    PlaybackControls { visible: bool },
}

/// Keeps the renderer and player in step with the viewer's current page.
pub struct ViewerPages {
    renderer: Box<dyn ImageTileRenderer>,
    player: Box<dyn VideoPlayer>,
    shown: Option<ViewItem>,
}

impl ViewerPages {
    pub fn new(renderer: Box<dyn ImageTileRenderer>, player: Box<dyn VideoPlayer>) -> Self {
        Self {
            renderer,
            player,
            shown: None,
        }
    }

    /// Moves to `item`, pausing a video that scrolls off screen.
    pub async fn show(&mut self, item: &ViewItem) {
        if self.shown.as_ref().map(ViewItem::uri) == Some(item.uri()) {
            return;
        }
        self.leave_current();

        match item {
            ViewItem::Image { uri, .. } => {
                let orientation = load_orientation(uri).await;
                trace!(%uri, degrees = orientation.degrees(), "Showing image page");
                self.renderer.show(uri, orientation);
            }
            ViewItem::Video { uri, .. } => {
                trace!(%uri, "Showing video page");
                self.player.prepare(uri);
            }
        }
        self.shown = Some(item.clone());
    }

    /// Leaves the viewer and releases whatever was shown.
    pub fn close(&mut self) {
        self.leave_current();
        self.player.release();
    }

    pub fn shown(&self) -> Option<&MediaUri> {
        self.shown.as_ref().map(ViewItem::uri)
    }

    fn leave_current(&mut self) {
        match self.shown.take() {
            Some(ViewItem::Image { .. }) => self.renderer.reset(),
            Some(ViewItem::Video { .. }) => self.player.pause(),
            None => {}
        }
    }
}
