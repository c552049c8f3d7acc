//! Media gallery picker core.
//!
//! - `catalog`: watches a content store and publishes a merged, newest-first
//!   media feed with video durations backfilled in batches
//! - `selection`: ordered multi-selection with drag-range support
//! - `gallery`: the screen coordinator and its pure view-state projection
//! - `gesture`: drag-to-select and auto-scroll over the grid
//! - `viewer` / `thumbnails`: seams to the rendering components

pub mod catalog;
pub mod config;
pub mod error;
pub mod gallery;
pub mod gesture;
pub mod models;
pub mod selection;
pub mod thumbnails;
pub mod viewer;

pub use catalog::{CatalogFeed, CatalogSource, ContentStore, SqliteContentStore};
pub use config::GalleryConfig;
pub use error::{DurationError, GalleryError};
pub use gallery::{BackAction, Gallery, PickerOutcome, PickerRequest, PickerResult, ViewState};
pub use models::{MediaRecord, MediaUri, VideoDuration, ViewItem};
pub use selection::SelectionEngine;
