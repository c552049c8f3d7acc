//! Error types shared across the picker.

use std::path::PathBuf;

use thiserror::Error;

use crate::models::MediaUri;

/// Errors surfaced by the gallery coordinator and catalog source.
#[derive(Error, Debug)]
pub enum GalleryError {
    #[error("Catalog source has shut down")]
    CatalogClosed,

    #[error("No tokio runtime available to run catalog reloads")]
    NoRuntime,

    #[error("Content store error: {0}")]
    Store(#[from] anyhow::Error),
}

/// Reasons a single video's duration could not be read.
#[derive(Error, Debug)]
pub enum DurationError {
    #[error("No local file for {uri}")]
    NotLocal { uri: MediaUri },

    #[error("Failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported container: {path:?}")]
    UnsupportedContainer { path: PathBuf },

    #[error("No duration header in {path:?}")]
    MissingHeader { path: PathBuf },
}
