use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use gallery_picker::catalog::{
    import_directory, CatalogSource, ContainerDurationExtractor, ImportConfig, SqliteContentStore,
    StoreCapabilities,
};
use gallery_picker::gallery::{Gallery, PickerRequest};
use gallery_picker::thumbnails::CenterCropThumbnailer;
use gallery_picker::{GalleryConfig, GalleryError, ViewItem};

/// How long to wait for the catalog to settle.
const SETTLE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser, Debug)]
#[command(name = "gallery-picker", about = "Headless media picker over a local media store")]
struct Args {
    /// SQLite media store (defaults to the user data dir)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Import a directory of media into the store first
    #[arg(long)]
    import: Option<PathBuf>,

    /// JSON config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Item indices to select and confirm
    #[arg(long, value_delimiter = ',')]
    select: Vec<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("gallery_picker=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config: {:?}", path))?;
            GalleryConfig::from_json(&json)?
        }
        None => GalleryConfig::default(),
    };

    // Files on disk carry no duration column; durations come from the files.
    let capabilities = StoreCapabilities {
        date_taken_column: true,
        video_duration_column: false,
    };
    let store = match &args.db {
        Some(path) => SqliteContentStore::open(path, capabilities)?,
        None => SqliteContentStore::open_default(capabilities)?,
    };
    if let Some(dir) = &args.import {
        let summary = import_directory(&store, dir, &ImportConfig::default())?;
        info!(images = summary.images, videos = summary.videos, "Imported media");
    }

    let catalog = Arc::new(CatalogSource::new(
        Arc::new(store),
        Arc::new(ContainerDurationExtractor),
        config.catalog.clone(),
    ));
    let mut gallery = Gallery::new(
        PickerRequest {
            request_key: "cli".into(),
            title: "Gallery".into(),
        },
        Arc::clone(&catalog),
    );
    gallery.set_permission(true)?;

    let settled = tokio::time::timeout(SETTLE_TIMEOUT, async {
        loop {
            let done = catalog.current().is_some_and(|feed| {
                feed.records()
                    .iter()
                    .all(|r| !r.is_video() || r.duration().is_some())
            });
            if done {
                gallery.refresh_feed();
                return Ok::<(), GalleryError>(());
            }
            gallery.catalog_changed().await?;
        }
    })
    .await;
    match settled {
        Ok(result) => result?,
        Err(_) => warn!("Catalog did not settle in time; showing what has loaded"),
    }

    let thumbnailer = Arc::new(CenterCropThumbnailer::new(&config.thumbnails));
    let state = gallery.view_state();
    let mut placeholders = 0;
    for (index, item) in state.items.iter().enumerate() {
        match item {
            ViewItem::Image { uri, .. } => {
                if thumbnailer.load_async(uri.clone()).await.is_placeholder {
                    placeholders += 1;
                }
                println!("{index:>5}  image  {uri}");
            }
            ViewItem::Video { uri, duration, .. } => {
                println!("{index:>5}  video  {uri}  [{duration}]");
            }
        }
    }
    info!(
        items = state.items.len(),
        thumbnails = thumbnailer.cached_count(),
        placeholders,
        "Catalog listed"
    );

    for index in &args.select {
        match state.items.get(*index) {
            Some(item) => {
                gallery.toggle(item.uri());
            }
            None => warn!(index, "No item at index"),
        }
    }
    if !args.select.is_empty() {
        let result = gallery.confirm();
        println!("{}", serde_json::to_string_pretty(&result)?);
    }

    gallery.close();
    Ok(())
}
