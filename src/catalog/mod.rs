//! Media catalog: content-store access and the merged feed.

pub mod duration;
pub mod import;
pub mod source;
pub mod sqlite_store;
pub mod store;

pub use duration::{ContainerDurationExtractor, DurationCache, DurationCacheKey, DurationExtractor};
pub use import::{import_directory, ImportConfig, ImportSummary};
pub use source::{CatalogFeed, CatalogSource};
pub use sqlite_store::{ImageEntry, SqliteContentStore, VideoEntry};
pub use store::{
    CancelToken, ChangeCallback, ContentStore, ImageRow, ObserverId, ObserverRegistry,
    StoreCapabilities, VideoColumns, VideoRow,
};
