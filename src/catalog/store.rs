//! The content-store collaborator: the platform media index the catalog reads.
//!
//! A store exposes two collections (images and videos), each queried as a
//! flat list of rows, and notifies registered observers when a collection
//! changes. Observers must not do work inside the callback; the catalog only
//! enqueues a reload from it.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Result;
use parking_lot::Mutex;
use tracing::trace;

use crate::models::{Collection, MediaUri};

/// Which optional columns the store can serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreCapabilities {
    /// Timestamps come from `date_taken` instead of `date_added`.
    pub date_taken_column: bool,
    /// Video durations are served directly. Without this the store serves
    /// file size and modification time and durations are extracted from
    /// the files.
    pub video_duration_column: bool,
}

impl Default for StoreCapabilities {
    fn default() -> Self {
        Self {
            date_taken_column: true,
            video_duration_column: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRow {
    pub uri: MediaUri,
    pub created: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoRow {
    pub uri: MediaUri,
    pub created: i64,
    pub columns: VideoColumns,
}

/// The capability-dependent part of a video row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoColumns {
    /// Duration column in milliseconds; `None` when the store has no value.
    Duration(Option<u64>),
    /// File size and modification time, for stores without a duration column.
    FileInfo { size: i64, modified: i64 },
}

/// Cooperative cancellation flag shared between a reload and its owner.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

pub type ChangeCallback = Box<dyn Fn(Collection) + Send + Sync>;

/// Platform media index.
///
/// Queries block and must check `cancel` between rows; rows gathered after
/// cancellation are discarded by the caller.
pub trait ContentStore: Send + Sync {
    fn capabilities(&self) -> StoreCapabilities;

    fn query_images(&self, cancel: &CancelToken) -> Result<Vec<ImageRow>>;

    fn query_videos(&self, cancel: &CancelToken) -> Result<Vec<VideoRow>>;

    fn register_observer(&self, collection: Collection, callback: ChangeCallback) -> ObserverId;

    fn unregister_observer(&self, id: ObserverId);
}

struct Registration {
    id: ObserverId,
    collection: Collection,
    callback: Arc<dyn Fn(Collection) + Send + Sync>,
}

/// Observer bookkeeping for [`ContentStore`] implementations.
#[derive(Default)]
pub struct ObserverRegistry {
    next_id: AtomicU64,
    registrations: Mutex<Vec<Registration>>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, collection: Collection, callback: ChangeCallback) -> ObserverId {
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.registrations.lock().push(Registration {
            id,
            collection,
            callback: Arc::from(callback),
        });
        trace!(?id, collection = collection.as_str(), "Registered content observer");
        id
    }

    pub fn unregister(&self, id: ObserverId) {
        self.registrations.lock().retain(|r| r.id != id);
    }

    /// Invokes every observer of `collection`. Callbacks run outside the lock.
    pub fn notify(&self, collection: Collection) {
        let callbacks: Vec<_> = self
            .registrations
            .lock()
            .iter()
            .filter(|r| r.collection == collection)
            .map(|r| Arc::clone(&r.callback))
            .collect();
        for callback in callbacks {
            callback(collection);
        }
    }

    pub fn len(&self) -> usize {
        self.registrations.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
