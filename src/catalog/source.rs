//! The catalog source: a continuously updated, time-ordered media feed.
//!
//! - Images and videos are two independently reloadable sub-lists
//! - A change notification reloads only the affected sub-list, cancelling
//!   any reload of it already in flight (cancel-and-replace)
//! - Every reload carries a generation id; results from a superseded
//!   generation are discarded on arrival
//! - The merged feed is published only once both sub-lists have loaded
//! - Missing video durations are backfilled in batches, newest first

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};
use xxhash_rust::xxh3::Xxh3;

use super::duration::{DurationCache, DurationCacheKey, DurationExtractor};
use super::store::{CancelToken, ContentStore, ObserverId, VideoColumns};
use crate::config::CatalogConfig;
use crate::error::GalleryError;
use crate::models::{Collection, MediaRecord, MediaUri, VideoDuration};

/// One published snapshot of the merged feed, newest first.
#[derive(Debug, Clone)]
pub struct CatalogFeed {
    records: Arc<Vec<MediaRecord>>,
    fingerprint: u64,
}

impl CatalogFeed {
    pub fn from_records(records: Vec<MediaRecord>) -> Self {
        let fingerprint = Self::compute_fingerprint(&records);
        Self {
            records: Arc::new(records),
            fingerprint,
        }
    }

    /// Hash of (uri, timestamp, duration) over the feed in order. Each uri
    /// is length-prefixed so record boundaries cannot shift.
    fn compute_fingerprint(records: &[MediaRecord]) -> u64 {
        let mut hasher = Xxh3::new();
        for record in records {
            let uri = record.uri().as_str().as_bytes();
            hasher.update(&(uri.len() as u64).to_le_bytes());
            hasher.update(uri);
            hasher.update(&record.timestamp().to_le_bytes());
            let duration_tag = match record.duration() {
                None => [0u8; 9],
                Some(VideoDuration::Unknown) => {
                    let mut tag = [0u8; 9];
                    tag[0] = 1;
                    tag
                }
                Some(VideoDuration::Known(ms)) => {
                    let mut tag = [2u8; 9];
                    tag[1..].copy_from_slice(&ms.to_le_bytes());
                    tag
                }
            };
            hasher.update(&duration_tag);
        }
        hasher.digest()
    }

    pub fn records(&self) -> &[MediaRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    pub fn get(&self, uri: &MediaUri) -> Option<&MediaRecord> {
        self.records.iter().find(|r| r.uri() == uri)
    }
}

#[derive(Default)]
struct SubList {
    records: Option<Vec<MediaRecord>>,
    /// All durations resolved (or not needed) for the current records.
    complete: bool,
    generation: u64,
    cancel: Option<CancelToken>,
}

impl SubList {
    fn in_flight(&self) -> bool {
        self.cancel.is_some()
    }

    /// Cancels the in-flight reload and invalidates its generation.
    fn cancel(&mut self) {
        if let Some(token) = self.cancel.take() {
            token.cancel();
        }
        self.generation += 1;
    }
}

#[derive(Default)]
struct Lists {
    images: SubList,
    videos: SubList,
}

impl Lists {
    fn get_mut(&mut self, collection: Collection) -> &mut SubList {
        match collection {
            Collection::Images => &mut self.images,
            Collection::Videos => &mut self.videos,
        }
    }

    fn get(&self, collection: Collection) -> &SubList {
        match collection {
            Collection::Images => &self.images,
            Collection::Videos => &self.videos,
        }
    }

    fn merged(&self) -> Option<Vec<MediaRecord>> {
        let images = self.images.records.as_ref()?;
        let videos = self.videos.records.as_ref()?;
        let mut merged: Vec<MediaRecord> = images.iter().chain(videos).cloned().collect();
        merged.sort_by(|a, b| b.timestamp().cmp(&a.timestamp()));
        Some(merged)
    }
}

struct Running {
    observers: Vec<ObserverId>,
    dispatcher: JoinHandle<()>,
}

struct Inner {
    store: Arc<dyn ContentStore>,
    extractor: Arc<dyn DurationExtractor>,
    durations: DurationCache,
    config: CatalogConfig,
    lists: Mutex<Lists>,
    feed_tx: watch::Sender<Option<CatalogFeed>>,
}

/// Watches a content store and publishes the merged media feed.
pub struct CatalogSource {
    inner: Arc<Inner>,
    running: Mutex<Option<Running>>,
}

impl CatalogSource {
    pub fn new(
        store: Arc<dyn ContentStore>,
        extractor: Arc<dyn DurationExtractor>,
        config: CatalogConfig,
    ) -> Self {
        let (feed_tx, _) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                store,
                extractor,
                durations: DurationCache::new(config.duration_cache_capacity),
                config,
                lists: Mutex::new(Lists::default()),
                feed_tx,
            }),
            running: Mutex::new(None),
        }
    }

    /// Begins watching the store and loads any sub-list that is neither
    /// loaded nor loading. Must be called from within a tokio runtime.
    pub fn start(&self) -> Result<(), GalleryError> {
        let handle = Handle::try_current().map_err(|_| GalleryError::NoRuntime)?;
        let mut running = self.running.lock();
        if running.is_none() {
            let (tx, rx) = flume::unbounded::<Collection>();
            let observers = [Collection::Images, Collection::Videos]
                .into_iter()
                .map(|collection| {
                    let tx = tx.clone();
                    self.inner.store.register_observer(
                        collection,
                        Box::new(move |changed| {
                            let _ = tx.send(changed);
                        }),
                    )
                })
                .collect();

            let inner = Arc::clone(&self.inner);
            let reload_handle = handle.clone();
            let dispatcher = handle.spawn(async move {
                while let Ok(collection) = rx.recv_async().await {
                    trace!(collection = collection.as_str(), "Content change observed");
                    inner.reload(collection, &reload_handle);
                }
            });

            *running = Some(Running {
                observers,
                dispatcher,
            });
            info!("Catalog source started");
        }
        drop(running);

        for collection in [Collection::Images, Collection::Videos] {
            let needs_load = {
                let lists = self.inner.lists.lock();
                let list = lists.get(collection);
                !list.complete && !list.in_flight()
            };
            if needs_load {
                self.inner.reload(collection, &handle);
            }
        }
        Ok(())
    }

    /// Unregisters observers and cancels both sub-list reloads.
    ///
    /// Already published records are kept; a later `start` only reloads
    /// sub-lists that never finished.
    pub fn stop(&self) {
        if let Some(running) = self.running.lock().take() {
            for id in running.observers {
                self.inner.store.unregister_observer(id);
            }
            running.dispatcher.abort();
            info!("Catalog source stopped");
        }
        let mut lists = self.inner.lists.lock();
        lists.images.cancel();
        lists.videos.cancel();
    }

    /// Explicitly reloads one sub-list, replacing any reload in flight.
    pub fn reload(&self, collection: Collection) -> Result<(), GalleryError> {
        let handle = Handle::try_current().map_err(|_| GalleryError::NoRuntime)?;
        self.inner.reload(collection, &handle);
        Ok(())
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<CatalogFeed>> {
        self.inner.feed_tx.subscribe()
    }

    /// The latest published feed, if both sub-lists have loaded.
    pub fn current(&self) -> Option<CatalogFeed> {
        self.inner.feed_tx.borrow().clone()
    }

    pub fn has_loaded(&self, collection: Collection) -> bool {
        self.inner.lists.lock().get(collection).records.is_some()
    }

    pub fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }

    pub fn duration_cache(&self) -> &DurationCache {
        &self.inner.durations
    }
}

impl Drop for CatalogSource {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Inner {
    fn reload(self: &Arc<Self>, collection: Collection, handle: &Handle) {
        let (generation, cancel) = {
            let mut lists = self.lists.lock();
            let list = lists.get_mut(collection);
            list.cancel();
            let token = CancelToken::new();
            list.cancel = Some(token.clone());
            (list.generation, token)
        };
        debug!(collection = collection.as_str(), generation, "Reloading sub-list");

        let inner = Arc::clone(self);
        handle.spawn_blocking(move || match collection {
            Collection::Images => inner.load_images(generation, &cancel),
            Collection::Videos => inner.load_videos(generation, &cancel),
        });
    }

    fn load_images(&self, generation: u64, cancel: &CancelToken) {
        let rows = self.store.query_images(cancel).unwrap_or_else(|e| {
            warn!(error = ?e, "Image query failed, using empty list");
            Vec::new()
        });
        if cancel.is_cancelled() {
            trace!(generation, "Image reload cancelled");
            return;
        }

        let records = rows
            .into_iter()
            .map(|row| MediaRecord::image(row.uri, row.created))
            .collect();
        self.commit(Collection::Images, generation, records, true);
    }

    fn load_videos(&self, generation: u64, cancel: &CancelToken) {
        let rows = self.store.query_videos(cancel).unwrap_or_else(|e| {
            warn!(error = ?e, "Video query failed, using empty list");
            Vec::new()
        });
        if cancel.is_cancelled() {
            trace!(generation, "Video reload cancelled");
            return;
        }

        let mut pending = Vec::new();
        let records = rows
            .into_iter()
            .map(|row| {
                let duration = match row.columns {
                    VideoColumns::Duration(Some(ms)) => Some(VideoDuration::Known(ms)),
                    VideoColumns::Duration(None) => Some(VideoDuration::Unknown),
                    VideoColumns::FileInfo { size, modified } => {
                        let key = DurationCacheKey {
                            uri: row.uri.clone(),
                            byte_size: size,
                            create_time: row.created,
                            modify_time: modified,
                        };
                        let cached = self.durations.get(&key);
                        if cached.is_none() {
                            pending.push(key);
                        }
                        cached
                    }
                };
                MediaRecord::video(row.uri, row.created, duration)
            })
            .collect();

        let complete = pending.is_empty();
        if self.commit(Collection::Videos, generation, records, complete) && !complete {
            self.backfill_durations(generation, cancel, pending);
        }
    }

    /// Extracts durations one file at a time, newest first, republishing
    /// after every batch and after the last file.
    fn backfill_durations(
        &self,
        generation: u64,
        cancel: &CancelToken,
        mut pending: Vec<DurationCacheKey>,
    ) {
        pending.sort_by(|a, b| b.create_time.cmp(&a.create_time));
        let total = pending.len();
        let batch_size = self.config.duration_batch_size.max(1);
        debug!(total, generation, "Backfilling video durations");

        let mut batch = HashMap::with_capacity(batch_size);
        for (index, key) in pending.into_iter().enumerate() {
            if cancel.is_cancelled() {
                debug!(generation, resolved = index, "Duration backfill cancelled");
                return;
            }

            let duration = match self.extractor.extract(&key.uri) {
                Ok(ms) => VideoDuration::Known(ms),
                Err(e) => {
                    warn!(uri = %key.uri, error = %e, "Failed to extract video duration");
                    VideoDuration::Unknown
                }
            };
            let uri = key.uri.clone();
            self.durations.insert(key, duration);
            batch.insert(uri, duration);

            let last = index + 1 == total;
            if batch.len() >= batch_size || last {
                if !self.patch_durations(generation, cancel, &batch, last) {
                    return;
                }
                trace!(resolved = index + 1, total, "Published duration batch");
                batch.clear();
            }
        }
    }

    /// Stores a finished (or partially resolved) sub-list if `generation`
    /// is still current, then republishes. Returns false for stale results.
    fn commit(
        &self,
        collection: Collection,
        generation: u64,
        records: Vec<MediaRecord>,
        complete: bool,
    ) -> bool {
        let mut lists = self.lists.lock();
        let list = lists.get_mut(collection);
        if list.generation != generation {
            debug!(
                collection = collection.as_str(),
                generation,
                current = list.generation,
                "Discarding stale reload"
            );
            return false;
        }
        debug!(
            collection = collection.as_str(),
            count = records.len(),
            complete,
            "Sub-list loaded"
        );
        list.records = Some(records);
        list.complete = complete;
        if complete {
            list.cancel = None;
        }
        self.publish(&lists);
        true
    }

    /// Replaces missing video durations by uri.
    fn patch_durations(
        &self,
        generation: u64,
        cancel: &CancelToken,
        batch: &HashMap<MediaUri, VideoDuration>,
        last: bool,
    ) -> bool {
        let mut lists = self.lists.lock();
        let videos = &mut lists.videos;
        if videos.generation != generation || cancel.is_cancelled() {
            debug!(generation, "Discarding stale duration batch");
            return false;
        }
        if let Some(records) = videos.records.as_mut() {
            for record in records.iter_mut() {
                if let Some(duration) = batch.get(record.uri()) {
                    record.resolve_duration(*duration);
                }
            }
        }
        if last {
            videos.complete = true;
            videos.cancel = None;
        }
        self.publish(&lists);
        true
    }

    fn publish(&self, lists: &Lists) {
        let Some(merged) = lists.merged() else {
            return;
        };
        let feed = CatalogFeed::from_records(merged);
        let published = self.feed_tx.send_if_modified(|current| {
            if current.as_ref().map(CatalogFeed::fingerprint) == Some(feed.fingerprint) {
                return false;
            }
            *current = Some(feed.clone());
            true
        });
        if published {
            debug!(count = feed.len(), "Published catalog feed");
        }
    }
}
