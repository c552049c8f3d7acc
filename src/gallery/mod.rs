//! The picker screen's coordinator.
//!
//! `Gallery` is the single owner of the selection, the viewer position and
//! the permission state. Every mutation goes through `&mut self` and ends
//! in one re-projection, published on a watch cell that the presentation
//! layer renders from. The catalog feed is pulled in via `catalog_changed`.

pub mod projector;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::catalog::{CatalogFeed, CatalogSource};
use crate::error::GalleryError;
use crate::gesture::GestureUpdate;
use crate::models::MediaUri;
use crate::selection::SelectionEngine;
use crate::viewer::RenderEvent;

pub use projector::{project, Notice, Permission, ProjectionInput, ViewState, ViewerState};

/// What the host screen opens the picker with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickerRequest {
    pub request_key: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickerResult {
    pub request_key: String,
    pub outcome: PickerOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PickerOutcome {
    Confirmed { uris: Vec<MediaUri> },
    ExternalAppRequested,
}

/// Outcome of a back press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackAction {
    CloseViewer,
    Dismiss,
}

pub struct Gallery {
    request: PickerRequest,
    catalog: Arc<CatalogSource>,
    feed_rx: watch::Receiver<Option<CatalogFeed>>,
    feed: Option<CatalogFeed>,
    selection: SelectionEngine,
    permission: Permission,
    current: Option<MediaUri>,
    fullscreen: bool,
    notice: Option<Notice>,
    state_tx: watch::Sender<ViewState>,
}

impl Gallery {
    pub fn new(request: PickerRequest, catalog: Arc<CatalogSource>) -> Self {
        let mut feed_rx = catalog.subscribe();
        let feed = feed_rx.borrow_and_update().clone();
        let (state_tx, _) = watch::channel(ViewState::default());
        let gallery = Self {
            request,
            catalog,
            feed_rx,
            feed,
            selection: SelectionEngine::new(),
            permission: Permission::Unknown,
            current: None,
            fullscreen: false,
            notice: None,
            state_tx,
        };
        gallery.publish();
        gallery
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.state_tx.subscribe()
    }

    pub fn view_state(&self) -> ViewState {
        self.state_tx.borrow().clone()
    }

    pub fn selection(&self) -> &SelectionEngine {
        &self.selection
    }

    pub fn request(&self) -> &PickerRequest {
        &self.request
    }

    // =========================================================================
    // Permission and catalog
    // =========================================================================

    /// Records the host's permission result. A grant starts the catalog;
    /// a denial shows the retry notice and loads nothing.
    pub fn set_permission(&mut self, granted: bool) -> Result<(), GalleryError> {
        self.permission = if granted {
            Permission::Granted
        } else {
            Permission::Denied
        };
        info!(granted, "Storage permission updated");
        if granted {
            self.catalog.start()?;
        }
        self.pull_feed();
        Ok(())
    }

    pub fn permission(&self) -> Permission {
        self.permission
    }

    /// Waits for the next catalog feed and re-projects.
    pub async fn catalog_changed(&mut self) -> Result<(), GalleryError> {
        self.feed_rx
            .changed()
            .await
            .map_err(|_| GalleryError::CatalogClosed)?;
        self.pull_feed();
        Ok(())
    }

    /// Pulls the latest feed without waiting. Returns whether it changed.
    pub fn refresh_feed(&mut self) -> bool {
        if !self.feed_rx.has_changed().unwrap_or(false) {
            return false;
        }
        self.pull_feed();
        true
    }

    fn pull_feed(&mut self) {
        self.feed = self.feed_rx.borrow_and_update().clone();
        if let (Some(feed), Some(uri)) = (self.feed.as_ref(), self.current.as_ref()) {
            if feed.get(uri).is_none() {
                debug!(%uri, "Viewed item left the feed, closing viewer");
                self.current = None;
                self.fullscreen = false;
            }
        }
        self.publish();
    }

    /// Stops watching the content store.
    pub fn close(&self) {
        self.catalog.stop();
    }

    // =========================================================================
    // Selection
    // =========================================================================

    pub fn toggle(&mut self, uri: &MediaUri) -> bool {
        let selected = self.selection.toggle(uri);
        self.publish();
        selected
    }

    /// Toggles the item open in the viewer. `None` outside the viewer.
    pub fn toggle_current(&mut self) -> Option<bool> {
        let uri = self.view_state().viewer?.item.uri().clone();
        Some(self.toggle(&uri))
    }

    pub fn on_gesture_selection_changed(&mut self, start: usize, end: usize) {
        let rendered = self.state_tx.borrow().rendered_uris();
        self.selection.apply_gesture_range(start, end, &rendered);
        self.publish();
    }

    pub fn on_gesture_selection_finished(&mut self) {
        self.selection.commit_gesture();
        self.publish();
    }

    pub fn apply_gesture(&mut self, update: GestureUpdate) {
        match update {
            GestureUpdate::Range { start, end } => self.on_gesture_selection_changed(start, end),
            GestureUpdate::Finished => self.on_gesture_selection_finished(),
        }
    }

    /// Replaces the selection with one the host re-supplies.
    pub fn restore_selection(&mut self, uris: impl IntoIterator<Item = MediaUri>) {
        self.selection.restore(uris);
        debug!(count = self.selection.len(), "Selection restored");
        self.publish();
    }

    // =========================================================================
    // Viewer
    // =========================================================================

    pub fn open_viewer(&mut self, uri: MediaUri) {
        debug!(%uri, "Opening viewer");
        self.current = Some(uri);
        self.publish();
    }

    /// Pager moved to another item.
    pub fn on_current_item_changed(&mut self, uri: MediaUri) {
        if self.is_viewing() {
            self.current = Some(uri);
            self.publish();
        }
    }

    pub fn on_back(&mut self) -> BackAction {
        if self.is_viewing() {
            self.close_viewer();
            BackAction::CloseViewer
        } else {
            BackAction::Dismiss
        }
    }

    /// Whether the viewer is on screen, as last projected.
    pub fn is_viewing(&self) -> bool {
        self.state_tx.borrow().is_viewing()
    }

    pub fn close_viewer(&mut self) {
        self.current = None;
        self.fullscreen = false;
        self.publish();
    }

    pub fn toggle_full_screen(&mut self) {
        self.set_full_screen(!self.fullscreen);
    }

    pub fn set_full_screen(&mut self, fullscreen: bool) {
        self.fullscreen = fullscreen && self.is_viewing();
        self.publish();
    }

    pub fn on_render_event(&mut self, event: RenderEvent) {
        match event {
            RenderEvent::ImageFailed { uri, reason } => {
                warn!(%uri, %reason, "Image failed to render");
                self.notice = Some(Notice::ImageLoadFailed);
            }
            RenderEvent::VideoFailed { uri, reason } => {
                warn!(%uri, %reason, "Video failed to play");
                self.notice = Some(Notice::VideoLoadFailed);
            }
            RenderEvent::PlaybackControls { visible } => {
                self.set_full_screen(!visible);
                return;
            }
            RenderEvent::ImageReady { .. } | RenderEvent::ImageLoaded { .. } => return,
        }
        self.publish();
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
        self.publish();
    }

    // =========================================================================
    // Results
    // =========================================================================

    /// Confirms the selection; with nothing selected, the item open in the
    /// viewer is returned on its own.
    pub fn confirm(&self) -> PickerResult {
        let mut uris = self.selection.selected().to_vec();
        if uris.is_empty() {
            if let Some(viewer) = self.state_tx.borrow().viewer.as_ref() {
                uris.push(viewer.item.uri().clone());
            }
        }
        info!(count = uris.len(), "Selection confirmed");
        self.result(PickerOutcome::Confirmed { uris })
    }

    pub fn request_external_app(&self) -> PickerResult {
        info!("External app requested");
        self.result(PickerOutcome::ExternalAppRequested)
    }

    fn result(&self, outcome: PickerOutcome) -> PickerResult {
        PickerResult {
            request_key: self.request.request_key.clone(),
            outcome,
        }
    }

    fn publish(&self) {
        let state = project(ProjectionInput {
            title: &self.request.title,
            permission: self.permission,
            feed: self.feed.as_ref(),
            selection: &self.selection,
            current: self.current.as_ref(),
            fullscreen: self.fullscreen,
            notice: self.notice,
        });
        self.state_tx.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            *current = state;
            true
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ContentStore, DurationExtractor, SqliteContentStore};
    use crate::catalog::{ImageEntry, StoreCapabilities, VideoEntry};
    use crate::config::CatalogConfig;
    use crate::error::DurationError;
    use std::time::Duration;

    struct NoExtraction;

    impl DurationExtractor for NoExtraction {
        fn extract(&self, uri: &MediaUri) -> Result<u64, DurationError> {
            Err(DurationError::NotLocal { uri: uri.clone() })
        }
    }

    fn request() -> PickerRequest {
        PickerRequest {
            request_key: "attach".into(),
            title: "Send to Alex".into(),
        }
    }

    fn seeded_store() -> Arc<SqliteContentStore> {
        let store = SqliteContentStore::open_in_memory(StoreCapabilities::default()).unwrap();
        store
            .upsert_images(&[
                ImageEntry::new("content://media/i1", 100),
                ImageEntry::new("content://media/i3", 300),
            ])
            .unwrap();
        store
            .upsert_videos(&[
                VideoEntry::new("content://media/v2", 200).duration_ms(5_000),
                VideoEntry::new("content://media/v4", 400).duration_ms(61_000),
            ])
            .unwrap();
        Arc::new(store)
    }

    fn catalog(store: Arc<SqliteContentStore>) -> Arc<CatalogSource> {
        Arc::new(CatalogSource::new(
            store as Arc<dyn ContentStore>,
            Arc::new(NoExtraction),
            CatalogConfig::default(),
        ))
    }

    async fn loaded_gallery() -> Gallery {
        let mut gallery = Gallery::new(request(), catalog(seeded_store()));
        gallery.set_permission(true).unwrap();
        while gallery.view_state().items.len() < 4 {
            tokio::time::timeout(Duration::from_secs(5), gallery.catalog_changed())
                .await
                .unwrap()
                .unwrap();
        }
        gallery
    }

    fn uri(s: &str) -> MediaUri {
        MediaUri::from(s)
    }

    #[tokio::test]
    async fn test_permission_after_load_is_single_update() {
        let catalog = catalog(seeded_store());
        catalog.start().unwrap();
        let mut feed_rx = catalog.subscribe();
        tokio::time::timeout(Duration::from_secs(5), feed_rx.wait_for(Option::is_some))
            .await
            .unwrap()
            .unwrap();

        let mut gallery = Gallery::new(request(), Arc::clone(&catalog));
        let mut state_rx = gallery.subscribe();
        assert!(gallery.view_state().items.is_empty());

        gallery.set_permission(true).unwrap();
        assert!(state_rx.has_changed().unwrap());
        assert_eq!(state_rx.borrow_and_update().items.len(), 4);
        assert!(!state_rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_denied_permission_shows_notice() {
        let mut gallery = Gallery::new(request(), catalog(seeded_store()));
        gallery.set_permission(false).unwrap();
        let state = gallery.view_state();
        assert!(state.permission_notice);
        assert!(state.items.is_empty());
        assert_eq!(state.title, "Send to Alex");
    }

    #[tokio::test]
    async fn test_feed_is_newest_first_with_badges() {
        let mut gallery = loaded_gallery().await;
        gallery.toggle(&uri("content://media/i1"));
        gallery.toggle(&uri("content://media/v4"));

        let state = gallery.view_state();
        let order: Vec<&str> = state.items.iter().map(|i| i.uri().as_str()).collect();
        assert_eq!(
            order,
            vec!["content://media/v4", "content://media/i3", "content://media/v2", "content://media/i1"]
        );
        assert_eq!(state.items[0].selection_number(), Some(2));
        assert_eq!(state.items[3].selection_number(), Some(1));
        assert!(state.send_visible);
    }

    #[tokio::test]
    async fn test_confirm_falls_back_to_viewed_item() {
        let mut gallery = loaded_gallery().await;
        gallery.open_viewer(uri("content://media/i3"));

        let result = gallery.confirm();
        assert_eq!(result.request_key, "attach");
        assert_eq!(
            result.outcome,
            PickerOutcome::Confirmed {
                uris: vec![uri("content://media/i3")]
            }
        );

        gallery.on_back();
        gallery.toggle(&uri("content://media/v2"));
        gallery.toggle(&uri("content://media/i1"));
        assert_eq!(
            gallery.confirm().outcome,
            PickerOutcome::Confirmed {
                uris: vec![uri("content://media/v2"), uri("content://media/i1")]
            }
        );
    }

    #[tokio::test]
    async fn test_gesture_updates_select_range() {
        let mut gallery = loaded_gallery().await;
        gallery.apply_gesture(GestureUpdate::Range { start: 1, end: 1 });
        gallery.apply_gesture(GestureUpdate::Range { start: 1, end: 3 });
        gallery.apply_gesture(GestureUpdate::Range { start: 1, end: 2 });
        gallery.apply_gesture(GestureUpdate::Finished);

        assert_eq!(
            gallery.selection().selected(),
            &[uri("content://media/i3"), uri("content://media/v2"), uri("content://media/i1")]
        );
    }

    #[tokio::test]
    async fn test_viewer_back_and_full_screen() {
        let mut gallery = loaded_gallery().await;
        assert_eq!(gallery.toggle_current(), None);

        gallery.open_viewer(uri("content://media/v4"));
        gallery.on_current_item_changed(uri("content://media/i3"));
        assert_eq!(gallery.view_state().viewer.map(|v| v.index), Some(1));

        assert_eq!(gallery.toggle_current(), Some(true));
        let state = gallery.view_state();
        assert_eq!(state.toolbar_check, Some(true));
        assert_eq!(state.toolbar_counter, 1);
        assert!(!state.send_visible);

        gallery.on_render_event(RenderEvent::PlaybackControls { visible: false });
        assert!(gallery.view_state().fullscreen);
        gallery.toggle_full_screen();
        assert!(!gallery.view_state().fullscreen);
        gallery.toggle_full_screen();

        assert_eq!(gallery.on_back(), BackAction::CloseViewer);
        let state = gallery.view_state();
        assert!(!state.fullscreen && state.toolbars_visible);
        assert!(state.send_visible);
        assert_eq!(gallery.on_back(), BackAction::Dismiss);
    }

    #[tokio::test]
    async fn test_deleted_viewed_item_closes_viewer() {
        let store = seeded_store();
        let mut gallery = Gallery::new(request(), catalog(Arc::clone(&store)));
        gallery.set_permission(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), async {
            while gallery.view_state().items.len() < 4 {
                gallery.catalog_changed().await.unwrap();
            }
        })
        .await
        .unwrap();

        gallery.open_viewer(uri("content://media/i3"));
        gallery.set_full_screen(true);
        assert!(gallery.view_state().fullscreen);

        assert!(store.delete(&uri("content://media/i3")).unwrap());
        tokio::time::timeout(Duration::from_secs(5), async {
            while gallery.view_state().items.len() > 3 {
                gallery.catalog_changed().await.unwrap();
            }
        })
        .await
        .unwrap();

        let state = gallery.view_state();
        assert!(!gallery.is_viewing());
        assert!(!state.fullscreen && state.toolbars_visible);
        assert_eq!(gallery.on_back(), BackAction::Dismiss);

        gallery.set_full_screen(true);
        assert!(!gallery.view_state().fullscreen);
        gallery.on_current_item_changed(uri("content://media/v2"));
        assert!(gallery.view_state().viewer.is_none());
        gallery.close();
    }

    #[tokio::test]
    async fn test_render_failure_shows_notice_and_keeps_selection() {
        let mut gallery = loaded_gallery().await;
        gallery.toggle(&uri("content://media/i1"));
        gallery.on_render_event(RenderEvent::VideoFailed {
            uri: uri("content://media/v2"),
            reason: "codec".into(),
        });
        let state = gallery.view_state();
        assert_eq!(state.notice, Some(Notice::VideoLoadFailed));
        assert_eq!(state.selected_count, 1);

        gallery.dismiss_notice();
        assert_eq!(gallery.view_state().notice, None);
    }

    #[tokio::test]
    async fn test_store_change_reaches_view_state() {
        let store = seeded_store();
        let mut gallery = Gallery::new(request(), catalog(Arc::clone(&store)));
        gallery.set_permission(true).unwrap();
        store
            .upsert_images(&[ImageEntry::new("content://media/i9", 900)])
            .unwrap();

        tokio::time::timeout(Duration::from_secs(5), async {
            while gallery.view_state().items.first().map(|i| i.uri().as_str())
                != Some("content://media/i9")
            {
                gallery.catalog_changed().await.unwrap();
            }
        })
        .await
        .unwrap();
        gallery.close();
    }

    #[test]
    fn test_result_serialization() {
        let result = PickerResult {
            request_key: "k".into(),
            outcome: PickerOutcome::Confirmed {
                uris: vec![uri("content://media/1")],
            },
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["outcome"]["type"], "confirmed");
        assert_eq!(json["outcome"]["uris"][0], "content://media/1");

        let external: PickerResult = serde_json::from_str(
            r#"{ "request_key": "k", "outcome": { "type": "external_app_requested" } }"#,
        )
        .unwrap();
        assert_eq!(external.outcome, PickerOutcome::ExternalAppRequested);
    }
}
