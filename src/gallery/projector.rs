//! Pure projection of picker state into what the screen renders.

use crate::catalog::CatalogFeed;
use crate::models::{MediaUri, ViewItem};
use crate::selection::SelectionEngine;

/// Storage read permission as last reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Permission {
    /// Not yet asked.
    #[default]
    Unknown,
    Granted,
    Denied,
}

/// Transient user-visible message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    ImageLoadFailed,
    VideoLoadFailed,
}

/// The item open in the single-item viewer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerState {
    pub index: usize,
    pub item: ViewItem,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ViewState {
    pub title: String,
    pub items: Vec<ViewItem>,
    pub selected_count: usize,
    /// Grid-level send button.
    pub send_visible: bool,
    pub send_extended: bool,
    /// Selected count shown in the viewer toolbar; 0 outside the viewer.
    pub toolbar_counter: usize,
    /// Viewer toolbar check box; `None` hides it.
    pub toolbar_check: Option<bool>,
    pub top_send_visible: bool,
    pub open_external_visible: bool,
    pub viewer: Option<ViewerState>,
    pub fullscreen: bool,
    pub toolbars_visible: bool,
    pub permission_notice: bool,
    pub notice: Option<Notice>,
}

impl ViewState {
    pub fn rendered_uris(&self) -> Vec<MediaUri> {
        self.items.iter().map(|item| item.uri().clone()).collect()
    }

    pub fn is_viewing(&self) -> bool {
        self.viewer.is_some()
    }
}

/// Everything the projection reads.
#[derive(Debug, Clone, Copy)]
pub struct ProjectionInput<'a> {
    pub title: &'a str,
    pub permission: Permission,
    pub feed: Option<&'a CatalogFeed>,
    pub selection: &'a SelectionEngine,
    pub current: Option<&'a MediaUri>,
    pub fullscreen: bool,
    pub notice: Option<Notice>,
}

/// Derives the full view state. The viewer counts as open only while its
/// uri is present in the rendered items.
pub fn project(input: ProjectionInput<'_>) -> ViewState {
    let numbers = input.selection.numbers();
    let items: Vec<ViewItem> = match (input.permission, input.feed) {
        (Permission::Granted, Some(feed)) => feed
            .records()
            .iter()
            .map(|record| ViewItem::from_record(record, numbers.get(record.uri()).copied()))
            .collect(),
        _ => Vec::new(),
    };

    let viewer = input.current.and_then(|uri| {
        items
            .iter()
            .position(|item| item.uri() == uri)
            .map(|index| ViewerState {
                index,
                item: items[index].clone(),
            })
    });

    let selected_count = input.selection.len();
    let viewing = viewer.is_some();
    let send = !viewing && selected_count > 0;
    let fullscreen = viewing && input.fullscreen;

    ViewState {
        title: input.title.to_string(),
        selected_count,
        send_visible: send,
        send_extended: send,
        toolbar_counter: if viewing { selected_count } else { 0 },
        toolbar_check: viewer.as_ref().map(|v| v.item.is_selected()),
        top_send_visible: viewing,
        open_external_visible: !viewing,
        viewer,
        fullscreen,
        toolbars_visible: !fullscreen,
        permission_notice: input.permission == Permission::Denied,
        notice: input.notice,
        items,
    }
}
