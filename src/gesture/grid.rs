/// What the gesture controller needs from the scrolling grid.
///
/// Coordinates are viewport-relative pixels; `y` may fall outside
/// `0..height()` while a drag is above or below the view.
pub trait GridSurface {
    /// Index of the item under the point, if any.
    fn item_index_at(&self, x: f32, y: f32) -> Option<usize>;

    /// Viewport height.
    fn height(&self) -> f32;

    /// Scrolls by `dy` pixels and returns the distance actually scrolled.
    fn scroll_by(&mut self, dy: i32) -> i32;
}

/// Fixed-column grid of square tiles, filled left to right.
#[derive(Debug, Clone)]
pub struct GridGeometry {
    /// Number of columns (default: 3)
    pub columns: usize,
    /// Gap between tiles in pixels (default: 0)
    pub gap: f32,
    viewport_width: f32,
    viewport_height: f32,
    item_count: usize,
    scroll_offset: f32,
}

impl GridGeometry {
    pub fn new(columns: usize, viewport_width: f32, viewport_height: f32) -> Self {
        Self {
            columns: columns.max(1),
            gap: 0.0,
            viewport_width: viewport_width.max(1.0),
            viewport_height: viewport_height.max(1.0),
            item_count: 0,
            scroll_offset: 0.0,
        }
    }

    pub fn with_gap(mut self, gap: f32) -> Self {
        self.gap = gap.max(0.0);
        self
    }

    /// Updates the item count, keeping the scroll offset in range.
    pub fn set_item_count(&mut self, count: usize) {
        self.item_count = count;
        self.scroll_offset = self.scroll_offset.clamp(0.0, self.max_scroll());
    }

    pub fn item_count(&self) -> usize {
        self.item_count
    }

    pub fn scroll_offset(&self) -> f32 {
        self.scroll_offset
    }

    /// Edge length of one tile; tiles share the width left after gaps.
    pub fn tile_size(&self) -> f32 {
        let gaps = self.gap * (self.columns as f32 - 1.0);
        ((self.viewport_width - gaps) / self.columns as f32).max(1.0)
    }

    pub fn row_count(&self) -> usize {
        self.item_count.div_ceil(self.columns)
    }

    pub fn content_height(&self) -> f32 {
        let rows = self.row_count() as f32;
        if rows == 0.0 {
            return 0.0;
        }
        rows * self.tile_size() + (rows - 1.0) * self.gap
    }

    fn max_scroll(&self) -> f32 {
        (self.content_height() - self.viewport_height).max(0.0)
    }
}

impl GridSurface for GridGeometry {
    fn item_index_at(&self, x: f32, y: f32) -> Option<usize> {
        if x < 0.0 || x >= self.viewport_width || y < 0.0 || y >= self.viewport_height {
            return None;
        }
        let pitch = self.tile_size() + self.gap;
        let content_y = y + self.scroll_offset;
        let column = (x / pitch) as usize;
        let row = (content_y / pitch) as usize;
        // Points in a gap belong to no tile.
        if x - column as f32 * pitch >= self.tile_size()
            || content_y - row as f32 * pitch >= self.tile_size()
        {
            return None;
        }
        let index = row * self.columns + column.min(self.columns - 1);
        (index < self.item_count).then_some(index)
    }

    fn height(&self) -> f32 {
        self.viewport_height
    }

    fn scroll_by(&mut self, dy: i32) -> i32 {
        let before = self.scroll_offset;
        self.scroll_offset = (before + dy as f32).clamp(0.0, self.max_scroll());
        (self.scroll_offset - before).round() as i32
    }
}
