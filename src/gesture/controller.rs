use std::time::Duration;

use tracing::trace;

use super::grid::GridSurface;
use crate::config::GestureConfig;

/// Output of the controller, applied to the selection by the gallery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureUpdate {
    /// The drag now spans `start..=end` (either direction).
    Range { start: usize, end: usize },
    /// The drag ended; commit it.
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Move { x: f32, y: f32 },
    Up,
    Cancel,
    /// A second finger touched down.
    SecondaryDown,
}

#[derive(Debug, Clone, Copy)]
struct Drag {
    start: usize,
    end: usize,
    last_position: Option<(f32, f32)>,
    /// Signed scroll speed in px per reference frame; 0 when not scrolling.
    speed: f32,
    /// Sub-pixel scroll carried between ticks.
    carry: f32,
}

/// Turns a drag over the grid into selection ranges and auto-scroll.
///
/// `Idle -> Dragging -> Idle`. While dragging, a pointer inside the top or
/// bottom hot-zone scrolls the grid on every `tick`, faster the deeper it
/// is, and the range is re-evaluated at the last pointer position after
/// each scroll step.
#[derive(Debug, Clone)]
pub struct GestureSelectionController {
    config: GestureConfig,
    drag: Option<Drag>,
}

impl GestureSelectionController {
    pub fn new(config: GestureConfig) -> Self {
        Self { config, drag: None }
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    pub fn is_auto_scrolling(&self) -> bool {
        self.drag.is_some_and(|d| d.speed != 0.0)
    }

    /// Long-press on item `index` starts a drag seeded at that item.
    pub fn start_gesture_selection(&mut self, index: usize) -> GestureUpdate {
        trace!(index, "Gesture selection started");
        self.drag = Some(Drag {
            start: index,
            end: index,
            last_position: None,
            speed: 0.0,
            carry: 0.0,
        });
        GestureUpdate::Range {
            start: index,
            end: index,
        }
    }

    pub fn on_pointer(
        &mut self,
        event: PointerEvent,
        surface: &dyn GridSurface,
    ) -> Option<GestureUpdate> {
        let drag = self.drag.as_mut()?;
        match event {
            PointerEvent::Move { x, y } => {
                drag.last_position = Some((x, y));
                drag.speed = scroll_speed(&self.config, y, surface.height());
                if drag.speed != 0.0 {
                    return None;
                }
                drag.carry = 0.0;
                let index = surface.item_index_at(x, y)?;
                extend(drag, index)
            }
            PointerEvent::Up | PointerEvent::Cancel | PointerEvent::SecondaryDown => {
                self.drag = None;
                trace!(?event, "Gesture selection finished");
                Some(GestureUpdate::Finished)
            }
        }
    }

    /// Advances auto-scroll by `elapsed`, then re-evaluates the range at
    /// the last pointer position.
    pub fn tick(
        &mut self,
        elapsed: Duration,
        surface: &mut dyn GridSurface,
    ) -> Option<GestureUpdate> {
        let frame = self.config.frame_interval();
        let drag = self.drag.as_mut()?;
        if drag.speed == 0.0 {
            return None;
        }

        let frames = (elapsed.as_nanos() as f64 / frame.as_nanos() as f64) as f32;
        let wanted = drag.speed * frames + drag.carry;
        let step = wanted.trunc();
        drag.carry = wanted - step;
        let scrolled = surface.scroll_by(step as i32);
        trace!(step, scrolled, "Auto-scroll tick");

        let (x, y) = drag.last_position?;
        let edge_y = y.clamp(0.0, (surface.height() - 1.0).max(0.0));
        let index = surface.item_index_at(x, edge_y)?;
        extend(drag, index)
    }
}

fn extend(drag: &mut Drag, index: usize) -> Option<GestureUpdate> {
    if index == drag.end {
        return None;
    }
    drag.end = index;
    Some(GestureUpdate::Range {
        start: drag.start,
        end: index,
    })
}

/// Signed px per frame for a pointer at `y` in a view of `height`.
fn scroll_speed(config: &GestureConfig, y: f32, height: f32) -> f32 {
    let zone = config.hot_zone.min(height / 2.0).max(1.0);
    let max = config.max_scroll_step as f32;
    if y < zone {
        -max * ((zone - y) / zone).min(1.0)
    } else if y > height - zone {
        max * ((y - (height - zone)) / zone).min(1.0)
    } else {
        0.0
    }
}
