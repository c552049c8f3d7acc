//! Drag-to-select over the grid.
//!
//! - `GestureSelectionController`: pointer events and auto-scroll ticks in,
//!   `GestureUpdate`s out
//! - `GridSurface`: hit-testing and scrolling seam to the grid widget
//! - `GridGeometry`: a fixed-column square-tile grid implementing it

pub mod controller;
pub mod grid;

pub use controller::{GestureSelectionController, GestureUpdate, PointerEvent};
pub use grid::{GridGeometry, GridSurface};
