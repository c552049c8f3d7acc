//! Ordered multi-selection with drag-gesture range support.
//!
//! The selection is an ordered list of unique uris; position + 1 is the
//! badge number. A drag gesture is evaluated against a fixed baseline (the
//! selection before the drag began) plus every uri the drag has swept so
//! far, so moving back over items never deselects them.

use std::collections::{HashMap, HashSet};

use tracing::trace;

use crate::models::MediaUri;

#[derive(Debug, Default, Clone)]
pub struct SelectionEngine {
    selected: Vec<MediaUri>,
    baseline: Vec<MediaUri>,
    /// Uris touched by the gesture in progress, in first-touched order.
    swept: Vec<MediaUri>,
}

impl SelectionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes `uri` if selected, else appends it. Returns whether it is
    /// selected afterwards. The result also becomes the gesture baseline.
    pub fn toggle(&mut self, uri: &MediaUri) -> bool {
        let selected = match self.selected.iter().position(|u| u == uri) {
            Some(index) => {
                self.selected.remove(index);
                false
            }
            None => {
                self.selected.push(uri.clone());
                true
            }
        };
        self.commit_gesture();
        trace!(%uri, selected, count = self.selected.len(), "Toggled selection");
        selected
    }

    /// Recomputes the selection as the baseline plus every uri swept by the
    /// current drag, including the range from `start` to `end` over
    /// `rendered`.
    ///
    /// Newly swept uris are appended in drag direction. Indices past the
    /// end of `rendered` are clamped.
    pub fn apply_gesture_range(&mut self, start: usize, end: usize, rendered: &[MediaUri]) {
        if let Some(last) = rendered.len().checked_sub(1) {
            let (low, high) = (start.min(end).min(last), start.max(end).min(last));
            let range = &rendered[low..=high];
            let mut seen: HashSet<MediaUri> = self.swept.iter().cloned().collect();
            let ordered: Vec<&MediaUri> = if start > end {
                range.iter().rev().collect()
            } else {
                range.iter().collect()
            };
            for uri in ordered {
                if seen.insert(uri.clone()) {
                    self.swept.push(uri.clone());
                }
            }
        }

        let mut members: HashSet<&MediaUri> = self.baseline.iter().collect();
        let mut next = self.baseline.clone();
        for uri in &self.swept {
            if members.insert(uri) {
                next.push(uri.clone());
            }
        }
        trace!(start, end, count = next.len(), "Applied gesture range");
        self.selected = next;
    }

    /// Makes the current selection the baseline for the next gesture.
    pub fn commit_gesture(&mut self) {
        self.baseline = self.selected.clone();
        self.swept.clear();
    }

    pub fn clear(&mut self) {
        self.selected.clear();
        self.commit_gesture();
    }

    /// Replaces the selection and the baseline. Duplicates are dropped,
    /// keeping the first occurrence.
    pub fn restore(&mut self, uris: impl IntoIterator<Item = MediaUri>) {
        let mut seen = HashSet::new();
        self.selected = uris
            .into_iter()
            .filter(|uri| seen.insert(uri.clone()))
            .collect();
        self.commit_gesture();
    }

    pub fn selected(&self) -> &[MediaUri] {
        &self.selected
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn contains(&self, uri: &MediaUri) -> bool {
        self.selected.contains(uri)
    }

    /// 1-based position of `uri` in the selection.
    pub fn selection_number(&self, uri: &MediaUri) -> Option<usize> {
        self.selected.iter().position(|u| u == uri).map(|i| i + 1)
    }

    /// Badge numbers for every selected uri.
    pub fn numbers(&self) -> HashMap<&MediaUri, usize> {
        self.selected
            .iter()
            .enumerate()
            .map(|(i, uri)| (uri, i + 1))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uris(n: usize) -> Vec<MediaUri> {
        (0..n).map(|i| MediaUri::new(format!("content://media/{i}"))).collect()
    }

    fn indices(engine: &SelectionEngine, rendered: &[MediaUri]) -> Vec<usize> {
        engine
            .selected()
            .iter()
            .map(|u| rendered.iter().position(|r| r == u).unwrap())
            .collect()
    }

    #[test]
    fn test_toggle_parity_and_numbering() {
        let items = uris(6);
        let mut engine = SelectionEngine::new();
        let mut counts = [0usize; 6];
        // Deterministic pseudo-random toggle sequence.
        let mut state = 7u32;
        for _ in 0..200 {
            state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            let index = (state >> 16) as usize % items.len();
            let now_selected = engine.toggle(&items[index]);
            counts[index] += 1;
            assert_eq!(now_selected, counts[index] % 2 == 1);
        }

        for (index, uri) in items.iter().enumerate() {
            assert_eq!(engine.contains(uri), counts[index] % 2 == 1);
        }
        for (position, uri) in engine.selected().iter().enumerate() {
            assert_eq!(engine.selection_number(uri), Some(position + 1));
        }
    }

    #[test]
    fn test_toggle_appends_and_renumbers() {
        let items = uris(3);
        let mut engine = SelectionEngine::new();
        engine.toggle(&items[2]);
        engine.toggle(&items[0]);
        engine.toggle(&items[1]);
        assert_eq!(engine.selection_number(&items[1]), Some(3));

        engine.toggle(&items[2]);
        assert_eq!(engine.selection_number(&items[0]), Some(1));
        assert_eq!(engine.selection_number(&items[1]), Some(2));
        assert_eq!(engine.selection_number(&items[2]), None);
    }

    #[test]
    fn test_gesture_range_is_idempotent() {
        let items = uris(8);
        let mut engine = SelectionEngine::new();
        engine.toggle(&items[6]);

        engine.apply_gesture_range(1, 4, &items);
        let first = engine.selected().to_vec();
        engine.apply_gesture_range(1, 4, &items);
        assert_eq!(engine.selected(), first.as_slice());
        assert_eq!(indices(&engine, &items), vec![6, 1, 2, 3, 4]);
    }

    #[test]
    fn test_reversing_drag_never_deselects() {
        let items = uris(8);
        let mut engine = SelectionEngine::new();

        engine.apply_gesture_range(2, 2, &items);
        engine.apply_gesture_range(2, 5, &items);
        engine.apply_gesture_range(2, 3, &items);
        engine.commit_gesture();
        assert_eq!(indices(&engine, &items), vec![2, 3, 4, 5]);

        engine.apply_gesture_range(3, 3, &items);
        assert_eq!(indices(&engine, &items), vec![2, 3, 4, 5]);
    }

    #[test]
    fn test_drag_over_preselected_items_keeps_them() {
        let items = uris(8);
        let mut engine = SelectionEngine::new();
        engine.toggle(&items[3]);

        engine.apply_gesture_range(2, 5, &items);
        engine.apply_gesture_range(2, 3, &items);
        assert_eq!(indices(&engine, &items), vec![3, 2, 4, 5]);
    }

    #[test]
    fn test_backward_drag_appends_in_drag_order() {
        let items = uris(6);
        let mut engine = SelectionEngine::new();
        engine.apply_gesture_range(4, 1, &items);
        assert_eq!(indices(&engine, &items), vec![4, 3, 2, 1]);
    }

    #[test]
    fn test_commit_sets_next_baseline() {
        let items = uris(10);
        let mut engine = SelectionEngine::new();
        engine.apply_gesture_range(0, 2, &items);
        engine.commit_gesture();

        engine.apply_gesture_range(7, 8, &items);
        engine.apply_gesture_range(7, 7, &items);
        assert_eq!(indices(&engine, &items), vec![0, 1, 2, 7, 8]);

        engine.toggle(&items[8]);
        engine.apply_gesture_range(9, 9, &items);
        assert_eq!(indices(&engine, &items), vec![0, 1, 2, 7, 9]);
    }

    #[test]
    fn test_range_is_clamped_to_rendered_items() {
        let items = uris(3);
        let mut engine = SelectionEngine::new();
        engine.apply_gesture_range(1, 99, &items);
        assert_eq!(indices(&engine, &items), vec![1, 2]);

        engine.clear();
        engine.apply_gesture_range(0, 5, &[]);
        assert!(engine.is_empty());
    }

    #[test]
    fn test_restore_replaces_selection_and_baseline() {
        let items = uris(4);
        let mut engine = SelectionEngine::new();
        engine.toggle(&items[0]);
        engine.restore(vec![items[3].clone(), items[1].clone(), items[3].clone()]);
        assert_eq!(engine.selected(), &[items[3].clone(), items[1].clone()]);

        engine.apply_gesture_range(2, 2, &items);
        assert_eq!(indices(&engine, &items), vec![3, 1, 2]);

        engine.clear();
        assert!(engine.is_empty());
        assert!(engine.numbers().is_empty());
    }
}
