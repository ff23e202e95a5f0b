//! Undo/redo entries for pixel- and position-changing operations.
//!
//! Entries carry explicit before/after state rather than ambient closures.
//! Applying an entry through the pipeline restores surface pixel content
//! and renderer bounds and triggers the same cache-invalidation path a live
//! edit would.

use crate::{
    core::{LayerId, Point, Rect},
    model::PaintTarget,
    surface::RasterSurface,
};

/// One reversible mutation, handed to the history collaborator.
#[derive(Clone, Debug)]
pub enum HistoryEntry {
    /// A paint gesture replaced pixel content on a layer's source or mask.
    Paint {
        layer_id: LayerId,
        target: PaintTarget,
        before: RasterSurface,
        after: RasterSurface,
    },
    /// A drag moved a layer (and its renderer bounds).
    Position {
        layer_id: LayerId,
        before: Point,
        after: Point,
        bounds_before: Rect,
        bounds_after: Rect,
    },
}

impl HistoryEntry {
    pub fn layer_id(&self) -> LayerId {
        match self {
            HistoryEntry::Paint { layer_id, .. } | HistoryEntry::Position { layer_id, .. } => {
                *layer_id
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_expose_their_layer() {
        let entry = HistoryEntry::Position {
            layer_id: LayerId(3),
            before: Point::new(0.0, 0.0),
            after: Point::new(5.0, 5.0),
            bounds_before: Rect::new(0.0, 0.0, 4.0, 4.0),
            bounds_after: Rect::new(5.0, 5.0, 9.0, 9.0),
        };
        assert_eq!(entry.layer_id(), LayerId(3));
    }
}
