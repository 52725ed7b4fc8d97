//! Edit modes and the canvas drag state machine

use super::canvas::{PickIndex, PickTarget};
use crate::value_objects::Position2D;

/// What dragging on the canvas edits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditMode {
    /// Drag location nodes; their labels follow
    MoveNodes,
    /// Drag labels, detaching them from their node
    MoveLabels,
    /// Drag single rail-car segments
    MoveSegments,
}

impl EditMode {
    /// Which element kinds this mode picks
    pub fn picks(&self) -> (bool, bool, bool) {
        match self {
            EditMode::MoveNodes => (true, false, false),
            EditMode::MoveLabels => (false, true, false),
            EditMode::MoveSegments => (false, false, true),
        }
    }

    /// Display name for the mode selector
    pub fn label(&self) -> &'static str {
        match self {
            EditMode::MoveNodes => "Move nodes",
            EditMode::MoveLabels => "Move labels",
            EditMode::MoveSegments => "Move segments",
        }
    }
}

/// Current pointer interaction on the canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DragState {
    /// No drag in progress
    #[default]
    Idle,
    /// Dragging empty space moves the camera
    Panning,
    /// Dragging a picked element
    Dragging(PickTarget),
}

impl DragState {
    /// Begin a drag at a map position: grab the nearest pickable element, or
    /// pan when nothing is in range.
    pub fn begin(index: &PickIndex, at: Position2D, pick_radius: f64) -> Self {
        match index.pick(at, pick_radius) {
            Some(target) => DragState::Dragging(target),
            None => DragState::Panning,
        }
    }

    /// The dragged element, if any
    pub fn target(&self) -> Option<PickTarget> {
        match self {
            DragState::Dragging(target) => Some(*target),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::MapGraph;
    use crate::MapId;

    #[test]
    fn test_mode_pick_masks() {
        assert_eq!(EditMode::MoveNodes.picks(), (true, false, false));
        assert_eq!(EditMode::MoveLabels.picks(), (false, true, false));
        assert_eq!(EditMode::MoveSegments.picks(), (false, false, true));
    }

    #[test]
    fn test_begin_drag_grabs_node_or_pans() {
        let mut map = MapGraph::new(MapId::new(), "Drag", "");
        let a = map.add_node("A", Position2D::new(0.0, 0.0)).unwrap();
        let (nodes, labels, segments) = EditMode::MoveNodes.picks();
        let index = PickIndex::new(&map, nodes, labels, segments);

        let on_node = DragState::begin(&index, Position2D::new(0.2, -0.1), 1.0);
        assert_eq!(on_node, DragState::Dragging(PickTarget::Node(a)));
        assert_eq!(on_node.target(), Some(PickTarget::Node(a)));

        let off_node = DragState::begin(&index, Position2D::new(50.0, 50.0), 1.0);
        assert_eq!(off_node, DragState::Panning);
        assert_eq!(off_node.target(), None);
    }
}
