//! Canvas camera, picking, and painting
//!
//! The canvas maps between map coordinates (y-up, arbitrary units) and egui
//! screen points. Picking goes through an `rstar` R-tree rebuilt per frame
//! from the pickable elements of the active edit mode.

use crate::{
    aggregate::MapGraph,
    export::{SEGMENT_LENGTH, SEGMENT_WIDTH},
    value_objects::{Position2D, Size},
    EdgeId, NodeId,
};
use eframe::egui;
use rstar::primitives::GeomWithData;
use rstar::RTree;

/// Screen-space pick radius in points
pub const PICK_RADIUS: f32 = 12.0;

/// Viewport into the map plane
#[derive(Debug, Clone, Copy)]
pub struct Camera {
    /// Map point at the center of the canvas
    pub center: Position2D,
    /// Pixels per map unit
    pub zoom: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            center: Position2D::default(),
            zoom: 12.0,
        }
    }
}

impl Camera {
    /// Map position to screen point within `rect`
    pub fn to_screen(&self, rect: egui::Rect, pos: Position2D) -> egui::Pos2 {
        let dx = (pos.x - self.center.x) as f32 * self.zoom;
        let dy = (pos.y - self.center.y) as f32 * self.zoom;
        // Map y grows upwards, screen y downwards.
        egui::pos2(rect.center().x + dx, rect.center().y - dy)
    }

    /// Screen point to map position within `rect`
    pub fn to_world(&self, rect: egui::Rect, pos: egui::Pos2) -> Position2D {
        let dx = (pos.x - rect.center().x) / self.zoom;
        let dy = (rect.center().y - pos.y) / self.zoom;
        Position2D::new(self.center.x + dx as f64, self.center.y + dy as f64)
    }

    /// Shift the camera by a screen-space drag delta
    pub fn pan(&mut self, delta: egui::Vec2) {
        self.center.x -= (delta.x / self.zoom) as f64;
        self.center.y += (delta.y / self.zoom) as f64;
    }

    /// Zoom towards a screen point, keeping it fixed
    pub fn zoom_towards(&mut self, rect: egui::Rect, pointer: egui::Pos2, factor: f32) {
        let before = self.to_world(rect, pointer);
        self.zoom = (self.zoom * factor).clamp(0.5, 400.0);
        let after = self.to_world(rect, pointer);
        self.center.x += before.x - after.x;
        self.center.y += before.y - after.y;
    }

    /// Fit the camera to the map bounds
    pub fn fit(&mut self, rect: egui::Rect, map: &MapGraph) {
        let Some((min, max)) = map.bounds() else {
            return;
        };
        self.center = Position2D::new((min.x + max.x) / 2.0, (min.y + max.y) / 2.0);
        let width = (max.x - min.x).max(1.0) as f32;
        let height = (max.y - min.y).max(1.0) as f32;
        let margin = 1.2;
        self.zoom = (rect.width() / (width * margin))
            .min(rect.height() / (height * margin))
            .clamp(0.5, 400.0);
    }
}

/// A pickable canvas element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickTarget {
    /// A location node
    Node(NodeId),
    /// A location label
    Label(NodeId),
    /// One rail-car segment of a connection
    Segment(EdgeId, usize),
}

/// Spatial index over the pickable elements of the current edit mode
pub struct PickIndex {
    tree: RTree<GeomWithData<[f64; 2], PickTarget>>,
}

impl PickIndex {
    /// Build an index over the given elements
    pub fn new(
        map: &MapGraph,
        nodes: bool,
        labels: bool,
        segments: bool,
    ) -> Self {
        let mut entries = Vec::new();
        if nodes {
            for node in map.nodes() {
                entries.push(GeomWithData::new(
                    [node.position.x, node.position.y],
                    PickTarget::Node(node.id),
                ));
            }
        }
        if labels {
            for label in map.labels() {
                entries.push(GeomWithData::new(
                    [label.position.x, label.position.y],
                    PickTarget::Label(label.node_id),
                ));
            }
        }
        if segments {
            for conn in map.connections() {
                for (i, segment) in conn.segments.iter().enumerate() {
                    entries.push(GeomWithData::new(
                        [segment.position.x, segment.position.y],
                        PickTarget::Segment(conn.id, i),
                    ));
                }
            }
        }
        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    /// Nearest element within the pick radius around a map position
    pub fn pick(&self, at: Position2D, max_distance: f64) -> Option<PickTarget> {
        let nearest = self.tree.nearest_neighbor(&[at.x, at.y])?;
        let dx = nearest.geom()[0] - at.x;
        let dy = nearest.geom()[1] - at.y;
        if dx * dx + dy * dy <= max_distance * max_distance {
            Some(nearest.data)
        } else {
            None
        }
    }
}

fn egui_color(color: crate::value_objects::Color) -> egui::Color32 {
    egui::Color32::from_rgba_unmultiplied(color.r, color.g, color.b, color.a)
}

/// Paint the map into the canvas rect
pub fn paint_map(
    painter: &egui::Painter,
    rect: egui::Rect,
    camera: &Camera,
    map: &MapGraph,
    background: Option<&egui::TextureHandle>,
    selected: Option<PickTarget>,
) {
    if let (Some(texture), Some(bg)) = (background, map.background()) {
        let size = texture.size();
        let top_left = camera.to_screen(rect, bg.offset);
        let bottom_right = camera.to_screen(
            rect,
            Position2D::new(
                bg.offset.x + size[0] as f64 * bg.scale,
                bg.offset.y - size[1] as f64 * bg.scale,
            ),
        );
        painter.image(
            texture.id(),
            egui::Rect::from_two_pos(top_left, bottom_right),
            egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
            egui::Color32::WHITE,
        );
    }

    let segment_size = Size {
        width: SEGMENT_LENGTH,
        height: SEGMENT_WIDTH,
    };
    for conn in map.connections() {
        let fill = egui_color(conn.color.to_color());
        for (i, segment) in conn.segments.iter().enumerate() {
            let corners: Vec<egui::Pos2> = segment
                .corners(segment_size)
                .iter()
                .map(|c| camera.to_screen(rect, *c))
                .collect();
            let is_selected = selected == Some(PickTarget::Segment(conn.id, i));
            let stroke = if is_selected {
                egui::Stroke::new(2.5, egui::Color32::GOLD)
            } else {
                egui::Stroke::new(1.0, egui::Color32::BLACK)
            };
            painter.add(egui::Shape::convex_polygon(corners, fill, stroke));
        }
    }

    for node in map.nodes() {
        let center = camera.to_screen(rect, node.position);
        let radius = (node.radius as f32 * camera.zoom).max(2.0);
        let is_selected = selected == Some(PickTarget::Node(node.id));
        let stroke = if is_selected {
            egui::Stroke::new(2.5, egui::Color32::GOLD)
        } else {
            egui::Stroke::new(1.0, egui::Color32::BLACK)
        };
        painter.circle(center, radius, egui_color(node.color), stroke);
    }

    for label in map.labels() {
        let pos = camera.to_screen(rect, label.position);
        let font_size = (label.font_size as f32 * camera.zoom).clamp(6.0, 60.0);
        let is_selected = selected == Some(PickTarget::Label(label.node_id));
        let color = if is_selected {
            egui::Color32::GOLD
        } else {
            egui::Color32::BLACK
        };
        painter.text(
            pos,
            egui::Align2::CENTER_CENTER,
            &label.text,
            egui::FontId::proportional(font_size),
            color,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value_objects::RailColor;
    use crate::MapId;

    fn rect() -> egui::Rect {
        egui::Rect::from_min_size(egui::pos2(0.0, 0.0), egui::vec2(800.0, 600.0))
    }

    #[test]
    fn test_camera_roundtrip() {
        let camera = Camera {
            center: Position2D::new(10.0, -4.0),
            zoom: 20.0,
        };
        let world = Position2D::new(13.5, 2.0);
        let back = camera.to_world(rect(), camera.to_screen(rect(), world));
        assert!((back.x - world.x).abs() < 1e-4);
        assert!((back.y - world.y).abs() < 1e-4);
    }

    #[test]
    fn test_camera_y_axis_flips() {
        let camera = Camera::default();
        let up = camera.to_screen(rect(), Position2D::new(0.0, 1.0));
        let down = camera.to_screen(rect(), Position2D::new(0.0, -1.0));
        assert!(up.y < down.y);
    }

    #[test]
    fn test_zoom_keeps_pointer_fixed() {
        let mut camera = Camera::default();
        let pointer = egui::pos2(600.0, 150.0);
        let before = camera.to_world(rect(), pointer);
        camera.zoom_towards(rect(), pointer, 1.5);
        let after = camera.to_world(rect(), pointer);
        assert!((before.x - after.x).abs() < 1e-3);
        assert!((before.y - after.y).abs() < 1e-3);
    }

    #[test]
    fn test_pick_respects_radius_and_mode() {
        let mut map = MapGraph::new(MapId::new(), "Pick", "");
        let a = map.add_node("A", Position2D::new(0.0, 0.0)).unwrap();
        let b = map.add_node("B", Position2D::new(10.0, 0.0)).unwrap();
        map.add_connection(a, b, 2, RailColor::Red).unwrap();

        let nodes_only = PickIndex::new(&map, true, false, false);
        assert_eq!(
            nodes_only.pick(Position2D::new(0.4, 0.1), 1.0),
            Some(PickTarget::Node(a))
        );
        assert_eq!(nodes_only.pick(Position2D::new(5.0, 8.0), 1.0), None);

        let segments_only = PickIndex::new(&map, false, false, true);
        match segments_only.pick(Position2D::new(2.5, 0.0), 2.0) {
            Some(PickTarget::Segment(_, _)) => {}
            other => panic!("expected a segment, got {other:?}"),
        }
    }
}
