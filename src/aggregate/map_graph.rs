//! Map graph aggregate
//!
//! All mutations flow through this aggregate so the referential integrity of
//! the scene holds at every point: connections always reference existing
//! nodes, every connection keeps exactly one segment per rail car, parallel
//! connection indices stay contiguous, and deleting a node cascades to its
//! connections, label, and tasks.

use crate::commands::MapCommandError;
use crate::identifiers::{EdgeId, MapId, NodeId, TaskId};
use crate::value_objects::{Color, Position2D, RailColor, SegmentPose};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Horizontal gap between a node and its label, in map units
const LABEL_OFFSET_X: f64 = 1.2;

/// A location on the board
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapNode {
    /// Unique identifier of the node
    pub id: NodeId,
    /// Unique location name shown on the board
    pub name: String,
    /// Center position in map coordinates
    pub position: Position2D,
    /// Drawing radius in map units
    pub radius: f64,
    /// Fill color of the node marker
    pub color: Color,
}

/// A rail connection between two locations
///
/// A connection of length `n` consists of `n` rail-car segments, each with its
/// own position and rotation. `connection_index` disambiguates parallel
/// connections between the same pair of locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapConnection {
    /// Unique identifier of the connection
    pub id: EdgeId,
    /// First endpoint (endpoint order normalized by node name)
    pub source: NodeId,
    /// Second endpoint
    pub target: NodeId,
    /// Number of rail cars
    pub length: u32,
    /// Rail color of the connection
    pub color: RailColor,
    /// Index among parallel connections between the same endpoints
    pub connection_index: u32,
    /// One pose per rail car, ordered from `source` to `target`
    pub segments: Vec<SegmentPose>,
}

impl MapConnection {
    /// Whether this connection touches the given node
    pub fn touches(&self, node_id: NodeId) -> bool {
        self.source == node_id || self.target == node_id
    }

    /// The other endpoint, if `node_id` is one of the two
    pub fn opposite(&self, node_id: NodeId) -> Option<NodeId> {
        if self.source == node_id {
            Some(self.target)
        } else if self.target == node_id {
            Some(self.source)
        } else {
            None
        }
    }
}

/// The text label of a location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapLabel {
    /// The node this label belongs to
    pub node_id: NodeId,
    /// Label text (defaults to the location name)
    pub text: String,
    /// Center position in map coordinates
    pub position: Position2D,
    /// Font size in map units
    pub font_size: f64,
    /// Set once the user drags the label away from its node; detached labels
    /// no longer follow node movement
    pub detached: bool,
}

/// A destination task between two (or more) locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier of the task
    pub id: TaskId,
    /// Display name, derived from the first and last stop
    pub name: String,
    /// Ordered stops; length >= 2
    pub stops: Vec<NodeId>,
    /// Shortest-path cost between the stops, filled in by analysis
    pub length: Option<u32>,
    /// Points for completing the task
    pub points: Option<u32>,
    /// Points when completed including bonus stops
    pub points_bonus: Option<u32>,
    /// Penalty for not completing the task
    pub points_penalty: Option<u32>,
}

/// Background image settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Background {
    /// Path to the image file
    pub image_path: PathBuf,
    /// Map units per image pixel
    pub scale: f64,
    /// Position of the image's top-left corner in map coordinates
    pub offset: Position2D,
}

impl Background {
    /// Create background settings for an image file
    pub fn new(image_path: PathBuf) -> Self {
        Self {
            image_path,
            scale: 1.0,
            offset: Position2D::default(),
        }
    }
}

/// The map aggregate: one editing session's entire scene
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapGraph {
    id: MapId,
    name: String,
    description: String,
    created_at: DateTime<Utc>,
    nodes: IndexMap<NodeId, MapNode>,
    connections: IndexMap<EdgeId, MapConnection>,
    labels: HashMap<NodeId, MapLabel>,
    tasks: IndexMap<TaskId, Task>,
    background: Option<Background>,
}

impl MapGraph {
    /// Create a new, empty map
    pub fn new(id: MapId, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: description.into(),
            created_at: Utc::now(),
            nodes: IndexMap::new(),
            connections: IndexMap::new(),
            labels: HashMap::new(),
            tasks: IndexMap::new(),
            background: None,
        }
    }

    /// Get the map ID
    pub fn id(&self) -> MapId {
        self.id
    }

    /// Get the map name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the map description
    pub fn description(&self) -> &str {
        &self.description
    }

    /// When the map was created
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// All nodes in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = &MapNode> {
        self.nodes.values()
    }

    /// All connections in insertion order
    pub fn connections(&self) -> impl Iterator<Item = &MapConnection> {
        self.connections.values()
    }

    /// All labels
    pub fn labels(&self) -> impl Iterator<Item = &MapLabel> {
        self.labels.values()
    }

    /// All tasks in insertion order
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    /// Background settings, if an image has been placed
    pub fn background(&self) -> Option<&Background> {
        self.background.as_ref()
    }

    /// Get a node by ID
    pub fn node(&self, node_id: NodeId) -> Result<&MapNode, MapCommandError> {
        self.nodes
            .get(&node_id)
            .ok_or(MapCommandError::NodeNotFound(node_id))
    }

    /// Look up a node by its location name
    pub fn node_by_name(&self, name: &str) -> Option<&MapNode> {
        self.nodes.values().find(|node| node.name == name)
    }

    /// Get a connection by ID
    pub fn connection(&self, edge_id: EdgeId) -> Result<&MapConnection, MapCommandError> {
        self.connections
            .get(&edge_id)
            .ok_or(MapCommandError::ConnectionNotFound(edge_id))
    }

    /// Get a task by ID
    pub fn task(&self, task_id: TaskId) -> Result<&Task, MapCommandError> {
        self.tasks
            .get(&task_id)
            .ok_or(MapCommandError::TaskNotFound(task_id))
    }

    /// Get the label of a node
    pub fn label(&self, node_id: NodeId) -> Result<&MapLabel, MapCommandError> {
        self.labels
            .get(&node_id)
            .ok_or(MapCommandError::NodeNotFound(node_id))
    }

    /// Get node count
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Get connection count
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Get task count
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Check if the map contains a node
    pub fn contains_node(&self, node_id: NodeId) -> bool {
        self.nodes.contains_key(&node_id)
    }

    /// Check if the map contains a connection
    pub fn contains_connection(&self, edge_id: EdgeId) -> bool {
        self.connections.contains_key(&edge_id)
    }

    /// Number of parallel connections between two nodes
    pub fn connection_count_between(&self, a: NodeId, b: NodeId) -> u32 {
        self.connections
            .values()
            .filter(|conn| conn.touches(a) && conn.touches(b))
            .count() as u32
    }

    // -- node operations --

    /// Add a location node; also creates its label beside the node
    pub fn add_node(
        &mut self,
        name: impl Into<String>,
        position: Position2D,
    ) -> Result<NodeId, MapCommandError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(MapCommandError::InvalidCommand(
                "Location name cannot be empty".to_string(),
            ));
        }
        if self.node_by_name(&name).is_some() {
            return Err(MapCommandError::DuplicateLocationName(name));
        }

        let node_id = NodeId::new();
        self.nodes.insert(
            node_id,
            MapNode {
                id: node_id,
                name: name.clone(),
                position,
                radius: 0.5,
                color: Color::rgb(0x22, 0x22, 0x22),
            },
        );
        self.labels.insert(
            node_id,
            MapLabel {
                node_id,
                text: name,
                position: Position2D::new(position.x + LABEL_OFFSET_X, position.y),
                font_size: 1.0,
                detached: false,
            },
        );
        Ok(node_id)
    }

    /// Remove a node, cascading to its connections, label, and tasks
    pub fn remove_node(&mut self, node_id: NodeId) -> Result<MapNode, MapCommandError> {
        let node = self
            .nodes
            .shift_remove(&node_id)
            .ok_or(MapCommandError::NodeNotFound(node_id))?;
        self.labels.remove(&node_id);

        let removed_edges: Vec<EdgeId> = self
            .connections
            .values()
            .filter(|conn| conn.touches(node_id))
            .map(|conn| conn.id)
            .collect();
        for edge_id in removed_edges {
            self.connections.shift_remove(&edge_id);
        }

        let removed_tasks: Vec<TaskId> = self
            .tasks
            .values()
            .filter(|task| task.stops.contains(&node_id))
            .map(|task| task.id)
            .collect();
        for task_id in removed_tasks {
            self.tasks.shift_remove(&task_id);
        }

        Ok(node)
    }

    /// Rename a node; its label text follows unless the user edited it
    pub fn rename_node(
        &mut self,
        node_id: NodeId,
        new_name: impl Into<String>,
    ) -> Result<(), MapCommandError> {
        let new_name = new_name.into();
        if new_name.trim().is_empty() {
            return Err(MapCommandError::InvalidCommand(
                "Location name cannot be empty".to_string(),
            ));
        }
        if let Some(existing) = self.node_by_name(&new_name) {
            if existing.id != node_id {
                return Err(MapCommandError::DuplicateLocationName(new_name));
            }
        }
        let node = self
            .nodes
            .get_mut(&node_id)
            .ok_or(MapCommandError::NodeNotFound(node_id))?;
        let old_name = std::mem::replace(&mut node.name, new_name.clone());
        if let Some(label) = self.labels.get_mut(&node_id) {
            if label.text == old_name {
                label.text = new_name.clone();
            }
        }
        // Task names derive from the first and last stop; rebuild them so a
        // rename never bleeds into other stop names.
        for task in self.tasks.values_mut() {
            if !task.stops.contains(&node_id) {
                continue;
            }
            let first = task.stops.first().and_then(|id| self.nodes.get(id));
            let last = task.stops.last().and_then(|id| self.nodes.get(id));
            if let (Some(first), Some(last)) = (first, last) {
                task.name = format!("{} - {}", first.name, last.name);
            }
        }
        Ok(())
    }

    /// Move a node; its label follows by the same delta unless detached
    pub fn move_node(
        &mut self,
        node_id: NodeId,
        position: Position2D,
    ) -> Result<(), MapCommandError> {
        let node = self
            .nodes
            .get_mut(&node_id)
            .ok_or(MapCommandError::NodeNotFound(node_id))?;
        let delta = position - node.position;
        node.position = position;
        if let Some(label) = self.labels.get_mut(&node_id) {
            if !label.detached {
                label.position = label.position + delta;
            }
        }
        Ok(())
    }

    // -- connection operations --

    /// Add a rail connection between two existing locations
    ///
    /// Endpoint order is normalized so the alphabetically smaller location
    /// name comes first. The segment chain is laid out straight between the
    /// endpoints.
    pub fn add_connection(
        &mut self,
        source: NodeId,
        target: NodeId,
        length: u32,
        color: RailColor,
    ) -> Result<EdgeId, MapCommandError> {
        if source == target {
            return Err(MapCommandError::InvalidCommand(
                "A connection cannot loop back to the same location".to_string(),
            ));
        }
        if length == 0 {
            return Err(MapCommandError::InvalidCommand(
                "Connection length must be at least 1".to_string(),
            ));
        }
        let source_name = self.node(source)?.name.clone();
        let target_name = self.node(target)?.name.clone();
        let (source, target) = if source_name <= target_name {
            (source, target)
        } else {
            (target, source)
        };

        let connection_index = self.connection_count_between(source, target);
        let edge_id = EdgeId::new();
        self.connections.insert(
            edge_id,
            MapConnection {
                id: edge_id,
                source,
                target,
                length,
                color,
                connection_index,
                segments: vec![SegmentPose::default(); length as usize],
            },
        );
        self.straighten_connection(edge_id)?;
        Ok(edge_id)
    }

    /// Remove a connection and close the gap in parallel connection indices
    pub fn remove_connection(&mut self, edge_id: EdgeId) -> Result<MapConnection, MapCommandError> {
        let removed = self
            .connections
            .shift_remove(&edge_id)
            .ok_or(MapCommandError::ConnectionNotFound(edge_id))?;
        for conn in self.connections.values_mut() {
            if conn.touches(removed.source)
                && conn.touches(removed.target)
                && conn.connection_index > removed.connection_index
            {
                conn.connection_index -= 1;
            }
        }
        Ok(removed)
    }

    /// Change the rail color of a connection
    pub fn set_connection_color(
        &mut self,
        edge_id: EdgeId,
        color: RailColor,
    ) -> Result<(), MapCommandError> {
        let conn = self
            .connections
            .get_mut(&edge_id)
            .ok_or(MapCommandError::ConnectionNotFound(edge_id))?;
        conn.color = color;
        Ok(())
    }

    /// Move a single rail-car segment and re-align its rotation with the
    /// neighboring chain anchors
    pub fn move_segment(
        &mut self,
        edge_id: EdgeId,
        segment: usize,
        position: Position2D,
    ) -> Result<(), MapCommandError> {
        let (source_pos, target_pos) = {
            let conn = self.connection(edge_id)?;
            (
                self.node(conn.source)?.position,
                self.node(conn.target)?.position,
            )
        };
        let conn = self
            .connections
            .get_mut(&edge_id)
            .ok_or(MapCommandError::ConnectionNotFound(edge_id))?;
        if segment >= conn.segments.len() {
            return Err(MapCommandError::SegmentOutOfRange { edge_id, segment });
        }
        let prev = if segment == 0 {
            source_pos
        } else {
            conn.segments[segment - 1].position
        };
        let next = if segment + 1 == conn.segments.len() {
            target_pos
        } else {
            conn.segments[segment + 1].position
        };
        conn.segments[segment] = SegmentPose::new(position, prev.angle_to(&next));
        Ok(())
    }

    /// Lay the segment chain of one connection out evenly along the straight
    /// line between its endpoints
    ///
    /// Parallel connections are offset sideways so they do not overlap.
    pub fn straighten_connection(&mut self, edge_id: EdgeId) -> Result<(), MapCommandError> {
        let (start, end, index, parallel) = {
            let conn = self.connection(edge_id)?;
            (
                self.node(conn.source)?.position,
                self.node(conn.target)?.position,
                conn.connection_index,
                self.connection_count_between(conn.source, conn.target),
            )
        };
        let angle = start.angle_to(&end);
        // Center parallel connections around the direct line
        let sideways = (index as f64 - (parallel.saturating_sub(1)) as f64 / 2.0) * 1.0;
        let normal = Position2D::new(-angle.sin(), angle.cos()) * sideways;

        let conn = self
            .connections
            .get_mut(&edge_id)
            .ok_or(MapCommandError::ConnectionNotFound(edge_id))?;
        let cars = conn.segments.len().max(1) as f64;
        for (i, pose) in conn.segments.iter_mut().enumerate() {
            let t = (i as f64 + 0.5) / cars;
            *pose = SegmentPose::new(start.lerp(&end, t) + normal, angle);
        }
        Ok(())
    }

    /// Straighten every connection on the map
    pub fn straighten_all(&mut self) -> Result<(), MapCommandError> {
        let ids: Vec<EdgeId> = self.connections.keys().copied().collect();
        for edge_id in ids {
            self.straighten_connection(edge_id)?;
        }
        Ok(())
    }

    /// Restore the segment-per-car invariant after manual edits
    ///
    /// Any connection whose segment count no longer matches its length gets
    /// its chain rebuilt by straightening.
    pub fn repair_connections(&mut self) -> Result<usize, MapCommandError> {
        let broken: Vec<EdgeId> = self
            .connections
            .values()
            .filter(|conn| conn.segments.len() != conn.length as usize)
            .map(|conn| conn.id)
            .collect();
        let repaired = broken.len();
        for edge_id in &broken {
            if let Some(conn) = self.connections.get_mut(edge_id) {
                conn.segments
                    .resize(conn.length as usize, SegmentPose::default());
            }
            self.straighten_connection(*edge_id)?;
        }
        Ok(repaired)
    }

    // -- label operations --

    /// Move a label; a moved label is detached and stops following its node
    pub fn move_label(
        &mut self,
        node_id: NodeId,
        position: Position2D,
    ) -> Result<(), MapCommandError> {
        let label = self
            .labels
            .get_mut(&node_id)
            .ok_or(MapCommandError::NodeNotFound(node_id))?;
        label.position = position;
        label.detached = true;
        Ok(())
    }

    /// Set the text of a label
    pub fn set_label_text(
        &mut self,
        node_id: NodeId,
        text: impl Into<String>,
    ) -> Result<(), MapCommandError> {
        let label = self
            .labels
            .get_mut(&node_id)
            .ok_or(MapCommandError::NodeNotFound(node_id))?;
        label.text = text.into();
        Ok(())
    }

    /// Set the font size of a label
    pub fn set_label_font_size(
        &mut self,
        node_id: NodeId,
        font_size: f64,
    ) -> Result<(), MapCommandError> {
        if font_size <= 0.0 {
            return Err(MapCommandError::InvalidCommand(
                "Font size must be positive".to_string(),
            ));
        }
        let label = self
            .labels
            .get_mut(&node_id)
            .ok_or(MapCommandError::NodeNotFound(node_id))?;
        label.font_size = font_size;
        Ok(())
    }

    /// Re-attach every label beside its node
    pub fn move_labels_to_nodes(&mut self) {
        for label in self.labels.values_mut() {
            if let Some(node) = self.nodes.get(&label.node_id) {
                label.position =
                    Position2D::new(node.position.x + LABEL_OFFSET_X, node.position.y);
                label.detached = false;
            }
        }
    }

    // -- task operations --

    /// Add a destination task over the given stops (in order)
    pub fn add_task(&mut self, stops: Vec<NodeId>) -> Result<TaskId, MapCommandError> {
        if stops.len() < 2 {
            return Err(MapCommandError::InvalidCommand(
                "A task needs at least two stops".to_string(),
            ));
        }
        for stop in &stops {
            self.node(*stop)?;
        }
        let first = &self.node(stops[0])?.name;
        let last = &self.node(*stops.last().unwrap_or(&stops[0]))?.name;
        let name = format!("{first} - {last}");

        let task_id = TaskId::new();
        self.tasks.insert(
            task_id,
            Task {
                id: task_id,
                name,
                stops,
                length: None,
                points: None,
                points_bonus: None,
                points_penalty: None,
            },
        );
        Ok(task_id)
    }

    /// Remove a task
    pub fn remove_task(&mut self, task_id: TaskId) -> Result<Task, MapCommandError> {
        self.tasks
            .shift_remove(&task_id)
            .ok_or(MapCommandError::TaskNotFound(task_id))
    }

    /// Set the point values of a task
    pub fn set_task_points(
        &mut self,
        task_id: TaskId,
        points: Option<u32>,
        points_bonus: Option<u32>,
        points_penalty: Option<u32>,
    ) -> Result<(), MapCommandError> {
        let task = self
            .tasks
            .get_mut(&task_id)
            .ok_or(MapCommandError::TaskNotFound(task_id))?;
        task.points = points;
        task.points_bonus = points_bonus;
        task.points_penalty = points_penalty;
        Ok(())
    }

    /// Store computed task lengths; tasks without explicit points default to
    /// their shortest-path length
    pub fn set_task_lengths(&mut self, lengths: &HashMap<TaskId, Option<u32>>) {
        for task in self.tasks.values_mut() {
            if let Some(length) = lengths.get(&task.id) {
                task.length = *length;
                if task.points.is_none() {
                    task.points = *length;
                }
            }
        }
    }

    // -- background operations --

    /// Place or replace the background image
    pub fn set_background(&mut self, image_path: PathBuf) {
        let previous = self.background.take();
        let mut background = Background::new(image_path);
        // Keep the user's alignment when swapping the image
        if let Some(previous) = previous {
            background.scale = previous.scale;
            background.offset = previous.offset;
        }
        self.background = Some(background);
    }

    /// Remove the background image
    pub fn clear_background(&mut self) -> Option<Background> {
        self.background.take()
    }

    /// Set the background scale (map units per pixel)
    pub fn set_background_scale(&mut self, scale: f64) -> Result<(), MapCommandError> {
        if scale <= 0.0 || !scale.is_finite() {
            return Err(MapCommandError::InvalidCommand(
                "Background scale must be positive".to_string(),
            ));
        }
        match self.background.as_mut() {
            Some(background) => {
                background.scale = scale;
                Ok(())
            }
            None => Err(MapCommandError::InvalidCommand(
                "No background image set".to_string(),
            )),
        }
    }

    /// Set the background offset
    pub fn set_background_offset(&mut self, offset: Position2D) -> Result<(), MapCommandError> {
        match self.background.as_mut() {
            Some(background) => {
                background.offset = offset;
                Ok(())
            }
            None => Err(MapCommandError::InvalidCommand(
                "No background image set".to_string(),
            )),
        }
    }

    // -- whole-graph operations --

    /// Centroid of all node positions
    pub fn centroid(&self) -> Position2D {
        if self.nodes.is_empty() {
            return Position2D::default();
        }
        let mut sum = Position2D::default();
        for node in self.nodes.values() {
            sum = sum + node.position;
        }
        sum * (1.0 / self.nodes.len() as f64)
    }

    /// Scale every position (nodes, segments, labels, background) by `factor`
    /// about the node centroid, for rescaling the board before printing
    pub fn scale_positions(&mut self, factor: f64) -> Result<(), MapCommandError> {
        if factor <= 0.0 || !factor.is_finite() {
            return Err(MapCommandError::InvalidCommand(
                "Scale factor must be positive".to_string(),
            ));
        }
        let center = self.centroid();
        let scale = |pos: Position2D| center + (pos - center) * factor;

        for node in self.nodes.values_mut() {
            node.position = scale(node.position);
        }
        for conn in self.connections.values_mut() {
            for pose in conn.segments.iter_mut() {
                pose.position = scale(pose.position);
            }
        }
        for label in self.labels.values_mut() {
            label.position = scale(label.position);
        }
        if let Some(background) = self.background.as_mut() {
            background.offset = scale(background.offset);
            background.scale *= factor;
        }
        Ok(())
    }

    /// Bounding box over nodes, segments, and labels: `(min, max)` corners
    ///
    /// Returns `None` for an empty map.
    pub fn bounds(&self) -> Option<(Position2D, Position2D)> {
        let mut points = Vec::new();
        for node in self.nodes.values() {
            points.push(node.position);
        }
        for conn in self.connections.values() {
            for pose in &conn.segments {
                points.push(pose.position);
            }
        }
        for label in self.labels.values() {
            points.push(label.position);
        }
        let first = *points.first()?;
        let mut min = first;
        let mut max = first;
        for point in points {
            min.x = min.x.min(point.x);
            min.y = min.y.min(point.y);
            max.x = max.x.max(point.x);
            max.y = max.y.max(point.y);
        }
        Some((min, max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_map() -> MapGraph {
        MapGraph::new(MapId::new(), "Test Map", "A test board")
    }

    #[test]
    fn test_add_node_creates_label() {
        let mut map = test_map();
        let id = map.add_node("Menegroth", Position2D::new(2.0, 3.0)).unwrap();

        assert_eq!(map.node_count(), 1);
        let label = map.label(id).unwrap();
        assert_eq!(label.text, "Menegroth");
        assert!(!label.detached);
        assert!(label.position.x > 2.0);
    }

    #[test]
    fn test_duplicate_location_name_rejected() {
        let mut map = test_map();
        map.add_node("Nargothrond", Position2D::default()).unwrap();
        let result = map.add_node("Nargothrond", Position2D::new(1.0, 1.0));

        assert!(matches!(
            result,
            Err(MapCommandError::DuplicateLocationName(_))
        ));
    }

    #[test]
    fn test_connection_normalizes_endpoint_order() {
        let mut map = test_map();
        let b = map.add_node("Bree", Position2D::new(10.0, 0.0)).unwrap();
        let a = map.add_node("Angband", Position2D::default()).unwrap();

        let edge = map.add_connection(b, a, 3, RailColor::Red).unwrap();
        let conn = map.connection(edge).unwrap();
        assert_eq!(map.node(conn.source).unwrap().name, "Angband");
        assert_eq!(conn.segments.len(), 3);
    }

    #[test]
    fn test_connection_requires_existing_nodes() {
        let mut map = test_map();
        let a = map.add_node("A", Position2D::default()).unwrap();
        let missing = NodeId::new();

        assert!(matches!(
            map.add_connection(a, missing, 2, RailColor::Blue),
            Err(MapCommandError::NodeNotFound(_))
        ));
        assert!(matches!(
            map.add_connection(a, a, 2, RailColor::Blue),
            Err(MapCommandError::InvalidCommand(_))
        ));
        assert!(matches!(
            map.add_connection(a, missing, 0, RailColor::Blue),
            Err(MapCommandError::InvalidCommand(_))
        ));
    }

    #[test]
    fn test_parallel_connection_indices() {
        let mut map = test_map();
        let a = map.add_node("A", Position2D::default()).unwrap();
        let b = map.add_node("B", Position2D::new(8.0, 0.0)).unwrap();

        let first = map.add_connection(a, b, 2, RailColor::Red).unwrap();
        let second = map.add_connection(a, b, 2, RailColor::Blue).unwrap();
        let third = map.add_connection(a, b, 2, RailColor::Green).unwrap();
        assert_eq!(map.connection(first).unwrap().connection_index, 0);
        assert_eq!(map.connection(second).unwrap().connection_index, 1);
        assert_eq!(map.connection(third).unwrap().connection_index, 2);

        // Removing the middle one closes the gap
        map.remove_connection(second).unwrap();
        assert_eq!(map.connection(first).unwrap().connection_index, 0);
        assert_eq!(map.connection(third).unwrap().connection_index, 1);
    }

    #[test]
    fn test_remove_node_cascades() {
        let mut map = test_map();
        let a = map.add_node("A", Position2D::default()).unwrap();
        let b = map.add_node("B", Position2D::new(5.0, 0.0)).unwrap();
        let c = map.add_node("C", Position2D::new(0.0, 5.0)).unwrap();
        map.add_connection(a, b, 2, RailColor::Red).unwrap();
        map.add_connection(b, c, 1, RailColor::Blue).unwrap();
        map.add_task(vec![a, b]).unwrap();
        map.add_task(vec![a, c]).unwrap();

        map.remove_node(b).unwrap();

        assert_eq!(map.node_count(), 2);
        assert_eq!(map.connection_count(), 0);
        // Only the task not involving B survives
        assert_eq!(map.task_count(), 1);
        assert_eq!(map.tasks().next().unwrap().name, "A - C");
    }

    #[test]
    fn test_move_node_carries_label() {
        let mut map = test_map();
        let a = map.add_node("A", Position2D::default()).unwrap();
        let label_pos = map.label(a).unwrap().position;

        map.move_node(a, Position2D::new(4.0, -2.0)).unwrap();
        let moved = map.label(a).unwrap().position;
        assert_eq!(moved, label_pos + Position2D::new(4.0, -2.0));

        // Detach the label, then the node moves alone
        map.move_label(a, Position2D::new(0.0, 10.0)).unwrap();
        map.move_node(a, Position2D::new(8.0, -2.0)).unwrap();
        assert_eq!(map.label(a).unwrap().position, Position2D::new(0.0, 10.0));
    }

    #[test]
    fn test_rename_node_updates_label_and_tasks() {
        let mut map = test_map();
        let a = map.add_node("Old", Position2D::default()).unwrap();
        let b = map.add_node("Other", Position2D::new(3.0, 0.0)).unwrap();
        map.add_task(vec![a, b]).unwrap();

        map.rename_node(a, "New").unwrap();
        assert_eq!(map.label(a).unwrap().text, "New");
        assert_eq!(map.tasks().next().unwrap().name, "New - Other");
    }

    #[test]
    fn test_rename_leaves_other_stop_names_intact() {
        let mut map = test_map();
        // "Dale" is a substring of "Dale Marsh"; renaming it must not touch
        // the other stop's name in derived task names.
        let a = map.add_node("Dale", Position2D::default()).unwrap();
        let b = map.add_node("Dale Marsh", Position2D::new(3.0, 0.0)).unwrap();
        map.add_task(vec![a, b]).unwrap();

        map.rename_node(a, "Esgaroth").unwrap();
        assert_eq!(map.tasks().next().unwrap().name, "Esgaroth - Dale Marsh");
    }

    #[test]
    fn test_straighten_places_segments_on_line() {
        let mut map = test_map();
        let a = map.add_node("A", Position2D::default()).unwrap();
        let b = map.add_node("B", Position2D::new(8.0, 0.0)).unwrap();
        let edge = map.add_connection(a, b, 4, RailColor::Gray).unwrap();

        let conn = map.connection(edge).unwrap();
        let expected_x = [1.0, 3.0, 5.0, 7.0];
        for (pose, x) in conn.segments.iter().zip(expected_x) {
            assert!((pose.position.x - x).abs() < 1e-9);
            assert!(pose.position.y.abs() < 1e-9);
            assert!(pose.rotation.abs() < 1e-9);
        }
    }

    #[test]
    fn test_move_segment_realigns_rotation() {
        let mut map = test_map();
        let a = map.add_node("A", Position2D::default()).unwrap();
        let b = map.add_node("B", Position2D::new(6.0, 0.0)).unwrap();
        let edge = map.add_connection(a, b, 2, RailColor::Red).unwrap();

        map.move_segment(edge, 0, Position2D::new(1.0, 2.0)).unwrap();
        let conn = map.connection(edge).unwrap();
        assert_eq!(conn.segments[0].position, Position2D::new(1.0, 2.0));
        // Rotation now points from the source node toward the next segment
        let expected = Position2D::default().angle_to(&conn.segments[1].position);
        assert!((conn.segments[0].rotation - expected).abs() < 1e-9);

        assert!(matches!(
            map.move_segment(edge, 5, Position2D::default()),
            Err(MapCommandError::SegmentOutOfRange { .. })
        ));
    }

    #[test]
    fn test_repair_connections_restores_invariant() {
        let mut map = test_map();
        let a = map.add_node("A", Position2D::default()).unwrap();
        let b = map.add_node("B", Position2D::new(6.0, 0.0)).unwrap();
        let edge = map.add_connection(a, b, 3, RailColor::Red).unwrap();

        // Corrupt the chain through a direct clone/replace cycle
        let mut conn = map.connection(edge).unwrap().clone();
        conn.segments.pop();
        map.connections.insert(edge, conn);

        let repaired = map.repair_connections().unwrap();
        assert_eq!(repaired, 1);
        assert_eq!(map.connection(edge).unwrap().segments.len(), 3);
    }

    #[test]
    fn test_scale_positions_about_centroid() {
        let mut map = test_map();
        let a = map.add_node("A", Position2D::new(0.0, 0.0)).unwrap();
        let b = map.add_node("B", Position2D::new(10.0, 0.0)).unwrap();

        map.scale_positions(0.5).unwrap();
        assert_eq!(map.node(a).unwrap().position, Position2D::new(2.5, 0.0));
        assert_eq!(map.node(b).unwrap().position, Position2D::new(7.5, 0.0));

        assert!(map.scale_positions(0.0).is_err());
    }

    #[test]
    fn test_task_lengths_default_points() {
        let mut map = test_map();
        let a = map.add_node("A", Position2D::default()).unwrap();
        let b = map.add_node("B", Position2D::new(3.0, 0.0)).unwrap();
        let task_id = map.add_task(vec![a, b]).unwrap();

        let mut lengths = HashMap::new();
        lengths.insert(task_id, Some(7));
        map.set_task_lengths(&lengths);

        let task = map.task(task_id).unwrap();
        assert_eq!(task.length, Some(7));
        assert_eq!(task.points, Some(7));

        // Explicit points are not overwritten
        map.set_task_points(task_id, Some(12), None, Some(5)).unwrap();
        map.set_task_lengths(&lengths);
        assert_eq!(map.task(task_id).unwrap().points, Some(12));
    }

    #[test]
    fn test_background_settings() {
        let mut map = test_map();
        assert!(map.set_background_scale(2.0).is_err());

        map.set_background(PathBuf::from("board.png"));
        map.set_background_scale(0.25).unwrap();
        map.set_background_offset(Position2D::new(-1.0, -2.0)).unwrap();

        // Swapping the image keeps alignment
        map.set_background(PathBuf::from("board_v2.png"));
        let background = map.background().unwrap();
        assert_eq!(background.image_path, PathBuf::from("board_v2.png"));
        assert_eq!(background.scale, 0.25);
        assert_eq!(background.offset, Position2D::new(-1.0, -2.0));
    }

    #[test]
    fn test_bounds() {
        let mut map = test_map();
        assert!(map.bounds().is_none());

        map.add_node("A", Position2D::new(-5.0, 2.0)).unwrap();
        map.add_node("B", Position2D::new(3.0, -4.0)).unwrap();
        let (min, max) = map.bounds().unwrap();
        assert_eq!(min, Position2D::new(-5.0, -4.0));
        assert!(max.x > 3.0); // labels extend past the node
        assert_eq!(max.y, 2.0);
    }
}
