//! Map domain events
//!
//! Events describe completed state changes. Handlers return them after a
//! successful command so projections and the UI log can observe mutations
//! without reaching into the aggregate.

use crate::identifiers::{EdgeId, MapId, NodeId, TaskId};
use crate::value_objects::{Position2D, RailColor};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Map created event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapCreated {
    /// The unique identifier of the map
    pub map_id: MapId,
    /// The name of the map
    pub name: String,
    /// A description of the board
    pub description: String,
    /// When the map was created
    pub created_at: DateTime<Utc>,
}

/// Node added event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeAdded {
    /// The map the node was added to
    pub map_id: MapId,
    /// The unique identifier of the node
    pub node_id: NodeId,
    /// The location name
    pub name: String,
    /// Where the node was placed
    pub position: Position2D,
}

/// Node removed event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRemoved {
    /// The map the node was removed from
    pub map_id: MapId,
    /// The ID of the removed node
    pub node_id: NodeId,
    /// The name the location had
    pub name: String,
    /// Connections removed by the cascade
    pub removed_connections: usize,
    /// Tasks removed by the cascade
    pub removed_tasks: usize,
}

/// Node renamed event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRenamed {
    /// The map containing the node
    pub map_id: MapId,
    /// The renamed node
    pub node_id: NodeId,
    /// The previous name
    pub old_name: String,
    /// The new name
    pub new_name: String,
}

/// Node moved event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeMoved {
    /// The map containing the node
    pub map_id: MapId,
    /// The moved node
    pub node_id: NodeId,
    /// The new position
    pub position: Position2D,
}

/// Connection added event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionAdded {
    /// The map the connection was added to
    pub map_id: MapId,
    /// The unique identifier of the connection
    pub edge_id: EdgeId,
    /// First endpoint
    pub source: NodeId,
    /// Second endpoint
    pub target: NodeId,
    /// Number of rail cars
    pub length: u32,
    /// Rail color
    pub color: RailColor,
    /// Index among parallel connections
    pub connection_index: u32,
}

/// Connection removed event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionRemoved {
    /// The map the connection was removed from
    pub map_id: MapId,
    /// The ID of the removed connection
    pub edge_id: EdgeId,
    /// Number of rail cars the connection had
    pub length: u32,
    /// Rail color the connection had
    pub color: RailColor,
}

/// Connection recolored event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionRecolored {
    /// The map containing the connection
    pub map_id: MapId,
    /// The recolored connection
    pub edge_id: EdgeId,
    /// The previous color
    pub old_color: RailColor,
    /// The new color
    pub new_color: RailColor,
}

/// Segment moved event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentMoved {
    /// The map containing the connection
    pub map_id: MapId,
    /// The connection the segment belongs to
    pub edge_id: EdgeId,
    /// Index of the segment within the chain
    pub segment: usize,
    /// The new segment center
    pub position: Position2D,
}

/// Connections straightened event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionsStraightened {
    /// The map whose connections were straightened
    pub map_id: MapId,
    /// The single straightened connection, or `None` for all
    pub edge_id: Option<EdgeId>,
}

/// Label moved event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelMoved {
    /// The map containing the label
    pub map_id: MapId,
    /// The node whose label moved
    pub node_id: NodeId,
    /// The new label center
    pub position: Position2D,
}

/// Label changed event (text or font size)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelChanged {
    /// The map containing the label
    pub map_id: MapId,
    /// The node whose label changed
    pub node_id: NodeId,
    /// New text, when changed
    pub text: Option<String>,
    /// New font size, when changed
    pub font_size: Option<f64>,
}

/// Task added event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskAdded {
    /// The map the task was added to
    pub map_id: MapId,
    /// The unique identifier of the task
    pub task_id: TaskId,
    /// The display name of the task
    pub name: String,
    /// The ordered stops
    pub stops: Vec<NodeId>,
}

/// Task removed event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRemoved {
    /// The map the task was removed from
    pub map_id: MapId,
    /// The ID of the removed task
    pub task_id: TaskId,
}

/// Task updated event (points or recomputed lengths)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskUpdated {
    /// The map containing the task
    pub map_id: MapId,
    /// The updated task, or `None` when all task lengths were recomputed
    pub task_id: Option<TaskId>,
}

/// Background changed event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackgroundChanged {
    /// The map whose background changed
    pub map_id: MapId,
    /// The image now in use, or `None` when cleared
    pub image_path: Option<PathBuf>,
}

/// Positions scaled event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionsScaled {
    /// The map whose positions were scaled
    pub map_id: MapId,
    /// The applied factor
    pub factor: f64,
}

/// Enum wrapper for map domain events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MapDomainEvent {
    /// A new map was created
    MapCreated(MapCreated),
    /// A location was added
    NodeAdded(NodeAdded),
    /// A location was removed
    NodeRemoved(NodeRemoved),
    /// A location was renamed
    NodeRenamed(NodeRenamed),
    /// A location was moved
    NodeMoved(NodeMoved),
    /// A connection was added
    ConnectionAdded(ConnectionAdded),
    /// A connection was removed
    ConnectionRemoved(ConnectionRemoved),
    /// A connection changed color
    ConnectionRecolored(ConnectionRecolored),
    /// A rail-car segment was moved
    SegmentMoved(SegmentMoved),
    /// Segment chains were laid out straight
    ConnectionsStraightened(ConnectionsStraightened),
    /// A label was moved
    LabelMoved(LabelMoved),
    /// A label's text or font size changed
    LabelChanged(LabelChanged),
    /// A task was added
    TaskAdded(TaskAdded),
    /// A task was removed
    TaskRemoved(TaskRemoved),
    /// A task was updated
    TaskUpdated(TaskUpdated),
    /// The background image changed
    BackgroundChanged(BackgroundChanged),
    /// All positions were scaled
    PositionsScaled(PositionsScaled),
}

impl MapDomainEvent {
    /// The map this event belongs to
    pub fn map_id(&self) -> MapId {
        match self {
            Self::MapCreated(e) => e.map_id,
            Self::NodeAdded(e) => e.map_id,
            Self::NodeRemoved(e) => e.map_id,
            Self::NodeRenamed(e) => e.map_id,
            Self::NodeMoved(e) => e.map_id,
            Self::ConnectionAdded(e) => e.map_id,
            Self::ConnectionRemoved(e) => e.map_id,
            Self::ConnectionRecolored(e) => e.map_id,
            Self::SegmentMoved(e) => e.map_id,
            Self::ConnectionsStraightened(e) => e.map_id,
            Self::LabelMoved(e) => e.map_id,
            Self::LabelChanged(e) => e.map_id,
            Self::TaskAdded(e) => e.map_id,
            Self::TaskRemoved(e) => e.map_id,
            Self::TaskUpdated(e) => e.map_id,
            Self::BackgroundChanged(e) => e.map_id,
            Self::PositionsScaled(e) => e.map_id,
        }
    }

    /// Stable event type name, used for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::MapCreated(_) => "MapCreated",
            Self::NodeAdded(_) => "NodeAdded",
            Self::NodeRemoved(_) => "NodeRemoved",
            Self::NodeRenamed(_) => "NodeRenamed",
            Self::NodeMoved(_) => "NodeMoved",
            Self::ConnectionAdded(_) => "ConnectionAdded",
            Self::ConnectionRemoved(_) => "ConnectionRemoved",
            Self::ConnectionRecolored(_) => "ConnectionRecolored",
            Self::SegmentMoved(_) => "SegmentMoved",
            Self::ConnectionsStraightened(_) => "ConnectionsStraightened",
            Self::LabelMoved(_) => "LabelMoved",
            Self::LabelChanged(_) => "LabelChanged",
            Self::TaskAdded(_) => "TaskAdded",
            Self::TaskRemoved(_) => "TaskRemoved",
            Self::TaskUpdated(_) => "TaskUpdated",
            Self::BackgroundChanged(_) => "BackgroundChanged",
            Self::PositionsScaled(_) => "PositionsScaled",
        }
    }
}
