//! Map commands
//!
//! Commands represent intent to modify the map. They are processed by the
//! command handler, which validates them against the aggregate and returns
//! the corresponding domain events.

use crate::identifiers::{EdgeId, MapId, NodeId, TaskId};
use crate::value_objects::{Position2D, RailColor};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Commands for map-wide operations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MapCommand {
    /// Create a new, empty map
    CreateMap {
        /// The name of the map
        name: String,
        /// A description of the board
        description: String,
    },

    /// Scale every position on the map by a factor about the node centroid
    ScalePositions {
        /// Multiplier applied to all distances from the centroid
        factor: f64,
    },

    /// Restore the one-segment-per-car invariant on all connections
    RepairConnections,

    /// A node-level command
    Node(NodeCommand),
    /// A connection-level command
    Connection(ConnectionCommand),
    /// A label-level command
    Label(LabelCommand),
    /// A task-level command
    Task(TaskCommand),
    /// A background-image command
    Background(BackgroundCommand),
}

/// Commands for location nodes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum NodeCommand {
    /// Add a location at the given position
    Add {
        /// Unique location name
        name: String,
        /// Position in map coordinates
        position: Position2D,
    },
    /// Remove a location, cascading to its connections, label, and tasks
    Remove {
        /// The node to remove
        node_id: NodeId,
    },
    /// Rename a location
    Rename {
        /// The node to rename
        node_id: NodeId,
        /// The new unique name
        new_name: String,
    },
    /// Move a location (its label follows while attached)
    Move {
        /// The node to move
        node_id: NodeId,
        /// New position in map coordinates
        position: Position2D,
    },
}

/// Commands for rail connections
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ConnectionCommand {
    /// Add a connection between two locations
    Add {
        /// First endpoint
        source: NodeId,
        /// Second endpoint
        target: NodeId,
        /// Number of rail cars (>= 1)
        length: u32,
        /// Rail color
        color: RailColor,
    },
    /// Remove a connection
    Remove {
        /// The connection to remove
        edge_id: EdgeId,
    },
    /// Change the rail color of a connection
    Recolor {
        /// The connection to recolor
        edge_id: EdgeId,
        /// The new color
        color: RailColor,
    },
    /// Move a single rail-car segment
    MoveSegment {
        /// The connection the segment belongs to
        edge_id: EdgeId,
        /// Index of the segment within the chain
        segment: usize,
        /// New segment center position
        position: Position2D,
    },
    /// Lay segment chains out straight between their endpoints
    Straighten {
        /// A single connection, or `None` for all of them
        edge_id: Option<EdgeId>,
    },
}

/// Commands for location labels
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LabelCommand {
    /// Move a label (detaches it from its node)
    Move {
        /// The node whose label moves
        node_id: NodeId,
        /// New label center position
        position: Position2D,
    },
    /// Change the label text
    SetText {
        /// The node whose label changes
        node_id: NodeId,
        /// New label text
        text: String,
    },
    /// Change the label font size
    SetFontSize {
        /// The node whose label changes
        node_id: NodeId,
        /// New font size in map units
        font_size: f64,
    },
    /// Re-attach every label beside its node
    ResetPositions,
}

/// Commands for destination tasks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TaskCommand {
    /// Add a task over the given stops
    Add {
        /// Ordered stop nodes (at least two)
        stops: Vec<NodeId>,
    },
    /// Remove a task
    Remove {
        /// The task to remove
        task_id: TaskId,
    },
    /// Set the point values of a task
    SetPoints {
        /// The task to change
        task_id: TaskId,
        /// Points for completion
        points: Option<u32>,
        /// Points for completion including bonus stops
        points_bonus: Option<u32>,
        /// Penalty for failing the task
        points_penalty: Option<u32>,
    },
    /// Recompute every task's shortest-path length
    RecomputeLengths,
}

/// Commands for the background image
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BackgroundCommand {
    /// Place or replace the background image
    Set {
        /// Path to the image file
        image_path: PathBuf,
    },
    /// Remove the background image
    Clear,
    /// Set the background scale (map units per pixel)
    SetScale {
        /// New scale, must be positive
        scale: f64,
    },
    /// Set the background offset
    SetOffset {
        /// New top-left corner in map coordinates
        offset: Position2D,
    },
}

/// Result type for map operations
pub type MapCommandResult<T> = Result<T, MapCommandError>;

/// Errors that can occur during map command processing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MapCommandError {
    /// Map not found
    MapNotFound(MapId),
    /// Node not found
    NodeNotFound(NodeId),
    /// Connection not found
    ConnectionNotFound(EdgeId),
    /// Task not found
    TaskNotFound(TaskId),
    /// Segment index outside a connection's chain
    SegmentOutOfRange {
        /// The connection
        edge_id: EdgeId,
        /// The out-of-range index
        segment: usize,
    },
    /// Another location already uses this name
    DuplicateLocationName(String),
    /// Invalid command parameters
    InvalidCommand(String),
}

impl std::fmt::Display for MapCommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MapCommandError::MapNotFound(id) => write!(f, "Map not found: {}", id),
            MapCommandError::NodeNotFound(id) => write!(f, "Location not found: {}", id),
            MapCommandError::ConnectionNotFound(id) => write!(f, "Connection not found: {}", id),
            MapCommandError::TaskNotFound(id) => write!(f, "Task not found: {}", id),
            MapCommandError::SegmentOutOfRange { edge_id, segment } => {
                write!(f, "Segment {} out of range on connection {}", segment, edge_id)
            }
            MapCommandError::DuplicateLocationName(name) => {
                write!(f, "Location name already in use: {}", name)
            }
            MapCommandError::InvalidCommand(msg) => write!(f, "Invalid command: {}", msg),
        }
    }
}

impl std::error::Error for MapCommandError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_command_serialization() {
        let cmd = MapCommand::CreateMap {
            name: "Beleriand".to_string(),
            description: "First Age rail map".to_string(),
        };

        let serialized = serde_json::to_string(&cmd).unwrap();
        let deserialized: MapCommand = serde_json::from_str(&serialized).unwrap();

        match deserialized {
            MapCommand::CreateMap { name, description } => {
                assert_eq!(name, "Beleriand");
                assert_eq!(description, "First Age rail map");
            }
            _ => panic!("Expected CreateMap command"),
        }
    }

    #[test]
    fn test_node_command_serialization() {
        let cmd = MapCommand::Node(NodeCommand::Add {
            name: "Gondolin".to_string(),
            position: Position2D::new(4.0, 2.0),
        });

        let serialized = serde_json::to_string(&cmd).unwrap();
        let deserialized: MapCommand = serde_json::from_str(&serialized).unwrap();

        match deserialized {
            MapCommand::Node(NodeCommand::Add { name, position }) => {
                assert_eq!(name, "Gondolin");
                assert_eq!(position, Position2D::new(4.0, 2.0));
            }
            _ => panic!("Expected node Add command"),
        }
    }

    #[test]
    fn test_connection_command_serialization() {
        let cmd = ConnectionCommand::Add {
            source: NodeId::new(),
            target: NodeId::new(),
            length: 4,
            color: RailColor::Purple,
        };

        let serialized = serde_json::to_string(&cmd).unwrap();
        let deserialized: ConnectionCommand = serde_json::from_str(&serialized).unwrap();

        match deserialized {
            ConnectionCommand::Add { length, color, .. } => {
                assert_eq!(length, 4);
                assert_eq!(color, RailColor::Purple);
            }
            _ => panic!("Expected connection Add command"),
        }
    }

    #[test]
    fn test_command_error_display() {
        let node_id = NodeId::new();
        let error = MapCommandError::NodeNotFound(node_id);

        let display = format!("{}", error);
        assert!(display.contains("Location not found"));
        assert!(display.contains(&node_id.to_string()));
    }
}
