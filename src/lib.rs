//! Rail map studio
//!
//! A desktop tool for laying out board-game maps: a graph of locations
//! connected by colored rail connections over a background image, with
//! destination tasks, force-based layout optimization, routing analysis,
//! and PNG export.

pub mod aggregate;
pub mod analysis;
pub mod app;
pub mod commands;
pub mod events;
pub mod export;
pub mod handlers;
pub mod identifiers;
pub mod io;
pub mod layout;
pub mod projections;
pub mod value_objects;

// Re-export main types
pub use aggregate::{Background, MapConnection, MapGraph, MapLabel, MapNode, Task};
pub use events::MapDomainEvent;

// Re-export commands and their types
pub use commands::{
    BackgroundCommand, ConnectionCommand, LabelCommand, MapCommand, MapCommandError,
    MapCommandResult, NodeCommand, TaskCommand,
};

// Re-export command handlers
pub use handlers::{
    InMemoryMapRepository, MapCommandHandler, MapCommandHandlerImpl, MapRepository,
};

// Re-export value objects
pub use value_objects::{Color, Position2D, RailColor, SegmentPose, Size};

// Re-export projections
pub use projections::{LocationListProjection, MapProjection, MapSummaryProjection};

// Re-export identifiers
pub use identifiers::{EdgeId, MapId, NodeId, TaskId};
