//! Map aggregate
//!
//! The `MapGraph` aggregate owns the entire in-memory scene: location nodes,
//! rail connections (chains of per-car segments), labels, destination tasks,
//! and the background image settings.

mod map_graph;

pub use map_graph::{
    Background, MapConnection, MapGraph, MapLabel, MapNode, Task,
};
