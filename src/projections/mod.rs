//! Read-model projections
//!
//! Projections consume domain events and maintain the lightweight views the
//! side panels read: a per-map summary and the alphabetical location list.

use crate::{
    events::{
        ConnectionAdded, ConnectionRemoved, MapCreated, MapDomainEvent, NodeAdded, NodeRemoved,
        NodeRenamed, TaskAdded, TaskRemoved,
    },
    MapId, NodeId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Trait for projections fed by map events
pub trait MapProjection {
    /// Apply one event
    fn handle_event(&mut self, event: &MapDomainEvent);

    /// Drop all state
    fn clear(&mut self);
}

/// Summary information about a map
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapSummary {
    /// Unique identifier of the map
    pub map_id: MapId,
    /// Human-readable name of the map
    pub name: String,
    /// Description of the board
    pub description: String,
    /// Current number of locations
    pub node_count: usize,
    /// Current number of rail connections
    pub connection_count: usize,
    /// Total rail cars over all connections
    pub total_cars: u32,
    /// Current number of tasks
    pub task_count: usize,
    /// When the map was created
    pub created_at: DateTime<Utc>,
    /// When the map last changed
    pub last_modified: DateTime<Utc>,
}

/// Projection that maintains map summaries
#[derive(Debug, Clone, Default)]
pub struct MapSummaryProjection {
    summaries: HashMap<MapId, MapSummary>,
}

impl MapSummaryProjection {
    /// Create an empty projection
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a map summary by ID
    pub fn get_summary(&self, map_id: &MapId) -> Option<&MapSummary> {
        self.summaries.get(map_id)
    }

    /// Get all map summaries
    pub fn get_all_summaries(&self) -> Vec<&MapSummary> {
        self.summaries.values().collect()
    }

    /// Total number of maps
    pub fn total_maps(&self) -> usize {
        self.summaries.len()
    }

    fn touch(&mut self, map_id: MapId, update: impl FnOnce(&mut MapSummary)) {
        if let Some(summary) = self.summaries.get_mut(&map_id) {
            update(summary);
            summary.last_modified = Utc::now();
        }
    }
}

impl MapProjection for MapSummaryProjection {
    fn handle_event(&mut self, event: &MapDomainEvent) {
        match event {
            MapDomainEvent::MapCreated(MapCreated {
                map_id,
                name,
                description,
                created_at,
            }) => {
                self.summaries.insert(
                    *map_id,
                    MapSummary {
                        map_id: *map_id,
                        name: name.clone(),
                        description: description.clone(),
                        node_count: 0,
                        connection_count: 0,
                        total_cars: 0,
                        task_count: 0,
                        created_at: *created_at,
                        last_modified: *created_at,
                    },
                );
            }
            MapDomainEvent::NodeAdded(NodeAdded { map_id, .. }) => {
                self.touch(*map_id, |s| s.node_count += 1);
            }
            MapDomainEvent::NodeRemoved(NodeRemoved {
                map_id,
                removed_connections,
                removed_tasks,
                ..
            }) => {
                let (connections, tasks) = (*removed_connections, *removed_tasks);
                self.touch(*map_id, |s| {
                    s.node_count = s.node_count.saturating_sub(1);
                    s.connection_count = s.connection_count.saturating_sub(connections);
                    s.task_count = s.task_count.saturating_sub(tasks);
                });
            }
            MapDomainEvent::ConnectionAdded(ConnectionAdded { map_id, length, .. }) => {
                let length = *length;
                self.touch(*map_id, |s| {
                    s.connection_count += 1;
                    s.total_cars += length;
                });
            }
            MapDomainEvent::ConnectionRemoved(ConnectionRemoved { map_id, length, .. }) => {
                let length = *length;
                self.touch(*map_id, |s| {
                    s.connection_count = s.connection_count.saturating_sub(1);
                    s.total_cars = s.total_cars.saturating_sub(length);
                });
            }
            MapDomainEvent::TaskAdded(TaskAdded { map_id, .. }) => {
                self.touch(*map_id, |s| s.task_count += 1);
            }
            MapDomainEvent::TaskRemoved(TaskRemoved { map_id, .. }) => {
                self.touch(*map_id, |s| s.task_count = s.task_count.saturating_sub(1));
            }
            other => {
                // Position and cosmetic changes only bump the timestamp.
                self.touch(other.map_id(), |_| {});
            }
        }
    }

    fn clear(&mut self) {
        self.summaries.clear();
    }
}

/// One entry of the location list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationEntry {
    /// The node this entry describes
    pub node_id: NodeId,
    /// The location name
    pub name: String,
}

/// Projection that maintains an alphabetical location list per map
#[derive(Debug, Clone, Default)]
pub struct LocationListProjection {
    locations: HashMap<MapId, Vec<LocationEntry>>,
}

impl LocationListProjection {
    /// Create an empty projection
    pub fn new() -> Self {
        Self::default()
    }

    /// Locations of a map, sorted by name
    pub fn locations(&self, map_id: &MapId) -> &[LocationEntry] {
        self.locations.get(map_id).map_or(&[], Vec::as_slice)
    }

    fn sort(entries: &mut [LocationEntry]) {
        entries.sort_by(|a, b| a.name.cmp(&b.name));
    }
}

impl MapProjection for LocationListProjection {
    fn handle_event(&mut self, event: &MapDomainEvent) {
        match event {
            MapDomainEvent::MapCreated(MapCreated { map_id, .. }) => {
                self.locations.insert(*map_id, Vec::new());
            }
            MapDomainEvent::NodeAdded(NodeAdded {
                map_id,
                node_id,
                name,
                ..
            }) => {
                let entries = self.locations.entry(*map_id).or_default();
                entries.push(LocationEntry {
                    node_id: *node_id,
                    name: name.clone(),
                });
                Self::sort(entries);
            }
            MapDomainEvent::NodeRemoved(NodeRemoved {
                map_id, node_id, ..
            }) => {
                if let Some(entries) = self.locations.get_mut(map_id) {
                    entries.retain(|e| e.node_id != *node_id);
                }
            }
            MapDomainEvent::NodeRenamed(NodeRenamed {
                map_id,
                node_id,
                new_name,
                ..
            }) => {
                if let Some(entries) = self.locations.get_mut(map_id) {
                    for entry in entries.iter_mut() {
                        if entry.node_id == *node_id {
                            entry.name = new_name.clone();
                        }
                    }
                    Self::sort(entries);
                }
            }
            _ => {}
        }
    }

    fn clear(&mut self) {
        self.locations.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value_objects::Position2D;

    fn created(map_id: MapId) -> MapDomainEvent {
        MapDomainEvent::MapCreated(MapCreated {
            map_id,
            name: "Test".to_string(),
            description: String::new(),
            created_at: Utc::now(),
        })
    }

    fn node_added(map_id: MapId, name: &str) -> (NodeId, MapDomainEvent) {
        let node_id = NodeId::new();
        let event = MapDomainEvent::NodeAdded(NodeAdded {
            map_id,
            node_id,
            name: name.to_string(),
            position: Position2D::default(),
        });
        (node_id, event)
    }

    #[test]
    fn test_summary_counts() {
        let mut projection = MapSummaryProjection::new();
        let map_id = MapId::new();
        projection.handle_event(&created(map_id));
        let (node_id, event) = node_added(map_id, "A");
        projection.handle_event(&event);
        projection.handle_event(&node_added(map_id, "B").1);
        projection.handle_event(&MapDomainEvent::ConnectionAdded(ConnectionAdded {
            map_id,
            edge_id: crate::EdgeId::new(),
            source: node_id,
            target: NodeId::new(),
            length: 5,
            color: crate::value_objects::RailColor::Red,
            connection_index: 0,
        }));

        let summary = projection.get_summary(&map_id).unwrap();
        assert_eq!(summary.node_count, 2);
        assert_eq!(summary.connection_count, 1);
        assert_eq!(summary.total_cars, 5);
        assert_eq!(projection.total_maps(), 1);
    }

    #[test]
    fn test_node_removed_applies_cascade_counts() {
        let mut projection = MapSummaryProjection::new();
        let map_id = MapId::new();
        projection.handle_event(&created(map_id));
        let (node_id, event) = node_added(map_id, "A");
        projection.handle_event(&event);
        projection.handle_event(&MapDomainEvent::NodeRemoved(NodeRemoved {
            map_id,
            node_id,
            name: "A".to_string(),
            removed_connections: 0,
            removed_tasks: 0,
        }));

        assert_eq!(projection.get_summary(&map_id).unwrap().node_count, 0);
    }

    #[test]
    fn test_location_list_stays_sorted() {
        let mut projection = LocationListProjection::new();
        let map_id = MapId::new();
        projection.handle_event(&created(map_id));
        for name in ["Mithrim", "Amon Ereb", "Himring"] {
            projection.handle_event(&node_added(map_id, name).1);
        }

        let names: Vec<&str> = projection
            .locations(&map_id)
            .iter()
            .map(|e| e.name.as_str())
            .collect();
        assert_eq!(names, vec!["Amon Ereb", "Himring", "Mithrim"]);
    }

    #[test]
    fn test_location_list_rename_resorts() {
        let mut projection = LocationListProjection::new();
        let map_id = MapId::new();
        projection.handle_event(&created(map_id));
        let (node_id, event) = node_added(map_id, "Balar");
        projection.handle_event(&event);
        projection.handle_event(&node_added(map_id, "Dorthonion").1);
        projection.handle_event(&MapDomainEvent::NodeRenamed(NodeRenamed {
            map_id,
            node_id,
            old_name: "Balar".to_string(),
            new_name: "Tol Galen".to_string(),
        }));

        let names: Vec<&str> = projection
            .locations(&map_id)
            .iter()
            .map(|e| e.name.as_str())
            .collect();
        assert_eq!(names, vec!["Dorthonion", "Tol Galen"]);
    }
}
