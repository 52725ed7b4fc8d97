//! Map command handlers
//!
//! Command handlers process map commands, validate business rules against the
//! aggregate, and emit domain events. They are the bridge between the UI and
//! the domain model.

mod repository;

pub use repository::InMemoryMapRepository;

use crate::{
    aggregate::MapGraph,
    analysis,
    commands::{
        BackgroundCommand, ConnectionCommand, LabelCommand, MapCommand, MapCommandResult,
        NodeCommand, TaskCommand,
    },
    events::{
        BackgroundChanged, ConnectionAdded, ConnectionRecolored, ConnectionRemoved,
        ConnectionsStraightened, LabelChanged, LabelMoved, MapCreated, MapDomainEvent, NodeAdded,
        NodeMoved, NodeRemoved, NodeRenamed, PositionsScaled, SegmentMoved, TaskAdded, TaskRemoved,
        TaskUpdated,
    },
    MapId,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Trait for handling map commands
pub trait MapCommandHandler {
    /// Handle a command against the map with the given ID.
    ///
    /// For [`MapCommand::CreateMap`] the given ID becomes the ID of the new
    /// map; every other command requires the map to exist.
    fn handle_command(
        &self,
        map_id: MapId,
        command: MapCommand,
    ) -> MapCommandResult<Vec<MapDomainEvent>>;
}

/// Repository trait for loading and saving map aggregates
pub trait MapRepository {
    /// Load a map aggregate by ID
    fn load(&self, map_id: MapId) -> MapCommandResult<MapGraph>;

    /// Save a map aggregate
    fn save(&self, map: &MapGraph) -> MapCommandResult<()>;

    /// Check if a map exists
    fn exists(&self, map_id: MapId) -> bool;

    /// Remove a map
    fn remove(&self, map_id: MapId) -> MapCommandResult<()>;
}

/// Implementation of the map command handler
pub struct MapCommandHandlerImpl {
    repository: Arc<dyn MapRepository>,
}

impl MapCommandHandlerImpl {
    /// Create a new map command handler
    pub fn new(repository: Arc<dyn MapRepository>) -> Self {
        Self { repository }
    }

    fn create_map(
        &self,
        map_id: MapId,
        name: String,
        description: String,
    ) -> MapCommandResult<Vec<MapDomainEvent>> {
        let map = MapGraph::new(map_id, name.clone(), description.clone());
        let created_at = map.created_at();
        self.repository.save(&map)?;

        Ok(vec![MapDomainEvent::MapCreated(MapCreated {
            map_id,
            name,
            description,
            created_at,
        })])
    }

    fn process_node_command(
        &self,
        map: &mut MapGraph,
        command: NodeCommand,
    ) -> MapCommandResult<Vec<MapDomainEvent>> {
        let map_id = map.id();
        match command {
            NodeCommand::Add { name, position } => {
                let node_id = map.add_node(name.clone(), position)?;
                Ok(vec![MapDomainEvent::NodeAdded(NodeAdded {
                    map_id,
                    node_id,
                    name,
                    position,
                })])
            }
            NodeCommand::Remove { node_id } => {
                let connections_before = map.connection_count();
                let tasks_before = map.task_count();
                let node = map.remove_node(node_id)?;
                // Removing a node may invalidate task lengths.
                let lengths = analysis::task_lengths(map);
                map.set_task_lengths(&lengths);
                Ok(vec![MapDomainEvent::NodeRemoved(NodeRemoved {
                    map_id,
                    node_id,
                    name: node.name,
                    removed_connections: connections_before - map.connection_count(),
                    removed_tasks: tasks_before - map.task_count(),
                })])
            }
            NodeCommand::Rename { node_id, new_name } => {
                let old_name = map.node(node_id)?.name.clone();
                map.rename_node(node_id, new_name.clone())?;
                Ok(vec![MapDomainEvent::NodeRenamed(NodeRenamed {
                    map_id,
                    node_id,
                    old_name,
                    new_name,
                })])
            }
            NodeCommand::Move { node_id, position } => {
                map.move_node(node_id, position)?;
                Ok(vec![MapDomainEvent::NodeMoved(NodeMoved {
                    map_id,
                    node_id,
                    position,
                })])
            }
        }
    }

    fn process_connection_command(
        &self,
        map: &mut MapGraph,
        command: ConnectionCommand,
    ) -> MapCommandResult<Vec<MapDomainEvent>> {
        let map_id = map.id();
        match command {
            ConnectionCommand::Add {
                source,
                target,
                length,
                color,
            } => {
                let edge_id = map.add_connection(source, target, length, color)?;
                let conn = map.connection(edge_id)?;
                let event = MapDomainEvent::ConnectionAdded(ConnectionAdded {
                    map_id,
                    edge_id,
                    source: conn.source,
                    target: conn.target,
                    length: conn.length,
                    color: conn.color.clone(),
                    connection_index: conn.connection_index,
                });
                // A new connection can shorten task routes.
                let lengths = analysis::task_lengths(map);
                map.set_task_lengths(&lengths);
                Ok(vec![event])
            }
            ConnectionCommand::Remove { edge_id } => {
                let conn = map.remove_connection(edge_id)?;
                let lengths = analysis::task_lengths(map);
                map.set_task_lengths(&lengths);
                Ok(vec![MapDomainEvent::ConnectionRemoved(ConnectionRemoved {
                    map_id,
                    edge_id,
                    length: conn.length,
                    color: conn.color,
                })])
            }
            ConnectionCommand::Recolor { edge_id, color } => {
                let old_color = map.connection(edge_id)?.color.clone();
                map.set_connection_color(edge_id, color.clone())?;
                Ok(vec![MapDomainEvent::ConnectionRecolored(
                    ConnectionRecolored {
                        map_id,
                        edge_id,
                        old_color,
                        new_color: color,
                    },
                )])
            }
            ConnectionCommand::MoveSegment {
                edge_id,
                segment,
                position,
            } => {
                map.move_segment(edge_id, segment, position)?;
                Ok(vec![MapDomainEvent::SegmentMoved(SegmentMoved {
                    map_id,
                    edge_id,
                    segment,
                    position,
                })])
            }
            ConnectionCommand::Straighten { edge_id } => {
                match edge_id {
                    Some(edge_id) => map.straighten_connection(edge_id)?,
                    None => map.straighten_all()?,
                }
                Ok(vec![MapDomainEvent::ConnectionsStraightened(
                    ConnectionsStraightened { map_id, edge_id },
                )])
            }
        }
    }

    fn process_label_command(
        &self,
        map: &mut MapGraph,
        command: LabelCommand,
    ) -> MapCommandResult<Vec<MapDomainEvent>> {
        let map_id = map.id();
        match command {
            LabelCommand::Move { node_id, position } => {
                map.move_label(node_id, position)?;
                Ok(vec![MapDomainEvent::LabelMoved(LabelMoved {
                    map_id,
                    node_id,
                    position,
                })])
            }
            LabelCommand::SetText { node_id, text } => {
                map.set_label_text(node_id, text.clone())?;
                Ok(vec![MapDomainEvent::LabelChanged(LabelChanged {
                    map_id,
                    node_id,
                    text: Some(text),
                    font_size: None,
                })])
            }
            LabelCommand::SetFontSize { node_id, font_size } => {
                map.set_label_font_size(node_id, font_size)?;
                Ok(vec![MapDomainEvent::LabelChanged(LabelChanged {
                    map_id,
                    node_id,
                    text: None,
                    font_size: Some(font_size),
                })])
            }
            LabelCommand::ResetPositions => {
                map.move_labels_to_nodes();
                let events = map
                    .labels()
                    .map(|label| {
                        MapDomainEvent::LabelMoved(LabelMoved {
                            map_id,
                            node_id: label.node_id,
                            position: label.position,
                        })
                    })
                    .collect();
                Ok(events)
            }
        }
    }

    fn process_task_command(
        &self,
        map: &mut MapGraph,
        command: TaskCommand,
    ) -> MapCommandResult<Vec<MapDomainEvent>> {
        let map_id = map.id();
        match command {
            TaskCommand::Add { stops } => {
                let task_id = map.add_task(stops)?;
                let length = analysis::task_length(map, task_id);
                let mut lengths = HashMap::new();
                lengths.insert(task_id, length);
                map.set_task_lengths(&lengths);
                let task = map.task(task_id)?;
                Ok(vec![MapDomainEvent::TaskAdded(TaskAdded {
                    map_id,
                    task_id,
                    name: task.name.clone(),
                    stops: task.stops.clone(),
                })])
            }
            TaskCommand::Remove { task_id } => {
                map.remove_task(task_id)?;
                Ok(vec![MapDomainEvent::TaskRemoved(TaskRemoved {
                    map_id,
                    task_id,
                })])
            }
            TaskCommand::SetPoints {
                task_id,
                points,
                points_bonus,
                points_penalty,
            } => {
                map.set_task_points(task_id, points, points_bonus, points_penalty)?;
                Ok(vec![MapDomainEvent::TaskUpdated(TaskUpdated {
                    map_id,
                    task_id: Some(task_id),
                })])
            }
            TaskCommand::RecomputeLengths => {
                let lengths = analysis::task_lengths(map);
                map.set_task_lengths(&lengths);
                Ok(vec![MapDomainEvent::TaskUpdated(TaskUpdated {
                    map_id,
                    task_id: None,
                })])
            }
        }
    }

    fn process_background_command(
        &self,
        map: &mut MapGraph,
        command: BackgroundCommand,
    ) -> MapCommandResult<Vec<MapDomainEvent>> {
        let map_id = map.id();
        match command {
            BackgroundCommand::Set { image_path } => {
                map.set_background(image_path.clone());
                Ok(vec![MapDomainEvent::BackgroundChanged(BackgroundChanged {
                    map_id,
                    image_path: Some(image_path),
                })])
            }
            BackgroundCommand::Clear => {
                map.clear_background();
                Ok(vec![MapDomainEvent::BackgroundChanged(BackgroundChanged {
                    map_id,
                    image_path: None,
                })])
            }
            BackgroundCommand::SetScale { scale } => {
                map.set_background_scale(scale)?;
                Ok(vec![MapDomainEvent::BackgroundChanged(BackgroundChanged {
                    map_id,
                    image_path: map.background().map(|b| b.image_path.clone()),
                })])
            }
            BackgroundCommand::SetOffset { offset } => {
                map.set_background_offset(offset)?;
                Ok(vec![MapDomainEvent::BackgroundChanged(BackgroundChanged {
                    map_id,
                    image_path: map.background().map(|b| b.image_path.clone()),
                })])
            }
        }
    }
}

impl MapCommandHandler for MapCommandHandlerImpl {
    fn handle_command(
        &self,
        map_id: MapId,
        command: MapCommand,
    ) -> MapCommandResult<Vec<MapDomainEvent>> {
        if let MapCommand::CreateMap { name, description } = command {
            return self.create_map(map_id, name, description);
        }

        let mut map = self.repository.load(map_id)?;
        let events = match command {
            MapCommand::CreateMap { .. } => unreachable!("handled above"),
            MapCommand::ScalePositions { factor } => {
                map.scale_positions(factor)?;
                vec![MapDomainEvent::PositionsScaled(PositionsScaled {
                    map_id,
                    factor,
                })]
            }
            MapCommand::RepairConnections => {
                let repaired = map.repair_connections()?;
                debug!(%map_id, repaired, "repaired connection segment chains");
                vec![MapDomainEvent::ConnectionsStraightened(
                    ConnectionsStraightened {
                        map_id,
                        edge_id: None,
                    },
                )]
            }
            MapCommand::Node(cmd) => self.process_node_command(&mut map, cmd)?,
            MapCommand::Connection(cmd) => self.process_connection_command(&mut map, cmd)?,
            MapCommand::Label(cmd) => self.process_label_command(&mut map, cmd)?,
            MapCommand::Task(cmd) => self.process_task_command(&mut map, cmd)?,
            MapCommand::Background(cmd) => self.process_background_command(&mut map, cmd)?,
        };
        self.repository.save(&map)?;

        for event in &events {
            debug!(%map_id, event_type = event.event_type(), "map event");
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value_objects::{Position2D, RailColor};

    fn handler() -> (MapCommandHandlerImpl, Arc<InMemoryMapRepository>) {
        let repository = Arc::new(InMemoryMapRepository::new());
        (MapCommandHandlerImpl::new(repository.clone()), repository)
    }

    fn create_map(handler: &MapCommandHandlerImpl) -> MapId {
        let map_id = MapId::new();
        handler
            .handle_command(
                map_id,
                MapCommand::CreateMap {
                    name: "Test Board".to_string(),
                    description: "A board for testing".to_string(),
                },
            )
            .unwrap();
        map_id
    }

    #[test]
    fn test_create_map_persists_aggregate() {
        let (handler, repository) = handler();
        let map_id = create_map(&handler);

        assert!(repository.exists(map_id));
        let map = repository.load(map_id).unwrap();
        assert_eq!(map.name(), "Test Board");
    }

    #[test]
    fn test_add_node_emits_event_and_saves() {
        let (handler, repository) = handler();
        let map_id = create_map(&handler);

        let events = handler
            .handle_command(
                map_id,
                MapCommand::Node(NodeCommand::Add {
                    name: "Osgiliath".to_string(),
                    position: Position2D::new(3.0, 4.0),
                }),
            )
            .unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type(), "NodeAdded");
        assert_eq!(repository.load(map_id).unwrap().node_count(), 1);
    }

    #[test]
    fn test_remove_node_reports_cascade() {
        let (handler, repository) = handler();
        let map_id = create_map(&handler);

        let a = match &handler
            .handle_command(
                map_id,
                MapCommand::Node(NodeCommand::Add {
                    name: "Minas Tirith".to_string(),
                    position: Position2D::new(0.0, 0.0),
                }),
            )
            .unwrap()[0]
        {
            MapDomainEvent::NodeAdded(e) => e.node_id,
            _ => panic!("expected NodeAdded"),
        };
        let b = match &handler
            .handle_command(
                map_id,
                MapCommand::Node(NodeCommand::Add {
                    name: "Edoras".to_string(),
                    position: Position2D::new(10.0, 0.0),
                }),
            )
            .unwrap()[0]
        {
            MapDomainEvent::NodeAdded(e) => e.node_id,
            _ => panic!("expected NodeAdded"),
        };
        handler
            .handle_command(
                map_id,
                MapCommand::Connection(ConnectionCommand::Add {
                    source: a,
                    target: b,
                    length: 3,
                    color: RailColor::Green,
                }),
            )
            .unwrap();

        let events = handler
            .handle_command(map_id, MapCommand::Node(NodeCommand::Remove { node_id: a }))
            .unwrap();
        match &events[0] {
            MapDomainEvent::NodeRemoved(e) => {
                assert_eq!(e.removed_connections, 1);
                assert_eq!(e.removed_tasks, 0);
            }
            other => panic!("expected NodeRemoved, got {}", other.event_type()),
        }
        assert_eq!(repository.load(map_id).unwrap().connection_count(), 0);
    }

    #[test]
    fn test_command_against_missing_map_fails() {
        let (handler, _) = handler();
        let result = handler.handle_command(
            MapId::new(),
            MapCommand::Node(NodeCommand::Add {
                name: "Nowhere".to_string(),
                position: Position2D::default(),
            }),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_background_offset_round_trips() {
        let (handler, repository) = handler();
        let map_id = create_map(&handler);

        handler
            .handle_command(
                map_id,
                MapCommand::Background(BackgroundCommand::Set {
                    image_path: std::path::PathBuf::from("board.png"),
                }),
            )
            .unwrap();
        let events = handler
            .handle_command(
                map_id,
                MapCommand::Background(BackgroundCommand::SetOffset {
                    offset: Position2D::new(-4.0, 2.5),
                }),
            )
            .unwrap();

        assert_eq!(events[0].event_type(), "BackgroundChanged");
        let map = repository.load(map_id).unwrap();
        assert_eq!(map.background().unwrap().offset, Position2D::new(-4.0, 2.5));
    }

    #[test]
    fn test_add_task_computes_length() {
        let (handler, repository) = handler();
        let map_id = create_map(&handler);

        let mut ids = Vec::new();
        for (name, x) in [("A", 0.0), ("B", 5.0), ("C", 10.0)] {
            let events = handler
                .handle_command(
                    map_id,
                    MapCommand::Node(NodeCommand::Add {
                        name: name.to_string(),
                        position: Position2D::new(x, 0.0),
                    }),
                )
                .unwrap();
            match &events[0] {
                MapDomainEvent::NodeAdded(e) => ids.push(e.node_id),
                _ => panic!("expected NodeAdded"),
            }
        }
        for pair in ids.windows(2) {
            handler
                .handle_command(
                    map_id,
                    MapCommand::Connection(ConnectionCommand::Add {
                        source: pair[0],
                        target: pair[1],
                        length: 4,
                        color: RailColor::Gray,
                    }),
                )
                .unwrap();
        }

        handler
            .handle_command(
                map_id,
                MapCommand::Task(TaskCommand::Add {
                    stops: vec![ids[0], ids[2]],
                }),
            )
            .unwrap();

        let map = repository.load(map_id).unwrap();
        let task = map.tasks().next().unwrap();
        assert_eq!(task.length, Some(8));
        // Points default to the computed length.
        assert_eq!(task.points, Some(8));
    }
}
