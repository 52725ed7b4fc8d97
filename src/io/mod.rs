//! Map definition files and project persistence
//!
//! Map definition files are plain text with ` ; ` separated fields:
//! locations (one name per line), paths (`A ; B ; length ; color`), and
//! tasks (`A ; B` with an optional length). Projects are versioned JSON
//! documents carrying the whole aggregate plus the simulation parameters.

use crate::{
    aggregate::MapGraph,
    layout::SimulationParams,
    value_objects::{Position2D, RailColor},
    MapId, NodeId,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

/// Current project file format version
pub const PROJECT_VERSION: u32 = 1;

/// Errors that can occur while reading or writing map files
#[derive(Debug, Error)]
pub enum MapIoError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed line {line}: {reason}: {content:?}")]
    MalformedLine {
        /// 1-based line number
        line: usize,
        /// What was wrong with it
        reason: String,
        /// The offending line
        content: String,
    },

    #[error("Unknown location: {0}")]
    UnknownLocation(String),

    #[error("Unsupported project version {0}")]
    UnsupportedVersion(u32),

    #[error("Map error: {0}")]
    Map(#[from] crate::commands::MapCommandError),
}

/// Result type for IO operations
pub type MapIoResult<T> = Result<T, MapIoError>;

/// A parsed path line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathDefinition {
    /// First location name
    pub from: String,
    /// Second location name
    pub to: String,
    /// Number of rail cars
    pub length: u32,
    /// Rail color
    pub color: RailColor,
}

/// A parsed task line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDefinition {
    /// First location name
    pub from: String,
    /// Second location name
    pub to: String,
    /// Optional precomputed length
    pub length: Option<u32>,
}

/// Read location names, one per line. Blank lines are skipped and
/// surrounding whitespace is trimmed.
pub fn read_locations(path: &Path) -> MapIoResult<Vec<String>> {
    let content = fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

/// Read path definitions: `A ; B ; length ; color` per line
pub fn read_paths(path: &Path) -> MapIoResult<Vec<PathDefinition>> {
    let content = fs::read_to_string(path)?;
    let mut paths = Vec::new();
    for (line_no, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(';').map(str::trim).collect();
        if fields.len() != 4 {
            return Err(MapIoError::MalformedLine {
                line: line_no + 1,
                reason: format!("expected 4 fields, found {}", fields.len()),
                content: line.to_string(),
            });
        }
        let length: u32 = fields[2].parse().map_err(|_| MapIoError::MalformedLine {
            line: line_no + 1,
            reason: format!("invalid length {:?}", fields[2]),
            content: line.to_string(),
        })?;
        paths.push(PathDefinition {
            from: fields[0].to_string(),
            to: fields[1].to_string(),
            length,
            color: RailColor::parse(fields[3]),
        });
    }
    Ok(paths)
}

/// Read task definitions: `A ; B` per line, with an optional third length
/// field
pub fn read_tasks(path: &Path) -> MapIoResult<Vec<TaskDefinition>> {
    let content = fs::read_to_string(path)?;
    let mut tasks = Vec::new();
    for (line_no, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(';').map(str::trim).collect();
        if fields.len() != 2 && fields.len() != 3 {
            return Err(MapIoError::MalformedLine {
                line: line_no + 1,
                reason: format!("expected 2 or 3 fields, found {}", fields.len()),
                content: line.to_string(),
            });
        }
        let length = match fields.get(2) {
            Some(field) => Some(field.parse().map_err(|_| MapIoError::MalformedLine {
                line: line_no + 1,
                reason: format!("invalid length {:?}", field),
                content: line.to_string(),
            })?),
            None => None,
        };
        tasks.push(TaskDefinition {
            from: fields[0].to_string(),
            to: fields[1].to_string(),
            length,
        });
    }
    Ok(tasks)
}

/// Build a map from parsed definitions.
///
/// Locations are placed evenly on a circle; paths and tasks that reference
/// an unknown location fail the import.
pub fn assemble_map(
    name: &str,
    locations: &[String],
    paths: &[PathDefinition],
    tasks: &[TaskDefinition],
) -> MapIoResult<MapGraph> {
    let mut map = MapGraph::new(MapId::new(), name, "");

    let count = locations.len().max(1) as f64;
    let radius = 10.0 * count / std::f64::consts::TAU;
    let mut by_name: HashMap<&str, NodeId> = HashMap::new();
    for (i, name) in locations.iter().enumerate() {
        let angle = std::f64::consts::TAU * i as f64 / count;
        let position = Position2D::new(radius * angle.cos(), radius * angle.sin());
        let node_id = map.add_node(name.clone(), position)?;
        by_name.insert(name.as_str(), node_id);
    }

    let resolve = |name: &str| -> MapIoResult<NodeId> {
        by_name
            .get(name)
            .copied()
            .ok_or_else(|| MapIoError::UnknownLocation(name.to_string()))
    };
    for path in paths {
        map.add_connection(
            resolve(&path.from)?,
            resolve(&path.to)?,
            path.length,
            path.color.clone(),
        )?;
    }
    for task in tasks {
        let task_id = map.add_task(vec![resolve(&task.from)?, resolve(&task.to)?])?;
        let length = match task.length {
            Some(length) => Some(length),
            None => crate::analysis::task_length(&map, task_id),
        };
        if length.is_none() {
            warn!(from = %task.from, to = %task.to, "task has no route");
        }
        let mut lengths = HashMap::new();
        lengths.insert(task_id, length);
        map.set_task_lengths(&lengths);
    }

    info!(
        locations = map.node_count(),
        paths = map.connection_count(),
        tasks = map.task_count(),
        "assembled map from definition files"
    );
    Ok(map)
}

/// Versioned on-disk project document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectDocument {
    /// Format version, see [`PROJECT_VERSION`]
    pub version: u32,
    /// The full map aggregate
    pub map: MapGraph,
    /// Simulation parameters of the layout optimizer
    pub simulation: SimulationParams,
}

/// Save a project as pretty-printed JSON
pub fn save_project(
    path: &Path,
    map: &MapGraph,
    simulation: SimulationParams,
) -> MapIoResult<()> {
    let document = ProjectDocument {
        version: PROJECT_VERSION,
        map: map.clone(),
        simulation,
    };
    let json = serde_json::to_string_pretty(&document)?;
    fs::write(path, json)?;
    info!(path = %path.display(), "saved project");
    Ok(())
}

/// Load a project, rejecting unknown format versions
pub fn load_project(path: &Path) -> MapIoResult<(MapGraph, SimulationParams)> {
    let json = fs::read_to_string(path)?;
    let document: ProjectDocument = serde_json::from_str(&json)?;
    if document.version != PROJECT_VERSION {
        return Err(MapIoError::UnsupportedVersion(document.version));
    }
    info!(path = %path.display(), "loaded project");
    Ok((document.map, document.simulation))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn temp_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_read_locations_skips_blanks() {
        let file = temp_file("Nargothrond\n\n  Gondolin  \nMenegroth\n");
        let locations = read_locations(file.path()).unwrap();
        assert_eq!(locations, vec!["Nargothrond", "Gondolin", "Menegroth"]);
    }

    #[test]
    fn test_read_paths() {
        let file = temp_file("Nargothrond ; Gondolin ; 4 ; red\nGondolin ; Menegroth ; 2 ; #8b4513\n");
        let paths = read_paths(file.path()).unwrap();
        assert_eq!(paths.len(), 2);
        assert_eq!(paths[0].length, 4);
        assert_eq!(paths[0].color, RailColor::Red);
        assert_eq!(paths[1].color, RailColor::Custom("#8b4513".to_string()));
    }

    #[test]
    fn test_read_paths_rejects_bad_length() {
        let file = temp_file("A ; B ; four ; red\n");
        match read_paths(file.path()) {
            Err(MapIoError::MalformedLine { line, .. }) => assert_eq!(line, 1),
            other => panic!("expected MalformedLine, got {other:?}"),
        }
    }

    #[test]
    fn test_read_tasks_with_and_without_length() {
        let file = temp_file("A ; B ; 7\nC ; D\n");
        let tasks = read_tasks(file.path()).unwrap();
        assert_eq!(tasks[0].length, Some(7));
        assert_eq!(tasks[1].length, None);
    }

    #[test]
    fn test_assemble_map_resolves_names() {
        let locations = vec!["A".to_string(), "B".to_string(), "C".to_string()];
        let paths = vec![
            PathDefinition {
                from: "A".to_string(),
                to: "B".to_string(),
                length: 3,
                color: RailColor::Green,
            },
            PathDefinition {
                from: "B".to_string(),
                to: "C".to_string(),
                length: 2,
                color: RailColor::Blue,
            },
        ];
        let tasks = vec![TaskDefinition {
            from: "A".to_string(),
            to: "C".to_string(),
            length: None,
        }];

        let map = assemble_map("Beleriand", &locations, &paths, &tasks).unwrap();
        assert_eq!(map.node_count(), 3);
        assert_eq!(map.connection_count(), 2);
        // The missing task length is computed from the shortest path.
        assert_eq!(map.tasks().next().unwrap().length, Some(5));
    }

    #[test]
    fn test_assemble_map_rejects_unknown_location() {
        let locations = vec!["A".to_string()];
        let paths = vec![PathDefinition {
            from: "A".to_string(),
            to: "Z".to_string(),
            length: 1,
            color: RailColor::Gray,
        }];
        match assemble_map("Broken", &locations, &paths, &[]) {
            Err(MapIoError::UnknownLocation(name)) => assert_eq!(name, "Z"),
            other => panic!("expected UnknownLocation, got {other:?}"),
        }
    }

    #[test]
    fn test_project_roundtrip() {
        let locations = vec!["A".to_string(), "B".to_string()];
        let paths = vec![PathDefinition {
            from: "A".to_string(),
            to: "B".to_string(),
            length: 2,
            color: RailColor::Red,
        }];
        let map = assemble_map("Roundtrip", &locations, &paths, &[]).unwrap();

        let file = NamedTempFile::new().unwrap();
        save_project(file.path(), &map, SimulationParams::default()).unwrap();
        let (loaded, params) = load_project(file.path()).unwrap();

        assert_eq!(loaded.id(), map.id());
        assert_eq!(loaded.node_count(), 2);
        assert_eq!(loaded.connection_count(), 1);
        assert_eq!(params, SimulationParams::default());
    }

    #[test]
    fn test_load_rejects_unknown_version() {
        let map = MapGraph::new(MapId::new(), "V", "");
        let document = ProjectDocument {
            version: 99,
            map,
            simulation: SimulationParams::default(),
        };
        let file = temp_file(&serde_json::to_string(&document).unwrap());
        match load_project(file.path()) {
            Err(MapIoError::UnsupportedVersion(99)) => {}
            other => panic!("expected UnsupportedVersion, got {other:?}"),
        }
    }
}
