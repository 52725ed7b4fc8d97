//! In-memory map repository

use super::MapRepository;
use crate::{
    aggregate::MapGraph,
    commands::{MapCommandError, MapCommandResult},
    MapId,
};
use parking_lot::RwLock;
use std::collections::HashMap;

/// In-memory implementation of [`MapRepository`].
///
/// Backs a single editing session; persistence to disk goes through the
/// project file format instead.
#[derive(Debug, Default)]
pub struct InMemoryMapRepository {
    maps: RwLock<HashMap<MapId, MapGraph>>,
}

impl InMemoryMapRepository {
    /// Create an empty repository
    pub fn new() -> Self {
        Self::default()
    }

    /// IDs of all stored maps
    pub fn map_ids(&self) -> Vec<MapId> {
        self.maps.read().keys().copied().collect()
    }
}

impl MapRepository for InMemoryMapRepository {
    fn load(&self, map_id: MapId) -> MapCommandResult<MapGraph> {
        self.maps
            .read()
            .get(&map_id)
            .cloned()
            .ok_or(MapCommandError::MapNotFound(map_id))
    }

    fn save(&self, map: &MapGraph) -> MapCommandResult<()> {
        self.maps.write().insert(map.id(), map.clone());
        Ok(())
    }

    fn exists(&self, map_id: MapId) -> bool {
        self.maps.read().contains_key(&map_id)
    }

    fn remove(&self, map_id: MapId) -> MapCommandResult<()> {
        self.maps
            .write()
            .remove(&map_id)
            .map(|_| ())
            .ok_or(MapCommandError::MapNotFound(map_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load_roundtrip() {
        let repository = InMemoryMapRepository::new();
        let map = MapGraph::new(MapId::new(), "Board", "");
        repository.save(&map).unwrap();

        let loaded = repository.load(map.id()).unwrap();
        assert_eq!(loaded.name(), "Board");
        assert_eq!(repository.map_ids(), vec![map.id()]);
    }

    #[test]
    fn test_load_missing_map_fails() {
        let repository = InMemoryMapRepository::new();
        let missing = MapId::new();
        match repository.load(missing) {
            Err(MapCommandError::MapNotFound(id)) => assert_eq!(id, missing),
            other => panic!("expected MapNotFound, got {:?}", other.map(|m| m.id())),
        }
    }

    #[test]
    fn test_remove_map() {
        let repository = InMemoryMapRepository::new();
        let map = MapGraph::new(MapId::new(), "Board", "");
        repository.save(&map).unwrap();
        repository.remove(map.id()).unwrap();
        assert!(!repository.exists(map.id()));
    }
}
