//! Graph analysis over the rail network
//!
//! Builds a `petgraph` view of the map and answers routing questions:
//! shortest paths and their costs, task lengths, node and edge importance,
//! and the distributions shown in the analysis panel.
//!
//! Parallel connections between the same pair of locations collapse to the
//! cheapest one for routing purposes.

use crate::{
    aggregate::MapGraph,
    value_objects::RailColor,
    EdgeId, NodeId, TaskId,
};
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use rand::Rng;
use std::collections::{BTreeMap, HashMap};

/// Routing view of a map's rail connections.
pub struct RailNetwork {
    graph: UnGraph<NodeId, u32>,
    indices: HashMap<NodeId, NodeIndex>,
}

impl RailNetwork {
    /// Build the network from a map
    pub fn from_map(map: &MapGraph) -> Self {
        Self::from_map_excluding(map, None)
    }

    /// Build the network, leaving out one connection.
    ///
    /// Used to measure how much a single connection matters: parallel
    /// connections between the same locations stay in.
    pub fn from_map_excluding(map: &MapGraph, excluded: Option<EdgeId>) -> Self {
        let mut graph = UnGraph::new_undirected();
        let mut indices = HashMap::new();
        for node in map.nodes() {
            indices.insert(node.id, graph.add_node(node.id));
        }
        for conn in map.connections() {
            if Some(conn.id) == excluded {
                continue;
            }
            if let (Some(&a), Some(&b)) = (indices.get(&conn.source), indices.get(&conn.target)) {
                graph.add_edge(a, b, conn.length);
            }
        }
        Self { graph, indices }
    }

    /// Shortest-path cost in rail cars from every location reachable from `from`
    pub fn distances_from(&self, from: NodeId) -> HashMap<NodeId, u32> {
        let Some(&start) = self.indices.get(&from) else {
            return HashMap::new();
        };
        petgraph::algo::dijkstra(&self.graph, start, None, |e| *e.weight())
            .into_iter()
            .map(|(idx, cost)| (self.graph[idx], cost))
            .collect()
    }

    /// Shortest-path cost in rail cars between two locations
    pub fn shortest_path_length(&self, from: NodeId, to: NodeId) -> Option<u32> {
        self.distances_from(from).get(&to).copied()
    }

    /// One shortest path between two locations, as a node sequence
    pub fn shortest_path(&self, from: NodeId, to: NodeId) -> Option<Vec<NodeId>> {
        self.walk_shortest_path(from, to)
    }

    /// A uniformly sampled shortest path between two locations.
    ///
    /// All shortest paths are enumerated and one is drawn at random, so every
    /// path is equally likely no matter how the branching is distributed.
    pub fn random_shortest_path(
        &self,
        from: NodeId,
        to: NodeId,
        rng: &mut impl Rng,
    ) -> Option<Vec<NodeId>> {
        let mut paths = self.all_shortest_paths(from, to);
        if paths.is_empty() {
            return None;
        }
        let index = rng.gen_range(0..paths.len());
        Some(paths.swap_remove(index))
    }

    /// All shortest paths between two locations
    pub fn all_shortest_paths(&self, from: NodeId, to: NodeId) -> Vec<Vec<NodeId>> {
        let dist_to = self.distances_from(to);
        if !dist_to.contains_key(&from) {
            return Vec::new();
        }
        let mut paths = Vec::new();
        let mut current = vec![from];
        self.collect_paths(&dist_to, to, &mut current, &mut paths);
        paths
    }

    fn collect_paths(
        &self,
        dist_to: &HashMap<NodeId, u32>,
        to: NodeId,
        current: &mut Vec<NodeId>,
        paths: &mut Vec<Vec<NodeId>>,
    ) {
        let head = current[current.len() - 1];
        if head == to {
            paths.push(current.clone());
            return;
        }
        for next in self.tight_neighbors(dist_to, head) {
            current.push(next);
            self.collect_paths(dist_to, to, current, paths);
            current.pop();
        }
    }

    /// Walk from `from` towards `to` along tight edges, taking the first
    /// candidate at each step.
    fn walk_shortest_path(&self, from: NodeId, to: NodeId) -> Option<Vec<NodeId>> {
        let dist_to = self.distances_from(to);
        dist_to.get(&from)?;

        let mut path = vec![from];
        let mut head = from;
        while head != to {
            let candidates = self.tight_neighbors(&dist_to, head);
            if candidates.is_empty() {
                return None;
            }
            head = candidates[0];
            path.push(head);
        }
        Some(path)
    }

    /// Neighbors of `node` that lie on some shortest path towards the node
    /// `dist_to` was computed from. Duplicates from parallel connections are
    /// removed so branching is uniform over locations.
    fn tight_neighbors(&self, dist_to: &HashMap<NodeId, u32>, node: NodeId) -> Vec<NodeId> {
        let Some(&idx) = self.indices.get(&node) else {
            return Vec::new();
        };
        let Some(&here) = dist_to.get(&node) else {
            return Vec::new();
        };
        let mut result = Vec::new();
        for edge in self.graph.edges(idx) {
            let other_idx = if edge.source() == idx {
                edge.target()
            } else {
                edge.source()
            };
            let other = self.graph[other_idx];
            if let Some(&there) = dist_to.get(&other) {
                if there + *edge.weight() == here && !result.contains(&other) {
                    result.push(other);
                }
            }
        }
        result
    }
}

/// Shortest-path length of a single task, summed over consecutive stops
pub fn task_length(map: &MapGraph, task_id: TaskId) -> Option<u32> {
    let task = map.task(task_id).ok()?;
    let network = RailNetwork::from_map(map);
    task_length_in(&network, &task.stops)
}

/// Shortest-path lengths for every task; unreachable tasks map to `None`
pub fn task_lengths(map: &MapGraph) -> HashMap<TaskId, Option<u32>> {
    let network = RailNetwork::from_map(map);
    map.tasks()
        .map(|task| (task.id, task_length_in(&network, &task.stops)))
        .collect()
}

/// Mean length over the tasks whose route exists
pub fn average_task_length(map: &MapGraph) -> Option<f64> {
    let lengths: Vec<u32> = task_lengths(map).into_values().flatten().collect();
    if lengths.is_empty() {
        return None;
    }
    Some(lengths.iter().map(|&l| f64::from(l)).sum::<f64>() / lengths.len() as f64)
}

fn task_length_in(network: &RailNetwork, stops: &[NodeId]) -> Option<u32> {
    let mut total = 0u32;
    for leg in stops.windows(2) {
        total += network.shortest_path_length(leg[0], leg[1])?;
    }
    Some(total)
}

/// Node importance scores in `[0, 1]`.
///
/// For every pair of locations, `samples_per_pair` random shortest paths are
/// drawn and each visited location counted; counts are normalized by the
/// maximum.
pub fn node_importance(
    map: &MapGraph,
    samples_per_pair: usize,
    rng: &mut impl Rng,
) -> HashMap<NodeId, f64> {
    let network = RailNetwork::from_map(map);
    let ids: Vec<NodeId> = map.nodes().map(|n| n.id).collect();
    let mut counts: HashMap<NodeId, u64> = ids.iter().map(|&id| (id, 0)).collect();

    for (i, &from) in ids.iter().enumerate() {
        for &to in &ids[i + 1..] {
            for _ in 0..samples_per_pair {
                let Some(path) = network.random_shortest_path(from, to, rng) else {
                    break;
                };
                for node in path {
                    if let Some(count) = counts.get_mut(&node) {
                        *count += 1;
                    }
                }
            }
        }
    }

    let max = counts.values().copied().max().unwrap_or(0);
    counts
        .into_iter()
        .map(|(id, count)| {
            let score = if max == 0 {
                0.0
            } else {
                count as f64 / max as f64
            };
            (id, score)
        })
        .collect()
}

/// What removing a connection does to the tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeImpact {
    /// No task gets longer
    Neutral,
    /// The largest task-length increase, in rail cars
    LengthIncrease(u32),
    /// Number of tasks that become impossible
    DisconnectsTasks(usize),
}

/// Impact of removing each connection on the task routes
pub fn edge_importance(map: &MapGraph) -> HashMap<EdgeId, EdgeImpact> {
    let base = task_lengths(map);
    let mut result = HashMap::new();

    for conn in map.connections() {
        let network = RailNetwork::from_map_excluding(map, Some(conn.id));
        let mut disconnected = 0usize;
        let mut max_increase = 0u32;
        for task in map.tasks() {
            let Some(Some(before)) = base.get(&task.id) else {
                continue;
            };
            match task_length_in(&network, &task.stops) {
                Some(after) => max_increase = max_increase.max(after.saturating_sub(*before)),
                None => disconnected += 1,
            }
        }
        let impact = if disconnected > 0 {
            EdgeImpact::DisconnectsTasks(disconnected)
        } else if max_increase > 0 {
            EdgeImpact::LengthIncrease(max_increase)
        } else {
            EdgeImpact::Neutral
        };
        result.insert(conn.id, impact);
    }
    result
}

/// Per-color connection usage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColorUsage {
    /// Number of connections with this color
    pub connections: usize,
    /// Total rail cars over those connections
    pub cars: u32,
}

/// How many locations have each degree (parallel connections count separately)
pub fn degree_distribution(map: &MapGraph) -> BTreeMap<usize, usize> {
    let mut degrees: HashMap<NodeId, usize> = map.nodes().map(|n| (n.id, 0)).collect();
    for conn in map.connections() {
        for endpoint in [conn.source, conn.target] {
            if let Some(degree) = degrees.get_mut(&endpoint) {
                *degree += 1;
            }
        }
    }
    let mut result = BTreeMap::new();
    for degree in degrees.into_values() {
        *result.entry(degree).or_insert(0) += 1;
    }
    result
}

/// How many connections have each length
pub fn edge_length_distribution(map: &MapGraph) -> BTreeMap<u32, usize> {
    let mut result = BTreeMap::new();
    for conn in map.connections() {
        *result.entry(conn.length).or_insert(0) += 1;
    }
    result
}

/// Connection count and total cars per rail color
pub fn color_distribution(map: &MapGraph) -> HashMap<RailColor, ColorUsage> {
    let mut result: HashMap<RailColor, ColorUsage> = HashMap::new();
    for conn in map.connections() {
        let usage = result.entry(conn.color.clone()).or_default();
        usage.connections += 1;
        usage.cars += conn.length;
    }
    result
}

/// How many tasks have each shortest-path length
pub fn task_length_distribution(map: &MapGraph) -> BTreeMap<u32, usize> {
    let mut result = BTreeMap::new();
    for length in task_lengths(map).into_values().flatten() {
        *result.entry(length).or_insert(0) += 1;
    }
    result
}

/// How many tasks award each point value
pub fn task_points_distribution(map: &MapGraph) -> BTreeMap<u32, usize> {
    let mut result = BTreeMap::new();
    for task in map.tasks() {
        if let Some(points) = task.points {
            *result.entry(points).or_insert(0) += 1;
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MapId;
    use crate::value_objects::Position2D;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn line_map(lengths: &[u32]) -> (MapGraph, Vec<NodeId>) {
        let mut map = MapGraph::new(MapId::new(), "Line", "");
        let mut ids = Vec::new();
        for i in 0..=lengths.len() {
            let id = map
                .add_node(format!("N{i}"), Position2D::new(i as f64 * 5.0, 0.0))
                .unwrap();
            ids.push(id);
        }
        for (i, &length) in lengths.iter().enumerate() {
            map.add_connection(ids[i], ids[i + 1], length, RailColor::Gray)
                .unwrap();
        }
        (map, ids)
    }

    #[test]
    fn test_shortest_path_length_sums_legs() {
        let (map, ids) = line_map(&[2, 3, 4]);
        let network = RailNetwork::from_map(&map);
        assert_eq!(network.shortest_path_length(ids[0], ids[3]), Some(9));
        assert_eq!(
            network.shortest_path(ids[0], ids[3]),
            Some(vec![ids[0], ids[1], ids[2], ids[3]])
        );
    }

    #[test]
    fn test_unreachable_pair_has_no_path() {
        let mut map = MapGraph::new(MapId::new(), "Split", "");
        let a = map.add_node("A", Position2D::new(0.0, 0.0)).unwrap();
        let b = map.add_node("B", Position2D::new(5.0, 0.0)).unwrap();
        let network = RailNetwork::from_map(&map);
        assert_eq!(network.shortest_path_length(a, b), None);
        assert_eq!(network.shortest_path(a, b), None);
    }

    #[test]
    fn test_parallel_connections_collapse_to_cheapest() {
        let mut map = MapGraph::new(MapId::new(), "Parallel", "");
        let a = map.add_node("A", Position2D::new(0.0, 0.0)).unwrap();
        let b = map.add_node("B", Position2D::new(5.0, 0.0)).unwrap();
        map.add_connection(a, b, 6, RailColor::Red).unwrap();
        map.add_connection(a, b, 2, RailColor::Blue).unwrap();

        let network = RailNetwork::from_map(&map);
        assert_eq!(network.shortest_path_length(a, b), Some(2));
    }

    #[test]
    fn test_all_shortest_paths_in_diamond() {
        let mut map = MapGraph::new(MapId::new(), "Diamond", "");
        let a = map.add_node("A", Position2D::new(0.0, 0.0)).unwrap();
        let b = map.add_node("B", Position2D::new(5.0, 5.0)).unwrap();
        let c = map.add_node("C", Position2D::new(5.0, -5.0)).unwrap();
        let d = map.add_node("D", Position2D::new(10.0, 0.0)).unwrap();
        for (x, y) in [(a, b), (a, c), (b, d), (c, d)] {
            map.add_connection(x, y, 3, RailColor::Gray).unwrap();
        }

        let network = RailNetwork::from_map(&map);
        let paths = network.all_shortest_paths(a, d);
        assert_eq!(paths.len(), 2);
        for path in &paths {
            assert_eq!(path.len(), 3);
            assert_eq!(path[0], a);
            assert_eq!(path[2], d);
        }

        let mut rng = StdRng::seed_from_u64(7);
        let sampled = network.random_shortest_path(a, d, &mut rng).unwrap();
        assert!(paths.contains(&sampled));
    }

    #[test]
    fn test_random_shortest_path_samples_paths_uniformly() {
        // Three shortest paths of cost 3: one over X and two over Y. A
        // per-step walker would give the X path half the draws; uniform
        // sampling gives each path a third.
        let mut map = MapGraph::new(MapId::new(), "Fan", "");
        let a = map.add_node("A", Position2D::new(0.0, 0.0)).unwrap();
        let x = map.add_node("X", Position2D::new(5.0, 5.0)).unwrap();
        let y = map.add_node("Y", Position2D::new(5.0, -5.0)).unwrap();
        let z = map.add_node("Z", Position2D::new(10.0, -8.0)).unwrap();
        let w = map.add_node("W", Position2D::new(10.0, -2.0)).unwrap();
        let d = map.add_node("D", Position2D::new(15.0, 0.0)).unwrap();
        map.add_connection(a, x, 1, RailColor::Gray).unwrap();
        map.add_connection(x, d, 2, RailColor::Gray).unwrap();
        map.add_connection(a, y, 1, RailColor::Gray).unwrap();
        map.add_connection(y, z, 1, RailColor::Gray).unwrap();
        map.add_connection(z, d, 1, RailColor::Gray).unwrap();
        map.add_connection(y, w, 1, RailColor::Gray).unwrap();
        map.add_connection(w, d, 1, RailColor::Gray).unwrap();

        let network = RailNetwork::from_map(&map);
        let paths = network.all_shortest_paths(a, d);
        assert_eq!(paths.len(), 3);

        let mut rng = StdRng::seed_from_u64(13);
        let samples = 300;
        let mut via_x = 0;
        for _ in 0..samples {
            let path = network.random_shortest_path(a, d, &mut rng).unwrap();
            assert!(paths.contains(&path));
            if path.contains(&x) {
                via_x += 1;
            }
        }
        // Expect about a third; a step-biased walker lands near half.
        assert!(via_x > 75 && via_x < 125, "via_x = {via_x}");
    }

    #[test]
    fn test_task_lengths_and_average() {
        let (mut map, ids) = line_map(&[2, 3, 4]);
        let t1 = map.add_task(vec![ids[0], ids[2]]).unwrap();
        let t2 = map.add_task(vec![ids[1], ids[3]]).unwrap();

        let lengths = task_lengths(&map);
        assert_eq!(lengths[&t1], Some(5));
        assert_eq!(lengths[&t2], Some(7));
        map.set_task_lengths(&lengths);
        assert_eq!(average_task_length(&map), Some(6.0));
    }

    #[test]
    fn test_edge_importance_detects_disconnection() {
        let (mut map, ids) = line_map(&[2, 3]);
        map.add_task(vec![ids[0], ids[2]]).unwrap();

        let importance = edge_importance(&map);
        // Every connection on a line is a bridge for the task.
        for impact in importance.values() {
            assert_eq!(*impact, EdgeImpact::DisconnectsTasks(1));
        }
    }

    #[test]
    fn test_edge_importance_detour_increase() {
        let mut map = MapGraph::new(MapId::new(), "Triangle", "");
        let a = map.add_node("A", Position2D::new(0.0, 0.0)).unwrap();
        let b = map.add_node("B", Position2D::new(5.0, 0.0)).unwrap();
        let c = map.add_node("C", Position2D::new(2.5, 5.0)).unwrap();
        let direct = map.add_connection(a, b, 1, RailColor::Red).unwrap();
        map.add_connection(a, c, 2, RailColor::Gray).unwrap();
        map.add_connection(c, b, 2, RailColor::Gray).unwrap();
        map.add_task(vec![a, b]).unwrap();

        let importance = edge_importance(&map);
        // Losing the direct connection forces the detour through C.
        assert_eq!(importance[&direct], EdgeImpact::LengthIncrease(3));
    }

    #[test]
    fn test_node_importance_favors_cut_vertex() {
        let (map, ids) = line_map(&[2, 2]);
        let mut rng = StdRng::seed_from_u64(42);
        let importance = node_importance(&map, 3, &mut rng);
        // The middle node sits on every path.
        assert_eq!(importance[&ids[1]], 1.0);
    }

    #[test]
    fn test_distributions() {
        let (mut map, ids) = line_map(&[2, 2, 5]);
        let first = map.connections().next().unwrap().id;
        map.set_connection_color(first, RailColor::Red).unwrap();
        let t = map.add_task(vec![ids[0], ids[3]]).unwrap();
        let lengths = task_lengths(&map);
        map.set_task_lengths(&lengths);
        map.set_task_points(t, Some(11), None, None).unwrap();

        assert_eq!(degree_distribution(&map), BTreeMap::from([(1, 2), (2, 2)]));
        assert_eq!(
            edge_length_distribution(&map),
            BTreeMap::from([(2, 2), (5, 1)])
        );
        let colors = color_distribution(&map);
        assert_eq!(colors[&RailColor::Red].connections, 1);
        assert_eq!(colors[&RailColor::Gray].cars, 7);
        assert_eq!(task_length_distribution(&map), BTreeMap::from([(9, 1)]));
        assert_eq!(task_points_distribution(&map), BTreeMap::from([(11, 1)]));
    }
}
