//! Force-based layout optimization
//!
//! Treats every node, rail-car segment, and label as a particle. Nodes are
//! pulled towards their anchor position, segment chains towards their
//! endpoints and neighboring segments, labels towards their nodes, and
//! nearby particles push each other apart. Running the simulation relaxes a
//! hand-drawn map into an evenly spaced one without tearing it apart.

use crate::{
    aggregate::MapGraph,
    commands::MapCommandResult,
    value_objects::Position2D,
    EdgeId, NodeId,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Tunable parameters of the particle simulation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationParams {
    /// Velocity multiplier applied every step
    pub velocity_decay: f64,
    /// Attraction between consecutive segments of a chain
    pub edge_edge_attraction: f64,
    /// Attraction between a chain's end segments and their endpoint nodes
    pub edge_node_attraction: f64,
    /// Attraction between a label and its node
    pub node_label_attraction: f64,
    /// Attraction between a node and its anchor position
    pub node_target_attraction: f64,
    /// Mass of node particles
    pub node_mass: f64,
    /// Mass of segment particles
    pub edge_mass: f64,
    /// Mass of label particles
    pub label_mass: f64,
    /// Distance below which particles repel each other
    pub interaction_radius: f64,
    /// Strength of the pairwise repulsion
    pub repulsion_strength: f64,
    /// Integration time step
    pub time_step: f64,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            velocity_decay: 0.99,
            edge_edge_attraction: 0.1,
            edge_node_attraction: 0.1,
            node_label_attraction: 0.1,
            node_target_attraction: 0.1,
            node_mass: 1.0,
            edge_mass: 1.0,
            label_mass: 1.0,
            interaction_radius: 15.0,
            repulsion_strength: 2.0,
            time_step: 0.02,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ParticleKind {
    Node(NodeId),
    Segment(EdgeId, usize),
    Label(NodeId),
}

#[derive(Debug, Clone)]
struct Particle {
    kind: ParticleKind,
    position: Position2D,
    velocity: Position2D,
    mass: f64,
    /// Approximate particle extent, used for the repulsion range
    radius: f64,
}

/// Particle simulation over a map snapshot.
///
/// Build it from a map, run some iterations, then write the relaxed
/// positions back with [`LayoutEngine::apply_to`].
pub struct LayoutEngine {
    params: SimulationParams,
    particles: Vec<Particle>,
    /// Node anchor positions the simulation pulls the nodes back towards
    anchors: HashMap<NodeId, Position2D>,
}

impl LayoutEngine {
    /// Snapshot a map into particles
    pub fn from_map(map: &MapGraph, params: SimulationParams) -> Self {
        let mut particles = Vec::new();
        let mut anchors = HashMap::new();

        for node in map.nodes() {
            anchors.insert(node.id, node.position);
            particles.push(Particle {
                kind: ParticleKind::Node(node.id),
                position: node.position,
                velocity: Position2D::default(),
                mass: params.node_mass,
                radius: node.radius,
            });
        }
        for conn in map.connections() {
            for (i, segment) in conn.segments.iter().enumerate() {
                particles.push(Particle {
                    kind: ParticleKind::Segment(conn.id, i),
                    position: segment.position,
                    velocity: Position2D::default(),
                    mass: params.edge_mass,
                    radius: 1.5,
                });
            }
        }
        for label in map.labels() {
            particles.push(Particle {
                kind: ParticleKind::Label(label.node_id),
                position: label.position,
                velocity: Position2D::default(),
                mass: params.label_mass,
                radius: label.font_size.max(1.0),
            });
        }

        Self {
            params,
            particles,
            anchors,
        }
    }

    /// Advance the simulation by one time step
    pub fn step(&mut self) {
        let forces = self.compute_forces();
        let dt = self.params.time_step;
        for (particle, force) in self.particles.iter_mut().zip(forces) {
            let acceleration = force * (1.0 / particle.mass);
            particle.velocity = (particle.velocity + acceleration * dt) * self.params.velocity_decay;
            particle.position = particle.position + particle.velocity * dt;
        }
    }

    /// Run a number of simulation steps
    pub fn run(&mut self, iterations: usize) {
        for _ in 0..iterations {
            self.step();
        }
        debug!(iterations, particles = self.particles.len(), "layout iterations done");
    }

    fn compute_forces(&self) -> Vec<Position2D> {
        let index: HashMap<ParticleKind, usize> = self
            .particles
            .iter()
            .enumerate()
            .map(|(i, p)| (p.kind, i))
            .collect();
        let mut forces = vec![Position2D::default(); self.particles.len()];

        for (i, particle) in self.particles.iter().enumerate() {
            match particle.kind {
                ParticleKind::Node(node_id) => {
                    if let Some(anchor) = self.anchors.get(&node_id) {
                        forces[i] = forces[i]
                            + attraction(particle.position, *anchor, self.params.node_target_attraction);
                    }
                }
                ParticleKind::Segment(edge_id, seg) => {
                    // End segments are pulled to their endpoint node, inner
                    // segments to both neighbors in the chain.
                    if let Some(&prev) = index.get(&ParticleKind::Segment(edge_id, seg.wrapping_sub(1)))
                    {
                        forces[i] = forces[i]
                            + attraction(
                                particle.position,
                                self.particles[prev].position,
                                self.params.edge_edge_attraction,
                            );
                    }
                    if let Some(&next) = index.get(&ParticleKind::Segment(edge_id, seg + 1)) {
                        forces[i] = forces[i]
                            + attraction(
                                particle.position,
                                self.particles[next].position,
                                self.params.edge_edge_attraction,
                            );
                    }
                }
                ParticleKind::Label(node_id) => {
                    if let Some(&node) = index.get(&ParticleKind::Node(node_id)) {
                        // Labels follow their node linearly.
                        let delta = self.particles[node].position - particle.position;
                        forces[i] = forces[i] + delta * self.params.node_label_attraction;
                    }
                }
            }
        }

        // Repulsion between nearby particles
        for i in 0..self.particles.len() {
            for j in (i + 1)..self.particles.len() {
                let a = &self.particles[i];
                let b = &self.particles[j];
                let distance = a.position.distance_to(&b.position);
                if distance >= self.params.interaction_radius || distance <= f64::EPSILON {
                    continue;
                }
                let overlap = (a.radius + b.radius - distance).max(0.0);
                if overlap <= 0.0 {
                    continue;
                }
                let direction = (a.position - b.position) * (1.0 / distance);
                let push = direction * (overlap * self.params.repulsion_strength);
                forces[i] = forces[i] + push;
                forces[j] = forces[j] - push;
            }
        }

        forces
    }

    /// Write the relaxed particle positions back into the map
    pub fn apply_to(&self, map: &mut MapGraph) -> MapCommandResult<()> {
        for particle in &self.particles {
            match particle.kind {
                ParticleKind::Node(node_id) => {
                    if map.contains_node(node_id) {
                        map.move_node(node_id, particle.position)?;
                    }
                }
                ParticleKind::Label(node_id) => {
                    if map.contains_node(node_id) {
                        map.move_label(node_id, particle.position)?;
                    }
                }
                ParticleKind::Segment(..) => {}
            }
        }
        // Segments go last so their rotation realigns against the moved nodes.
        for particle in &self.particles {
            if let ParticleKind::Segment(edge_id, seg) = particle.kind {
                if map.contains_connection(edge_id) {
                    map.move_segment(edge_id, seg, particle.position)?;
                }
            }
        }
        Ok(())
    }

    /// Connect the endpoint pull for a chain's outer segments.
    ///
    /// Kept separate from `compute_forces` so endpoint nodes can be resolved
    /// once per chain instead of per step.
    pub fn anchor_segments(&mut self, map: &MapGraph) {
        let node_pos: HashMap<NodeId, Position2D> = self
            .anchors
            .iter()
            .map(|(&id, &pos)| (id, pos))
            .collect();
        let mut endpoint_forces: Vec<(usize, Position2D)> = Vec::new();
        for (i, particle) in self.particles.iter().enumerate() {
            if let ParticleKind::Segment(edge_id, seg) = particle.kind {
                let Ok(conn) = map.connection(edge_id) else {
                    continue;
                };
                let target = if seg == 0 {
                    node_pos.get(&conn.source)
                } else if seg + 1 == conn.segments.len() {
                    node_pos.get(&conn.target)
                } else {
                    None
                };
                if let Some(&target) = target {
                    endpoint_forces.push((i, attraction(
                        self.particles[i].position,
                        target,
                        self.params.edge_node_attraction,
                    )));
                }
            }
        }
        let dt = self.params.time_step;
        for (i, force) in endpoint_forces {
            let particle = &mut self.particles[i];
            particle.velocity = particle.velocity + force * (dt / particle.mass);
        }
    }
}

/// Quadratic attraction towards a target, matching `distance^2 / 2` falloff
fn attraction(from: Position2D, to: Position2D, strength: f64) -> Position2D {
    let distance = from.distance_to(&to);
    if distance <= f64::EPSILON {
        return Position2D::default();
    }
    let direction = (to - from) * (1.0 / distance);
    direction * (strength * distance * distance / 2.0)
}

/// Convenience wrapper: snapshot, simulate, write back
pub fn optimize_layout(
    map: &mut MapGraph,
    params: SimulationParams,
    iterations: usize,
) -> MapCommandResult<()> {
    let mut engine = LayoutEngine::from_map(map, params);
    for _ in 0..iterations {
        engine.anchor_segments(map);
        engine.step();
    }
    engine.apply_to(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value_objects::RailColor;
    use crate::MapId;

    fn two_node_map() -> (MapGraph, NodeId, NodeId) {
        let mut map = MapGraph::new(MapId::new(), "Layout", "");
        let a = map.add_node("A", Position2D::new(0.0, 0.0)).unwrap();
        let b = map.add_node("B", Position2D::new(20.0, 0.0)).unwrap();
        (map, a, b)
    }

    #[test]
    fn test_default_params_match_editor_defaults() {
        let params = SimulationParams::default();
        assert_eq!(params.velocity_decay, 0.99);
        assert_eq!(params.interaction_radius, 15.0);
        assert_eq!(params.repulsion_strength, 2.0);
    }

    #[test]
    fn test_nodes_stay_near_anchor() {
        let (mut map, a, _) = two_node_map();
        let before = map.node(a).unwrap().position;
        optimize_layout(&mut map, SimulationParams::default(), 50).unwrap();
        let after = map.node(a).unwrap().position;
        // The anchor pull keeps nodes from drifting away.
        assert!(before.distance_to(&after) < 10.0);
    }

    #[test]
    fn test_segment_chain_survives_simulation() {
        let (mut map, a, b) = two_node_map();
        let edge = map.add_connection(a, b, 4, RailColor::Blue).unwrap();
        optimize_layout(&mut map, SimulationParams::default(), 20).unwrap();
        assert_eq!(map.connection(edge).unwrap().segments.len(), 4);
    }

    #[test]
    fn test_repulsion_pushes_overlapping_labels_apart() {
        let mut map = MapGraph::new(MapId::new(), "Crowded", "");
        let a = map.add_node("Alpha", Position2D::new(0.0, 0.0)).unwrap();
        let b = map.add_node("Beta", Position2D::new(0.5, 0.0)).unwrap();
        let before = map
            .label(a)
            .unwrap()
            .position
            .distance_to(&map.label(b).unwrap().position);
        optimize_layout(&mut map, SimulationParams::default(), 30).unwrap();
        let after = map
            .label(a)
            .unwrap()
            .position
            .distance_to(&map.label(b).unwrap().position);
        assert!(after >= before);
    }

    #[test]
    fn test_step_is_deterministic() {
        let (map, _, _) = two_node_map();
        let mut engine_a = LayoutEngine::from_map(&map, SimulationParams::default());
        let mut engine_b = LayoutEngine::from_map(&map, SimulationParams::default());
        engine_a.step();
        engine_b.step();
        let mut map_a = map.clone();
        let mut map_b = map.clone();
        engine_a.apply_to(&mut map_a).unwrap();
        engine_b.apply_to(&mut map_b).unwrap();
        for (na, nb) in map_a.nodes().zip(map_b.nodes()) {
            assert_eq!(na.position, nb.position);
        }
    }
}
