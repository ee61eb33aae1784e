use crate::graph::{GraphState, Vec2};
use crate::layout::{ForceContext, ForceModel};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub alpha_min: f32,
    pub alpha_decay: f32,
    pub velocity_decay: f32,
    /// Alpha target held while a node is being dragged.
    pub drag_alpha_target: f32,
    /// Width of the square around the centre where new nodes spawn.
    pub initial_spread: f32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            alpha_min: 0.001,
            alpha_decay: 0.02,
            velocity_decay: 0.4,
            drag_alpha_target: 0.3,
            initial_spread: 100.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    Running { alpha: f32 },
    /// Alpha fell below the threshold on this tick, or the simulation was already idle.
    Settled,
}

/// Discrete-step force simulation over a [`GraphState`].
///
/// Every tick moves alpha toward the target, applies the force model, then
/// integrates velocities with decay. Pinned nodes sit at their pin with zero
/// velocity. The simulation stops itself once alpha drops below `alpha_min`
/// and stays steppable after [`Simulation::restart`] or a drag.
#[derive(Debug)]
pub struct Simulation {
    config: SimulationConfig,
    forces: ForceModel,
    alpha: f32,
    alpha_target: f32,
    running: bool,
    ticks: u64,
    rng: StdRng,
}

impl Simulation {
    pub fn new(config: SimulationConfig, forces: ForceModel) -> Self {
        Self::with_rng(config, forces, StdRng::from_os_rng())
    }

    /// Deterministic jiggle, for tests and benchmarks.
    pub fn with_seed(config: SimulationConfig, forces: ForceModel, seed: u64) -> Self {
        Self::with_rng(config, forces, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: SimulationConfig, forces: ForceModel, rng: StdRng) -> Self {
        Self {
            config,
            forces,
            alpha: 0.0,
            alpha_target: 0.0,
            running: false,
            ticks: 0,
            rng,
        }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn forces_mut(&mut self) -> &mut ForceModel {
        &mut self.forces
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn alpha_target(&self) -> f32 {
        self.alpha_target
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn is_settled(&self) -> bool {
        !self.running
    }

    /// Full reheat after the active set changed. Positions are left alone.
    pub fn restart(&mut self) {
        self.alpha = 1.0;
        self.running = true;
        tracing::debug!("Simulation restarted");
    }

    /// Keep the simulation warm while a node is dragged.
    pub fn begin_drag(&mut self) {
        self.alpha_target = self.config.drag_alpha_target;
        self.running = true;
    }

    /// Let the simulation cool down after a drag.
    pub fn end_drag(&mut self) {
        self.alpha_target = 0.0;
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn step(&mut self, state: &mut GraphState, center: Vec2) -> TickOutcome {
        if !self.running {
            return TickOutcome::Settled;
        }

        self.alpha += (self.alpha_target - self.alpha) * self.config.alpha_decay;

        let links = state.link_indices().to_vec();
        let nodes = state.nodes_mut();
        {
            let mut ctx = ForceContext {
                nodes: &mut *nodes,
                links: &links,
                center,
                rng: &mut self.rng,
            };
            self.forces.apply(&mut ctx, self.alpha);
        }

        let keep = 1.0 - self.config.velocity_decay;
        for node in nodes.iter_mut() {
            match node.pin {
                Some(pin) => {
                    node.position = pin;
                    node.velocity = Vec2::ZERO;
                }
                None => {
                    node.velocity = node.velocity * keep;
                    node.position += node.velocity;
                }
            }
        }
        self.ticks += 1;

        if self.alpha < self.config.alpha_min {
            self.running = false;
            tracing::debug!("Simulation settled after {} ticks", self.ticks);
            return TickOutcome::Settled;
        }
        TickOutcome::Running { alpha: self.alpha }
    }

    /// Step until settled or `max_ticks` were spent. Returns the ticks taken.
    pub fn run_until_settled(
        &mut self,
        state: &mut GraphState,
        center: Vec2,
        max_ticks: u64,
    ) -> u64 {
        let mut taken = 0;
        while taken < max_ticks && !self.is_settled() {
            self.step(state, center);
            taken += 1;
        }
        if !self.is_settled() {
            tracing::warn!("Simulation still running after {max_ticks} ticks");
        }
        taken
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::project;
    use crate::reconcile::Reconciler;
    use mindgraph_core::Tree;
    use serde_json::json;
    use std::time::Duration;

    fn settled_state(value: serde_json::Value) -> (GraphState, Simulation) {
        let tree = Tree::from_value(&value);
        let mut reconciler = Reconciler::with_seed(100.0, Duration::ZERO, 1);
        let state = reconciler
            .reconcile(GraphState::new(), project(tree.root()), Vec2::ZERO)
            .state;
        let sim = Simulation::with_seed(SimulationConfig::default(), ForceModel::default(), 1);
        (state, sim)
    }

    #[test]
    fn test_idle_simulation_does_not_move_nodes() {
        let (mut state, mut sim) = settled_state(json!({"a": 1}));
        let before: Vec<Vec2> = state.nodes().iter().map(|n| n.position).collect();
        assert_eq!(sim.step(&mut state, Vec2::ZERO), TickOutcome::Settled);
        let after: Vec<Vec2> = state.nodes().iter().map(|n| n.position).collect();
        assert_eq!(before, after);
        assert_eq!(sim.ticks(), 0);
    }

    #[test]
    fn test_alpha_decays_to_settlement() {
        let (mut state, mut sim) = settled_state(json!({"a": 1, "b": {"c": 2}}));
        sim.restart();
        let ticks = sim.run_until_settled(&mut state, Vec2::ZERO, 1000);
        // 1.0 * 0.98^n < 0.001 first holds at n = 342.
        assert_eq!(ticks, 342);
        assert!(sim.is_settled());
        assert!(sim.alpha() < 0.001);
    }

    #[test]
    fn test_settled_layout_keeps_nodes_apart() {
        let (mut state, mut sim) = settled_state(json!({"a": 1, "b": 2, "c": [1, 2]}));
        sim.restart();
        sim.run_until_settled(&mut state, Vec2::ZERO, 1000);
        let nodes = state.nodes();
        for i in 0..nodes.len() {
            for j in (i + 1)..nodes.len() {
                assert!(nodes[i].position.distance(nodes[j].position) > 10.0);
            }
        }
    }

    #[test]
    fn test_pinned_node_stays_at_pin() {
        let (mut state, mut sim) = settled_state(json!({"a": 1, "b": 2}));
        let id = state.nodes()[1].id;
        let pin = Vec2::new(250.0, -40.0);
        state.pin(id, pin);
        sim.restart();
        for _ in 0..50 {
            sim.step(&mut state, Vec2::ZERO);
        }
        let node = state.node(id).unwrap();
        assert_eq!(node.position, pin);
        assert_eq!(node.velocity, Vec2::ZERO);
    }

    #[test]
    fn test_drag_keeps_simulation_warm() {
        let (mut state, mut sim) = settled_state(json!({"a": 1}));
        sim.begin_drag();
        for _ in 0..500 {
            sim.step(&mut state, Vec2::ZERO);
        }
        assert!(!sim.is_settled());
        assert!(sim.alpha() > 0.25);

        sim.end_drag();
        sim.run_until_settled(&mut state, Vec2::ZERO, 1000);
        assert!(sim.is_settled());
    }
}
