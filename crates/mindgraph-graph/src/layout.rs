use crate::graph::{LayoutNode, Vec2};
use crate::style::NodeSizing;
use rand::Rng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

/// Tunable constants of the force model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForceConfig {
    pub link_distance: f32,
    /// Extra link length per level of the target node's depth.
    pub depth_increment: f32,
    pub link_strength: f32,
    pub charge_strength: f32,
    pub charge_distance_min: f32,
    /// Pairs further apart than this ignore each other. `None` means unbounded.
    pub charge_distance_max: Option<f32>,
    pub collision_radius: f32,
    /// Collision radius added per label character.
    pub label_factor: f32,
    pub collision_strength: f32,
    pub center_strength: f32,
}

impl Default for ForceConfig {
    fn default() -> Self {
        Self {
            link_distance: 80.0,
            depth_increment: 10.0,
            link_strength: 0.8,
            charge_strength: -300.0,
            charge_distance_min: 1.0,
            charge_distance_max: None,
            collision_radius: 25.0,
            label_factor: 0.3,
            collision_strength: 1.0,
            center_strength: 1.0,
        }
    }
}

/// Everything a force may read or write during one tick.
pub struct ForceContext<'a> {
    pub nodes: &'a mut [LayoutNode],
    /// Links as indices into `nodes`.
    pub links: &'a [(usize, usize)],
    pub center: Vec2,
    pub rng: &'a mut StdRng,
}

/// One additive force. Forces adjust velocities (or, for centering, positions)
/// and never touch the pin.
pub trait Force: Send {
    fn apply(&self, ctx: &mut ForceContext<'_>, alpha: f32);
}

/// Tiny random offset used to separate coincident nodes.
fn jiggle(rng: &mut StdRng) -> f32 {
    (rng.random::<f32>() - 0.5) * 1e-6
}

/// Spring between each linked pair, resting length growing with the target's depth.
#[derive(Debug, Clone)]
pub struct LinkForce {
    pub distance: f32,
    pub depth_increment: f32,
    pub strength: f32,
}

impl LinkForce {
    pub fn resting_length(&self, target_depth: u32) -> f32 {
        self.distance + target_depth.max(1) as f32 * self.depth_increment
    }
}

impl Force for LinkForce {
    fn apply(&self, ctx: &mut ForceContext<'_>, alpha: f32) {
        let mut degree = vec![0usize; ctx.nodes.len()];
        for &(s, t) in ctx.links {
            degree[s] += 1;
            degree[t] += 1;
        }

        for &(s, t) in ctx.links {
            if s == t {
                continue;
            }
            let source = ctx.nodes[s].position + ctx.nodes[s].velocity;
            let target = ctx.nodes[t].position + ctx.nodes[t].velocity;

            let mut delta = target - source;
            if delta.x == 0.0 {
                delta.x = jiggle(ctx.rng);
            }
            if delta.y == 0.0 {
                delta.y = jiggle(ctx.rng);
            }
            let length = delta.length();
            let rest = self.resting_length(ctx.nodes[t].depth);
            let k = (length - rest) / length * alpha * self.strength;
            let pull = delta * k;

            // Lighter endpoint moves more.
            let bias = degree[s] as f32 / (degree[s] + degree[t]) as f32;
            ctx.nodes[t].velocity -= pull * bias;
            ctx.nodes[s].velocity += pull * (1.0 - bias);
        }
    }
}

/// All-pairs repulsion (negative strength) or attraction (positive strength).
#[derive(Debug, Clone)]
pub struct ManyBodyForce {
    pub strength: f32,
    pub distance_min: f32,
    pub distance_max: Option<f32>,
}

impl Force for ManyBodyForce {
    fn apply(&self, ctx: &mut ForceContext<'_>, alpha: f32) {
        let min2 = self.distance_min * self.distance_min;
        let max2 = self.distance_max.map_or(f32::INFINITY, |d| d * d);
        let n = ctx.nodes.len();

        for i in 0..n {
            for j in (i + 1)..n {
                let mut delta = ctx.nodes[j].position - ctx.nodes[i].position;
                if delta.x == 0.0 {
                    delta.x = jiggle(ctx.rng);
                }
                if delta.y == 0.0 {
                    delta.y = jiggle(ctx.rng);
                }
                let mut l2 = delta.x * delta.x + delta.y * delta.y;
                if l2 >= max2 {
                    continue;
                }
                if l2 < min2 {
                    l2 = (min2 * l2).sqrt();
                }
                let w = self.strength * alpha / l2;
                ctx.nodes[i].velocity += delta * w;
                ctx.nodes[j].velocity -= delta * w;
            }
        }
    }
}

/// Translates the whole set so its mean sits on the centre. Alpha independent.
#[derive(Debug, Clone)]
pub struct CenterForce {
    pub strength: f32,
}

impl Force for CenterForce {
    fn apply(&self, ctx: &mut ForceContext<'_>, _alpha: f32) {
        if ctx.nodes.is_empty() {
            return;
        }
        let mut sum = Vec2::ZERO;
        for node in ctx.nodes.iter() {
            sum += node.position;
        }
        let mean = sum * (1.0 / ctx.nodes.len() as f32);
        let shift = (mean - ctx.center) * self.strength;
        for node in ctx.nodes.iter_mut() {
            node.position -= shift;
        }
    }
}

/// Pushes apart overlapping circles. Radius grows with label length and node kind.
#[derive(Debug, Clone)]
pub struct CollideForce {
    pub radius: f32,
    pub label_factor: f32,
    pub strength: f32,
    pub sizing: NodeSizing,
}

impl CollideForce {
    pub fn radius_of(&self, node: &LayoutNode) -> f32 {
        self.radius
            + node.label.chars().count() as f32 * self.label_factor
            + self.sizing.extra_radius(node.depth, node.kind)
    }
}

impl Force for CollideForce {
    fn apply(&self, ctx: &mut ForceContext<'_>, _alpha: f32) {
        let radii: Vec<f32> = ctx.nodes.iter().map(|n| self.radius_of(n)).collect();
        let n = ctx.nodes.len();

        for i in 0..n {
            for j in (i + 1)..n {
                let a = ctx.nodes[i].position + ctx.nodes[i].velocity;
                let b = ctx.nodes[j].position + ctx.nodes[j].velocity;
                let reach = radii[i] + radii[j];

                let mut delta = a - b;
                let mut l2 = delta.x * delta.x + delta.y * delta.y;
                if l2 >= reach * reach {
                    continue;
                }
                if delta.x == 0.0 {
                    delta.x = jiggle(ctx.rng);
                    l2 += delta.x * delta.x;
                }
                if delta.y == 0.0 {
                    delta.y = jiggle(ctx.rng);
                    l2 += delta.y * delta.y;
                }
                let l = l2.sqrt();
                let push = delta * ((reach - l) / l * self.strength);

                let ri2 = radii[i] * radii[i];
                let rj2 = radii[j] * radii[j];
                let share = rj2 / (ri2 + rj2);
                ctx.nodes[i].velocity += push * share;
                ctx.nodes[j].velocity -= push * (1.0 - share);
            }
        }
    }
}

/// Named, ordered set of forces applied each tick.
pub struct ForceModel {
    forces: Vec<(String, Box<dyn Force>)>,
}

impl Default for ForceModel {
    fn default() -> Self {
        Self::from_config(&ForceConfig::default(), &NodeSizing::default())
    }
}

impl ForceModel {
    pub fn empty() -> Self {
        Self { forces: Vec::new() }
    }

    /// Link, charge, center and collide, in that order.
    pub fn from_config(config: &ForceConfig, sizing: &NodeSizing) -> Self {
        let mut model = Self::empty();
        model.insert(
            "link",
            LinkForce {
                distance: config.link_distance,
                depth_increment: config.depth_increment,
                strength: config.link_strength,
            },
        );
        model.insert(
            "charge",
            ManyBodyForce {
                strength: config.charge_strength,
                distance_min: config.charge_distance_min,
                distance_max: config.charge_distance_max,
            },
        );
        model.insert(
            "center",
            CenterForce {
                strength: config.center_strength,
            },
        );
        model.insert(
            "collide",
            CollideForce {
                radius: config.collision_radius,
                label_factor: config.label_factor,
                strength: config.collision_strength,
                sizing: sizing.clone(),
            },
        );
        model
    }

    /// Add a force, replacing any existing force with the same name in place.
    pub fn insert(&mut self, name: &str, force: impl Force + 'static) {
        let boxed: Box<dyn Force> = Box::new(force);
        match self.forces.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = boxed,
            None => self.forces.push((name.to_string(), boxed)),
        }
    }

    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.forces.len();
        self.forces.retain(|(n, _)| n != name);
        self.forces.len() != before
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.forces.iter().map(|(n, _)| n.as_str())
    }

    pub fn apply(&self, ctx: &mut ForceContext<'_>, alpha: f32) {
        for (_, force) in &self.forces {
            force.apply(ctx, alpha);
        }
    }
}

impl std::fmt::Debug for ForceModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mindgraph_core::{NodeId, NodeKind};
    use rand::SeedableRng;

    fn node(id: u64, x: f32, y: f32) -> LayoutNode {
        LayoutNode {
            id: NodeId(id),
            label: "node".into(),
            depth: 1,
            kind: NodeKind::PRIMITIVE,
            size_hint: 0,
            collapsed: false,
            position: Vec2::new(x, y),
            velocity: Vec2::ZERO,
            pin: None,
        }
    }

    fn run(force: &dyn Force, nodes: &mut [LayoutNode], links: &[(usize, usize)]) {
        let mut rng = StdRng::seed_from_u64(7);
        let mut ctx = ForceContext {
            nodes,
            links,
            center: Vec2::ZERO,
            rng: &mut rng,
        };
        force.apply(&mut ctx, 1.0);
    }

    #[test]
    fn test_link_resting_length_grows_with_depth() {
        let link = LinkForce {
            distance: 80.0,
            depth_increment: 10.0,
            strength: 0.8,
        };
        assert_eq!(link.resting_length(1), 90.0);
        assert_eq!(link.resting_length(3), 110.0);
        assert!(link.resting_length(4) > link.resting_length(3));
    }

    #[test]
    fn test_link_pulls_stretched_pair_together() {
        let mut nodes = vec![node(1, 0.0, 0.0), node(2, 500.0, 0.0)];
        let link = LinkForce {
            distance: 80.0,
            depth_increment: 10.0,
            strength: 0.8,
        };
        run(&link, &mut nodes, &[(0, 1)]);
        assert!(nodes[0].velocity.x > 0.0);
        assert!(nodes[1].velocity.x < 0.0);
    }

    #[test]
    fn test_charge_repels() {
        let mut nodes = vec![node(1, -5.0, 0.0), node(2, 5.0, 0.0)];
        let charge = ManyBodyForce {
            strength: -300.0,
            distance_min: 1.0,
            distance_max: None,
        };
        run(&charge, &mut nodes, &[]);
        assert!(nodes[0].velocity.x < 0.0);
        assert!(nodes[1].velocity.x > 0.0);
        assert!((nodes[0].velocity.x + nodes[1].velocity.x).abs() < 1e-4);
    }

    #[test]
    fn test_center_moves_mean_to_center() {
        let mut nodes = vec![node(1, 10.0, 10.0), node(2, 30.0, 50.0)];
        run(&CenterForce { strength: 1.0 }, &mut nodes, &[]);
        let mean = (nodes[0].position + nodes[1].position) * 0.5;
        assert!(mean.length() < 1e-4);
    }

    #[test]
    fn test_collide_separates_overlapping_nodes() {
        let mut nodes = vec![node(1, 0.0, 0.0), node(2, 1.0, 0.0)];
        let collide = CollideForce {
            radius: 25.0,
            label_factor: 0.3,
            strength: 1.0,
            sizing: NodeSizing::default(),
        };
        run(&collide, &mut nodes, &[]);
        assert!(nodes[0].velocity.x < 0.0);
        assert!(nodes[1].velocity.x > 0.0);
    }

    #[test]
    fn test_collide_radius_by_kind_and_label() {
        let collide = CollideForce {
            radius: 25.0,
            label_factor: 0.3,
            strength: 1.0,
            sizing: NodeSizing::default(),
        };
        let mut array = node(1, 0.0, 0.0);
        array.kind = NodeKind::ARRAY;
        let mut object = node(2, 0.0, 0.0);
        object.kind = NodeKind::OBJECT;
        let leaf = node(3, 0.0, 0.0);
        assert!(collide.radius_of(&array) > collide.radius_of(&object));
        assert!(collide.radius_of(&object) > collide.radius_of(&leaf));

        let mut long = node(4, 0.0, 0.0);
        long.label = "a much longer label".into();
        assert!(collide.radius_of(&long) > collide.radius_of(&leaf));
    }

    #[test]
    fn test_force_model_insert_replaces_by_name() {
        let mut model = ForceModel::default();
        assert_eq!(
            model.names().collect::<Vec<_>>(),
            vec!["link", "charge", "center", "collide"]
        );
        model.insert("center", CenterForce { strength: 0.1 });
        assert_eq!(model.names().count(), 4);
        assert!(model.remove("collide"));
        assert!(!model.remove("collide"));
        assert_eq!(model.names().count(), 3);
    }
}
