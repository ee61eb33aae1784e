use crate::projection::VisibleLink;
use mindgraph_core::{NodeId, NodeKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn distance(self, other: Vec2) -> f32 {
        (self - other).length()
    }
}

impl Add for Vec2 {
    type Output = Vec2;
    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Vec2;
    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Vec2 {
    type Output = Vec2;
    fn mul(self, rhs: f32) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

impl AddAssign for Vec2 {
    fn add_assign(&mut self, rhs: Vec2) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl SubAssign for Vec2 {
    fn sub_assign(&mut self, rhs: Vec2) {
        self.x -= rhs.x;
        self.y -= rhs.y;
    }
}

/// Axis-aligned box around a set of node centres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: Vec2,
    pub max: Vec2,
}

impl Bounds {
    pub fn center(&self) -> Vec2 {
        Vec2::new(
            (self.min.x + self.max.x) / 2.0,
            (self.min.y + self.max.y) / 2.0,
        )
    }

    pub fn size(&self) -> Vec2 {
        self.max - self.min
    }
}

/// A visible node together with its physical state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutNode {
    pub id: NodeId,
    pub label: String,
    pub depth: u32,
    pub kind: NodeKind,
    pub size_hint: usize,
    pub collapsed: bool,

    pub position: Vec2,
    pub velocity: Vec2,
    /// Externally driven position (drag or inline edit). Runtime only.
    #[serde(skip)]
    pub pin: Option<Vec2>,
}

impl LayoutNode {
    pub fn is_pinned(&self) -> bool {
        self.pin.is_some()
    }
}

/// A node removed from the active set, kept around until its exit transition ends.
#[derive(Debug, Clone, PartialEq)]
pub struct ExitingNode {
    pub node: LayoutNode,
    pub remaining: Duration,
}

/// The reconciled, simulated node/link set.
///
/// Only the reconciler replaces the set, only the simulation moves free nodes,
/// and only [`GraphState::pin`]/[`GraphState::unpin`] drive pinned ones.
#[derive(Debug, Clone, Default)]
pub struct GraphState {
    nodes: Vec<LayoutNode>,
    links: Vec<VisibleLink>,
    link_indices: Vec<(usize, usize)>,
    node_map: HashMap<NodeId, usize>,
    exiting: Vec<ExitingNode>,
    generation: u64,
}

impl GraphState {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_parts(
        nodes: Vec<LayoutNode>,
        links: Vec<VisibleLink>,
        exiting: Vec<ExitingNode>,
        generation: u64,
    ) -> Self {
        let node_map: HashMap<NodeId, usize> = nodes
            .iter()
            .enumerate()
            .map(|(idx, node)| (node.id, idx))
            .collect();

        let mut kept_links = Vec::with_capacity(links.len());
        let mut link_indices = Vec::with_capacity(links.len());
        for link in links {
            match (node_map.get(&link.source), node_map.get(&link.target)) {
                (Some(&src), Some(&dst)) => {
                    link_indices.push((src, dst));
                    kept_links.push(link);
                }
                _ => {
                    tracing::warn!(
                        "Dropping link {} because an endpoint is missing from the layout set",
                        link.key()
                    );
                }
            }
        }

        Self {
            nodes,
            links: kept_links,
            link_indices,
            node_map,
            exiting,
            generation,
        }
    }

    pub(crate) fn into_parts(self) -> (Vec<LayoutNode>, Vec<ExitingNode>, u64) {
        (self.nodes, self.exiting, self.generation)
    }

    pub fn nodes(&self) -> &[LayoutNode] {
        &self.nodes
    }

    pub fn links(&self) -> &[VisibleLink] {
        &self.links
    }

    pub fn exiting(&self) -> &[ExitingNode] {
        &self.exiting
    }

    pub(crate) fn nodes_mut(&mut self) -> &mut [LayoutNode] {
        &mut self.nodes
    }

    pub(crate) fn link_indices(&self) -> &[(usize, usize)] {
        &self.link_indices
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Bumped by every reconciliation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn node(&self, id: NodeId) -> Option<&LayoutNode> {
        self.node_map.get(&id).map(|&idx| &self.nodes[idx])
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.node_map.contains_key(&id)
    }

    /// Pin a node at `position`. The node jumps there immediately and stays until unpinned.
    pub fn pin(&mut self, id: NodeId, position: Vec2) -> bool {
        let Some(&idx) = self.node_map.get(&id) else {
            return false;
        };
        let node = &mut self.nodes[idx];
        node.pin = Some(position);
        node.position = position;
        node.velocity = Vec2::ZERO;
        true
    }

    pub fn unpin(&mut self, id: NodeId) -> bool {
        match self.node_map.get(&id) {
            Some(&idx) => self.nodes[idx].pin.take().is_some(),
            None => false,
        }
    }

    /// Advance exit transitions and drop the ones that finished. Returns the dropped ids.
    pub fn advance_transitions(&mut self, elapsed: Duration) -> Vec<NodeId> {
        let mut finished = Vec::new();
        self.exiting.retain_mut(|exiting| {
            exiting.remaining = exiting.remaining.saturating_sub(elapsed);
            if exiting.remaining.is_zero() {
                finished.push(exiting.node.id);
                false
            } else {
                true
            }
        });
        finished
    }

    pub fn bounds(&self) -> Option<Bounds> {
        let first = self.nodes.first()?;
        let mut bounds = Bounds {
            min: first.position,
            max: first.position,
        };
        for node in &self.nodes[1..] {
            bounds.min.x = bounds.min.x.min(node.position.x);
            bounds.min.y = bounds.min.y.min(node.position.y);
            bounds.max.x = bounds.max.x.max(node.position.x);
            bounds.max.y = bounds.max.y.max(node.position.y);
        }
        Some(bounds)
    }
}
