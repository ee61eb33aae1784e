use mindgraph_core::NodeKind;
use serde::{Deserialize, Serialize};

/// Rendering role of a node, used by renderers to pick fill and stroke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    Root,
    Array,
    Object,
    Primitive,
}

impl NodeRole {
    pub fn of(depth: u32, kind: NodeKind) -> Self {
        if depth == 0 {
            return NodeRole::Root;
        }
        match kind {
            NodeKind::ARRAY => NodeRole::Array,
            NodeKind::OBJECT => NodeRole::Object,
            NodeKind::PRIMITIVE => NodeRole::Primitive,
        }
    }
}

/// Node radius: `base_radius + max(0, depth_factor - depth * depth_falloff) * type_factor`.
///
/// Deeper nodes never grow, and at equal depth arrays are at least as large as objects,
/// which are at least as large as primitives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeSizing {
    pub base_radius: f32,
    pub depth_factor: f32,
    pub depth_falloff: f32,
    pub array_factor: f32,
    pub object_factor: f32,
    pub primitive_factor: f32,
}

impl Default for NodeSizing {
    fn default() -> Self {
        Self {
            base_radius: 8.0,
            depth_factor: 6.0,
            depth_falloff: 0.3,
            array_factor: 2.0,
            object_factor: 1.5,
            primitive_factor: 1.0,
        }
    }
}

impl NodeSizing {
    pub fn type_factor(&self, kind: NodeKind) -> f32 {
        match kind {
            NodeKind::ARRAY => self.array_factor,
            NodeKind::OBJECT => self.object_factor,
            NodeKind::PRIMITIVE => self.primitive_factor,
        }
    }

    pub fn radius(&self, depth: u32, kind: NodeKind) -> f32 {
        let depth_bonus = (self.depth_factor - depth as f32 * self.depth_falloff).max(0.0);
        self.base_radius + depth_bonus * self.type_factor(kind)
    }

    /// Radius above the base, i.e. the part contributed by depth and kind.
    pub fn extra_radius(&self, depth: u32, kind: NodeKind) -> f32 {
        self.radius(depth, kind) - self.base_radius
    }
}
