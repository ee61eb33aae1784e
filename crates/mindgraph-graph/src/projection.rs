use mindgraph_core::{NodeId, NodeKind, TreeNode};
use serde::{Deserialize, Serialize};

/// A node of the visible projection.
///
/// `id` doubles as the back reference: the authoritative node is `Tree::find(id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisibleNode {
    pub id: NodeId,
    pub label: String,
    pub depth: u32,
    pub kind: NodeKind,
    /// Number of direct children in the tree, visible or not.
    pub size_hint: usize,
    pub collapsed: bool,
}

impl VisibleNode {
    fn from_tree(node: &TreeNode) -> Self {
        Self {
            id: node.id(),
            label: node.label().to_string(),
            depth: node.depth(),
            kind: node.kind(),
            size_hint: node.children().len(),
            collapsed: node.is_collapsed(),
        }
    }
}

/// Parent to child edge of the visible projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VisibleLink {
    pub source: NodeId,
    pub target: NodeId,
}

impl VisibleLink {
    pub fn new(source: NodeId, target: NodeId) -> Self {
        Self { source, target }
    }

    pub fn key(&self) -> String {
        format!("{}|{}", self.source, self.target)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Projection {
    pub nodes: Vec<VisibleNode>,
    pub links: Vec<VisibleLink>,
}

impl Projection {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.iter().any(|node| node.id == id)
    }
}

/// Pre-order walk of the tree that stops at collapsed nodes.
///
/// Children of a collapsed node are absent from the output entirely, which keeps the
/// projection exact: one node per visible tree node, one link per visible edge.
pub fn project(root: Option<&TreeNode>) -> Projection {
    let mut projection = Projection::default();
    if let Some(root) = root {
        visit(root, &mut projection);
    }
    projection
}

fn visit(node: &TreeNode, out: &mut Projection) {
    out.nodes.push(VisibleNode::from_tree(node));
    if node.is_collapsed() {
        return;
    }
    for child in node.children() {
        out.links.push(VisibleLink::new(node.id(), child.id()));
        visit(child, out);
    }
}
