use crate::graph::{GraphState, LayoutNode};
use crate::projection::VisibleLink;
use mindgraph_core::TreeNode;
use serde::Serialize;

/// Read-only view handed to external renderers and exporters.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct GraphSnapshot<'a> {
    pub nodes: &'a [LayoutNode],
    pub links: &'a [VisibleLink],
    pub tree: Option<&'a TreeNode>,
}

impl<'a> GraphSnapshot<'a> {
    pub fn new(state: &'a GraphState, tree: Option<&'a TreeNode>) -> Self {
        Self {
            nodes: state.nodes(),
            links: state.links(),
            tree,
        }
    }
}
