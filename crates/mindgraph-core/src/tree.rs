use crate::error::TreeError;
use crate::{NodeId, NodeKind, scalar_display};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// One node of the canonical document tree.
///
/// Fields are private: the tree is only edited through the named operations on
/// [`Tree`]. Everything else observes nodes read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    id: NodeId,
    key: String,
    label: String,
    /// Raw scalar for leaves, `None` for containers. A JSON `null` leaf is `Some(Null)`.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_scalar"
    )]
    value: Option<Value>,
    kind: NodeKind,
    #[serde(default)]
    children: Vec<TreeNode>,
    depth: u32,
    #[serde(default)]
    collapsed: bool,
}

/// One entry of the flat pre-order encoding of a tree.
///
/// Nesting is carried by `depth` alone, so the encoded form stays a shallow list
/// however deep the tree is. Share tokens and stored sessions use this form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatNode {
    id: NodeId,
    key: String,
    label: String,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_scalar"
    )]
    value: Option<Value>,
    kind: NodeKind,
    depth: u32,
    #[serde(default)]
    collapsed: bool,
}

impl FlatNode {
    pub fn depth(&self) -> u32 {
        self.depth
    }

    fn into_node(self) -> TreeNode {
        TreeNode {
            id: self.id,
            key: self.key,
            label: self.label,
            value: self.value,
            kind: self.kind,
            children: Vec::new(),
            depth: self.depth,
            collapsed: self.collapsed,
        }
    }
}

fn deserialize_scalar<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl TreeNode {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn children(&self) -> &[TreeNode] {
        &self.children
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn is_collapsed(&self) -> bool {
        self.collapsed
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// Pre-order walk over this node and every descendant, collapsed or not.
    pub fn iter(&self) -> PreOrder<'_> {
        PreOrder { stack: vec![self] }
    }

    /// Number of nodes below this one.
    pub fn descendant_count(&self) -> usize {
        self.iter().count() - 1
    }

    /// Rebuild the document this subtree describes. Renamed labels are not reflected;
    /// keys and raw leaf values are.
    pub fn to_document(&self) -> Value {
        match self.kind {
            NodeKind::ARRAY => Value::Array(self.children.iter().map(Self::to_document).collect()),
            NodeKind::OBJECT => Value::Object(
                self.children
                    .iter()
                    .map(|child| (child.key.clone(), child.to_document()))
                    .collect(),
            ),
            NodeKind::PRIMITIVE => self.value.clone().unwrap_or(Value::Null),
        }
    }

    /// Pre-order flat encoding of this subtree.
    pub fn flatten(&self) -> Vec<FlatNode> {
        self.iter()
            .map(|node| FlatNode {
                id: node.id,
                key: node.key.clone(),
                label: node.label.clone(),
                value: node.value.clone(),
                kind: node.kind,
                depth: node.depth,
                collapsed: node.collapsed,
            })
            .collect()
    }

    /// Rebuild a subtree from its pre-order flat encoding.
    ///
    /// The first entry is the root at depth 0 and every later entry sits at most one
    /// level below its predecessor. Ids and kinds are checked separately by
    /// [`Tree::from_root`] and [`Tree::adopt`].
    pub fn unflatten(nodes: Vec<FlatNode>) -> Result<TreeNode, TreeError> {
        let mut open: Vec<TreeNode> = Vec::new();
        for flat in nodes {
            let depth = flat.depth as usize;
            let fits = if open.is_empty() {
                depth == 0
            } else {
                (1..=open.len()).contains(&depth)
            };
            if !fits {
                return Err(TreeError::InvalidSnapshot(format!(
                    "node {} at depth {} does not follow its predecessor",
                    flat.id, flat.depth
                )));
            }
            while open.len() > depth {
                close_deepest(&mut open);
            }
            open.push(flat.into_node());
        }
        while open.len() > 1 {
            close_deepest(&mut open);
        }
        open.pop()
            .ok_or_else(|| TreeError::InvalidSnapshot("snapshot has no nodes".to_string()))
    }

    /// Compare labels, keys, values, kinds, collapse flags and nesting while ignoring ids.
    pub fn structurally_eq(&self, other: &TreeNode) -> bool {
        self.key == other.key
            && self.label == other.label
            && self.value == other.value
            && self.kind == other.kind
            && self.depth == other.depth
            && self.collapsed == other.collapsed
            && self.children.len() == other.children.len()
            && self
                .children
                .iter()
                .zip(&other.children)
                .all(|(a, b)| a.structurally_eq(b))
    }

    fn find(&self, id: NodeId) -> Option<&TreeNode> {
        self.iter().find(|node| node.id == id)
    }

    fn find_mut(&mut self, id: NodeId) -> Option<&mut TreeNode> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter_mut().find_map(|child| child.find_mut(id))
    }

    fn parent_of_mut(&mut self, id: NodeId) -> Option<&mut TreeNode> {
        if self.children.iter().any(|child| child.id == id) {
            return Some(self);
        }
        self.children
            .iter_mut()
            .find_map(|child| child.parent_of_mut(id))
    }

    fn validate(&self, expected_depth: u32, seen: &mut HashSet<NodeId>) -> Result<(), TreeError> {
        if self.depth != expected_depth {
            return Err(TreeError::InvalidSnapshot(format!(
                "node {} has depth {} but sits at depth {}",
                self.id, self.depth, expected_depth
            )));
        }
        if !seen.insert(self.id) {
            return Err(TreeError::InvalidSnapshot(format!(
                "duplicate node id {}",
                self.id
            )));
        }
        if self.kind == NodeKind::PRIMITIVE && !self.children.is_empty() {
            return Err(TreeError::InvalidSnapshot(format!(
                "primitive node {} has children",
                self.id
            )));
        }
        if self.kind.is_container() == self.value.is_some() {
            return Err(TreeError::InvalidSnapshot(format!(
                "{} node {} does not match its value",
                self.kind, self.id
            )));
        }
        for child in &self.children {
            child.validate(expected_depth + 1, seen)?;
        }
        Ok(())
    }
}

/// Move the deepest open node into its parent's children.
fn close_deepest(open: &mut Vec<TreeNode>) {
    if open.len() < 2 {
        return;
    }
    if let Some(child) = open.pop()
        && let Some(parent) = open.last_mut()
    {
        parent.children.push(child);
    }
}

pub struct PreOrder<'a> {
    stack: Vec<&'a TreeNode>,
}

impl<'a> Iterator for PreOrder<'a> {
    type Item = &'a TreeNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

/// Figures shown in the analytics panel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeStats {
    pub nodes: usize,
    pub links: usize,
    pub max_depth: u32,
    pub size_bytes: usize,
}

/// The canonical document tree plus the allocator that hands out its ids.
///
/// The allocator only moves forward, including across full replacements and
/// snapshot restores, so an id is never handed out twice for the same `Tree`.
#[derive(Debug, Clone)]
pub struct Tree {
    root: Option<TreeNode>,
    next_id: u64,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    pub fn new() -> Self {
        Self {
            root: None,
            next_id: 1,
        }
    }

    pub fn from_value(value: &Value) -> Self {
        let mut tree = Self::new();
        tree.replace_root(value);
        tree
    }

    /// Take an already-built root verbatim, ids included. Used when restoring
    /// snapshots that must keep their identities.
    pub fn from_root(root: TreeNode) -> Result<Self, TreeError> {
        let mut seen = HashSet::new();
        root.validate(0, &mut seen)?;
        let next_id = seen.iter().map(|id| id.0).max().unwrap_or(0) + 1;
        Ok(Self {
            root: Some(root),
            next_id,
        })
    }

    pub fn root(&self) -> Option<&TreeNode> {
        self.root.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub fn len(&self) -> usize {
        self.root.as_ref().map_or(0, |root| root.iter().count())
    }

    pub fn find(&self, id: NodeId) -> Option<&TreeNode> {
        self.root.as_ref().and_then(|root| root.find(id))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.find(id).is_some()
    }

    pub fn is_root(&self, id: NodeId) -> bool {
        self.root.as_ref().is_some_and(|root| root.id == id)
    }

    /// Same nodes, labels and collapse state. The allocator position is ignored.
    pub fn content_eq(&self, other: &Tree) -> bool {
        self.root == other.root
    }

    fn allocate(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Build a node (and its whole subtree) from a decoded value, allocating fresh ids
    /// in pre-order.
    pub fn build(&mut self, value: &Value, key: &str, depth: u32) -> TreeNode {
        let id = self.allocate();
        let kind = NodeKind::of(value);
        let mut children = Vec::new();

        match value {
            Value::Array(items) => {
                for (index, item) in items.iter().enumerate() {
                    children.push(self.build(item, &format!("[{index}]"), depth + 1));
                }
            }
            Value::Object(fields) => {
                for (field, item) in fields {
                    children.push(self.build(item, field, depth + 1));
                }
            }
            scalar => {
                return TreeNode {
                    id,
                    key: key.to_string(),
                    label: format!("{key}: {}", scalar_display(scalar)),
                    value: Some(scalar.clone()),
                    kind,
                    children,
                    depth,
                    collapsed: false,
                };
            }
        }

        TreeNode {
            id,
            key: key.to_string(),
            label: key.to_string(),
            value: None,
            kind,
            children,
            depth,
            collapsed: false,
        }
    }

    /// Replace the whole tree with one built from `value`. Every id is new.
    pub fn replace_root(&mut self, value: &Value) -> usize {
        let root = self.build(value, "root", 0);
        let count = root.iter().count();
        self.root = Some(root);
        count
    }

    /// Replace the whole tree with a decoded snapshot, re-keying every node with a
    /// fresh id. Structure, labels, values and collapse flags are kept.
    pub fn adopt(&mut self, mut root: TreeNode) -> Result<usize, TreeError> {
        let mut seen = HashSet::new();
        root.validate(0, &mut seen)?;
        self.renumber(&mut root);
        let count = seen.len();
        self.root = Some(root);
        Ok(count)
    }

    fn renumber(&mut self, node: &mut TreeNode) {
        node.id = self.allocate();
        for child in &mut node.children {
            self.renumber(child);
        }
    }

    /// Restore a snapshot verbatim (ids included) without rewinding the allocator.
    pub fn restore(&mut self, snapshot: &Tree) {
        self.root = snapshot.root.clone();
        self.next_id = self.next_id.max(snapshot.next_id);
    }

    pub fn clear(&mut self) {
        self.root = None;
    }

    /// Set a node's display label. Returns `Ok(false)` when nothing changed.
    pub fn rename(&mut self, id: NodeId, label: &str) -> Result<bool, TreeError> {
        let label = label.trim();
        if label.is_empty() {
            return Err(TreeError::EmptyLabel);
        }
        let root = self.root.as_mut().ok_or(TreeError::Empty)?;
        let node = root.find_mut(id).ok_or(TreeError::NodeNotFound(id))?;
        if node.label == label {
            return Ok(false);
        }
        node.label = label.to_string();
        Ok(true)
    }

    /// Detach a node and its whole subtree from its parent in one step.
    pub fn delete(&mut self, id: NodeId) -> Result<TreeNode, TreeError> {
        let root = self.root.as_mut().ok_or(TreeError::Empty)?;
        if root.id == id {
            return Err(TreeError::RootDeletion);
        }
        let parent = root.parent_of_mut(id).ok_or(TreeError::NodeNotFound(id))?;
        let position = parent
            .children
            .iter()
            .position(|child| child.id == id)
            .ok_or(TreeError::NodeNotFound(id))?;
        let removed = parent.children.remove(position);
        if parent.children.is_empty() {
            parent.collapsed = false;
        }
        Ok(removed)
    }

    /// Set the collapse flag. Collapsing a node without children is a no-op, so
    /// the flag only ever persists on nodes that have something to hide.
    pub fn set_collapsed(&mut self, id: NodeId, collapsed: bool) -> Result<bool, TreeError> {
        let root = self.root.as_mut().ok_or(TreeError::Empty)?;
        let node = root.find_mut(id).ok_or(TreeError::NodeNotFound(id))?;
        if node.collapsed == collapsed || (collapsed && node.children.is_empty()) {
            return Ok(false);
        }
        node.collapsed = collapsed;
        Ok(true)
    }

    /// Clear every collapse flag. Returns how many nodes changed.
    pub fn expand_all(&mut self) -> usize {
        fn expand(node: &mut TreeNode) -> usize {
            let mut changed = usize::from(node.collapsed);
            node.collapsed = false;
            for child in &mut node.children {
                changed += expand(child);
            }
            changed
        }
        self.root.as_mut().map_or(0, expand)
    }

    /// Collapse every node that has children. Returns how many nodes changed.
    pub fn collapse_all(&mut self) -> usize {
        fn collapse(node: &mut TreeNode) -> usize {
            if node.children.is_empty() {
                return 0;
            }
            let mut changed = usize::from(!node.collapsed);
            node.collapsed = true;
            for child in &mut node.children {
                changed += collapse(child);
            }
            changed
        }
        self.root.as_mut().map_or(0, collapse)
    }

    pub fn stats(&self) -> TreeStats {
        let Some(root) = &self.root else {
            return TreeStats::default();
        };

        let mut stats = TreeStats::default();
        for node in root.iter() {
            stats.nodes += 1;
            stats.links += node.children.len();
            stats.max_depth = stats.max_depth.max(node.depth);
            stats.size_bytes += serde_json::to_string(&node.label).map_or(0, |s| s.len());
        }
        stats.size_bytes += serde_json::to_string(root).map_or(0, |s| s.len());
        stats
    }
}
