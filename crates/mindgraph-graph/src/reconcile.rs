use crate::graph::{ExitingNode, GraphState, LayoutNode, Vec2};
use crate::projection::{Projection, VisibleNode};
use mindgraph_core::NodeId;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::time::Duration;

/// Result of merging a projection into the previous layout set.
#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub state: GraphState,
    /// Ids that became visible, in projection order.
    pub entered: Vec<NodeId>,
    /// Ids that left the active set, in previous order.
    pub exited: Vec<NodeId>,
    /// Count of ids carried over with their physical state.
    pub retained: usize,
}

impl Reconciliation {
    pub fn topology_changed(&self) -> bool {
        !self.entered.is_empty() || !self.exited.is_empty()
    }
}

/// Merges visible projections into layout state while keeping identity continuity.
///
/// Takes the previous state by value and returns a new one, so there is never a
/// moment where two versions of a node are live. Callers sequence reconciliations
/// between simulation ticks.
#[derive(Debug)]
pub struct Reconciler {
    rng: StdRng,
    spread: f32,
    exit_duration: Duration,
}

impl Reconciler {
    pub fn new(spread: f32, exit_duration: Duration) -> Self {
        Self {
            rng: StdRng::from_os_rng(),
            spread,
            exit_duration,
        }
    }

    pub fn with_seed(spread: f32, exit_duration: Duration, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            spread,
            exit_duration,
        }
    }

    /// Zero drops exited nodes immediately.
    pub fn set_exit_duration(&mut self, exit_duration: Duration) {
        self.exit_duration = exit_duration;
    }

    pub fn reconcile(
        &mut self,
        previous: GraphState,
        projection: Projection,
        center: Vec2,
    ) -> Reconciliation {
        let (previous_nodes, previous_exiting, generation) = previous.into_parts();

        let previous_order: Vec<NodeId> = previous_nodes.iter().map(|n| n.id).collect();
        let mut active: HashMap<NodeId, LayoutNode> =
            previous_nodes.into_iter().map(|n| (n.id, n)).collect();
        let mut exiting: HashMap<NodeId, ExitingNode> = previous_exiting
            .into_iter()
            .map(|e| (e.node.id, e))
            .collect();

        let mut nodes = Vec::with_capacity(projection.nodes.len());
        let mut entered = Vec::new();
        let mut retained = 0;

        for visible in projection.nodes {
            let id = visible.id;
            let node = if let Some(mut kept) = active.remove(&id) {
                retained += 1;
                refresh(&mut kept, visible);
                kept
            } else if let Some(revived) = exiting.remove(&id) {
                tracing::debug!("Node {id} re-entered during its exit transition");
                entered.push(id);
                let mut kept = revived.node;
                refresh(&mut kept, visible);
                kept
            } else {
                entered.push(id);
                self.spawn(visible, center)
            };
            nodes.push(node);
        }

        let mut exited = Vec::new();
        let mut still_exiting: Vec<ExitingNode> = exiting.into_values().collect();
        for id in previous_order {
            if let Some(mut node) = active.remove(&id) {
                exited.push(id);
                node.pin = None;
                if !self.exit_duration.is_zero() {
                    still_exiting.push(ExitingNode {
                        node,
                        remaining: self.exit_duration,
                    });
                }
            }
        }
        still_exiting.sort_by_key(|e| e.node.id);

        tracing::debug!(
            "Reconciled {} nodes: {} entered, {} exited, {} retained",
            nodes.len(),
            entered.len(),
            exited.len(),
            retained
        );

        Reconciliation {
            state: GraphState::from_parts(nodes, projection.links, still_exiting, generation + 1),
            entered,
            exited,
            retained,
        }
    }

    fn spawn(&mut self, visible: VisibleNode, center: Vec2) -> LayoutNode {
        let offset = Vec2::new(
            (self.rng.random::<f32>() - 0.5) * self.spread,
            (self.rng.random::<f32>() - 0.5) * self.spread,
        );
        LayoutNode {
            id: visible.id,
            label: visible.label,
            depth: visible.depth,
            kind: visible.kind,
            size_hint: visible.size_hint,
            collapsed: visible.collapsed,
            position: center + offset,
            velocity: Vec2::ZERO,
            pin: None,
        }
    }
}

fn refresh(node: &mut LayoutNode, visible: VisibleNode) {
    node.label = visible.label;
    node.depth = visible.depth;
    node.kind = visible.kind;
    node.size_hint = visible.size_hint;
    node.collapsed = visible.collapsed;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::project;
    use mindgraph_core::Tree;
    use serde_json::json;

    fn reconciler() -> Reconciler {
        Reconciler::with_seed(100.0, Duration::ZERO, 42)
    }

    fn id_of(tree: &Tree, key: &str) -> NodeId {
        tree.root()
            .unwrap()
            .iter()
            .find(|n| n.key() == key)
            .unwrap()
            .id()
    }

    #[test]
    fn test_first_reconcile_spawns_near_center() {
        let tree = Tree::from_value(&json!({"a": 1, "b": {"c": 2}}));
        let center = Vec2::new(400.0, 300.0);
        let result = reconciler().reconcile(GraphState::new(), project(tree.root()), center);

        assert_eq!(result.entered.len(), 4);
        assert!(result.exited.is_empty());
        assert_eq!(result.state.node_count(), 4);
        assert_eq!(result.state.link_count(), 3);
        assert_eq!(result.state.generation(), 1);
        for node in result.state.nodes() {
            assert!((node.position.x - center.x).abs() <= 50.0);
            assert!((node.position.y - center.y).abs() <= 50.0);
            assert_eq!(node.velocity, Vec2::ZERO);
        }
    }

    #[test]
    fn test_unchanged_projection_is_identity() {
        let tree = Tree::from_value(&json!({"a": 1, "b": {"c": 2}}));
        let mut reconciler = reconciler();
        let first = reconciler
            .reconcile(GraphState::new(), project(tree.root()), Vec2::ZERO)
            .state;
        let before = first.nodes().to_vec();

        let second = reconciler.reconcile(first, project(tree.root()), Vec2::ZERO);
        assert!(!second.topology_changed());
        assert_eq!(second.retained, 4);
        assert_eq!(second.state.nodes(), before.as_slice());
    }

    #[test]
    fn test_removed_leaf_leaves_others_untouched() {
        let mut tree = Tree::from_value(&json!({"a": 1, "b": {"c": 2}}));
        let mut reconciler = reconciler();
        let first = reconciler
            .reconcile(GraphState::new(), project(tree.root()), Vec2::ZERO)
            .state;
        let before = first.nodes().to_vec();

        let c = id_of(&tree, "c");
        tree.delete(c).unwrap();
        let result = reconciler.reconcile(first, project(tree.root()), Vec2::ZERO);

        assert_eq!(result.exited, vec![c]);
        assert!(result.entered.is_empty());
        assert!(!result.state.contains(c));
        for node in result.state.nodes() {
            let old = before.iter().find(|n| n.id == node.id).unwrap();
            assert_eq!(node.position, old.position);
            assert_eq!(node.velocity, old.velocity);
        }
    }

    #[test]
    fn test_display_fields_refresh_but_physics_persist() {
        let mut tree = Tree::from_value(&json!({"a": 1}));
        let mut reconciler = reconciler();
        let mut state = reconciler
            .reconcile(GraphState::new(), project(tree.root()), Vec2::ZERO)
            .state;
        let a = id_of(&tree, "a");
        state.pin(a, Vec2::new(12.0, 34.0));

        tree.rename(a, "renamed").unwrap();
        let result = reconciler.reconcile(state, project(tree.root()), Vec2::ZERO);
        let node = result.state.node(a).unwrap();
        assert_eq!(node.label, "renamed");
        assert_eq!(node.position, Vec2::new(12.0, 34.0));
        assert!(node.is_pinned());
    }

    #[test]
    fn test_exit_transition_and_reentry() {
        let mut tree = Tree::from_value(&json!({"a": {"b": 1}}));
        let mut reconciler = Reconciler::with_seed(100.0, Duration::from_millis(300), 3);
        let state = reconciler
            .reconcile(GraphState::new(), project(tree.root()), Vec2::ZERO)
            .state;
        let a = id_of(&tree, "a");
        let b = id_of(&tree, "b");
        let b_position = state.node(b).unwrap().position;

        tree.set_collapsed(a, true).unwrap();
        let collapsed = reconciler.reconcile(state, project(tree.root()), Vec2::ZERO);
        assert_eq!(collapsed.exited, vec![b]);
        assert_eq!(collapsed.state.exiting().len(), 1);

        tree.set_collapsed(a, false).unwrap();
        let expanded = reconciler.reconcile(collapsed.state, project(tree.root()), Vec2::ZERO);
        assert_eq!(expanded.entered, vec![b]);
        assert!(expanded.state.exiting().is_empty());
        assert_eq!(expanded.state.node(b).unwrap().position, b_position);
    }

    #[test]
    fn test_zero_exit_duration_drops_immediately() {
        let mut tree = Tree::from_value(&json!({"a": 1, "b": 2}));
        let mut reconciler = reconciler();
        let state = reconciler
            .reconcile(GraphState::new(), project(tree.root()), Vec2::ZERO)
            .state;
        let root = tree.root().unwrap().id();
        tree.set_collapsed(root, true).unwrap();

        let result = reconciler.reconcile(state, project(tree.root()), Vec2::ZERO);
        assert_eq!(result.exited.len(), 2);
        assert!(result.state.exiting().is_empty());
        assert_eq!(result.state.node_count(), 1);
        assert_eq!(result.state.link_count(), 0);
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use crate::projection::project;
    use mindgraph_core::Tree;
    use proptest::prelude::*;
    use serde_json::{Value, json};

    proptest! {
        #[test]
        fn prop_reconcile_twice_changes_nothing(keys in prop::collection::btree_set("[a-z]{1,5}", 1..12)) {
            let value: Value = keys
                .iter()
                .map(|k| (k.clone(), json!({"x": 1})))
                .collect::<serde_json::Map<_, _>>()
                .into();
            let tree = Tree::from_value(&value);
            let mut reconciler = Reconciler::with_seed(100.0, Duration::ZERO, 9);
            let first = reconciler.reconcile(GraphState::new(), project(tree.root()), Vec2::ZERO).state;
            let snapshot = first.nodes().to_vec();
            let second = reconciler.reconcile(first, project(tree.root()), Vec2::ZERO);
            prop_assert!(second.entered.is_empty());
            prop_assert!(second.exited.is_empty());
            prop_assert_eq!(second.state.nodes(), snapshot.as_slice());
        }
    }
}
