//! Redraw decision visitors

use crate::node::{Node, VisibilityMode};

use super::{NodeVisitor, Traverse, VisitContext};

/// Finds whether any reachable node needs its render state rebuilt.
///
/// The traversal stops at the first dirty node. A node with visibility
/// `Off` is still checked itself; with `invisible_are_valid == false` its
/// subtree is not descended.
#[derive(Debug, Clone)]
pub struct IsDirtyVisitor {
    invisible_are_valid: bool,
    dirty: bool,
}

impl IsDirtyVisitor {
    pub fn new(invisible_are_valid: bool) -> Self {
        Self {
            invisible_are_valid,
            dirty: false,
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn reset(&mut self) {
        self.dirty = false;
    }
}

impl NodeVisitor for IsDirtyVisitor {
    fn invisible_are_valid(&self) -> bool {
        self.invisible_are_valid
    }

    fn valid(&self, _node: &Node) -> bool {
        !self.dirty
    }

    fn apply_node(&mut self, node: &Node, _ctx: &VisitContext) -> Traverse {
        if node.is_dirty() {
            self.dirty = true;
            return Traverse::Stop;
        }
        if !self.invisible_are_valid && node.visibility() == VisibilityMode::Off {
            return Traverse::Prune;
        }
        Traverse::Descend
    }
}

/// Marks every visited node dirty, regardless of visibility
#[derive(Debug, Clone, Copy, Default)]
pub struct SetDirtyVisitor;

impl NodeVisitor for SetDirtyVisitor {
    fn valid(&self, _node: &Node) -> bool {
        true
    }

    fn apply_node(&mut self, node: &Node, _ctx: &VisitContext) -> Traverse {
        node.set_dirty(true);
        Traverse::Descend
    }
}

/// Marks every visited node clean, regardless of visibility
#[derive(Debug, Clone, Copy, Default)]
pub struct SetCleanVisitor;

impl NodeVisitor for SetCleanVisitor {
    fn valid(&self, _node: &Node) -> bool {
        true
    }

    fn apply_node(&mut self, node: &Node, _ctx: &VisitContext) -> Traverse {
        node.set_dirty(false);
        Traverse::Descend
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::SceneGraph;
    use crate::node::NodeId;
    use glam::{Vec3, Vec4};

    struct Tree {
        graph: SceneGraph,
        root: NodeId,
        hidden: NodeId,
        deep_leaf: NodeId,
    }

    /// root -> [a, hidden -> [deep -> [deep_leaf]]]
    fn tree() -> Tree {
        let mut graph = SceneGraph::new();
        let root = graph.create_group("root").unwrap();
        let a = graph.create_sphere("root/a", 1.0, Vec4::ONE).unwrap();
        let hidden = graph.create_group("root/hidden").unwrap();
        let deep = graph.create_group("root/hidden/deep").unwrap();
        let deep_leaf = graph
            .create_box("root/hidden/deep/leaf", Vec3::ONE, Vec4::ONE)
            .unwrap();
        graph.add_child(root, a).unwrap();
        graph.add_child(root, hidden).unwrap();
        graph.add_child(hidden, deep).unwrap();
        graph.add_child(deep, deep_leaf).unwrap();
        graph.accept(root, &mut SetCleanVisitor).unwrap();
        Tree {
            graph,
            root,
            hidden,
            deep_leaf,
        }
    }

    fn is_dirty(graph: &SceneGraph, root: NodeId, invisible_are_valid: bool) -> bool {
        let mut visitor = IsDirtyVisitor::new(invisible_are_valid);
        graph.accept(root, &mut visitor).unwrap();
        visitor.is_dirty()
    }

    #[test]
    fn test_clean_tree_is_not_dirty() {
        let t = tree();
        assert!(!is_dirty(&t.graph, t.root, true));
        assert!(!is_dirty(&t.graph, t.root, false));
    }

    #[test]
    fn test_dirty_round_trip() {
        let mut t = tree();
        t.graph
            .node_mut(t.deep_leaf)
            .unwrap()
            .set_color(Vec4::new(0.0, 1.0, 0.0, 1.0))
            .unwrap();
        assert!(is_dirty(&t.graph, t.root, true));

        t.graph.accept(t.root, &mut SetCleanVisitor).unwrap();
        assert!(!is_dirty(&t.graph, t.root, true));
    }

    #[test]
    fn test_invisible_node_itself_is_checked() {
        let mut t = tree();
        t.graph
            .node_mut(t.hidden)
            .unwrap()
            .set_visibility(VisibilityMode::Off);
        assert!(t.graph.node(t.hidden).unwrap().is_dirty());

        assert!(is_dirty(&t.graph, t.root, false));
        assert!(is_dirty(&t.graph, t.root, true));
    }

    #[test]
    fn test_invisible_subtree_policy() {
        let mut t = tree();
        t.graph
            .node_mut(t.hidden)
            .unwrap()
            .set_visibility(VisibilityMode::Off);
        t.graph.node(t.hidden).unwrap().set_dirty(false);
        t.graph
            .node_mut(t.deep_leaf)
            .unwrap()
            .set_half_axis(Vec3::splat(2.0))
            .unwrap();

        // Skipping invisible subtrees hides the dirty descendant
        assert!(!is_dirty(&t.graph, t.root, false));
        // Including them finds it
        assert!(is_dirty(&t.graph, t.root, true));
    }

    #[test]
    fn test_set_dirty_ignores_visibility() {
        let mut t = tree();
        t.graph
            .node_mut(t.hidden)
            .unwrap()
            .set_visibility(VisibilityMode::Off);
        t.graph.accept(t.root, &mut SetCleanVisitor).unwrap();
        assert!(!t.graph.node(t.deep_leaf).unwrap().is_dirty());

        t.graph.accept(t.root, &mut SetDirtyVisitor).unwrap();
        assert!(t.graph.node(t.deep_leaf).unwrap().is_dirty());
        assert!(t.graph.iter().all(Node::is_dirty));
    }
}
