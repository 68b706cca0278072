//! Seam towards the rendering engine
//!
//! The scene graph never draws. A [`RenderBackend`] owns one drawable per
//! node and is told, under the frame lock, which nodes changed.

use std::collections::HashMap;

use glam::{Vec3, Vec4};

use crate::configuration::Configuration;
use crate::graph::SceneGraph;
use crate::node::{Node, NodeId, VisibilityMode};
use crate::visitor::{NodeVisitor, Traverse, VisitContext};

pub trait RenderBackend: Send {
    /// Create or refresh the drawable of `node`, placed at `global`
    fn sync_node(&mut self, node: &Node, global: &Configuration);

    /// Drop the drawable of a deleted node
    fn remove_node(&mut self, id: NodeId);

    /// Render one frame from the current drawables
    fn draw(&mut self);
}

/// Syncs every dirty node and everything below it, since moving a group
/// moves its whole subtree. Invisible nodes are synced too so that the
/// backend can hide them.
pub struct RebuildVisitor<'a, B: RenderBackend + ?Sized> {
    backend: &'a mut B,
    dirty_depth: Option<usize>,
    synced: usize,
}

impl<'a, B: RenderBackend + ?Sized> RebuildVisitor<'a, B> {
    pub fn new(backend: &'a mut B) -> Self {
        Self {
            backend,
            dirty_depth: None,
            synced: 0,
        }
    }

    pub fn synced(&self) -> usize {
        self.synced
    }
}

impl<B: RenderBackend + ?Sized> NodeVisitor for RebuildVisitor<'_, B> {
    fn apply_node(&mut self, node: &Node, ctx: &VisitContext) -> Traverse {
        if let Some(depth) = self.dirty_depth
            && ctx.depth <= depth
        {
            self.dirty_depth = None;
        }
        if self.dirty_depth.is_none() && node.is_dirty() {
            self.dirty_depth = Some(ctx.depth);
        }
        if self.dirty_depth.is_some() {
            self.backend.sync_node(node, &ctx.global);
            self.synced += 1;
        }
        Traverse::Descend
    }
}

impl SceneGraph {
    /// Push the dirty part of every root's subtree to `backend`. Returns
    /// the number of synced nodes.
    pub fn rebuild<B: RenderBackend + ?Sized>(&self, backend: &mut B) -> usize {
        let mut visitor = RebuildVisitor::new(backend);
        self.accept_roots(&mut visitor);
        visitor.synced()
    }
}

/// What a [`HeadlessBackend`] knows about one drawable
#[derive(Debug, Clone, PartialEq)]
pub struct DrawableState {
    pub name: String,
    pub kind: &'static str,
    pub global: Configuration,
    pub scale: Vec3,
    pub color: Option<Vec4>,
    pub visible: bool,
    pub revision: u64,
}

/// Backend without a window. Keeps the last synced state of every node,
/// for tests and for running the viewer without a display.
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    drawables: HashMap<NodeId, DrawableState>,
    frames: u64,
    syncs: u64,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drawable(&self, id: NodeId) -> Option<&DrawableState> {
        self.drawables.get(&id)
    }

    pub fn drawables(&self) -> impl Iterator<Item = (&NodeId, &DrawableState)> {
        self.drawables.iter()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn syncs(&self) -> u64 {
        self.syncs
    }
}

impl RenderBackend for HeadlessBackend {
    fn sync_node(&mut self, node: &Node, global: &Configuration) {
        self.syncs += 1;
        let revision = self
            .drawables
            .get(&node.id())
            .map_or(0, |d| d.revision + 1);
        self.drawables.insert(
            node.id(),
            DrawableState {
                name: node.name().to_string(),
                kind: node.kind().type_name(),
                global: *global,
                scale: node.scale(),
                color: node.color(),
                visible: node.visibility() != VisibilityMode::Off,
                revision,
            },
        );
    }

    fn remove_node(&mut self, id: NodeId) {
        self.drawables.remove(&id);
    }

    fn draw(&mut self) {
        self.frames += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::visitor::SetCleanVisitor;

    #[test]
    fn test_rebuild_syncs_dirty_subtree() {
        let mut graph = SceneGraph::new();
        let root = graph.create_group("root").unwrap();
        let arm = graph.create_group("root/arm").unwrap();
        let hand = graph.create_sphere("root/arm/hand", 0.1, Vec4::ONE).unwrap();
        let other = graph.create_sphere("root/other", 0.1, Vec4::ONE).unwrap();
        graph.add_child(root, arm).unwrap();
        graph.add_child(arm, hand).unwrap();
        graph.add_child(root, other).unwrap();

        let mut backend = HeadlessBackend::new();
        assert_eq!(graph.rebuild(&mut backend), 4);
        graph.accept(root, &mut SetCleanVisitor).unwrap();

        graph
            .node_mut(arm)
            .unwrap()
            .apply_configuration(Configuration::from_position(Vec3::Z));
        assert_eq!(graph.rebuild(&mut backend), 2);

        let hand_state = backend.drawable(hand).unwrap();
        assert_eq!(hand_state.revision, 1);
        assert_eq!(hand_state.global.position, Vec3::Z);
        assert_eq!(backend.drawable(other).unwrap().revision, 0);
    }

    #[test]
    fn test_hidden_node_is_synced_invisible() {
        let mut graph = SceneGraph::new();
        let ball = graph.create_sphere("ball", 0.1, Vec4::ONE).unwrap();
        graph
            .node_mut(ball)
            .unwrap()
            .set_visibility(VisibilityMode::Off);

        let mut backend = HeadlessBackend::new();
        graph.rebuild(&mut backend);
        assert!(!backend.drawable(ball).unwrap().visible);

        backend.remove_node(ball);
        assert!(backend.drawable(ball).is_none());
    }
}
