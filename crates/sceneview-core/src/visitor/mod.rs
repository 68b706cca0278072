//! Double-dispatch traversal over the node kinds
//!
//! [`SceneGraph::accept`] walks a subtree pre-order, parent before
//! children, children in list order, and calls the `apply_*` method
//! matching each node's kind. Every typed method defaults to
//! [`NodeVisitor::apply_node`], so a visitor only overrides the kinds it
//! cares about.

mod dirty;
mod geom_writer;
mod simplify;
mod transform_writer;

pub use dirty::{IsDirtyVisitor, SetCleanVisitor, SetDirtyVisitor};
pub use geom_writer::BlenderGeomWriterVisitor;
pub use simplify::MeshSimplifierVisitor;
pub use transform_writer::{
    FileTransformWriter, TransformFormat, TransformWriter, TransformWriterVisitor,
};

use crate::configuration::Configuration;
use crate::error::SceneError;
use crate::graph::SceneGraph;
use crate::node::{Node, NodeId, VisibilityMode};
use crate::shape::{
    ArrowShape, BoxShape, ColladaShape, FaceShape, GroundShape, GroupNode, LightShape, LineShape,
    MeshShape, NodeKind, RadialShape, RodShape, SphereShape, XyzAxisShape,
};

/// What the traversal does after a node has been applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Traverse {
    /// Visit the node's children
    Descend,
    /// Skip the node's children
    Prune,
    /// Abort the whole traversal
    Stop,
}

/// Per-node traversal state
#[derive(Debug, Clone, Copy)]
pub struct VisitContext {
    /// World transform of the visited node
    pub global: Configuration,
    /// 0 for the traversal root
    pub depth: usize,
    pub parent: Option<NodeId>,
}

pub trait NodeVisitor {
    /// Whether nodes with [`VisibilityMode::Off`] are visited
    fn invisible_are_valid(&self) -> bool {
        true
    }

    /// Gate checked before each node. A rejected node is skipped together
    /// with its subtree.
    fn valid(&self, node: &Node) -> bool {
        self.invisible_are_valid() || node.visibility() != VisibilityMode::Off
    }

    fn apply_node(&mut self, _node: &Node, _ctx: &VisitContext) -> Traverse {
        Traverse::Descend
    }

    fn apply_group(&mut self, node: &Node, _group: &GroupNode, ctx: &VisitContext) -> Traverse {
        self.apply_node(node, ctx)
    }

    /// Called after all children of a descended group were visited
    fn leave_group(&mut self, _node: &Node, _group: &GroupNode, _ctx: &VisitContext) {}

    fn apply_box(&mut self, node: &Node, _shape: &BoxShape, ctx: &VisitContext) -> Traverse {
        self.apply_node(node, ctx)
    }

    fn apply_sphere(&mut self, node: &Node, _shape: &SphereShape, ctx: &VisitContext) -> Traverse {
        self.apply_node(node, ctx)
    }

    fn apply_cylinder(&mut self, node: &Node, _shape: &RadialShape, ctx: &VisitContext) -> Traverse {
        self.apply_node(node, ctx)
    }

    fn apply_cone(&mut self, node: &Node, _shape: &RadialShape, ctx: &VisitContext) -> Traverse {
        self.apply_node(node, ctx)
    }

    fn apply_capsule(&mut self, node: &Node, _shape: &RadialShape, ctx: &VisitContext) -> Traverse {
        self.apply_node(node, ctx)
    }

    fn apply_arrow(&mut self, node: &Node, _shape: &ArrowShape, ctx: &VisitContext) -> Traverse {
        self.apply_node(node, ctx)
    }

    fn apply_rod(&mut self, node: &Node, _shape: &RodShape, ctx: &VisitContext) -> Traverse {
        self.apply_node(node, ctx)
    }

    fn apply_xyz_axis(&mut self, node: &Node, _shape: &XyzAxisShape, ctx: &VisitContext) -> Traverse {
        self.apply_node(node, ctx)
    }

    fn apply_light(&mut self, node: &Node, _shape: &LightShape, ctx: &VisitContext) -> Traverse {
        self.apply_node(node, ctx)
    }

    fn apply_mesh(&mut self, node: &Node, _shape: &MeshShape, ctx: &VisitContext) -> Traverse {
        self.apply_node(node, ctx)
    }

    fn apply_collada(&mut self, node: &Node, _shape: &ColladaShape, ctx: &VisitContext) -> Traverse {
        self.apply_node(node, ctx)
    }

    fn apply_line(&mut self, node: &Node, _shape: &LineShape, ctx: &VisitContext) -> Traverse {
        self.apply_node(node, ctx)
    }

    fn apply_face(&mut self, node: &Node, _shape: &FaceShape, ctx: &VisitContext) -> Traverse {
        self.apply_node(node, ctx)
    }

    fn apply_ground(&mut self, node: &Node, _shape: &GroundShape, ctx: &VisitContext) -> Traverse {
        self.apply_node(node, ctx)
    }
}

fn dispatch<V: NodeVisitor + ?Sized>(visitor: &mut V, node: &Node, ctx: &VisitContext) -> Traverse {
    match node.kind() {
        NodeKind::Group(g) => visitor.apply_group(node, g, ctx),
        NodeKind::Box(s) => visitor.apply_box(node, s, ctx),
        NodeKind::Sphere(s) => visitor.apply_sphere(node, s, ctx),
        NodeKind::Cylinder(s) => visitor.apply_cylinder(node, s, ctx),
        NodeKind::Cone(s) => visitor.apply_cone(node, s, ctx),
        NodeKind::Capsule(s) => visitor.apply_capsule(node, s, ctx),
        NodeKind::Arrow(s) => visitor.apply_arrow(node, s, ctx),
        NodeKind::Rod(s) => visitor.apply_rod(node, s, ctx),
        NodeKind::XyzAxis(s) => visitor.apply_xyz_axis(node, s, ctx),
        NodeKind::Light(s) => visitor.apply_light(node, s, ctx),
        NodeKind::Mesh(s) => visitor.apply_mesh(node, s, ctx),
        NodeKind::Collada(s) => visitor.apply_collada(node, s, ctx),
        NodeKind::Line(s) => visitor.apply_line(node, s, ctx),
        NodeKind::Face(s) => visitor.apply_face(node, s, ctx),
        NodeKind::Ground(s) => visitor.apply_ground(node, s, ctx),
    }
}

impl SceneGraph {
    /// Run `visitor` over the subtree rooted at `root`
    pub fn accept<V: NodeVisitor + ?Sized>(&self, root: NodeId, visitor: &mut V) -> Result<(), SceneError> {
        let node = self.node(root)?;
        let parent_global = match node.parent() {
            Some(parent) => self.global_transform(parent)?,
            None => Configuration::IDENTITY,
        };
        self.visit(root, parent_global, 0, visitor);
        Ok(())
    }

    /// Run `visitor` over every root subtree in turn. A `Stop` ends the
    /// whole pass.
    pub fn accept_roots<V: NodeVisitor + ?Sized>(&self, visitor: &mut V) {
        for root in self.roots() {
            if !self.visit(root, Configuration::IDENTITY, 0, visitor) {
                break;
            }
        }
    }

    /// Returns false once the traversal has been stopped
    fn visit<V: NodeVisitor + ?Sized>(
        &self,
        id: NodeId,
        parent_global: Configuration,
        depth: usize,
        visitor: &mut V,
    ) -> bool {
        let Some(node) = self.get(id) else {
            return true;
        };
        if !visitor.valid(node) {
            return true;
        }

        let ctx = VisitContext {
            global: parent_global.compose(&node.local_transform()),
            depth,
            parent: node.parent(),
        };
        match dispatch(visitor, node, &ctx) {
            Traverse::Stop => return false,
            Traverse::Prune => return true,
            Traverse::Descend => {}
        }

        if let NodeKind::Group(group) = node.kind() {
            for child in group.children() {
                if !self.visit(*child, ctx.global, depth + 1, visitor) {
                    return false;
                }
            }
            visitor.leave_group(node, group, &ctx);
        }
        true
    }
}
