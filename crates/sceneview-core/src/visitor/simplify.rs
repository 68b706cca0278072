//! Mesh decimation over a subtree

use crate::error::SceneError;
use crate::graph::SceneGraph;
use crate::mesh::{MeshData, MeshError};
use crate::node::{Node, NodeId};
use crate::shape::MeshShape;

use super::{NodeVisitor, Traverse, VisitContext};

/// Simplifies every loaded mesh leaf it visits.
///
/// Results are collected during the traversal and written back with
/// [`apply`](Self::apply), which marks the touched leaves dirty.
#[derive(Debug)]
pub struct MeshSimplifierVisitor {
    ratio: f32,
    results: Vec<(NodeId, MeshData)>,
    failures: Vec<(String, MeshError)>,
}

impl MeshSimplifierVisitor {
    pub fn new(ratio: f32) -> Result<Self, SceneError> {
        if !(ratio > 0.0 && ratio <= 1.0) {
            return Err(SceneError::InvalidArgument(
                MeshError::InvalidRatio(ratio).to_string(),
            ));
        }
        Ok(Self {
            ratio,
            results: Vec::new(),
            failures: Vec::new(),
        })
    }

    pub fn ratio(&self) -> f32 {
        self.ratio
    }

    /// Meshes that could not be simplified, by node name
    pub fn failures(&self) -> &[(String, MeshError)] {
        &self.failures
    }

    /// Store the simplified meshes in the graph; returns how many changed
    pub fn apply(self, graph: &mut SceneGraph) -> Result<usize, SceneError> {
        let count = self.results.len();
        for (id, data) in self.results {
            graph.node_mut(id)?.set_mesh_data(data)?;
        }
        Ok(count)
    }
}

impl NodeVisitor for MeshSimplifierVisitor {
    fn apply_mesh(&mut self, node: &Node, shape: &MeshShape, _ctx: &VisitContext) -> Traverse {
        let Some(data) = &shape.data else {
            tracing::debug!("Mesh '{}' is not loaded, skipping", node.name());
            return Traverse::Descend;
        };
        match data.simplify(self.ratio) {
            Ok(simplified) => {
                tracing::debug!(
                    "Simplified '{}': {} -> {} vertices",
                    node.name(),
                    data.vertices.len(),
                    simplified.vertices.len()
                );
                self.results.push((node.id(), simplified));
            }
            Err(error) => {
                tracing::warn!("Could not simplify '{}': {}", node.name(), error);
                self.failures.push((node.name().to_string(), error));
            }
        }
        Traverse::Descend
    }
}

impl SceneGraph {
    /// Simplify all loaded meshes under `root` to about `ratio` of their
    /// vertices. Returns the number of meshes replaced.
    pub fn simplify_meshes(&mut self, root: NodeId, ratio: f32) -> Result<usize, SceneError> {
        let mut visitor = MeshSimplifierVisitor::new(ratio)?;
        self.accept(root, &mut visitor)?;
        visitor.apply(self)
    }
}
