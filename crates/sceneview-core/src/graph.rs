//! Scene graph arena: node ownership, naming and group composition

use std::collections::HashMap;
use std::path::PathBuf;

use glam::{Vec3, Vec4};

use crate::configuration::Configuration;
use crate::defaults::SceneDefaults;
use crate::error::SceneError;
use crate::mesh::MeshData;
use crate::node::{LightingMode, Node, NodeId, WireframeMode};
use crate::shape::{
    ArrowShape, BoxShape, ColladaShape, FaceShape, GroundShape, GroupNode, LightShape, LineShape,
    Material, MeshShape, NodeKind, RadialShape, RodShape, SphereShape, XyzAxisShape,
};

/// Owns every node and resolves names and ids.
///
/// A node removed from its group stays in the arena, detached, until
/// [`delete_node`](Self::delete_node) is called. Ids of deleted nodes
/// resolve to [`SceneError::NodeIdNotFound`].
#[derive(Debug, Clone, Default)]
pub struct SceneGraph {
    nodes: HashMap<NodeId, Node>,
    name_index: HashMap<String, NodeId>,
    defaults: SceneDefaults,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults(defaults: SceneDefaults) -> Self {
        Self {
            defaults,
            ..Self::default()
        }
    }

    pub fn defaults(&self) -> &SceneDefaults {
        &self.defaults
    }

    // ---- lookup ----

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn node(&self, id: NodeId) -> Result<&Node, SceneError> {
        self.nodes.get(&id).ok_or(SceneError::NodeIdNotFound(id))
    }

    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, SceneError> {
        self.nodes.get_mut(&id).ok_or(SceneError::NodeIdNotFound(id))
    }

    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.name_index.get(name).copied()
    }

    pub fn id_of(&self, name: &str) -> Result<NodeId, SceneError> {
        self.find(name)
            .ok_or_else(|| SceneError::NodeNotFound(name.to_string()))
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.name_index.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// All node names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.name_index.keys().cloned().collect();
        names.sort();
        names
    }

    /// Nodes without a parent, sorted by name
    pub fn roots(&self) -> Vec<NodeId> {
        let mut roots: Vec<&Node> = self.nodes.values().filter(|n| n.parent.is_none()).collect();
        roots.sort_by(|a, b| a.name().cmp(b.name()));
        roots.into_iter().map(Node::id).collect()
    }

    // ---- factories ----

    /// Insert a new node of `kind`. Names are unique across the graph.
    pub fn create_node(&mut self, name: &str, kind: NodeKind) -> Result<NodeId, SceneError> {
        if name.is_empty() {
            return Err(SceneError::InvalidArgument("node name is empty".to_string()));
        }
        if self.name_index.contains_key(name) {
            return Err(SceneError::NameTaken(name.to_string()));
        }
        kind.validate()?;

        let mut node = Node::new(name, kind);
        node.landmark_size = self.defaults.landmark_size;
        let id = node.id();
        tracing::debug!("Created {} node '{}'", node.kind().type_name(), name);
        self.name_index.insert(name.to_string(), id);
        self.nodes.insert(id, node);
        Ok(id)
    }

    pub fn create_group(&mut self, name: &str) -> Result<NodeId, SceneError> {
        self.create_node(name, NodeKind::Group(GroupNode::default()))
    }

    pub fn create_box(&mut self, name: &str, half_axis: Vec3, color: Vec4) -> Result<NodeId, SceneError> {
        self.create_node(
            name,
            NodeKind::Box(BoxShape {
                half_axis,
                material: Material::new(color),
            }),
        )
    }

    pub fn create_sphere(&mut self, name: &str, radius: f32, color: Vec4) -> Result<NodeId, SceneError> {
        self.create_node(
            name,
            NodeKind::Sphere(SphereShape {
                radius,
                material: Material::new(color),
            }),
        )
    }

    pub fn create_cylinder(&mut self, name: &str, radius: f32, height: f32, color: Vec4) -> Result<NodeId, SceneError> {
        self.create_node(name, NodeKind::Cylinder(radial(radius, height, color)))
    }

    pub fn create_cone(&mut self, name: &str, radius: f32, height: f32, color: Vec4) -> Result<NodeId, SceneError> {
        self.create_node(name, NodeKind::Cone(radial(radius, height, color)))
    }

    pub fn create_capsule(&mut self, name: &str, radius: f32, height: f32, color: Vec4) -> Result<NodeId, SceneError> {
        self.create_node(name, NodeKind::Capsule(radial(radius, height, color)))
    }

    pub fn create_arrow(&mut self, name: &str, radius: f32, size: f32, color: Vec4) -> Result<NodeId, SceneError> {
        self.create_node(
            name,
            NodeKind::Arrow(ArrowShape {
                radius,
                size,
                material: Material::new(color),
            }),
        )
    }

    pub fn create_rod(
        &mut self,
        name: &str,
        radius: f32,
        length: f32,
        capsules: usize,
        color: Vec4,
    ) -> Result<NodeId, SceneError> {
        self.create_node(
            name,
            NodeKind::Rod(RodShape {
                radius,
                length,
                capsules,
                material: Material::new(color),
            }),
        )
    }

    pub fn create_xyz_axis(&mut self, name: &str, radius: f32, size_axis: f32, color: Vec4) -> Result<NodeId, SceneError> {
        self.create_node(
            name,
            NodeKind::XyzAxis(XyzAxisShape {
                radius,
                size_axis,
                material: Material::new(color),
            }),
        )
    }

    pub fn create_light(&mut self, name: &str, radius: f32, color: Vec4) -> Result<NodeId, SceneError> {
        self.create_node(
            name,
            NodeKind::Light(LightShape {
                radius,
                material: Material::new(color),
            }),
        )
    }

    pub fn create_line(&mut self, name: &str, from: Vec3, to: Vec3, color: Vec4) -> Result<NodeId, SceneError> {
        self.create_node(
            name,
            NodeKind::Line(LineShape {
                points: vec![from, to],
                width: 1.0,
                material: Material::new(color),
            }),
        )
    }

    pub fn create_face(&mut self, name: &str, corners: Vec<Vec3>, color: Vec4) -> Result<NodeId, SceneError> {
        self.create_node(
            name,
            NodeKind::Face(FaceShape {
                corners,
                material: Material::new(color),
            }),
        )
    }

    /// Mesh leaf referencing `path`, with triangles if already loaded
    pub fn create_mesh(
        &mut self,
        name: &str,
        path: impl Into<PathBuf>,
        data: Option<MeshData>,
        color: Vec4,
    ) -> Result<NodeId, SceneError> {
        self.create_node(
            name,
            NodeKind::Mesh(MeshShape {
                path: path.into(),
                data,
                material: Material::new(color),
            }),
        )
    }

    pub fn create_collada(&mut self, name: &str, path: impl Into<PathBuf>, color: Vec4) -> Result<NodeId, SceneError> {
        self.create_node(
            name,
            NodeKind::Collada(ColladaShape {
                path: path.into(),
                material: Material::new(color),
            }),
        )
    }

    /// Square checkerboard floor using the graph defaults
    pub fn create_ground(&mut self, name: &str) -> Result<NodeId, SceneError> {
        let size = self.defaults.ground_size;
        let [first, second] = self.defaults.ground_colors;
        self.create_node(
            name,
            NodeKind::Ground(GroundShape {
                length: size,
                width: size,
                square_size: self.defaults.ground_square_size,
                material: Material::new(Vec4::from_array(first)),
                alternate_color: Vec4::from_array(second),
            }),
        )
    }

    // ---- group composition ----

    pub fn children(&self, group: NodeId) -> Result<&[NodeId], SceneError> {
        Ok(self.group(group)?.children())
    }

    pub fn has_child(&self, group: NodeId, child: NodeId) -> bool {
        self.get(group)
            .and_then(|g| g.kind().as_group())
            .is_some_and(|g| g.contains(child))
    }

    /// Append `child` to `group`. A child already held by another group is
    /// moved. Marks the group dirty.
    pub fn add_child(&mut self, group: NodeId, child: NodeId) -> Result<(), SceneError> {
        self.group(group)?;
        let child_node = self.node(child)?;
        let child_parent = child_node.parent;

        if child_parent == Some(group) {
            return Err(SceneError::DuplicateChild {
                group: self.name_of(group),
                child: self.name_of(child),
            });
        }
        if self.would_create_cycle(group, child) {
            return Err(SceneError::WouldCreateCycle {
                group: self.name_of(group),
                child: self.name_of(child),
            });
        }

        if let Some(old_parent) = child_parent {
            self.detach(old_parent, child);
        }
        if let Some(node) = self.nodes.get_mut(&group) {
            if let Some(g) = node.kind.as_group_mut() {
                g.children.push(child);
            }
            node.set_dirty(true);
        }
        if let Some(node) = self.nodes.get_mut(&child) {
            node.parent = Some(group);
        }
        Ok(())
    }

    /// Remove `child` from `group` without destroying it
    pub fn remove_child(&mut self, group: NodeId, child: NodeId) -> Result<(), SceneError> {
        if !self.group(group)?.contains(child) {
            return Err(SceneError::ChildNotFound {
                group: self.name_of(group),
                child: self.name_of(child),
            });
        }
        self.detach(group, child);
        Ok(())
    }

    pub fn remove_all_children(&mut self, group: NodeId) -> Result<(), SceneError> {
        let children = self.group(group)?.children().to_vec();
        for child in children {
            self.detach(group, child);
        }
        if let Some(node) = self.nodes.get_mut(&group) {
            node.set_dirty(true);
        }
        Ok(())
    }

    fn detach(&mut self, group: NodeId, child: NodeId) {
        if let Some(node) = self.nodes.get_mut(&group) {
            if let Some(g) = node.kind.as_group_mut() {
                g.children.retain(|c| *c != child);
            }
            node.set_dirty(true);
        }
        if let Some(node) = self.nodes.get_mut(&child)
            && node.parent == Some(group)
        {
            node.parent = None;
        }
    }

    /// Check if adding child under group would create a cycle
    pub(crate) fn would_create_cycle(&self, group: NodeId, child: NodeId) -> bool {
        let mut current = Some(group);
        while let Some(id) = current {
            if id == child {
                return true;
            }
            current = self.nodes.get(&id).and_then(|n| n.parent);
        }
        false
    }

    fn group(&self, id: NodeId) -> Result<&GroupNode, SceneError> {
        let node = self.node(id)?;
        node.kind()
            .as_group()
            .ok_or_else(|| SceneError::NotAGroup(node.name().to_string()))
    }

    fn name_of(&self, id: NodeId) -> String {
        self.get(id)
            .map(|n| n.name().to_string())
            .unwrap_or_else(|| id.to_string())
    }

    /// Ids of `root` and every descendant, pre-order
    pub fn subtree(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            out.push(id);
            if let Some(group) = node.kind().as_group() {
                stack.extend(group.children().iter().rev());
            }
        }
        out
    }

    /// Remove a node from the graph. With `recursive`, descendants are
    /// deleted too; otherwise they are left detached.
    pub fn delete_node(&mut self, id: NodeId, recursive: bool) -> Result<(), SceneError> {
        let parent = self.node(id)?.parent;
        if let Some(parent) = parent {
            self.detach(parent, id);
        }

        let doomed = if recursive {
            self.subtree(id)
        } else {
            vec![id]
        };
        for node_id in &doomed {
            if let Some(node) = self.nodes.remove(node_id) {
                self.name_index.remove(node.name());
                if let Some(group) = node.kind().as_group() {
                    for child in group.children() {
                        if let Some(child) = self.nodes.get_mut(child) {
                            child.parent = None;
                        }
                    }
                }
            }
        }
        tracing::debug!("Deleted {} node(s)", doomed.len());
        Ok(())
    }

    /// Deep copy of the subtree at `source` under a new name. Descendant
    /// names sharing the source prefix get the new prefix, others are
    /// nested under it. The copy is detached.
    pub fn clone_node(&mut self, source: NodeId, name: &str) -> Result<NodeId, SceneError> {
        let source_name = self.node(source)?.name().to_string();
        let ids = self.subtree(source);

        let mut renamed: Vec<(NodeId, String)> = Vec::with_capacity(ids.len());
        for id in &ids {
            let old = self.node(*id)?.name();
            let new = if *id == source {
                name.to_string()
            } else if let Some(rest) = old.strip_prefix(&source_name) {
                format!("{name}{rest}")
            } else {
                format!("{name}/{old}")
            };
            if new.is_empty() {
                return Err(SceneError::InvalidArgument("node name is empty".to_string()));
            }
            if self.name_index.contains_key(&new) || renamed.iter().any(|(_, n)| *n == new) {
                return Err(SceneError::NameTaken(new));
            }
            renamed.push((*id, new));
        }

        let mut id_map: HashMap<NodeId, NodeId> = HashMap::new();
        let mut copies: Vec<Node> = Vec::with_capacity(renamed.len());
        for (id, new_name) in &renamed {
            let copy = self.node(*id)?.duplicate(new_name.as_str());
            id_map.insert(*id, copy.id());
            copies.push(copy);
        }
        for copy in &mut copies {
            if let Some(group) = copy.kind.as_group_mut() {
                for child in &mut group.children {
                    if let Some(new_child) = id_map.get(child) {
                        *child = *new_child;
                    }
                }
            }
        }
        let root = id_map.get(&source).copied().ok_or(SceneError::NodeIdNotFound(source))?;
        for copy in copies {
            self.name_index.insert(copy.name().to_string(), copy.id());
            self.nodes.insert(copy.id(), copy);
        }
        for id in self.subtree(root) {
            let children = self
                .get(id)
                .and_then(|n| n.kind().as_group())
                .map(|g| g.children().to_vec())
                .unwrap_or_default();
            for child in children {
                if let Some(c) = self.nodes.get_mut(&child) {
                    c.parent = Some(id);
                }
            }
        }
        Ok(root)
    }

    // ---- transforms ----

    /// World transform of a node: the composition of every local transform
    /// from the root down to `id`.
    pub fn global_transform(&self, id: NodeId) -> Result<Configuration, SceneError> {
        let mut chain = Vec::new();
        let mut current = Some(id);
        while let Some(node_id) = current {
            let node = self.node(node_id)?;
            chain.push(node.local_transform());
            current = node.parent;
        }
        Ok(chain
            .into_iter()
            .rev()
            .fold(Configuration::IDENTITY, |acc, local| acc.compose(&local)))
    }

    // ---- subtree-wide styling ----

    /// Set the color of a leaf, or of every leaf below a group
    pub fn set_color(&mut self, id: NodeId, color: Vec4) -> Result<(), SceneError> {
        if !color.is_finite() {
            return Err(SceneError::InvalidArgument(format!("invalid color {color}")));
        }
        let ids = self.subtree(id);
        for node_id in ids {
            if let Some(node) = self.nodes.get_mut(&node_id) {
                if node.is_group() {
                    node.set_dirty(true);
                } else {
                    node.set_color(color)?;
                }
            }
        }
        Ok(())
    }

    /// Set alpha on a node and every descendant
    pub fn set_alpha(&mut self, id: NodeId, alpha: f32) -> Result<(), SceneError> {
        if !(0.0..=1.0).contains(&alpha) {
            return Err(SceneError::InvalidArgument(format!(
                "alpha must be within [0, 1], got {alpha}"
            )));
        }
        self.node(id)?;
        for node_id in self.subtree(id) {
            if let Some(node) = self.nodes.get_mut(&node_id) {
                node.set_alpha(alpha)?;
            }
        }
        Ok(())
    }

    pub fn set_lighting_mode(&mut self, id: NodeId, mode: LightingMode) -> Result<(), SceneError> {
        self.node(id)?;
        for node_id in self.subtree(id) {
            if let Some(node) = self.nodes.get_mut(&node_id) {
                node.set_lighting_mode(mode);
            }
        }
        Ok(())
    }

    pub fn set_wireframe_mode(&mut self, id: NodeId, mode: WireframeMode) -> Result<(), SceneError> {
        self.node(id)?;
        for node_id in self.subtree(id) {
            if let Some(node) = self.nodes.get_mut(&node_id) {
                node.set_wireframe_mode(mode);
            }
        }
        Ok(())
    }
}

fn radial(radius: f32, height: f32, color: Vec4) -> RadialShape {
    RadialShape {
        radius,
        height,
        material: Material::new(color),
    }
}
