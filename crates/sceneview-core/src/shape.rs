//! Node kinds and their drawable parameters

use std::path::PathBuf;

use glam::{Vec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::error::SceneError;
use crate::mesh::MeshData;
use crate::node::NodeId;

/// Surface appearance shared by drawable leaves
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub color: Vec4,
    pub texture: Option<PathBuf>,
}

impl Material {
    pub fn new(color: Vec4) -> Self {
        Self {
            color,
            texture: None,
        }
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::new(Vec4::ONE)
    }
}

/// Ordered child list of a group. Order is traversal and export order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupNode {
    pub(crate) children: Vec<NodeId>,
}

impl GroupNode {
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn contains(&self, child: NodeId) -> bool {
        self.children.contains(&child)
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoxShape {
    pub half_axis: Vec3,
    pub material: Material,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SphereShape {
    pub radius: f32,
    pub material: Material,
}

/// Radius plus height: cylinders, cones and capsules
#[derive(Debug, Clone, PartialEq)]
pub struct RadialShape {
    pub radius: f32,
    pub height: f32,
    pub material: Material,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArrowShape {
    pub radius: f32,
    pub size: f32,
    pub material: Material,
}

/// A cylinder made of `capsules` stacked segments
#[derive(Debug, Clone, PartialEq)]
pub struct RodShape {
    pub radius: f32,
    pub length: f32,
    pub capsules: usize,
    pub material: Material,
}

/// Three colored axes around a central sphere
#[derive(Debug, Clone, PartialEq)]
pub struct XyzAxisShape {
    pub radius: f32,
    pub size_axis: f32,
    pub material: Material,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LightShape {
    pub radius: f32,
    pub material: Material,
}

/// Triangle mesh leaf. `data` stays `None` until the mesh file is loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshShape {
    pub path: PathBuf,
    pub data: Option<MeshData>,
    pub material: Material,
}

/// Externally loaded scene file, kept as an opaque path
#[derive(Debug, Clone, PartialEq)]
pub struct ColladaShape {
    pub path: PathBuf,
    pub material: Material,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineShape {
    pub points: Vec<Vec3>,
    pub width: f32,
    pub material: Material,
}

/// Planar polygon, three or four corners
#[derive(Debug, Clone, PartialEq)]
pub struct FaceShape {
    pub corners: Vec<Vec3>,
    pub material: Material,
}

/// Checkerboard floor of `length x width` split in square cells
#[derive(Debug, Clone, PartialEq)]
pub struct GroundShape {
    pub length: f32,
    pub width: f32,
    pub square_size: f32,
    pub material: Material,
    pub alternate_color: Vec4,
}

/// The closed set of node kinds
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Group(GroupNode),
    Box(BoxShape),
    Sphere(SphereShape),
    Cylinder(RadialShape),
    Cone(RadialShape),
    Capsule(RadialShape),
    Arrow(ArrowShape),
    Rod(RodShape),
    XyzAxis(XyzAxisShape),
    Light(LightShape),
    Mesh(MeshShape),
    Collada(ColladaShape),
    Line(LineShape),
    Face(FaceShape),
    Ground(GroundShape),
}

impl NodeKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            NodeKind::Group(_) => "Group",
            NodeKind::Box(_) => "Box",
            NodeKind::Sphere(_) => "Sphere",
            NodeKind::Cylinder(_) => "Cylinder",
            NodeKind::Cone(_) => "Cone",
            NodeKind::Capsule(_) => "Capsule",
            NodeKind::Arrow(_) => "Arrow",
            NodeKind::Rod(_) => "Rod",
            NodeKind::XyzAxis(_) => "XyzAxis",
            NodeKind::Light(_) => "Light",
            NodeKind::Mesh(_) => "Mesh",
            NodeKind::Collada(_) => "Collada",
            NodeKind::Line(_) => "Line",
            NodeKind::Face(_) => "Face",
            NodeKind::Ground(_) => "Ground",
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self, NodeKind::Group(_))
    }

    pub fn as_group(&self) -> Option<&GroupNode> {
        match self {
            NodeKind::Group(group) => Some(group),
            _ => None,
        }
    }

    pub(crate) fn as_group_mut(&mut self) -> Option<&mut GroupNode> {
        match self {
            NodeKind::Group(group) => Some(group),
            _ => None,
        }
    }

    pub fn material(&self) -> Option<&Material> {
        match self {
            NodeKind::Group(_) => None,
            NodeKind::Box(s) => Some(&s.material),
            NodeKind::Sphere(s) => Some(&s.material),
            NodeKind::Cylinder(s) | NodeKind::Cone(s) | NodeKind::Capsule(s) => Some(&s.material),
            NodeKind::Arrow(s) => Some(&s.material),
            NodeKind::Rod(s) => Some(&s.material),
            NodeKind::XyzAxis(s) => Some(&s.material),
            NodeKind::Light(s) => Some(&s.material),
            NodeKind::Mesh(s) => Some(&s.material),
            NodeKind::Collada(s) => Some(&s.material),
            NodeKind::Line(s) => Some(&s.material),
            NodeKind::Face(s) => Some(&s.material),
            NodeKind::Ground(s) => Some(&s.material),
        }
    }

    pub(crate) fn material_mut(&mut self) -> Option<&mut Material> {
        match self {
            NodeKind::Group(_) => None,
            NodeKind::Box(s) => Some(&mut s.material),
            NodeKind::Sphere(s) => Some(&mut s.material),
            NodeKind::Cylinder(s) | NodeKind::Cone(s) | NodeKind::Capsule(s) => {
                Some(&mut s.material)
            }
            NodeKind::Arrow(s) => Some(&mut s.material),
            NodeKind::Rod(s) => Some(&mut s.material),
            NodeKind::XyzAxis(s) => Some(&mut s.material),
            NodeKind::Light(s) => Some(&mut s.material),
            NodeKind::Mesh(s) => Some(&mut s.material),
            NodeKind::Collada(s) => Some(&mut s.material),
            NodeKind::Line(s) => Some(&mut s.material),
            NodeKind::Face(s) => Some(&mut s.material),
            NodeKind::Ground(s) => Some(&mut s.material),
        }
    }

    pub fn radius(&self) -> Option<f32> {
        match self {
            NodeKind::Sphere(s) => Some(s.radius),
            NodeKind::Cylinder(s) | NodeKind::Cone(s) | NodeKind::Capsule(s) => Some(s.radius),
            NodeKind::Arrow(s) => Some(s.radius),
            NodeKind::Rod(s) => Some(s.radius),
            NodeKind::XyzAxis(s) => Some(s.radius),
            NodeKind::Light(s) => Some(s.radius),
            _ => None,
        }
    }

    pub(crate) fn radius_mut(&mut self) -> Option<&mut f32> {
        match self {
            NodeKind::Sphere(s) => Some(&mut s.radius),
            NodeKind::Cylinder(s) | NodeKind::Cone(s) | NodeKind::Capsule(s) => {
                Some(&mut s.radius)
            }
            NodeKind::Arrow(s) => Some(&mut s.radius),
            NodeKind::Rod(s) => Some(&mut s.radius),
            NodeKind::XyzAxis(s) => Some(&mut s.radius),
            NodeKind::Light(s) => Some(&mut s.radius),
            _ => None,
        }
    }

    /// Main length of the shape: height, arrow size, rod length or axis size
    pub fn length(&self) -> Option<f32> {
        match self {
            NodeKind::Cylinder(s) | NodeKind::Cone(s) | NodeKind::Capsule(s) => Some(s.height),
            NodeKind::Arrow(s) => Some(s.size),
            NodeKind::Rod(s) => Some(s.length),
            NodeKind::XyzAxis(s) => Some(s.size_axis),
            _ => None,
        }
    }

    pub(crate) fn length_mut(&mut self) -> Option<&mut f32> {
        match self {
            NodeKind::Cylinder(s) | NodeKind::Cone(s) | NodeKind::Capsule(s) => {
                Some(&mut s.height)
            }
            NodeKind::Arrow(s) => Some(&mut s.size),
            NodeKind::Rod(s) => Some(&mut s.length),
            NodeKind::XyzAxis(s) => Some(&mut s.size_axis),
            _ => None,
        }
    }

    /// Check shape parameters before a node of this kind is created
    pub(crate) fn validate(&self) -> Result<(), SceneError> {
        if let Some(radius) = self.radius() {
            positive("radius", radius)?;
        }
        if let Some(length) = self.length() {
            positive("length", length)?;
        }
        match self {
            NodeKind::Box(s) => {
                if !(s.half_axis.is_finite() && s.half_axis.cmpgt(Vec3::ZERO).all()) {
                    return Err(SceneError::InvalidArgument(format!(
                        "box half axes must be positive, got {}",
                        s.half_axis
                    )));
                }
            }
            NodeKind::Rod(s) if s.capsules == 0 => {
                return Err(SceneError::InvalidArgument(
                    "a rod needs at least one capsule".to_string(),
                ));
            }
            NodeKind::Line(s) => {
                if s.points.len() < 2 {
                    return Err(SceneError::InvalidArgument(
                        "a line needs at least two points".to_string(),
                    ));
                }
                positive("line width", s.width)?;
            }
            NodeKind::Face(s) if !(3..=4).contains(&s.corners.len()) => {
                return Err(SceneError::InvalidArgument(format!(
                    "a face needs three or four corners, got {}",
                    s.corners.len()
                )));
            }
            NodeKind::Mesh(MeshShape { data: Some(data), .. }) => {
                data.validate()
                    .map_err(|e| SceneError::InvalidArgument(e.to_string()))?;
            }
            NodeKind::Ground(s) => {
                positive("ground length", s.length)?;
                positive("ground width", s.width)?;
                positive("ground square size", s.square_size)?;
            }
            _ => {}
        }
        Ok(())
    }
}

/// Reject zero, negative and non-finite sizes
pub(crate) fn positive(what: &str, value: f32) -> Result<f32, SceneError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(SceneError::InvalidArgument(format!(
            "{what} must be positive, got {value}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_negative_radius() {
        let kind = NodeKind::Sphere(SphereShape {
            radius: -1.0,
            material: Material::default(),
        });
        assert!(matches!(kind.validate(), Err(SceneError::InvalidArgument(_))));
    }

    #[test]
    fn test_validate_box() {
        let flat = NodeKind::Box(BoxShape {
            half_axis: Vec3::new(1.0, 0.0, 1.0),
            material: Material::default(),
        });
        assert!(flat.validate().is_err());

        let ok = NodeKind::Box(BoxShape {
            half_axis: Vec3::splat(0.5),
            material: Material::default(),
        });
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_validate_face_corner_count() {
        let face = NodeKind::Face(FaceShape {
            corners: vec![Vec3::ZERO, Vec3::X],
            material: Material::default(),
        });
        assert!(face.validate().is_err());
    }

    #[test]
    fn test_shared_accessors() {
        let cone = NodeKind::Cone(RadialShape {
            radius: 0.2,
            height: 1.5,
            material: Material::new(Vec4::new(1.0, 0.0, 0.0, 1.0)),
        });
        assert_eq!(cone.radius(), Some(0.2));
        assert_eq!(cone.length(), Some(1.5));
        assert_eq!(cone.type_name(), "Cone");
        assert!(NodeKind::Group(GroupNode::default()).material().is_none());
    }
}
