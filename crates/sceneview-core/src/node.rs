//! Scene graph node

use std::path::Path;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};

use glam::{Quat, Vec3, Vec4};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::configuration::Configuration;
use crate::error::SceneError;
use crate::mesh::MeshData;
use crate::properties::{self, Property, PropertyMap, PropertyValue};
use crate::shape::{NodeKind, positive};

/// Arena handle of a node inside a [`SceneGraph`](crate::SceneGraph)
pub type NodeId = Uuid;

macro_rules! node_mode {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident = $index:literal => $label:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
        pub enum $name {
            #[default]
            $($variant = $index),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }

            pub fn from_index(index: i32) -> Result<Self, SceneError> {
                match index {
                    $($index => Ok($name::$variant),)+
                    _ => Err(SceneError::InvalidArgument(format!(
                        "{index} is not a valid {}",
                        stringify!($name)
                    ))),
                }
            }
        }

        impl FromStr for $name {
            type Err = SceneError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($label => Ok($name::$variant),)+
                    _ => Err(SceneError::InvalidArgument(format!(
                        "unknown {} '{s}'",
                        stringify!($name)
                    ))),
                }
            }
        }
    };
}

node_mode! {
    /// How a node takes part in drawing
    VisibilityMode { On = 0 => "ON", AlwaysOnTop = 1 => "ALWAYS_ON_TOP", Off = 2 => "OFF" }
}

node_mode! {
    WireframeMode { Fill = 0 => "FILL", Wireframe = 1 => "WIREFRAME", FillAndWireframe = 2 => "FILL_AND_WIREFRAME" }
}

node_mode! {
    LightingMode { On = 0 => "ON", Off = 1 => "OFF" }
}

pub const MAX_HIGHLIGHT_STATE: i32 = 8;

/// A scene graph entity, drawable leaf or group.
///
/// Nodes live in a [`SceneGraph`](crate::SceneGraph) arena and are created
/// through its factory methods. Every successful mutation sets the dirty
/// flag; a rejected one leaves the node untouched.
#[derive(Debug)]
pub struct Node {
    id: NodeId,
    name: String,
    pub(crate) parent: Option<NodeId>,
    static_transform: Configuration,
    dynamic: Configuration,
    scale: Vec3,
    visibility: VisibilityMode,
    lighting: LightingMode,
    wireframe: WireframeMode,
    highlight_state: u8,
    highlight_enabled: bool,
    alpha: f32,
    landmark: Option<f32>,
    /// Size used when a landmark is added without one
    pub(crate) landmark_size: f32,
    selectable: bool,
    dirty: AtomicBool,
    properties: PropertyMap,
    pub(crate) kind: NodeKind,
}

impl Clone for Node {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            name: self.name.clone(),
            parent: self.parent,
            static_transform: self.static_transform,
            dynamic: self.dynamic,
            scale: self.scale,
            visibility: self.visibility,
            lighting: self.lighting,
            wireframe: self.wireframe,
            highlight_state: self.highlight_state,
            highlight_enabled: self.highlight_enabled,
            alpha: self.alpha,
            landmark: self.landmark,
            landmark_size: self.landmark_size,
            selectable: self.selectable,
            dirty: AtomicBool::new(self.is_dirty()),
            properties: self.properties.clone(),
            kind: self.kind.clone(),
        }
    }
}

impl Node {
    pub(crate) fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        let mut properties = properties::base_properties();
        properties.extend(properties::kind_properties(&kind));
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            parent: None,
            static_transform: Configuration::IDENTITY,
            dynamic: Configuration::IDENTITY,
            scale: Vec3::ONE,
            visibility: VisibilityMode::On,
            lighting: LightingMode::On,
            wireframe: WireframeMode::Fill,
            highlight_state: 0,
            highlight_enabled: true,
            alpha: 1.0,
            landmark: None,
            landmark_size: crate::defaults::DEFAULT_LANDMARK_SIZE,
            selectable: true,
            dirty: AtomicBool::new(true),
            properties,
            kind,
        }
    }

    /// Copy with a fresh id and name, detached from any parent
    pub(crate) fn duplicate(&self, name: impl Into<String>) -> Self {
        let mut copy = self.clone();
        copy.id = Uuid::new_v4();
        copy.name = name.into();
        copy.parent = None;
        copy.mark_dirty();
        copy
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn is_group(&self) -> bool {
        self.kind.is_group()
    }

    // ---- dirty flag ----

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Stamp the dirty flag. Visitors use this on shared references.
    pub fn set_dirty(&self, dirty: bool) {
        self.dirty.store(dirty, Ordering::Release);
    }

    fn mark_dirty(&self) {
        self.set_dirty(true);
    }

    // ---- transforms ----

    pub fn set_static_transform(&mut self, config: Configuration) {
        self.static_transform = config.normalized();
        self.mark_dirty();
    }

    pub fn static_transform(&self) -> Configuration {
        self.static_transform
    }

    pub fn static_position(&self) -> Vec3 {
        self.static_transform.position
    }

    pub fn static_rotation(&self) -> Quat {
        self.static_transform.quat
    }

    /// Set this frame's pose. Always marks dirty, even for an unchanged value.
    pub fn apply_configuration(&mut self, config: Configuration) {
        self.dynamic = config.normalized();
        self.mark_dirty();
    }

    pub fn dynamic_configuration(&self) -> Configuration {
        self.dynamic
    }

    /// Transform relative to the parent: the dynamic configuration is the
    /// outer frame, the static transform is expressed inside it.
    pub fn local_transform(&self) -> Configuration {
        self.dynamic.compose(&self.static_transform)
    }

    pub fn scale(&self) -> Vec3 {
        self.scale
    }

    pub fn set_scale(&mut self, scale: Vec3) -> Result<(), SceneError> {
        if !scale.is_finite() || scale.cmpeq(Vec3::ZERO).any() {
            return Err(SceneError::InvalidArgument(format!(
                "scale must be finite and non-zero, got {scale}"
            )));
        }
        self.scale = scale;
        self.mark_dirty();
        Ok(())
    }

    // ---- display modes ----

    pub fn visibility(&self) -> VisibilityMode {
        self.visibility
    }

    pub fn set_visibility(&mut self, mode: VisibilityMode) {
        if self.visibility != mode {
            self.visibility = mode;
            self.mark_dirty();
        }
    }

    pub fn lighting_mode(&self) -> LightingMode {
        self.lighting
    }

    pub fn set_lighting_mode(&mut self, mode: LightingMode) {
        if self.lighting != mode {
            self.lighting = mode;
            self.mark_dirty();
        }
    }

    pub fn wireframe_mode(&self) -> WireframeMode {
        self.wireframe
    }

    pub fn set_wireframe_mode(&mut self, mode: WireframeMode) {
        if self.wireframe != mode {
            self.wireframe = mode;
            self.mark_dirty();
        }
    }

    pub fn highlight_state(&self) -> u8 {
        self.highlight_state
    }

    pub fn set_highlight_state(&mut self, state: i32) -> Result<(), SceneError> {
        if !(0..=MAX_HIGHLIGHT_STATE).contains(&state) {
            return Err(SceneError::InvalidArgument(format!(
                "highlight state must be within 0..={MAX_HIGHLIGHT_STATE}, got {state}"
            )));
        }
        if self.highlight_state as i32 != state {
            self.highlight_state = state as u8;
            self.mark_dirty();
        }
        Ok(())
    }

    pub fn highlight_enabled(&self) -> bool {
        self.highlight_enabled
    }

    pub fn set_highlight_enabled(&mut self, enabled: bool) {
        if self.highlight_enabled != enabled {
            self.highlight_enabled = enabled;
            self.mark_dirty();
        }
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn set_alpha(&mut self, alpha: f32) -> Result<(), SceneError> {
        if !(0.0..=1.0).contains(&alpha) {
            return Err(SceneError::InvalidArgument(format!(
                "alpha must be within [0, 1], got {alpha}"
            )));
        }
        if self.alpha != alpha {
            self.alpha = alpha;
            self.mark_dirty();
        }
        Ok(())
    }

    pub fn transparency(&self) -> f32 {
        1.0 - self.alpha
    }

    pub fn set_transparency(&mut self, transparency: f32) -> Result<(), SceneError> {
        self.set_alpha(1.0 - transparency)
    }

    pub fn landmark(&self) -> Option<f32> {
        self.landmark
    }

    pub fn add_landmark(&mut self, size: f32) -> Result<(), SceneError> {
        let size = positive("landmark size", size)?;
        self.landmark = Some(size);
        self.mark_dirty();
        Ok(())
    }

    /// Add a landmark of the scene's default size
    pub fn add_default_landmark(&mut self) -> Result<(), SceneError> {
        self.add_landmark(self.landmark_size)
    }

    pub fn delete_landmark(&mut self) {
        if self.landmark.take().is_some() {
            self.mark_dirty();
        }
    }

    pub fn is_selectable(&self) -> bool {
        self.selectable
    }

    pub fn set_selectable(&mut self, selectable: bool) {
        if self.selectable != selectable {
            self.selectable = selectable;
            self.mark_dirty();
        }
    }

    // ---- leaf geometry ----

    /// Set the color of a drawable leaf. Groups are handled by
    /// [`SceneGraph::set_color`](crate::SceneGraph::set_color).
    pub fn set_color(&mut self, color: Vec4) -> Result<(), SceneError> {
        if !color.is_finite() {
            return Err(SceneError::InvalidArgument(format!("invalid color {color}")));
        }
        let name = &self.name;
        let material = self
            .kind
            .material_mut()
            .ok_or_else(|| SceneError::InvalidArgument(format!("node '{name}' has no color")))?;
        material.color = color;
        self.mark_dirty();
        Ok(())
    }

    pub fn color(&self) -> Option<Vec4> {
        self.kind.material().map(|m| m.color)
    }

    pub fn set_texture(&mut self, path: impl AsRef<Path>) -> Result<(), SceneError> {
        let path = path.as_ref();
        let name = &self.name;
        let material = self
            .kind
            .material_mut()
            .ok_or_else(|| SceneError::InvalidArgument(format!("node '{name}' has no material")))?;
        material.texture = if path.as_os_str().is_empty() {
            None
        } else {
            Some(path.to_path_buf())
        };
        self.mark_dirty();
        Ok(())
    }

    pub fn set_radius(&mut self, radius: f32) -> Result<(), SceneError> {
        let radius = positive("radius", radius)?;
        let name = &self.name;
        let slot = self
            .kind
            .radius_mut()
            .ok_or_else(|| SceneError::InvalidArgument(format!("node '{name}' has no radius")))?;
        *slot = radius;
        self.mark_dirty();
        Ok(())
    }

    /// Height of cylinders, cones and capsules, arrow size, rod length or
    /// axis size.
    pub fn set_length(&mut self, length: f32) -> Result<(), SceneError> {
        let length = positive("length", length)?;
        let name = &self.name;
        let slot = self
            .kind
            .length_mut()
            .ok_or_else(|| SceneError::InvalidArgument(format!("node '{name}' has no length")))?;
        *slot = length;
        self.mark_dirty();
        Ok(())
    }

    pub fn set_half_axis(&mut self, half_axis: Vec3) -> Result<(), SceneError> {
        match &mut self.kind {
            NodeKind::Box(shape) => {
                if !(half_axis.is_finite() && half_axis.cmpgt(Vec3::ZERO).all()) {
                    return Err(SceneError::InvalidArgument(format!(
                        "box half axes must be positive, got {half_axis}"
                    )));
                }
                shape.half_axis = half_axis;
            }
            _ => {
                return Err(SceneError::InvalidArgument(format!(
                    "node '{}' is not a box",
                    self.name
                )));
            }
        }
        self.mark_dirty();
        Ok(())
    }

    pub fn set_line_point(&mut self, index: usize, point: Vec3) -> Result<(), SceneError> {
        match &mut self.kind {
            NodeKind::Line(line) if index < line.points.len() => line.points[index] = point,
            NodeKind::Line(line) => {
                return Err(SceneError::InvalidArgument(format!(
                    "line '{}' has {} points, no index {index}",
                    self.name,
                    line.points.len()
                )));
            }
            _ => {
                return Err(SceneError::InvalidArgument(format!(
                    "node '{}' is not a line",
                    self.name
                )));
            }
        }
        self.mark_dirty();
        Ok(())
    }

    pub fn set_line_width(&mut self, width: f32) -> Result<(), SceneError> {
        let width = positive("line width", width)?;
        match &mut self.kind {
            NodeKind::Line(line) => line.width = width,
            _ => {
                return Err(SceneError::InvalidArgument(format!(
                    "node '{}' is not a line",
                    self.name
                )));
            }
        }
        self.mark_dirty();
        Ok(())
    }

    /// Replace the loaded triangles of a mesh leaf
    pub fn set_mesh_data(&mut self, data: MeshData) -> Result<(), SceneError> {
        data.validate()
            .map_err(|e| SceneError::InvalidArgument(e.to_string()))?;
        match &mut self.kind {
            NodeKind::Mesh(mesh) => mesh.data = Some(data),
            _ => {
                return Err(SceneError::InvalidArgument(format!(
                    "node '{}' is not a mesh",
                    self.name
                )));
            }
        }
        self.mark_dirty();
        Ok(())
    }

    // ---- properties ----

    pub fn has_property(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.get(name)
    }

    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.properties.keys().map(String::as_str)
    }

    /// Register an extra property. Names are unique per node.
    pub fn add_property(&mut self, name: impl Into<String>, property: Property) -> Result<(), SceneError> {
        let name = name.into();
        if self.properties.contains_key(&name) {
            return Err(SceneError::InvalidArgument(format!(
                "node '{}' already has a property '{name}'",
                self.name
            )));
        }
        self.properties.insert(name, property);
        Ok(())
    }

    pub fn get_property(&self, name: &str) -> Result<PropertyValue, SceneError> {
        self.lookup(name)?.get(name, self)
    }

    /// Type-checked set by name. Marks dirty on success.
    pub fn set_property(&mut self, name: &str, value: PropertyValue) -> Result<(), SceneError> {
        let property = self.lookup(name)?.clone();
        let setter = property.setter.ok_or_else(|| SceneError::PropertyAccess {
            property: name.to_string(),
            access: "read-only".to_string(),
        })?;
        let value = property.coerce(name, value)?;

        if !property.always_apply
            && let Some(getter) = property.getter
            && getter(self) == value
        {
            return Ok(());
        }

        setter(self, value)?;
        self.mark_dirty();
        Ok(())
    }

    fn lookup(&self, name: &str) -> Result<&Property, SceneError> {
        self.properties
            .get(name)
            .ok_or_else(|| SceneError::PropertyNotFound {
                node: self.name.clone(),
                property: name.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::properties::PropertyType;
    use crate::shape::{BoxShape, GroupNode, Material, SphereShape};
    use approx::assert_relative_eq;

    fn sphere(name: &str) -> Node {
        Node::new(
            name,
            NodeKind::Sphere(SphereShape {
                radius: 1.0,
                material: Material::default(),
            }),
        )
    }

    fn unit_box(name: &str) -> Node {
        Node::new(
            name,
            NodeKind::Box(BoxShape {
                half_axis: Vec3::splat(0.5),
                material: Material::default(),
            }),
        )
    }

    #[test]
    fn test_new_node_is_dirty() {
        let node = sphere("s");
        assert!(node.is_dirty());
        assert_eq!(node.visibility(), VisibilityMode::On);
        assert_eq!(node.alpha(), 1.0);
    }

    #[test]
    fn test_set_static_transform_marks_dirty() {
        let mut node = sphere("s");
        node.set_dirty(false);
        let config = Configuration::new(Vec3::ONE, Quat::from_rotation_x(0.4));
        node.set_static_transform(config);
        assert!(node.is_dirty());

        node.set_static_transform(config);
        assert_eq!(node.static_position(), Vec3::ONE);
        assert!(node.static_rotation().abs_diff_eq(config.quat, 1e-6));
        assert!(node.is_dirty());
    }

    #[test]
    fn test_apply_configuration_always_marks_dirty() {
        let mut node = sphere("s");
        let config = Configuration::from_position(Vec3::X);
        node.apply_configuration(config);
        node.set_dirty(false);
        node.apply_configuration(config);
        assert!(node.is_dirty());
        assert_eq!(node.dynamic_configuration(), config);
    }

    #[test]
    fn test_setters_normalize_orientation() {
        let mut node = sphere("s");
        let stretched = Configuration {
            position: Vec3::ZERO,
            quat: Quat::from_xyzw(0.0, 0.0, 0.0, 2.0),
        };
        node.set_static_transform(Configuration::from_position(Vec3::X));
        node.apply_configuration(stretched);
        assert_relative_eq!(node.dynamic_configuration().quat.length(), 1.0, epsilon = 1e-6);
        assert!(node.local_transform().position.abs_diff_eq(Vec3::X, 1e-6));

        node.set_static_transform(stretched);
        assert_relative_eq!(node.static_rotation().w, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_same_transform_property_marks_dirty() {
        let mut node = sphere("s");
        node.set_dirty(false);
        node.set_property("Transform", PropertyValue::Configuration(Configuration::IDENTITY))
            .unwrap();
        assert!(node.is_dirty());

        // other properties still skip unchanged values
        node.set_dirty(false);
        node.set_property("Alpha", PropertyValue::Float(1.0)).unwrap();
        assert!(!node.is_dirty());
    }

    #[test]
    fn test_local_transform_convention() {
        let mut node = sphere("s");
        node.set_static_transform(Configuration::from_position(Vec3::ONE));
        let q1 = Quat::from_xyzw(0.5, 0.5, 0.5, 0.5);
        let t1 = Vec3::new(0.0, 0.0, 1.0);
        node.apply_configuration(Configuration::new(t1, q1));

        let local = node.local_transform();
        let expected = t1 + q1 * Vec3::ONE;
        assert_relative_eq!(local.position.x, expected.x, epsilon = 1e-6);
        assert_relative_eq!(local.position.y, expected.y, epsilon = 1e-6);
        assert_relative_eq!(local.position.z, expected.z, epsilon = 1e-6);
        assert!(local.quat.abs_diff_eq(q1, 1e-6));
    }

    #[test]
    fn test_unchanged_visibility_keeps_clean() {
        let mut node = sphere("s");
        node.set_dirty(false);
        node.set_visibility(VisibilityMode::On);
        assert!(!node.is_dirty());
        node.set_visibility(VisibilityMode::Off);
        assert!(node.is_dirty());
    }

    #[test]
    fn test_invalid_radius_leaves_node_clean() {
        let mut node = sphere("s");
        node.set_dirty(false);
        assert!(node.set_radius(-2.0).is_err());
        assert!(!node.is_dirty());
        assert_eq!(node.kind().radius(), Some(1.0));

        node.set_radius(2.0).unwrap();
        assert!(node.is_dirty());
        assert_eq!(node.kind().radius(), Some(2.0));
    }

    #[test]
    fn test_group_has_no_color() {
        let mut group = Node::new("g", NodeKind::Group(GroupNode::default()));
        group.set_dirty(false);
        assert!(group.set_color(Vec4::ONE).is_err());
        assert!(!group.is_dirty());
        assert!(!group.has_property("Color"));
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("ALWAYS_ON_TOP".parse::<VisibilityMode>().unwrap(), VisibilityMode::AlwaysOnTop);
        assert_eq!("FILL_AND_WIREFRAME".parse::<WireframeMode>().unwrap(), WireframeMode::FillAndWireframe);
        assert!("on".parse::<LightingMode>().is_err());
        assert_eq!(VisibilityMode::Off.as_str(), "OFF");
    }

    #[test]
    fn test_property_get_set() {
        let mut node = unit_box("b");
        node.set_dirty(false);

        node.set_property("HalfLength", PropertyValue::Vector3(Vec3::new(1.0, 2.0, 3.0)))
            .unwrap();
        assert!(node.is_dirty());
        assert_eq!(
            node.get_property("HalfLength").unwrap(),
            PropertyValue::Vector3(Vec3::new(1.0, 2.0, 3.0))
        );
        assert_eq!(
            node.get_property("Name").unwrap(),
            PropertyValue::String("b".to_string())
        );
    }

    #[test]
    fn test_property_errors_keep_node_clean() {
        let mut node = unit_box("b");
        node.set_dirty(false);

        assert!(matches!(
            node.set_property("HalfLength", PropertyValue::Float(1.0)),
            Err(SceneError::PropertyType { .. })
        ));
        assert!(matches!(
            node.set_property("Name", PropertyValue::String("x".into())),
            Err(SceneError::PropertyAccess { .. })
        ));
        assert!(matches!(
            node.get_property("Color"),
            Err(SceneError::PropertyAccess { .. })
        ));
        assert!(matches!(
            node.get_property("Nope"),
            Err(SceneError::PropertyNotFound { .. })
        ));
        assert!(matches!(
            node.set_property("Visibility", PropertyValue::String("HIDDEN".into())),
            Err(SceneError::InvalidArgument(_))
        ));
        assert!(matches!(
            node.set_property("Alpha", PropertyValue::Float(2.0)),
            Err(SceneError::InvalidArgument(_))
        ));
        assert!(!node.is_dirty());
    }

    #[test]
    fn test_enum_property_by_name() {
        let mut node = sphere("s");
        node.set_property("Visibility", PropertyValue::String("OFF".into()))
            .unwrap();
        assert_eq!(node.visibility(), VisibilityMode::Off);
        assert_eq!(node.get_property("Visibility").unwrap(), PropertyValue::Int(2));

        node.set_property("WireframeMode", PropertyValue::Int(1)).unwrap();
        assert_eq!(node.wireframe_mode(), WireframeMode::Wireframe);
    }

    #[test]
    fn test_setting_same_value_is_noop() {
        let mut node = sphere("s");
        node.set_dirty(false);
        node.set_property("Radius", PropertyValue::Float(1.0)).unwrap();
        assert!(!node.is_dirty());
    }

    #[test]
    fn test_add_property() {
        let mut node = sphere("s");
        let prop = Property::read_only(PropertyType::Int, |_| PropertyValue::Int(42));
        node.add_property("Answer", prop.clone()).unwrap();
        assert_eq!(node.get_property("Answer").unwrap(), PropertyValue::Int(42));
        assert!(node.add_property("Answer", prop).is_err());
        assert!(node.property_names().any(|n| n == "Answer"));
    }

    #[test]
    fn test_landmark() {
        let mut node = sphere("s");
        assert!(node.add_landmark(0.0).is_err());
        node.add_landmark(0.1).unwrap();
        assert_eq!(node.landmark(), Some(0.1));
        node.set_dirty(false);
        node.delete_landmark();
        assert!(node.is_dirty());
        assert_eq!(node.landmark(), None);
    }
}
