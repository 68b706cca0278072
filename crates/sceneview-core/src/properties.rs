//! Named, typed node attributes
//!
//! Each node carries a table of properties, so that UIs and scripts can
//! enumerate and get/set attributes by name without knowing the node kind.

use std::collections::BTreeMap;
use std::fmt;

use glam::{Vec2, Vec3, Vec4};

use crate::configuration::Configuration;
use crate::error::SceneError;
use crate::node::{LightingMode, Node, VisibilityMode, WireframeMode};
use crate::shape::NodeKind;

/// Value carried through the property protocol
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Bool(bool),
    Int(i32),
    Float(f32),
    String(String),
    Vector2(Vec2),
    Vector3(Vec3),
    Vector4(Vec4),
    Configuration(Configuration),
}

impl PropertyValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            PropertyValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            PropertyValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_vec3(&self) -> Option<Vec3> {
        match self {
            PropertyValue::Vector3(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_vec4(&self) -> Option<Vec4> {
        match self {
            PropertyValue::Vector4(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_configuration(&self) -> Option<Configuration> {
        match self {
            PropertyValue::Configuration(v) => Some(*v),
            _ => None,
        }
    }

    fn matches(&self, ty: PropertyType) -> bool {
        matches!(
            (self, ty),
            (PropertyValue::Bool(_), PropertyType::Bool)
                | (PropertyValue::Int(_), PropertyType::Int)
                | (PropertyValue::Float(_), PropertyType::Float)
                | (PropertyValue::String(_), PropertyType::String)
                | (PropertyValue::Vector2(_), PropertyType::Vector2)
                | (PropertyValue::Vector3(_), PropertyType::Vector3)
                | (PropertyValue::Vector4(_), PropertyType::Vector4)
                | (PropertyValue::Configuration(_), PropertyType::Configuration)
        )
    }
}

/// Named integer enumeration exposed through enum properties
#[derive(Debug, PartialEq, Eq)]
pub struct MetaEnum {
    pub type_name: &'static str,
    pub names: &'static [&'static str],
    pub values: &'static [i32],
}

impl MetaEnum {
    pub fn from_name(&self, name: &str) -> Option<i32> {
        self.names
            .iter()
            .position(|n| *n == name)
            .map(|i| self.values[i])
    }

    pub fn name_of(&self, value: i32) -> Option<&'static str> {
        self.values
            .iter()
            .position(|v| *v == value)
            .map(|i| self.names[i])
    }

    pub fn contains(&self, value: i32) -> bool {
        self.values.contains(&value)
    }
}

pub static VISIBILITY_ENUM: MetaEnum = MetaEnum {
    type_name: "VisibilityMode",
    names: &["ON", "ALWAYS_ON_TOP", "OFF"],
    values: &[0, 1, 2],
};

pub static WIREFRAME_ENUM: MetaEnum = MetaEnum {
    type_name: "WireframeMode",
    names: &["FILL", "WIREFRAME", "FILL_AND_WIREFRAME"],
    values: &[0, 1, 2],
};

pub static LIGHTING_ENUM: MetaEnum = MetaEnum {
    type_name: "LightingMode",
    names: &["ON", "OFF"],
    values: &[0, 1],
};

/// Type tag of a property
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PropertyType {
    Bool,
    Int,
    Float,
    String,
    Vector2,
    Vector3,
    Vector4,
    Configuration,
    /// Stored as `Int`, settable by value or by name
    Enum(&'static MetaEnum),
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyType::Bool => write!(f, "bool"),
            PropertyType::Int => write!(f, "int"),
            PropertyType::Float => write!(f, "float"),
            PropertyType::String => write!(f, "string"),
            PropertyType::Vector2 => write!(f, "vector2"),
            PropertyType::Vector3 => write!(f, "vector3"),
            PropertyType::Vector4 => write!(f, "vector4"),
            PropertyType::Configuration => write!(f, "configuration"),
            PropertyType::Enum(meta) => write!(f, "enum {}", meta.type_name),
        }
    }
}

pub type Getter = fn(&Node) -> PropertyValue;
pub type Setter = fn(&mut Node, PropertyValue) -> Result<(), SceneError>;

/// Typed accessor pair. A missing getter or setter makes the property
/// write-only or read-only.
#[derive(Debug, Clone)]
pub struct Property {
    pub ty: PropertyType,
    pub getter: Option<Getter>,
    pub setter: Option<Setter>,
    /// Inclusive bounds for `Int` and `Float` values
    pub range: Option<(f32, f32)>,
    pub description: &'static str,
    /// Run the setter even when the value is unchanged
    pub always_apply: bool,
}

impl Property {
    pub fn new(ty: PropertyType, getter: Option<Getter>, setter: Option<Setter>) -> Self {
        Self {
            ty,
            getter,
            setter,
            range: None,
            description: "",
            always_apply: false,
        }
    }

    pub fn read_only(ty: PropertyType, getter: Getter) -> Self {
        Self::new(ty, Some(getter), None)
    }

    pub fn read_write(ty: PropertyType, getter: Getter, setter: Setter) -> Self {
        Self::new(ty, Some(getter), Some(setter))
    }

    pub fn write_only(ty: PropertyType, setter: Setter) -> Self {
        Self::new(ty, None, Some(setter))
    }

    pub fn with_range(mut self, min: f32, max: f32) -> Self {
        self.range = Some((min, max));
        self
    }

    pub fn with_always_apply(mut self) -> Self {
        self.always_apply = true;
        self
    }

    pub fn with_description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    pub fn has_read_access(&self) -> bool {
        self.getter.is_some()
    }

    pub fn has_write_access(&self) -> bool {
        self.setter.is_some()
    }

    pub(crate) fn get(&self, name: &str, node: &Node) -> Result<PropertyValue, SceneError> {
        let getter = self.getter.ok_or_else(|| SceneError::PropertyAccess {
            property: name.to_string(),
            access: "write-only".to_string(),
        })?;
        Ok(getter(node))
    }

    /// Type-check `value` and bring it to the stored representation.
    pub(crate) fn coerce(&self, name: &str, value: PropertyValue) -> Result<PropertyValue, SceneError> {
        let type_error = || SceneError::PropertyType {
            property: name.to_string(),
            expected: self.ty.to_string(),
        };

        let value = match self.ty {
            PropertyType::Enum(meta) => match value {
                PropertyValue::Int(v) if meta.contains(v) => PropertyValue::Int(v),
                PropertyValue::Int(v) => {
                    return Err(SceneError::InvalidArgument(format!(
                        "{v} is not a valid {} value",
                        meta.type_name
                    )));
                }
                PropertyValue::String(s) => match meta.from_name(&s) {
                    Some(v) => PropertyValue::Int(v),
                    None => {
                        return Err(SceneError::InvalidArgument(format!(
                            "'{s}' is not a valid {} name",
                            meta.type_name
                        )));
                    }
                },
                _ => return Err(type_error()),
            },
            ty if value.matches(ty) => value,
            _ => return Err(type_error()),
        };

        if let Some((min, max)) = self.range {
            let scalar = match &value {
                PropertyValue::Float(v) => Some(*v),
                PropertyValue::Int(v) => Some(*v as f32),
                _ => None,
            };
            if let Some(v) = scalar
                && !(min..=max).contains(&v)
            {
                return Err(SceneError::InvalidArgument(format!(
                    "property '{name}' must be within [{min}, {max}], got {v}"
                )));
            }
        }
        Ok(value)
    }
}

pub type PropertyMap = BTreeMap<String, Property>;

fn expect_bool(value: &PropertyValue) -> Result<bool, SceneError> {
    value.as_bool().ok_or_else(|| mismatch("bool"))
}

fn expect_int(value: &PropertyValue) -> Result<i32, SceneError> {
    value.as_int().ok_or_else(|| mismatch("int"))
}

fn expect_float(value: &PropertyValue) -> Result<f32, SceneError> {
    value.as_float().ok_or_else(|| mismatch("float"))
}

fn expect_vec3(value: &PropertyValue) -> Result<Vec3, SceneError> {
    value.as_vec3().ok_or_else(|| mismatch("vector3"))
}

fn expect_vec4(value: &PropertyValue) -> Result<Vec4, SceneError> {
    value.as_vec4().ok_or_else(|| mismatch("vector4"))
}

fn mismatch(expected: &str) -> SceneError {
    SceneError::InvalidArgument(format!("expected a {expected} value"))
}

/// Properties every node exposes
pub(crate) fn base_properties() -> PropertyMap {
    let mut map = PropertyMap::new();
    map.insert(
        "Name".into(),
        Property::read_only(PropertyType::String, |n| {
            PropertyValue::String(n.name().to_string())
        }),
    );
    map.insert(
        "Visibility".into(),
        Property::read_write(
            PropertyType::Enum(&VISIBILITY_ENUM),
            |n| PropertyValue::Int(n.visibility() as i32),
            |n, v| {
                n.set_visibility(VisibilityMode::from_index(expect_int(&v)?)?);
                Ok(())
            },
        ),
    );
    map.insert(
        "WireframeMode".into(),
        Property::read_write(
            PropertyType::Enum(&WIREFRAME_ENUM),
            |n| PropertyValue::Int(n.wireframe_mode() as i32),
            |n, v| {
                n.set_wireframe_mode(WireframeMode::from_index(expect_int(&v)?)?);
                Ok(())
            },
        ),
    );
    map.insert(
        "LightingMode".into(),
        Property::read_write(
            PropertyType::Enum(&LIGHTING_ENUM),
            |n| PropertyValue::Int(n.lighting_mode() as i32),
            |n, v| {
                n.set_lighting_mode(LightingMode::from_index(expect_int(&v)?)?);
                Ok(())
            },
        ),
    );
    map.insert(
        "Highlight/State".into(),
        Property::read_write(
            PropertyType::Int,
            |n| PropertyValue::Int(n.highlight_state() as i32),
            |n, v| n.set_highlight_state(expect_int(&v)?),
        )
        .with_range(0.0, 8.0),
    );
    map.insert(
        "Highlight/Enable".into(),
        Property::read_write(
            PropertyType::Bool,
            |n| PropertyValue::Bool(n.highlight_enabled()),
            |n, v| {
                n.set_highlight_enabled(expect_bool(&v)?);
                Ok(())
            },
        ),
    );
    map.insert(
        "Landmark".into(),
        Property::read_write(
            PropertyType::Bool,
            |n| PropertyValue::Bool(n.landmark().is_some()),
            |n, v| {
                if expect_bool(&v)? {
                    n.add_default_landmark()
                } else {
                    n.delete_landmark();
                    Ok(())
                }
            },
        ),
    );
    map.insert(
        "Selectable".into(),
        Property::read_write(
            PropertyType::Bool,
            |n| PropertyValue::Bool(n.is_selectable()),
            |n, v| {
                n.set_selectable(expect_bool(&v)?);
                Ok(())
            },
        ),
    );
    map.insert(
        "Alpha".into(),
        Property::read_write(
            PropertyType::Float,
            |n| PropertyValue::Float(n.alpha()),
            |n, v| n.set_alpha(expect_float(&v)?),
        )
        .with_range(0.0, 1.0),
    );
    map.insert(
        "Scale".into(),
        Property::read_write(
            PropertyType::Vector3,
            |n| PropertyValue::Vector3(n.scale()),
            |n, v| n.set_scale(expect_vec3(&v)?),
        ),
    );
    map.insert(
        "Transform".into(),
        Property::read_write(
            PropertyType::Configuration,
            |n| PropertyValue::Configuration(n.dynamic_configuration()),
            |n, v| {
                let config = v.as_configuration().ok_or_else(|| mismatch("configuration"))?;
                n.apply_configuration(config);
                Ok(())
            },
        )
        .with_always_apply(),
    );
    map
}

/// Properties specific to a node kind
pub(crate) fn kind_properties(kind: &NodeKind) -> PropertyMap {
    let mut map = PropertyMap::new();

    if kind.material().is_some() {
        map.insert(
            "Color".into(),
            Property::write_only(PropertyType::Vector4, |n, v| n.set_color(expect_vec4(&v)?))
                .with_description("RGBA color"),
        );
    }
    if kind.radius().is_some() {
        map.insert(
            "Radius".into(),
            Property::read_write(
                PropertyType::Float,
                |n| PropertyValue::Float(n.kind().radius().unwrap_or_default()),
                |n, v| n.set_radius(expect_float(&v)?),
            ),
        );
    }

    let length_name = match kind {
        NodeKind::Cylinder(_) | NodeKind::Cone(_) | NodeKind::Capsule(_) => Some("Height"),
        NodeKind::Arrow(_) => Some("Size"),
        NodeKind::Rod(_) => Some("Length"),
        NodeKind::XyzAxis(_) => Some("SizeAxis"),
        _ => None,
    };
    if let Some(name) = length_name {
        map.insert(
            name.into(),
            Property::read_write(
                PropertyType::Float,
                |n| PropertyValue::Float(n.kind().length().unwrap_or_default()),
                |n, v| n.set_length(expect_float(&v)?),
            ),
        );
    }

    match kind {
        NodeKind::Box(_) => {
            map.insert(
                "HalfLength".into(),
                Property::read_write(
                    PropertyType::Vector3,
                    |n| match n.kind() {
                        NodeKind::Box(b) => PropertyValue::Vector3(b.half_axis),
                        _ => PropertyValue::Vector3(Vec3::ZERO),
                    },
                    |n, v| n.set_half_axis(expect_vec3(&v)?),
                ),
            );
        }
        NodeKind::Mesh(_) | NodeKind::Collada(_) => {
            map.insert(
                "MeshFile".into(),
                Property::read_only(PropertyType::String, |n| {
                    let path = match n.kind() {
                        NodeKind::Mesh(m) => m.path.display().to_string(),
                        NodeKind::Collada(c) => c.path.display().to_string(),
                        _ => String::new(),
                    };
                    PropertyValue::String(path)
                }),
            );
            map.insert(
                "Texture".into(),
                Property::read_write(
                    PropertyType::String,
                    |n| {
                        let texture = n
                            .kind()
                            .material()
                            .and_then(|m| m.texture.as_ref())
                            .map(|t| t.display().to_string())
                            .unwrap_or_default();
                        PropertyValue::String(texture)
                    },
                    |n, v| {
                        let path = v.as_str().ok_or_else(|| mismatch("string"))?;
                        n.set_texture(path)
                    },
                ),
            );
        }
        NodeKind::Line(_) => {
            map.insert(
                "Point1".into(),
                Property::read_write(
                    PropertyType::Vector3,
                    |n| line_point(n, 0),
                    |n, v| n.set_line_point(0, expect_vec3(&v)?),
                ),
            );
            map.insert(
                "Point2".into(),
                Property::read_write(
                    PropertyType::Vector3,
                    |n| line_point(n, 1),
                    |n, v| n.set_line_point(1, expect_vec3(&v)?),
                ),
            );
            map.insert(
                "LineWidth".into(),
                Property::read_write(
                    PropertyType::Float,
                    |n| match n.kind() {
                        NodeKind::Line(l) => PropertyValue::Float(l.width),
                        _ => PropertyValue::Float(0.0),
                    },
                    |n, v| n.set_line_width(expect_float(&v)?),
                ),
            );
        }
        _ => {}
    }
    map
}

fn line_point(node: &Node, index: usize) -> PropertyValue {
    match node.kind() {
        NodeKind::Line(l) => PropertyValue::Vector3(l.points.get(index).copied().unwrap_or_default()),
        _ => PropertyValue::Vector3(Vec3::ZERO),
    }
}
