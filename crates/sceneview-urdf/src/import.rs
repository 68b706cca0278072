//! URDF import functionality
//!
//! Reads a URDF description and turns every link into a [`LinkModel`]:
//! the link's geometry elements with their offsets and materials.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use glam::{EulerRot, Quat, Vec3, Vec4};
use sceneview_core::{Configuration, MeshData, SceneError};

/// Which geometry of each link to import
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GeometrySource {
    #[default]
    Visual,
    Collision,
}

impl std::str::FromStr for GeometrySource {
    type Err = ImportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "visual" => Ok(GeometrySource::Visual),
            "collision" => Ok(GeometrySource::Collision),
            _ => Err(ImportError::InvalidOption(format!(
                "geometry source should be either \"visual\" or \"collision\", got \"{s}\""
            ))),
        }
    }
}

/// Frame in which link poses will be applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkFrame {
    /// Poses are link frames; geometry origins become static transforms
    #[default]
    Link,
    /// Poses are given directly for each geometry; no static offset
    Object,
}

impl std::str::FromStr for LinkFrame {
    type Err = ImportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "link" => Ok(LinkFrame::Link),
            "object" => Ok(LinkFrame::Object),
            _ => Err(ImportError::InvalidOption(format!(
                "frame should be either \"link\" or \"object\", got \"{s}\""
            ))),
        }
    }
}

/// Import options for URDF loading
#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub geometry: GeometrySource,
    pub frame: LinkFrame,
    /// Load STL and OBJ meshes into memory instead of keeping only paths
    pub load_meshes: bool,
    /// Directories searched for `package://` URIs
    pub package_paths: Vec<PathBuf>,
    /// Base directory for relative mesh paths; defaults to the URDF's directory
    pub base_dir: Option<PathBuf>,
    /// Color of geometry without a material
    pub default_color: [f32; 4],
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            geometry: GeometrySource::Visual,
            frame: LinkFrame::Link,
            load_meshes: false,
            package_paths: ros_package_path(),
            base_dir: None,
            default_color: [0.7, 0.7, 0.7, 1.0],
        }
    }
}

/// Directories listed in `ROS_PACKAGE_PATH`
pub fn ros_package_path() -> Vec<PathBuf> {
    std::env::var("ROS_PACKAGE_PATH")
        .map(|value| {
            value
                .split(':')
                .filter(|p| !p.is_empty())
                .map(PathBuf::from)
                .collect()
        })
        .unwrap_or_default()
}

/// Errors that can occur during URDF import
#[derive(Debug, Clone, thiserror::Error)]
pub enum ImportError {
    #[error("Failed to parse URDF: {0}")]
    UrdfParse(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Mesh file not found: {path}")]
    MeshNotFound { path: String },

    #[error("Failed to load mesh '{path}': {reason}")]
    MeshLoad { path: String, reason: String },

    #[error("Invalid import option: {0}")]
    InvalidOption(String),

    #[error("Empty URDF: no links defined")]
    EmptyUrdf,

    #[error(transparent)]
    Scene(#[from] SceneError),
}

/// Drawable geometry of one link element
#[derive(Debug, Clone, PartialEq)]
pub enum LinkShape {
    Box { half_axis: Vec3 },
    Cylinder { radius: f32, length: f32 },
    Capsule { radius: f32, length: f32 },
    Sphere { radius: f32 },
    Mesh {
        path: PathBuf,
        scale: Vec3,
        data: Option<MeshData>,
    },
}

/// One visual or collision element of a link
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryModel {
    pub shape: LinkShape,
    /// Offset from the link frame to the geometry
    pub origin: Configuration,
    pub color: Vec4,
    pub texture: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinkModel {
    pub name: String,
    pub geometries: Vec<GeometryModel>,
}

/// Robot description ready to be turned into scene nodes
#[derive(Debug, Clone, PartialEq)]
pub struct RobotModel {
    pub name: String,
    pub links: Vec<LinkModel>,
}

/// Import a URDF file
pub fn import_urdf(urdf_path: &Path, options: &ImportOptions) -> Result<RobotModel, ImportError> {
    let urdf_path = resolve_uri(&urdf_path.to_string_lossy(), &options.package_paths)
        .unwrap_or_else(|| urdf_path.to_path_buf());
    let robot = urdf_rs::read_file(&urdf_path).map_err(|e| ImportError::UrdfParse(e.to_string()))?;

    let base_dir = options.base_dir.clone().unwrap_or_else(|| {
        urdf_path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    });
    convert_robot(&robot, &base_dir, options)
}

/// Import a URDF document held in memory
pub fn import_urdf_str(xml: &str, options: &ImportOptions) -> Result<RobotModel, ImportError> {
    let robot = urdf_rs::read_from_string(xml).map_err(|e| ImportError::UrdfParse(e.to_string()))?;
    let base_dir = options.base_dir.clone().unwrap_or_else(|| PathBuf::from("."));
    convert_robot(&robot, &base_dir, options)
}

fn convert_robot(
    robot: &urdf_rs::Robot,
    base_dir: &Path,
    options: &ImportOptions,
) -> Result<RobotModel, ImportError> {
    if robot.links.is_empty() {
        return Err(ImportError::EmptyUrdf);
    }

    // Colors of the materials declared at robot level
    let material_colors: HashMap<String, Vec4> = robot
        .materials
        .iter()
        .filter_map(|m| m.color.as_ref().map(|c| (m.name.clone(), convert_color(c))))
        .collect();

    let mut links = Vec::with_capacity(robot.links.len());
    for urdf_link in &robot.links {
        let elements: Vec<(&urdf_rs::Pose, &urdf_rs::Geometry, Option<&urdf_rs::Material>)> =
            match options.geometry {
                GeometrySource::Visual => urdf_link
                    .visual
                    .iter()
                    .map(|v| (&v.origin, &v.geometry, v.material.as_ref()))
                    .collect(),
                GeometrySource::Collision => urdf_link
                    .collision
                    .iter()
                    .map(|c| (&c.origin, &c.geometry, None))
                    .collect(),
            };

        let mut geometries = Vec::with_capacity(elements.len());
        for (origin, geometry, material) in elements {
            let shape = convert_geometry(geometry, base_dir, options)?;
            let (color, texture) = convert_material(material, &material_colors, base_dir, options);
            geometries.push(GeometryModel {
                shape,
                origin: convert_pose(origin),
                color,
                texture,
            });
        }
        tracing::debug!(
            "Link '{}': {} geometry element(s)",
            urdf_link.name,
            geometries.len()
        );
        links.push(LinkModel {
            name: urdf_link.name.clone(),
            geometries,
        });
    }

    tracing::info!("Imported robot '{}' with {} links", robot.name, links.len());
    Ok(RobotModel {
        name: robot.name.clone(),
        links,
    })
}

fn convert_geometry(
    geometry: &urdf_rs::Geometry,
    base_dir: &Path,
    options: &ImportOptions,
) -> Result<LinkShape, ImportError> {
    let shape = match geometry {
        urdf_rs::Geometry::Box { size } => LinkShape::Box {
            half_axis: to_vec3(size) * 0.5,
        },
        urdf_rs::Geometry::Cylinder { radius, length } => LinkShape::Cylinder {
            radius: *radius as f32,
            length: *length as f32,
        },
        urdf_rs::Geometry::Capsule { radius, length } => LinkShape::Capsule {
            radius: *radius as f32,
            length: *length as f32,
        },
        urdf_rs::Geometry::Sphere { radius } => LinkShape::Sphere {
            radius: *radius as f32,
        },
        urdf_rs::Geometry::Mesh { filename, scale } => {
            let path = resolve_mesh_path(filename, base_dir, options)?;
            let data = if options.load_meshes && is_loadable(&path) {
                Some(sceneview_core::load_mesh(&path).map_err(|e| ImportError::MeshLoad {
                    path: filename.clone(),
                    reason: e.to_string(),
                })?)
            } else {
                None
            };
            LinkShape::Mesh {
                path,
                scale: scale.as_ref().map(to_vec3).unwrap_or(Vec3::ONE),
                data,
            }
        }
    };
    Ok(shape)
}

fn convert_material(
    material: Option<&urdf_rs::Material>,
    material_colors: &HashMap<String, Vec4>,
    base_dir: &Path,
    options: &ImportOptions,
) -> (Vec4, Option<PathBuf>) {
    let default_color = Vec4::from_array(options.default_color);
    let Some(material) = material else {
        return (default_color, None);
    };

    let color = material
        .color
        .as_ref()
        .map(convert_color)
        .or_else(|| material_colors.get(&material.name).copied())
        .unwrap_or(default_color);

    let texture = material
        .texture
        .as_ref()
        .filter(|t| !t.filename.is_empty())
        .map(|t| {
            resolve_uri(&t.filename, &options.package_paths)
                .unwrap_or_else(|| relative_to(base_dir, strip_file_uri(&t.filename)))
        });
    (color, texture)
}

/// Resolve a mesh reference to a filesystem path
fn resolve_mesh_path(filename: &str, base_dir: &Path, options: &ImportOptions) -> Result<PathBuf, ImportError> {
    if filename.starts_with("package://") {
        return match resolve_uri(filename, &options.package_paths) {
            Some(path) => Ok(path),
            None if options.load_meshes => Err(ImportError::MeshNotFound {
                path: filename.to_string(),
            }),
            None => {
                tracing::warn!(
                    "File not found: {}. Check the ROS_PACKAGE_PATH environment variable.",
                    filename
                );
                Ok(PathBuf::from(filename))
            }
        };
    }

    let path = relative_to(base_dir, strip_file_uri(filename));
    if options.load_meshes && !path.exists() {
        return Err(ImportError::MeshNotFound {
            path: path.to_string_lossy().to_string(),
        });
    }
    Ok(path)
}

/// Resolve `package://` against the search path. `None` when the URI is
/// not a package URI or no matching file exists.
fn resolve_uri(uri: &str, package_paths: &[PathBuf]) -> Option<PathBuf> {
    let rest = uri.strip_prefix("package://")?;
    package_paths
        .iter()
        .map(|dir| dir.join(rest))
        .find(|candidate| candidate.is_file())
}

fn strip_file_uri(filename: &str) -> &str {
    filename.strip_prefix("file://").unwrap_or(filename)
}

fn relative_to(base_dir: &Path, path: &str) -> PathBuf {
    if Path::new(path).is_absolute() {
        PathBuf::from(path)
    } else {
        base_dir.join(path)
    }
}

fn is_loadable(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| matches!(e.to_lowercase().as_str(), "stl" | "obj"))
        .unwrap_or(false)
}

fn to_vec3(v: &urdf_rs::Vec3) -> Vec3 {
    Vec3::new(v.0[0] as f32, v.0[1] as f32, v.0[2] as f32)
}

fn convert_color(color: &urdf_rs::Color) -> Vec4 {
    Vec4::new(
        color.rgba.0[0] as f32,
        color.rgba.0[1] as f32,
        color.rgba.0[2] as f32,
        color.rgba.0[3] as f32,
    )
}

/// Convert urdf_rs::Pose (fixed-axis roll, pitch, yaw) to a Configuration
fn convert_pose(pose: &urdf_rs::Pose) -> Configuration {
    let [roll, pitch, yaw] = pose.rpy.0.map(|a| a as f32);
    Configuration::new(
        to_vec3(&pose.xyz),
        Quat::from_euler(EulerRot::ZYX, yaw, pitch, roll),
    )
}
