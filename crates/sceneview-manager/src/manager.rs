//! Name-based facade over the scene graph
//!
//! Every mutation goes through the frame mutex, so a render pass never
//! observes a half-applied change. Node configurations sent with
//! [`WindowsManager::apply_configuration`] are only queued; they are
//! applied together at the start of the next [`WindowsManager::refresh`].

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use glam::{Vec3, Vec4};
use parking_lot::{Mutex, MutexGuard};
use sceneview_core::{
    Configuration, FileTransformWriter, IsDirtyVisitor, LightingMode, MeshData, Node, NodeId,
    PropertyValue, RenderBackend, SceneError, SceneGraph, SetCleanVisitor, TransformWriter,
    TransformWriterVisitor, VisibilityMode, WireframeMode,
};
use sceneview_urdf::{ImportError, ImportOptions};

use crate::config::ViewerConfig;

/// Property holding the dynamic configuration
const TRANSFORM_PROPERTY: &str = "Transform";

/// Shared manager type
pub type SharedManager = Arc<WindowsManager>;

/// What one call to [`WindowsManager::refresh`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameStats {
    /// Queued configurations applied
    pub applied: usize,
    /// Whether a dirty node was found
    pub dirty: bool,
    /// Nodes pushed to the render backend
    pub synced: usize,
    /// Whether a transform frame was captured
    pub captured: bool,
}

struct CaptureState {
    visitor: Option<TransformWriterVisitor<FileTransformWriter>>,
    roots: Vec<String>,
    on_refresh: bool,
}

pub struct WindowsManager {
    /// The frame mutex
    graph: Mutex<SceneGraph>,
    pending: Mutex<Vec<(NodeId, Configuration)>>,
    /// Drawables to drop at the next refresh
    removed: Mutex<Vec<NodeId>>,
    capture: Mutex<CaptureState>,
    refresh_period_ms: AtomicU64,
    config: ViewerConfig,
}

impl WindowsManager {
    pub fn new(config: ViewerConfig) -> Self {
        let graph = SceneGraph::with_defaults(config.defaults.clone());
        Self {
            graph: Mutex::new(graph),
            pending: Mutex::new(Vec::new()),
            removed: Mutex::new(Vec::new()),
            capture: Mutex::new(CaptureState {
                visitor: None,
                roots: Vec::new(),
                on_refresh: config.capture.auto_capture,
            }),
            refresh_period_ms: AtomicU64::new(config.refresh_period_ms.max(1)),
            config,
        }
    }

    pub fn shared(config: ViewerConfig) -> SharedManager {
        Arc::new(Self::new(config))
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    /// Acquire the frame mutex
    pub fn lock(&self) -> MutexGuard<'_, SceneGraph> {
        self.graph.lock()
    }

    pub fn refresh_period(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.refresh_period_ms.load(Ordering::Relaxed))
    }

    pub fn set_refresh_period(&self, period_ms: u64) -> Result<(), SceneError> {
        if period_ms == 0 {
            return Err(SceneError::InvalidArgument(
                "refresh period must be positive".to_string(),
            ));
        }
        self.refresh_period_ms.store(period_ms, Ordering::Relaxed);
        Ok(())
    }

    // ---- locking helpers ----

    fn with_graph<R>(
        &self,
        op: &str,
        f: impl FnOnce(&mut SceneGraph) -> Result<R, SceneError>,
    ) -> Result<R, SceneError> {
        let mut graph = self.graph.lock();
        f(&mut *graph).inspect_err(|e| tracing::warn!("{} rejected: {}", op, e))
    }

    fn with_node<R>(
        &self,
        name: &str,
        op: &str,
        f: impl FnOnce(&mut Node) -> Result<R, SceneError>,
    ) -> Result<R, SceneError> {
        self.with_graph(op, |graph| {
            let id = graph.id_of(name)?;
            f(graph.node_mut(id)?)
        })
    }

    /// Create a node and attach it to the group named by its prefix, if any
    fn create(
        &self,
        name: &str,
        f: impl FnOnce(&mut SceneGraph) -> Result<NodeId, SceneError>,
    ) -> Result<NodeId, SceneError> {
        self.with_graph("create", |graph| {
            let id = f(graph)?;
            init_parent(graph, name, id)?;
            tracing::debug!("Created {} '{}'", graph.node(id)?.kind().type_name(), name);
            Ok(id)
        })
    }

    // ---- scenes and groups ----

    pub fn create_scene(&self, name: &str) -> Result<NodeId, SceneError> {
        let id = self.with_graph("create_scene", |graph| graph.create_group(name))?;
        tracing::info!("Created scene '{}'", name);
        Ok(id)
    }

    /// Scene group with a checkerboard floor child `<name>/floor`
    pub fn create_scene_with_floor(&self, name: &str) -> Result<NodeId, SceneError> {
        let id = self.with_graph("create_scene_with_floor", |graph| {
            if graph.contains_name(name) {
                return Err(SceneError::NameTaken(name.to_string()));
            }
            let floor_name = format!("{name}/floor");
            if graph.contains_name(&floor_name) {
                return Err(SceneError::NameTaken(floor_name));
            }
            let scene = graph.create_group(name)?;
            let floor = graph.create_ground(&floor_name)?;
            graph.add_child(scene, floor)?;
            Ok(scene)
        })?;
        tracing::info!("Created scene '{}' with floor", name);
        Ok(id)
    }

    pub fn create_group(&self, name: &str) -> Result<NodeId, SceneError> {
        self.create(name, |graph| graph.create_group(name))
    }

    // ---- leaves ----

    pub fn add_box(&self, name: &str, half_axis: Vec3, color: Vec4) -> Result<NodeId, SceneError> {
        self.create(name, |graph| graph.create_box(name, half_axis, color))
    }

    pub fn add_sphere(&self, name: &str, radius: f32, color: Vec4) -> Result<NodeId, SceneError> {
        self.create(name, |graph| graph.create_sphere(name, radius, color))
    }

    pub fn add_cylinder(&self, name: &str, radius: f32, height: f32, color: Vec4) -> Result<NodeId, SceneError> {
        self.create(name, |graph| graph.create_cylinder(name, radius, height, color))
    }

    pub fn add_cone(&self, name: &str, radius: f32, height: f32, color: Vec4) -> Result<NodeId, SceneError> {
        self.create(name, |graph| graph.create_cone(name, radius, height, color))
    }

    pub fn add_capsule(&self, name: &str, radius: f32, height: f32, color: Vec4) -> Result<NodeId, SceneError> {
        self.create(name, |graph| graph.create_capsule(name, radius, height, color))
    }

    pub fn add_arrow(&self, name: &str, radius: f32, size: f32, color: Vec4) -> Result<NodeId, SceneError> {
        self.create(name, |graph| graph.create_arrow(name, radius, size, color))
    }

    pub fn add_rod(
        &self,
        name: &str,
        radius: f32,
        length: f32,
        capsules: usize,
        color: Vec4,
    ) -> Result<NodeId, SceneError> {
        self.create(name, |graph| graph.create_rod(name, radius, length, capsules, color))
    }

    pub fn add_xyz_axis(&self, name: &str, radius: f32, size_axis: f32, color: Vec4) -> Result<NodeId, SceneError> {
        self.create(name, |graph| graph.create_xyz_axis(name, radius, size_axis, color))
    }

    pub fn add_light(&self, name: &str, radius: f32, color: Vec4) -> Result<NodeId, SceneError> {
        self.create(name, |graph| graph.create_light(name, radius, color))
    }

    pub fn add_line(&self, name: &str, from: Vec3, to: Vec3, color: Vec4) -> Result<NodeId, SceneError> {
        self.create(name, |graph| graph.create_line(name, from, to, color))
    }

    pub fn add_triangle_face(&self, name: &str, corners: [Vec3; 3], color: Vec4) -> Result<NodeId, SceneError> {
        self.create(name, |graph| graph.create_face(name, corners.to_vec(), color))
    }

    pub fn add_square_face(&self, name: &str, corners: [Vec3; 4], color: Vec4) -> Result<NodeId, SceneError> {
        self.create(name, |graph| graph.create_face(name, corners.to_vec(), color))
    }

    /// Mesh leaf from a file. STL and OBJ files are loaded before the frame
    /// mutex is taken; other formats are referenced by path only.
    pub fn add_mesh(&self, name: &str, path: impl AsRef<Path>) -> Result<NodeId, SceneError> {
        let path = path.as_ref();
        if self.node_exists(name) {
            tracing::warn!("add_mesh rejected: name '{}' is already taken", name);
            return Err(SceneError::NameTaken(name.to_string()));
        }
        if !path.is_file() {
            let error = SceneError::Io {
                path: path.display().to_string(),
                reason: "no such file".to_string(),
            };
            tracing::warn!("add_mesh rejected: {}", error);
            return Err(error);
        }

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        let data: Option<MeshData> = match extension.as_str() {
            "stl" | "obj" => Some(sceneview_core::load_mesh(path).map_err(|e| SceneError::Io {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?),
            _ => None,
        };

        let color = self.config.defaults.default_color();
        self.create(name, |graph| match data {
            Some(data) => graph.create_mesh(name, path, Some(data), color),
            None if extension == "dae" => graph.create_collada(name, path, color),
            None => graph.create_mesh(name, path, None, color),
        })
    }

    /// Import a URDF as group `name`. The file is parsed before the frame
    /// mutex is taken.
    pub fn add_urdf(&self, name: &str, urdf_path: &Path, options: &ImportOptions) -> Result<NodeId, ImportError> {
        if name.is_empty() {
            return Err(SceneError::InvalidArgument("robot name cannot be empty".to_string()).into());
        }
        if self.node_exists(name) {
            return Err(SceneError::NameTaken(name.to_string()).into());
        }

        let model = sceneview_urdf::import_urdf(urdf_path, options).inspect_err(|e| {
            tracing::warn!("Failed to import {:?}: {}", urdf_path, e);
        })?;

        let mut graph = self.graph.lock();
        let robot = sceneview_urdf::build_robot(&mut graph, name, &model, options)?;
        if let Err(e) = init_parent(&mut graph, name, robot) {
            graph.delete_node(robot, true)?;
            return Err(e.into());
        }
        Ok(robot)
    }

    // ---- group membership ----

    pub fn add_to_group(&self, node: &str, group: &str) -> Result<(), SceneError> {
        self.with_graph("add_to_group", |graph| {
            let child = graph.id_of(node)?;
            let group = graph.id_of(group)?;
            graph.add_child(group, child)
        })
    }

    pub fn remove_from_group(&self, node: &str, group: &str) -> Result<(), SceneError> {
        self.with_graph("remove_from_group", |graph| {
            let child = graph.id_of(node)?;
            let group = graph.id_of(group)?;
            graph.remove_child(group, child)
        })
    }

    /// Delete a node, and its whole subtree when `all` is set
    pub fn delete_node(&self, name: &str, all: bool) -> Result<(), SceneError> {
        self.with_graph("delete_node", |graph| {
            let id = graph.id_of(name)?;
            let doomed = if all { graph.subtree(id) } else { vec![id] };
            graph.delete_node(id, all)?;
            self.removed.lock().extend(doomed);
            Ok(())
        })
    }

    // ---- transforms ----

    /// Queue a new dynamic configuration, applied at the next refresh
    pub fn apply_configuration(&self, name: &str, config: Configuration) -> Result<(), SceneError> {
        self.apply_configurations(&[(name, config)])
    }

    /// Queue several configurations. Either every name is known and all
    /// are queued, or nothing is.
    pub fn apply_configurations(&self, configs: &[(&str, Configuration)]) -> Result<(), SceneError> {
        self.with_graph("apply_configurations", |graph| {
            let resolved = configs
                .iter()
                .map(|(name, config)| Ok((graph.id_of(name)?, *config)))
                .collect::<Result<Vec<_>, SceneError>>()?;
            self.pending.lock().extend(resolved);
            Ok(())
        })
    }

    pub fn pending_configurations(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn set_static_transform(&self, name: &str, config: Configuration) -> Result<(), SceneError> {
        self.with_node(name, "set_static_transform", |node| {
            node.set_static_transform(config);
            Ok(())
        })
    }

    pub fn get_static_transform(&self, name: &str) -> Result<Configuration, SceneError> {
        self.with_node(name, "get_static_transform", |node| Ok(node.static_transform()))
    }

    pub fn node_global_transform(&self, name: &str) -> Result<Configuration, SceneError> {
        self.with_graph("node_global_transform", |graph| {
            let id = graph.id_of(name)?;
            graph.global_transform(id)
        })
    }

    // ---- appearance ----

    pub fn set_visibility(&self, name: &str, mode: &str) -> Result<(), SceneError> {
        let mode: VisibilityMode = mode.parse()?;
        self.with_node(name, "set_visibility", |node| {
            node.set_visibility(mode);
            Ok(())
        })
    }

    pub fn set_wireframe_mode(&self, name: &str, mode: &str) -> Result<(), SceneError> {
        let mode: WireframeMode = mode.parse()?;
        self.with_graph("set_wireframe_mode", |graph| {
            let id = graph.id_of(name)?;
            graph.set_wireframe_mode(id, mode)
        })
    }

    pub fn set_lighting_mode(&self, name: &str, mode: &str) -> Result<(), SceneError> {
        let mode: LightingMode = mode.parse()?;
        self.with_graph("set_lighting_mode", |graph| {
            let id = graph.id_of(name)?;
            graph.set_lighting_mode(id, mode)
        })
    }

    pub fn set_color(&self, name: &str, color: Vec4) -> Result<(), SceneError> {
        self.with_graph("set_color", |graph| {
            let id = graph.id_of(name)?;
            graph.set_color(id, color)
        })
    }

    pub fn set_scale(&self, name: &str, scale: Vec3) -> Result<(), SceneError> {
        self.with_node(name, "set_scale", |node| node.set_scale(scale))
    }

    pub fn set_alpha(&self, name: &str, alpha: f32) -> Result<(), SceneError> {
        self.with_graph("set_alpha", |graph| {
            let id = graph.id_of(name)?;
            graph.set_alpha(id, alpha)
        })
    }

    pub fn set_highlight(&self, name: &str, state: i32) -> Result<(), SceneError> {
        self.with_node(name, "set_highlight", |node| node.set_highlight_state(state))
    }

    /// Landmark of `size`, or of the configured default size
    pub fn add_landmark(&self, name: &str, size: Option<f32>) -> Result<(), SceneError> {
        self.with_node(name, "add_landmark", |node| match size {
            Some(size) => node.add_landmark(size),
            None => node.add_default_landmark(),
        })
    }

    pub fn delete_landmark(&self, name: &str) -> Result<(), SceneError> {
        self.with_node(name, "delete_landmark", |node| {
            node.delete_landmark();
            Ok(())
        })
    }

    // ---- properties ----

    pub fn get_property(&self, name: &str, property: &str) -> Result<PropertyValue, SceneError> {
        self.with_node(name, "get_property", |node| node.get_property(property))
    }

    /// Set a property now. Writing `Transform` supersedes configurations
    /// still queued for the node.
    pub fn set_property(&self, name: &str, property: &str, value: PropertyValue) -> Result<(), SceneError> {
        self.with_graph("set_property", |graph| {
            let id = graph.id_of(name)?;
            graph.node_mut(id)?.set_property(property, value)?;
            if property == TRANSFORM_PROPERTY {
                self.pending.lock().retain(|(queued, _)| *queued != id);
            }
            Ok(())
        })
    }

    pub fn property_names(&self, name: &str) -> Result<Vec<String>, SceneError> {
        self.with_node(name, "property_names", |node| {
            Ok(node.property_names().map(str::to_string).collect())
        })
    }

    // ---- queries ----

    pub fn node_exists(&self, name: &str) -> bool {
        self.graph.lock().contains_name(name)
    }

    /// Names of all nodes, sorted
    pub fn node_list(&self) -> Vec<String> {
        self.graph.lock().names()
    }

    /// Names of all group nodes, sorted
    pub fn group_node_list(&self) -> Vec<String> {
        let graph = self.graph.lock();
        let mut names: Vec<String> = graph
            .iter()
            .filter(|n| n.is_group())
            .map(|n| n.name().to_string())
            .collect();
        names.sort();
        names
    }

    // ---- export ----

    /// Write a Blender script recreating the subtree at `name`
    pub fn write_blender_script(&self, name: &str, path: impl Into<PathBuf>) -> Result<(), SceneError> {
        let path = path.into();
        self.with_graph("write_blender_script", |graph| {
            let id = graph.id_of(name)?;
            graph.write_blender_script(id, &path)
        })?;
        tracing::info!("Wrote Blender script for '{}' to {:?}", name, path);
        Ok(())
    }

    /// Simplify every loaded mesh below `name`. Returns the number of
    /// simplified meshes.
    pub fn simplify_meshes(&self, name: &str, ratio: f32) -> Result<usize, SceneError> {
        self.with_graph("simplify_meshes", |graph| {
            let id = graph.id_of(name)?;
            graph.simplify_meshes(id, ratio)
        })
    }

    // ---- transform capture ----

    /// Direct transform capture of the subtrees at `roots` to `path`,
    /// appending in the configured format
    pub fn set_capture_transform(&self, path: impl Into<PathBuf>, roots: &[&str]) -> Result<(), SceneError> {
        {
            let graph = self.graph.lock();
            for root in roots {
                graph.id_of(root)?;
            }
        }
        let path = path.into();
        let writer = FileTransformWriter::new(&path, self.config.capture.format);
        let mut capture = self.capture.lock();
        capture.visitor = Some(TransformWriterVisitor::new(writer));
        capture.roots = roots.iter().map(|r| r.to_string()).collect();
        tracing::info!("Capturing transforms of {:?} to {:?}", capture.roots, path);
        Ok(())
    }

    /// Capture one frame now
    pub fn capture_transform(&self) -> Result<(), SceneError> {
        let graph = self.graph.lock();
        let mut capture = self.capture.lock();
        capture_frame(&graph, &mut capture)
    }

    /// Capture a frame at the end of every refresh
    pub fn capture_transform_on_refresh(&self, enabled: bool) {
        self.capture.lock().on_refresh = enabled;
        tracing::debug!("Capture on refresh: {}", enabled);
    }

    pub fn captured_frames(&self) -> u64 {
        self.capture
            .lock()
            .visitor
            .as_ref()
            .map_or(0, |v| v.writer().frame_count())
    }

    // ---- frame ----

    /// One render pass under the frame mutex: apply queued configurations,
    /// rebuild and stamp clean if anything is dirty, draw, then capture
    /// when enabled.
    pub fn refresh(&self, backend: &mut dyn RenderBackend) -> FrameStats {
        let mut graph = self.graph.lock();
        let mut stats = FrameStats::default();

        let pending = std::mem::take(&mut *self.pending.lock());
        for (id, config) in pending {
            match graph.node_mut(id) {
                Ok(node) => {
                    node.apply_configuration(config);
                    stats.applied += 1;
                }
                Err(_) => tracing::debug!("Dropping configuration of deleted node {}", id),
            }
        }

        for id in self.removed.lock().drain(..) {
            backend.remove_node(id);
        }

        let mut is_dirty = IsDirtyVisitor::new(false);
        graph.accept_roots(&mut is_dirty);
        stats.dirty = is_dirty.is_dirty();

        if stats.dirty {
            stats.synced = graph.rebuild(&mut *backend);
            graph.accept_roots(&mut SetCleanVisitor);
        }
        backend.draw();

        let mut capture = self.capture.lock();
        if capture.on_refresh && capture.visitor.is_some() {
            match capture_frame(&graph, &mut capture) {
                Ok(()) => stats.captured = true,
                Err(e) => tracing::warn!("Transform capture failed: {}", e),
            }
        }
        stats
    }
}

impl Default for WindowsManager {
    fn default() -> Self {
        Self::new(ViewerConfig::default())
    }
}

fn capture_frame(graph: &SceneGraph, capture: &mut CaptureState) -> Result<(), SceneError> {
    let roots = capture
        .roots
        .iter()
        .map(|name| graph.id_of(name))
        .collect::<Result<Vec<_>, _>>()?;
    let visitor = capture
        .visitor
        .as_mut()
        .ok_or_else(|| SceneError::InvalidArgument("no capture file set".to_string()))?;
    visitor.capture_frame(graph, &roots)
}

/// `a/b/c` -> `a/b`
fn parent_name(name: &str) -> Option<&str> {
    name.rfind('/').map(|i| &name[..i]).filter(|p| !p.is_empty())
}

/// Attach a new node to the existing group its name is prefixed with
fn init_parent(graph: &mut SceneGraph, name: &str, id: NodeId) -> Result<(), SceneError> {
    if let Some(parent) = parent_name(name).and_then(|p| graph.find(p))
        && graph.node(parent)?.is_group()
    {
        graph.add_child(parent, id)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;
    use sceneview_core::{HeadlessBackend, NodeKind};

    fn manager() -> WindowsManager {
        WindowsManager::default()
    }

    #[test]
    fn test_parent_name() {
        assert_eq!(parent_name("a/b/c"), Some("a/b"));
        assert_eq!(parent_name("a"), None);
        assert_eq!(parent_name("/a"), None);
    }

    #[test]
    fn test_auto_parent_from_prefix() {
        let wm = manager();
        wm.create_scene("world").unwrap();
        wm.create_group("world/robot").unwrap();
        wm.add_sphere("world/robot/ball", 0.1, Vec4::ONE).unwrap();
        wm.add_box("loose/box", Vec3::ONE, Vec4::ONE).unwrap();

        let graph = wm.lock();
        let robot = graph.id_of("world/robot").unwrap();
        let ball = graph.id_of("world/robot/ball").unwrap();
        assert!(graph.has_child(robot, ball));
        assert_eq!(graph.node(robot).unwrap().parent(), graph.find("world"));
        assert_eq!(graph.node(graph.id_of("loose/box").unwrap()).unwrap().parent(), None);
    }

    #[test]
    fn test_scene_with_floor() {
        let wm = manager();
        wm.create_scene_with_floor("world").unwrap();
        let graph = wm.lock();
        let floor = graph.node(graph.id_of("world/floor").unwrap()).unwrap();
        assert!(matches!(floor.kind(), NodeKind::Ground(_)));
        assert_eq!(floor.parent(), graph.find("world"));
        drop(graph);

        assert!(matches!(wm.create_scene("world"), Err(SceneError::NameTaken(_))));
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let wm = manager();
        wm.add_sphere("ball", 0.1, Vec4::ONE).unwrap();
        assert!(matches!(
            wm.add_box("ball", Vec3::ONE, Vec4::ONE),
            Err(SceneError::NameTaken(_))
        ));
        assert!(matches!(
            wm.add_sphere("bad", -1.0, Vec4::ONE),
            Err(SceneError::InvalidArgument(_))
        ));
        assert!(!wm.node_exists("bad"));
    }

    #[test]
    fn test_queued_configuration() {
        let wm = manager();
        wm.create_scene("world").unwrap();
        wm.add_sphere("world/ball", 0.1, Vec4::ONE).unwrap();
        let mut backend = HeadlessBackend::new();
        wm.refresh(&mut backend);

        let pose = Configuration::new(Vec3::new(1.0, 2.0, 3.0), Quat::from_rotation_z(0.5));
        wm.apply_configuration("world/ball", pose).unwrap();
        assert_eq!(wm.pending_configurations(), 1);
        assert_eq!(wm.node_global_transform("world/ball").unwrap(), Configuration::IDENTITY);

        let stats = wm.refresh(&mut backend);
        assert_eq!(stats.applied, 1);
        assert!(stats.dirty);
        assert_eq!(stats.synced, 1);
        assert_eq!(wm.pending_configurations(), 0);
        assert!(wm.node_global_transform("world/ball").unwrap().approx_eq(&pose, 1e-6));

        let stats = wm.refresh(&mut backend);
        assert!(!stats.dirty);
        assert_eq!(backend.frames(), 3);
    }

    #[test]
    fn test_immediate_transform_supersedes_queued() {
        let wm = manager();
        wm.add_sphere("ball", 0.1, Vec4::ONE).unwrap();
        let mut backend = HeadlessBackend::new();
        wm.refresh(&mut backend);

        wm.apply_configuration("ball", Configuration::from_position(Vec3::X))
            .unwrap();
        wm.set_property(
            "ball",
            "Transform",
            PropertyValue::Configuration(Configuration::from_position(Vec3::Y)),
        )
        .unwrap();
        assert_eq!(wm.pending_configurations(), 0);

        let stats = wm.refresh(&mut backend);
        assert_eq!(stats.applied, 0);
        let id = wm.lock().id_of("ball").unwrap();
        assert_eq!(backend.drawable(id).unwrap().global.position, Vec3::Y);
        assert_eq!(wm.node_global_transform("ball").unwrap().position, Vec3::Y);

        // a later queued pose still wins over the earlier immediate one
        wm.apply_configuration("ball", Configuration::from_position(Vec3::Z))
            .unwrap();
        wm.refresh(&mut backend);
        assert_eq!(backend.drawable(id).unwrap().global.position, Vec3::Z);
    }

    #[test]
    fn test_same_transform_property_redraws() {
        let wm = manager();
        wm.add_sphere("ball", 0.1, Vec4::ONE).unwrap();
        let mut backend = HeadlessBackend::new();
        wm.refresh(&mut backend);
        assert!(!wm.refresh(&mut backend).dirty);

        wm.set_property("ball", "Transform", PropertyValue::Configuration(Configuration::IDENTITY))
            .unwrap();
        assert!(wm.refresh(&mut backend).dirty);
    }

    #[test]
    fn test_apply_configurations_all_or_nothing() {
        let wm = manager();
        wm.add_sphere("a", 0.1, Vec4::ONE).unwrap();
        let result = wm.apply_configurations(&[
            ("a", Configuration::from_position(Vec3::X)),
            ("missing", Configuration::IDENTITY),
        ]);
        assert!(matches!(result, Err(SceneError::NodeNotFound(_))));
        assert_eq!(wm.pending_configurations(), 0);
    }

    #[test]
    fn test_mode_strings() {
        let wm = manager();
        wm.create_group("g").unwrap();
        wm.add_sphere("g/s", 0.1, Vec4::ONE).unwrap();
        wm.set_visibility("g", "OFF").unwrap();
        wm.set_wireframe_mode("g", "WIREFRAME").unwrap();
        wm.set_lighting_mode("g", "OFF").unwrap();
        assert!(matches!(
            wm.set_visibility("g", "HIDDEN"),
            Err(SceneError::InvalidArgument(_))
        ));

        let graph = wm.lock();
        let s = graph.node(graph.id_of("g/s").unwrap()).unwrap();
        assert_eq!(s.wireframe_mode(), WireframeMode::Wireframe);
        assert_eq!(s.lighting_mode(), LightingMode::Off);
        assert_eq!(s.visibility(), VisibilityMode::On);
    }

    #[test]
    fn test_delete_node_drops_drawables() {
        let wm = manager();
        wm.create_group("g").unwrap();
        wm.add_sphere("g/a", 0.1, Vec4::ONE).unwrap();
        wm.add_sphere("g/b", 0.1, Vec4::ONE).unwrap();
        let mut backend = HeadlessBackend::new();
        wm.refresh(&mut backend);
        assert_eq!(backend.drawables().count(), 3);

        wm.delete_node("g", true).unwrap();
        wm.refresh(&mut backend);
        assert_eq!(backend.drawables().count(), 0);
        assert!(wm.node_list().is_empty());
    }

    #[test]
    fn test_group_lists() {
        let wm = manager();
        wm.create_scene("world").unwrap();
        wm.create_group("world/arm").unwrap();
        wm.add_cone("world/arm/tip", 0.1, 0.2, Vec4::ONE).unwrap();
        assert_eq!(wm.node_list(), vec!["world", "world/arm", "world/arm/tip"]);
        assert_eq!(wm.group_node_list(), vec!["world", "world/arm"]);

        wm.remove_from_group("world/arm", "world").unwrap();
        assert!(matches!(
            wm.remove_from_group("world/arm", "world"),
            Err(SceneError::ChildNotFound { .. })
        ));
        wm.add_to_group("world/arm", "world").unwrap();
        assert!(matches!(
            wm.add_to_group("world", "world/arm"),
            Err(SceneError::WouldCreateCycle { .. })
        ));
    }

    #[test]
    fn test_properties_through_manager() {
        let wm = manager();
        wm.add_sphere("ball", 0.1, Vec4::ONE).unwrap();
        wm.set_property("ball", "Radius", PropertyValue::Float(0.5)).unwrap();
        assert_eq!(wm.get_property("ball", "Radius").unwrap(), PropertyValue::Float(0.5));
        wm.set_property("ball", "Visibility", PropertyValue::String("OFF".into()))
            .unwrap();
        assert!(wm.property_names("ball").unwrap().contains(&"Radius".to_string()));
        assert!(matches!(
            wm.get_property("ball", "Nope"),
            Err(SceneError::PropertyNotFound { .. })
        ));
    }

    #[test]
    fn test_landmark_and_highlight() {
        let wm = manager();
        wm.add_box("b", Vec3::ONE, Vec4::ONE).unwrap();
        wm.add_landmark("b", None).unwrap();
        wm.set_highlight("b", 3).unwrap();
        assert!(wm.set_highlight("b", 9).is_err());
        {
            let graph = wm.lock();
            let node = graph.node(graph.id_of("b").unwrap()).unwrap();
            assert_eq!(node.landmark(), Some(0.05));
            assert_eq!(node.highlight_state(), 3);
        }
        wm.delete_landmark("b").unwrap();
        assert!(wm.add_landmark("missing", Some(1.0)).is_err());
    }

    #[test]
    fn test_static_transform_round_trip() {
        let wm = manager();
        wm.add_capsule("c", 0.1, 0.5, Vec4::ONE).unwrap();
        let config = Configuration::new(Vec3::ONE, Quat::from_rotation_x(0.3));
        wm.set_static_transform("c", config).unwrap();
        assert!(wm.get_static_transform("c").unwrap().approx_eq(&config, 1e-6));
    }

    #[test]
    fn test_refresh_period() {
        let wm = manager();
        assert_eq!(wm.refresh_period(), std::time::Duration::from_millis(20));
        assert!(wm.set_refresh_period(0).is_err());
        wm.set_refresh_period(5).unwrap();
        assert_eq!(wm.refresh_period(), std::time::Duration::from_millis(5));
    }

    #[test]
    fn test_capture_without_file() {
        let wm = manager();
        assert!(wm.capture_transform().is_err());
        assert_eq!(wm.captured_frames(), 0);
    }
}
