//! Transform capture and geometry export through the manager

use std::path::PathBuf;

use glam::{Vec3, Vec4};
use sceneview_core::{Configuration, HeadlessBackend, SceneError, TransformFormat};
use sceneview_manager::{CaptureConfig, ViewerConfig, WindowsManager};

fn temp_path(ext: &str) -> PathBuf {
    std::env::temp_dir().join(format!("sceneview-manager-{}.{ext}", uuid::Uuid::new_v4()))
}

fn manager(format: TransformFormat, auto_capture: bool) -> WindowsManager {
    WindowsManager::new(ViewerConfig {
        capture: CaptureConfig {
            format,
            auto_capture,
        },
        ..ViewerConfig::default()
    })
}

#[test]
fn test_capture_on_refresh_yaml() {
    let wm = manager(TransformFormat::Yaml, true);
    wm.create_scene("root").unwrap();
    wm.apply_configuration("root", Configuration::from_position(Vec3::new(1.0, 2.0, 3.0)))
        .unwrap();

    let path = temp_path("yaml");
    wm.set_capture_transform(&path, &["root"]).unwrap();

    let mut backend = HeadlessBackend::new();
    assert!(wm.refresh(&mut backend).captured);
    assert!(wm.refresh(&mut backend).captured);

    let content = std::fs::read_to_string(&path).unwrap();
    std::fs::remove_file(&path).ok();
    assert_eq!(
        content,
        "frame_0:\n  root: [1, 2, 3, 1, 0, 0, 0]\nframe_1:\n  root: [1, 2, 3, 1, 0, 0, 0]\n"
    );
    assert_eq!(wm.captured_frames(), 2);
}

#[test]
fn test_manual_capture_basic() {
    let wm = manager(TransformFormat::Basic, false);
    wm.create_scene("root").unwrap();
    wm.add_sphere("root/ball", 0.1, Vec4::ONE).unwrap();
    wm.set_static_transform("root/ball", Configuration::from_position(Vec3::Z))
        .unwrap();

    let path = temp_path("txt");
    wm.set_capture_transform(&path, &["root"]).unwrap();

    let mut backend = HeadlessBackend::new();
    assert!(!wm.refresh(&mut backend).captured);
    wm.capture_transform().unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    std::fs::remove_file(&path).ok();
    assert_eq!(content, "FRAME=0\nroot=0, 0, 0, 1, 0, 0, 0\nroot/ball=0, 0, 1, 1, 0, 0, 0\n");

    wm.capture_transform_on_refresh(true);
    assert!(wm.refresh(&mut backend).captured);
    std::fs::remove_file(&path).ok();
}

#[test]
fn test_capture_to_unwritable_path() {
    let wm = manager(TransformFormat::Basic, false);
    wm.create_scene("root").unwrap();
    let path = std::env::temp_dir()
        .join(format!("sceneview-missing-{}", uuid::Uuid::new_v4()))
        .join("frames.txt");
    wm.set_capture_transform(&path, &["root"]).unwrap();
    assert!(matches!(wm.capture_transform(), Err(SceneError::Io { .. })));
}

#[test]
fn test_capture_unknown_root() {
    let wm = manager(TransformFormat::Basic, false);
    assert!(matches!(
        wm.set_capture_transform(temp_path("txt"), &["nothing"]),
        Err(SceneError::NodeNotFound(_))
    ));
}

#[test]
fn test_blender_script_export() {
    let wm = manager(TransformFormat::Basic, false);
    wm.create_scene("world").unwrap();
    wm.add_box("world/box", Vec3::new(0.5, 0.5, 0.5), Vec4::ONE).unwrap();
    wm.add_sphere("world/ball", 0.2, Vec4::ONE).unwrap();

    let path = temp_path("py");
    wm.write_blender_script("world", &path).unwrap();
    let script = std::fs::read_to_string(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert!(script.starts_with("import bpy\n"));
    assert!(script.contains("primitive_ico_sphere_add"));
    assert!(script.contains("world/box"));
}

#[test]
fn test_add_mesh_from_stl() {
    let path = temp_path("stl");
    let triangle = stl_triangle();
    std::fs::write(&path, triangle).unwrap();

    let wm = manager(TransformFormat::Basic, false);
    wm.add_mesh("part", &path).unwrap();
    assert!(matches!(
        wm.add_mesh("other", temp_path("stl")),
        Err(SceneError::Io { .. })
    ));
    std::fs::remove_file(&path).ok();

    let graph = wm.lock();
    let node = graph.node(graph.id_of("part").unwrap()).unwrap();
    let sceneview_core::NodeKind::Mesh(mesh) = node.kind() else {
        panic!("expected a mesh leaf");
    };
    assert_eq!(mesh.data.as_ref().map(|d| d.triangle_count()), Some(1));
}

/// Binary STL with a single facet
fn stl_triangle() -> Vec<u8> {
    let mut bytes = vec![0u8; 80];
    bytes.extend_from_slice(&1u32.to_le_bytes());
    let facet: [[f32; 3]; 4] = [[0.0, 0.0, 1.0], [0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
    for v in facet.iter().flatten() {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes.extend_from_slice(&0u16.to_le_bytes());
    bytes
}
