//! Builds scene nodes from an imported [`RobotModel`]

use std::path::Path;

use sceneview_core::{Configuration, NodeId, SceneGraph};

use crate::import::{GeometryModel, ImportError, ImportOptions, LinkFrame, LinkShape, RobotModel};

/// Add `model` to `graph` under a new group named `robot_name`.
///
/// Each link becomes a child `<robot_name>/<link>` that clients drive with
/// `apply_configuration`. A link with a single geometry element is that
/// leaf; a link with several is a group of leaves `<robot_name>/<link>_<j>`;
/// a link without geometry is an empty group.
///
/// On failure every node created so far is removed again.
pub fn build_robot(
    graph: &mut SceneGraph,
    robot_name: &str,
    model: &RobotModel,
    options: &ImportOptions,
) -> Result<NodeId, ImportError> {
    if model.links.is_empty() {
        return Err(ImportError::EmptyUrdf);
    }

    let mut created = Vec::new();
    let robot = match populate(graph, robot_name, model, options, &mut created) {
        Ok(robot) => robot,
        Err(e) => {
            for id in created.iter().rev() {
                if let Err(cleanup) = graph.delete_node(*id, false) {
                    tracing::warn!("Failed to roll back node {}: {}", id, cleanup);
                }
            }
            tracing::warn!("Discarded partial robot '{}': {}", robot_name, e);
            return Err(e);
        }
    };

    tracing::info!(
        "Added robot '{}' ({} links) as '{}'",
        model.name,
        model.links.len(),
        robot_name
    );
    Ok(robot)
}

/// Create the robot nodes, recording each new id in `created`
fn populate(
    graph: &mut SceneGraph,
    robot_name: &str,
    model: &RobotModel,
    options: &ImportOptions,
    created: &mut Vec<NodeId>,
) -> Result<NodeId, ImportError> {
    let robot = graph.create_group(robot_name)?;
    created.push(robot);
    for link in &model.links {
        let link_name = format!("{robot_name}/{}", link.name);
        let link_id = match link.geometries.as_slice() {
            [single] => create_leaf(graph, &link_name, single, options, created)?,
            geometries => {
                let group = graph.create_group(&link_name)?;
                created.push(group);
                for (j, geometry) in geometries.iter().enumerate() {
                    let leaf = create_leaf(graph, &format!("{link_name}_{j}"), geometry, options, created)?;
                    graph.add_child(group, leaf)?;
                }
                group
            }
        };
        graph.add_child(robot, link_id)?;
    }
    Ok(robot)
}

fn create_leaf(
    graph: &mut SceneGraph,
    name: &str,
    geometry: &GeometryModel,
    options: &ImportOptions,
    created: &mut Vec<NodeId>,
) -> Result<NodeId, ImportError> {
    let color = geometry.color;
    let id = match &geometry.shape {
        LinkShape::Box { half_axis } => graph.create_box(name, *half_axis, color)?,
        LinkShape::Cylinder { radius, length } => graph.create_cylinder(name, *radius, *length, color)?,
        LinkShape::Capsule { radius, length } => graph.create_capsule(name, *radius, *length, color)?,
        LinkShape::Sphere { radius } => graph.create_sphere(name, *radius, color)?,
        LinkShape::Mesh { path, data, .. } if !is_collada(path) => {
            graph.create_mesh(name, path.clone(), data.clone(), color)?
        }
        LinkShape::Mesh { path, .. } => graph.create_collada(name, path.clone(), color)?,
    };
    created.push(id);

    let node = graph.node_mut(id)?;
    if let LinkShape::Mesh { scale, .. } = &geometry.shape {
        node.set_scale(*scale)?;
    }
    if let Some(texture) = &geometry.texture {
        node.set_texture(texture)?;
    }
    node.set_static_transform(match options.frame {
        LinkFrame::Link => geometry.origin,
        LinkFrame::Object => Configuration::IDENTITY,
    });
    Ok(id)
}

fn is_collada(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("dae"))
}

/// Parse `urdf_path` and add the robot to `graph`
pub fn load_robot(
    graph: &mut SceneGraph,
    robot_name: &str,
    urdf_path: &Path,
    options: &ImportOptions,
) -> Result<NodeId, ImportError> {
    let model = crate::import::import_urdf(urdf_path, options)?;
    build_robot(graph, robot_name, &model, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::{GeometrySource, import_urdf_str};
    use glam::{Quat, Vec3, Vec4};
    use sceneview_core::{NodeKind, SceneError};

    const ROBOT: &str = r#"
        <robot name="arm">
          <link name="base">
            <visual>
              <origin xyz="0 0 0.1" rpy="0 0 0"/>
              <geometry><box size="0.2 0.4 0.6"/></geometry>
              <material name="red"><color rgba="1 0 0 1"/></material>
            </visual>
          </link>
          <link name="forearm">
            <visual>
              <origin xyz="0.5 0 0" rpy="0 1.5707963 0"/>
              <geometry><cylinder radius="0.05" length="1.0"/></geometry>
            </visual>
            <visual>
              <origin xyz="1 0 0" rpy="0 0 0"/>
              <geometry><mesh filename="meshes/wrist.dae" scale="0.5 0.5 0.5"/></geometry>
            </visual>
          </link>
          <link name="world"/>
        </robot>
    "#;

    fn options() -> ImportOptions {
        ImportOptions {
            package_paths: Vec::new(),
            base_dir: Some("/robots/arm".into()),
            ..ImportOptions::default()
        }
    }

    fn build(options: &ImportOptions) -> (SceneGraph, NodeId) {
        let model = import_urdf_str(ROBOT, options).unwrap();
        let mut graph = SceneGraph::new();
        let robot = build_robot(&mut graph, "robot", &model, options).unwrap();
        (graph, robot)
    }

    #[test]
    fn test_link_naming() {
        let (graph, robot) = build(&options());
        let children: Vec<&str> = graph
            .children(robot)
            .unwrap()
            .iter()
            .map(|id| graph.node(*id).unwrap().name())
            .collect();
        assert_eq!(children, vec!["robot/base", "robot/forearm", "robot/world"]);

        let forearm = graph.id_of("robot/forearm").unwrap();
        assert_eq!(graph.children(forearm).unwrap().len(), 2);
        assert!(graph.contains_name("robot/forearm_0"));
        assert!(graph.contains_name("robot/forearm_1"));
        assert!(graph.node(graph.id_of("robot/world").unwrap()).unwrap().is_group());
    }

    #[test]
    fn test_single_geometry_link_is_leaf() {
        let (graph, _) = build(&options());
        let base = graph.node(graph.id_of("robot/base").unwrap()).unwrap();
        let NodeKind::Box(shape) = base.kind() else {
            panic!("expected a box, got {}", base.kind().type_name());
        };
        assert_eq!(shape.half_axis, Vec3::new(0.1, 0.2, 0.3));
        assert_eq!(base.color(), Some(Vec4::new(1.0, 0.0, 0.0, 1.0)));
        assert_eq!(base.static_position(), Vec3::new(0.0, 0.0, 0.1));
    }

    #[test]
    fn test_visual_origin_is_static_transform() {
        let (mut graph, robot) = build(&options());
        let forearm = graph.id_of("robot/forearm").unwrap();
        let cylinder = graph.id_of("robot/forearm_0").unwrap();

        let expected = Quat::from_rotation_y(std::f32::consts::FRAC_PI_2);
        let node = graph.node(cylinder).unwrap();
        assert!(node.static_rotation().abs_diff_eq(expected, 1e-5));

        graph
            .node_mut(forearm)
            .unwrap()
            .apply_configuration(Configuration::from_position(Vec3::Z));
        let global = graph.global_transform(cylinder).unwrap();
        assert!(global.position.abs_diff_eq(Vec3::new(0.5, 0.0, 1.0), 1e-5));
        assert!(graph.node(robot).unwrap().is_group());
    }

    #[test]
    fn test_collada_mesh_leaf() {
        let (graph, _) = build(&options());
        let wrist = graph.node(graph.id_of("robot/forearm_1").unwrap()).unwrap();
        let NodeKind::Collada(shape) = wrist.kind() else {
            panic!("expected a collada leaf");
        };
        assert_eq!(shape.path, Path::new("/robots/arm/meshes/wrist.dae"));
        assert_eq!(wrist.scale(), Vec3::splat(0.5));
    }

    #[test]
    fn test_object_frame_leaves_identity() {
        let opts = ImportOptions {
            frame: LinkFrame::Object,
            ..options()
        };
        let (graph, _) = build(&opts);
        for name in ["robot/base", "robot/forearm_0", "robot/forearm_1"] {
            let node = graph.node(graph.id_of(name).unwrap()).unwrap();
            assert_eq!(node.static_transform(), Configuration::IDENTITY);
        }
    }

    #[test]
    fn test_collision_geometry() {
        let opts = ImportOptions {
            geometry: GeometrySource::Collision,
            ..options()
        };
        let (graph, robot) = build(&opts);
        // No collision elements: every link is an empty group
        for child in graph.children(robot).unwrap() {
            assert!(graph.node(*child).unwrap().is_group());
        }
    }

    #[test]
    fn test_name_taken() {
        let model = import_urdf_str(ROBOT, &options()).unwrap();
        let mut graph = SceneGraph::new();
        build_robot(&mut graph, "robot", &model, &options()).unwrap();
        assert!(matches!(
            build_robot(&mut graph, "robot", &model, &options()),
            Err(ImportError::Scene(SceneError::NameTaken(_)))
        ));
    }

    #[test]
    fn test_failed_build_leaves_no_nodes() {
        let broken = ROBOT.replace(
            r#"<cylinder radius="0.05" length="1.0"/>"#,
            r#"<sphere radius="0"/>"#,
        );
        let model = import_urdf_str(&broken, &options()).unwrap();
        let mut graph = SceneGraph::new();
        graph.create_group("world").unwrap();

        assert!(matches!(
            build_robot(&mut graph, "robot", &model, &options()),
            Err(ImportError::Scene(SceneError::InvalidArgument(_)))
        ));
        assert_eq!(graph.names(), vec!["world"]);

        // a clash on a link name is rolled back too
        graph.create_group("robot/forearm").unwrap();
        let model = import_urdf_str(ROBOT, &options()).unwrap();
        assert!(build_robot(&mut graph, "robot", &model, &options()).is_err());
        assert_eq!(graph.names(), vec!["robot/forearm", "world"]);
    }
}
