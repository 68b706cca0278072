//! Geometry export as a Blender Python script
//!
//! The script recreates the hierarchy with empties for groups and
//! primitives or imported files for leaves. Kinds without a Blender
//! counterpart become plain empties so that children keep their parent.

use std::fmt::Write as _;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use glam::{Quat, Vec3};

use crate::error::SceneError;
use crate::graph::SceneGraph;
use crate::node::{Node, NodeId};
use crate::shape::{BoxShape, ColladaShape, GroupNode, MeshShape, RadialShape, SphereShape};

use super::{NodeVisitor, Traverse, VisitContext};

const GROUP_MARK: &str = "##";

const HEADER: &[&str] = &[
    "import bpy",
    "",
    "## Start convenient functions",
    "taggedObjects = list()",
    "def tagObjects ():",
    "  global taggedObjects",
    "  taggedObjects = list ()",
    "  for obj in bpy.data.objects:",
    "    taggedObjects.append (obj.name)",
    "",
    "def getNonTaggedObjects ():",
    "  global taggedObjects",
    "  return [obj for obj in bpy.data.objects if obj.name not in taggedObjects]",
    "",
    "def setParent (children, parent):",
    "  for child in children:",
    "    child.parent = parent",
    "",
    "## End of convenient functions",
];

pub struct BlenderGeomWriterVisitor {
    path: PathBuf,
    out: BufWriter<File>,
    group_stack: Vec<String>,
    error: Option<SceneError>,
}

impl BlenderGeomWriterVisitor {
    /// Open `path` for appending and write the helper header. When the file
    /// already exists the header is appended commented out.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self, SceneError> {
        let path = path.into();
        let existed = path.exists();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| SceneError::io(&path, e))?;

        let mut visitor = Self {
            path,
            out: BufWriter::new(file),
            group_stack: Vec::new(),
            error: None,
        };
        let comment = if existed { "# " } else { "" };
        let mut header = String::new();
        for line in HEADER {
            let _ = writeln!(header, "{comment}{line}");
        }
        visitor.emit(&header);
        visitor.check()?;
        Ok(visitor)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush the script and report the first write error, if any
    pub fn finish(mut self) -> Result<(), SceneError> {
        self.check()?;
        self.out.flush().map_err(|e| SceneError::io(&self.path, e))
    }

    fn check(&mut self) -> Result<(), SceneError> {
        match self.error.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn emit(&mut self, text: &str) {
        if self.error.is_some() {
            return;
        }
        if let Err(e) = self.out.write_all(text.as_bytes()) {
            self.error = Some(SceneError::io(&self.path, e));
        }
    }

    fn parent_line(&self) -> Option<String> {
        self.group_stack.last().map(|parent| {
            format!("bpy.context.object.parent = bpy.data.objects[\"{parent}\"]\n")
        })
    }

    /// Name the shape object, place it at the static transform and wrap it
    /// in an empty carrying the node name.
    fn standard_apply(&mut self, node: &Node) -> Traverse {
        let id = node.name();
        let mut text = String::new();
        let _ = writeln!(text, "bpy.context.object.name = \"{id}__shape\"");
        let _ = writeln!(
            text,
            "bpy.context.object.location = {}",
            vector_list(node.static_position())
        );
        let _ = writeln!(text, "bpy.context.object.rotation_mode = 'QUATERNION'");
        let _ = writeln!(
            text,
            "bpy.context.object.rotation_quaternion = {}",
            quat_list(node.static_rotation())
        );
        let _ = writeln!(text, "bpy.ops.object.empty_add ()");
        let _ = writeln!(text, "bpy.context.object.name = \"{id}\"");
        let _ = writeln!(
            text,
            "bpy.data.objects[\"{id}__shape\"].parent = bpy.data.objects[\"{id}\"]"
        );
        if let Some(line) = self.parent_line() {
            text.push_str(&line);
        }
        self.emit(&text);
        Traverse::Descend
    }
}

fn vector_list(v: Vec3) -> String {
    format!("( {}, {}, {}, )", v.x, v.y, v.z)
}

fn quat_list(q: Quat) -> String {
    format!("( {}, {}, {}, {}, )", q.w, q.x, q.y, q.z)
}

impl NodeVisitor for BlenderGeomWriterVisitor {
    /// Kinds with no Blender primitive
    fn apply_node(&mut self, node: &Node, _ctx: &VisitContext) -> Traverse {
        tracing::warn!(
            "{} is not exported to Blender, '{}' becomes an empty",
            node.kind().type_name(),
            node.name()
        );
        self.emit("bpy.ops.object.empty_add()\n");
        self.standard_apply(node)
    }

    fn apply_group(&mut self, node: &Node, _group: &GroupNode, _ctx: &VisitContext) -> Traverse {
        let marks = GROUP_MARK.repeat(self.group_stack.len() + 1);
        let mut text = format!("{marks} Group {}\n", node.name());
        text.push_str("bpy.ops.object.empty_add()\n");
        let _ = writeln!(text, "bpy.context.object.name = \"{}\"", node.name());
        if let Some(line) = self.parent_line() {
            text.push_str(&line);
        }
        self.emit(&text);
        self.group_stack.push(node.name().to_string());
        Traverse::Descend
    }

    fn leave_group(&mut self, _node: &Node, _group: &GroupNode, _ctx: &VisitContext) {
        self.group_stack.pop();
        let marks = GROUP_MARK.repeat(self.group_stack.len() + 1);
        self.emit(&format!("{marks}\n"));
    }

    fn apply_box(&mut self, node: &Node, shape: &BoxShape, _ctx: &VisitContext) -> Traverse {
        self.emit(&format!(
            "bpy.ops.mesh.primitive_cube_add ()\nbpy.context.object.dimensions = {}\n",
            vector_list(shape.half_axis * 2.0)
        ));
        self.standard_apply(node)
    }

    fn apply_sphere(&mut self, node: &Node, shape: &SphereShape, _ctx: &VisitContext) -> Traverse {
        self.emit(&format!(
            "bpy.ops.mesh.primitive_ico_sphere_add (size={})\n",
            shape.radius
        ));
        self.standard_apply(node)
    }

    fn apply_cylinder(&mut self, node: &Node, shape: &RadialShape, _ctx: &VisitContext) -> Traverse {
        self.emit(&format!(
            "bpy.ops.mesh.primitive_cylinder_add (radius={}, depth={})\n",
            shape.radius, shape.height
        ));
        self.standard_apply(node)
    }

    fn apply_cone(&mut self, node: &Node, shape: &RadialShape, _ctx: &VisitContext) -> Traverse {
        self.emit(&format!(
            "bpy.ops.mesh.primitive_cone_add (radius1={}, depth={})\n",
            shape.radius, shape.height
        ));
        self.standard_apply(node)
    }

    fn apply_mesh(&mut self, node: &Node, shape: &MeshShape, _ctx: &VisitContext) -> Traverse {
        self.import_file(node, &shape.path)
    }

    fn apply_collada(&mut self, node: &Node, shape: &ColladaShape, _ctx: &VisitContext) -> Traverse {
        self.import_file(node, &shape.path)
    }
}

impl BlenderGeomWriterVisitor {
    fn import_file(&mut self, node: &Node, path: &Path) -> Traverse {
        let file = path.display();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();

        let mut text = String::from("tagObjects()\n");
        match ext.as_str() {
            "obj" => {
                let _ = writeln!(text, "bpy.ops.import_scene.obj (filepath=\"{file}\")");
            }
            "dae" => {
                let _ = writeln!(text, "bpy.ops.wm.collada_import (filepath=\"{file}\")");
            }
            "stl" => {
                let _ = writeln!(text, "bpy.ops.import_mesh.stl (filepath=\"{file}\")");
            }
            _ => {
                tracing::warn!(
                    "Unknown mesh extension for '{}' ({}), load it manually into the empty of the same name",
                    node.name(),
                    file
                );
                let _ = writeln!(text, "# Here goes the content of file {file}");
            }
        }
        text.push_str("imported_objects = getNonTaggedObjects ()\n");
        text.push_str("print(imported_objects)\n");
        text.push_str("bpy.ops.object.empty_add ()\n");
        text.push_str("setParent (imported_objects, bpy.context.object)\n");
        self.emit(&text);
        self.standard_apply(node)
    }
}

impl SceneGraph {
    /// Append a Blender script rebuilding the subtree at `root` to `path`
    pub fn write_blender_script(&self, root: NodeId, path: impl Into<PathBuf>) -> Result<(), SceneError> {
        let mut visitor = BlenderGeomWriterVisitor::create(path)?;
        self.accept(root, &mut visitor)?;
        visitor.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::Configuration;
    use glam::Vec4;

    fn temp_script() -> PathBuf {
        std::env::temp_dir().join(format!("sceneview-{}.py", uuid::Uuid::new_v4()))
    }

    fn scene() -> (SceneGraph, NodeId) {
        let mut graph = SceneGraph::new();
        let root = graph.create_group("world").unwrap();
        let body = graph.create_box("world/body", Vec3::new(0.5, 1.0, 1.5), Vec4::ONE).unwrap();
        let light = graph.create_light("world/light", 0.1, Vec4::ONE).unwrap();
        let mesh = graph.create_mesh("world/part", "meshes/part.STL", None, Vec4::ONE).unwrap();
        graph
            .node_mut(body)
            .unwrap()
            .set_static_transform(Configuration::from_position(Vec3::new(1.0, 0.0, 0.0)));
        graph.add_child(root, body).unwrap();
        graph.add_child(root, light).unwrap();
        graph.add_child(root, mesh).unwrap();
        (graph, root)
    }

    #[test]
    fn test_script_structure() {
        let (graph, root) = scene();
        let path = temp_script();
        graph.write_blender_script(root, &path).unwrap();
        let script = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert!(script.starts_with("import bpy\n"));
        assert!(script.contains("## Group world\n"));
        assert!(script.contains("bpy.context.object.dimensions = ( 1, 2, 3, )\n"));
        assert!(script.contains("bpy.context.object.location = ( 1, 0, 0, )\n"));
        assert!(script.contains("bpy.context.object.rotation_quaternion = ( 1, 0, 0, 0, )\n"));
        assert!(script.contains("bpy.ops.import_mesh.stl (filepath=\"meshes/part.STL\")\n"));
        assert!(script.contains("bpy.context.object.parent = bpy.data.objects[\"world\"]\n"));
        assert!(script.ends_with("##\n"));

        // The light has no primitive and becomes an empty
        let light_at = script.find("\"world/light__shape\"").unwrap();
        assert!(script[..light_at].ends_with("bpy.ops.object.empty_add()\nbpy.context.object.name = "));
    }

    #[test]
    fn test_append_comments_header() {
        let (graph, root) = scene();
        let path = temp_script();
        graph.write_blender_script(root, &path).unwrap();
        graph.write_blender_script(root, &path).unwrap();
        let script = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert!(script.starts_with("import bpy\n"));
        assert_eq!(script.matches("# import bpy\n").count(), 1);
        assert_eq!(script.matches("## Group world\n").count(), 2);
    }

    #[test]
    fn test_nested_group_markers() {
        let mut graph = SceneGraph::new();
        let outer = graph.create_group("a").unwrap();
        let inner = graph.create_group("a/b").unwrap();
        graph.add_child(outer, inner).unwrap();

        let path = temp_script();
        graph.write_blender_script(outer, &path).unwrap();
        let script = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert!(script.contains("#### Group a/b\n"));
        assert!(script.contains("####\n##\n"));
    }
}
