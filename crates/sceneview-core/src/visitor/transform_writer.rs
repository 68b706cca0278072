//! Frame-by-frame capture of global transforms

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::configuration::Configuration;
use crate::error::SceneError;
use crate::graph::SceneGraph;
use crate::node::{Node, NodeId};

use super::{NodeVisitor, Traverse, VisitContext};

/// Text layout of a capture file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TransformFormat {
    /// `FRAME=<n>` then `<name>=x, y, z, qw, qx, qy, qz`
    #[default]
    Basic,
    /// `frame_<n>:` then `  <name>: [x, y, z, qw, qx, qy, qz]`
    Yaml,
}

/// Sink for captured transforms
pub trait TransformWriter {
    fn open(&mut self) -> Result<(), SceneError>;
    /// Write the header of the next frame and advance the frame counter
    fn new_frame(&mut self) -> Result<(), SceneError>;
    fn write_transform(&mut self, name: &str, transform: &Configuration) -> Result<(), SceneError>;
    fn close(&mut self) -> Result<(), SceneError>;
    fn frame_count(&self) -> u64;
}

/// Appends frames to a text file
#[derive(Debug)]
pub struct FileTransformWriter {
    path: PathBuf,
    format: TransformFormat,
    frame_count: u64,
    out: Option<BufWriter<File>>,
}

impl FileTransformWriter {
    pub fn new(path: impl Into<PathBuf>, format: TransformFormat) -> Self {
        Self {
            path: path.into(),
            format,
            frame_count: 0,
            out: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> TransformFormat {
        self.format
    }

    fn out(&mut self) -> Result<&mut BufWriter<File>, SceneError> {
        let path = &self.path;
        self.out
            .as_mut()
            .ok_or_else(|| SceneError::io(path, "capture file is not open"))
    }
}

impl TransformWriter for FileTransformWriter {
    fn open(&mut self) -> Result<(), SceneError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| SceneError::io(&self.path, e))?;
        self.out = Some(BufWriter::new(file));
        Ok(())
    }

    fn new_frame(&mut self) -> Result<(), SceneError> {
        let frame = self.frame_count;
        let line = match self.format {
            TransformFormat::Basic => format!("FRAME={frame}"),
            TransformFormat::Yaml => format!("frame_{frame}:"),
        };
        let path = self.path.clone();
        writeln!(self.out()?, "{line}").map_err(|e| SceneError::io(&path, e))?;
        self.frame_count += 1;
        Ok(())
    }

    fn write_transform(&mut self, name: &str, transform: &Configuration) -> Result<(), SceneError> {
        let values = transform
            .to_array_wxyz()
            .iter()
            .map(|v| format_value(*v))
            .collect::<Vec<_>>()
            .join(", ");
        let line = match self.format {
            TransformFormat::Basic => format!("{name}={values}"),
            TransformFormat::Yaml => format!("  {name}: [{values}]"),
        };
        let path = self.path.clone();
        writeln!(self.out()?, "{line}").map_err(|e| SceneError::io(&path, e))
    }

    fn close(&mut self) -> Result<(), SceneError> {
        if let Some(mut out) = self.out.take() {
            out.flush().map_err(|e| SceneError::io(&self.path, e))?;
        }
        Ok(())
    }

    fn frame_count(&self) -> u64 {
        self.frame_count
    }
}

/// Shortest round-trip form, with negative zero printed as `0`
fn format_value(value: f32) -> String {
    if value == 0.0 {
        "0".to_string()
    } else {
        value.to_string()
    }
}

/// Writes the global transform of every visited node, visible or not
pub struct TransformWriterVisitor<W: TransformWriter = FileTransformWriter> {
    writer: W,
    error: Option<SceneError>,
}

impl<W: TransformWriter> TransformWriterVisitor<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            error: None,
        }
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    pub fn into_writer(self) -> W {
        self.writer
    }

    /// Open the sink, write one frame covering every node under `roots`,
    /// close the sink. The sink is closed even when writing fails.
    pub fn capture_frame(&mut self, graph: &SceneGraph, roots: &[NodeId]) -> Result<(), SceneError> {
        self.writer.open()?;
        let written = self.write_frame(graph, roots);
        let closed = self.writer.close();
        written.and(closed)
    }

    fn write_frame(&mut self, graph: &SceneGraph, roots: &[NodeId]) -> Result<(), SceneError> {
        self.writer.new_frame()?;
        for root in roots {
            graph.accept(*root, self)?;
            if let Some(error) = self.error.take() {
                return Err(error);
            }
        }
        Ok(())
    }
}

impl<W: TransformWriter> NodeVisitor for TransformWriterVisitor<W> {
    fn apply_node(&mut self, node: &Node, ctx: &VisitContext) -> Traverse {
        match self.writer.write_transform(node.name(), &ctx.global) {
            Ok(()) => Traverse::Descend,
            Err(error) => {
                self.error = Some(error);
                Traverse::Stop
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::VisibilityMode;
    use glam::{Quat, Vec3, Vec4};

    fn temp_path(ext: &str) -> PathBuf {
        std::env::temp_dir().join(format!("sceneview-capture-{}.{ext}", uuid::Uuid::new_v4()))
    }

    fn single_root() -> (SceneGraph, NodeId) {
        let mut graph = SceneGraph::new();
        let root = graph.create_group("root").unwrap();
        graph
            .node_mut(root)
            .unwrap()
            .apply_configuration(Configuration::from_position(Vec3::new(1.0, 2.0, 3.0)));
        (graph, root)
    }

    #[test]
    fn test_basic_single_frame() {
        let (graph, root) = single_root();
        let path = temp_path("txt");

        let mut visitor = TransformWriterVisitor::new(FileTransformWriter::new(&path, TransformFormat::Basic));
        visitor.capture_frame(&graph, &[root]).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(content, "FRAME=0\nroot=1, 2, 3, 1, 0, 0, 0\n");
        assert_eq!(visitor.writer().frame_count(), 1);
    }

    #[test]
    fn test_yaml_frames_append() {
        let (mut graph, root) = single_root();
        let path = temp_path("yaml");
        let mut visitor = TransformWriterVisitor::new(FileTransformWriter::new(&path, TransformFormat::Yaml));

        visitor.capture_frame(&graph, &[root]).unwrap();
        graph
            .node_mut(root)
            .unwrap()
            .apply_configuration(Configuration::new(Vec3::ZERO, Quat::from_xyzw(0.0, 0.0, 1.0, 0.0)));
        visitor.capture_frame(&graph, &[root]).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(
            content,
            "frame_0:\n  root: [1, 2, 3, 1, 0, 0, 0]\nframe_1:\n  root: [0, 0, 0, 0, 0, 0, 1]\n"
        );
    }

    #[test]
    fn test_invisible_nodes_are_written() {
        let (mut graph, root) = single_root();
        let child = graph.create_sphere("root/ball", 0.1, Vec4::ONE).unwrap();
        graph.add_child(root, child).unwrap();
        graph
            .node_mut(child)
            .unwrap()
            .set_visibility(VisibilityMode::Off);

        let path = temp_path("txt");
        let mut visitor = TransformWriterVisitor::new(FileTransformWriter::new(&path, TransformFormat::Basic));
        visitor.capture_frame(&graph, &[root]).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(content.lines().count(), 3);
        assert!(content.contains("root/ball=1, 2, 3, 1, 0, 0, 0"));
    }

    #[test]
    fn test_unopenable_file_fails() {
        let (graph, root) = single_root();
        let path = std::env::temp_dir()
            .join(format!("sceneview-missing-{}", uuid::Uuid::new_v4()))
            .join("capture.txt");

        let mut visitor = TransformWriterVisitor::new(FileTransformWriter::new(&path, TransformFormat::Basic));
        assert!(matches!(
            visitor.capture_frame(&graph, &[root]),
            Err(SceneError::Io { .. })
        ));
        assert_eq!(visitor.writer().frame_count(), 0);
    }
}
