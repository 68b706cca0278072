//! Scene Viewer Core
//!
//! This crate contains the scene graph of the viewer:
//! - Configuration: rigid transform algebra
//! - Node / GroupNode: the node model, its kinds and dirty tracking
//! - SceneGraph: arena owning the nodes, naming and group composition
//! - Properties: named typed attributes for UIs and scripts
//! - Visitors: dirty detection, transform capture, geometry export, mesh simplification
//! - RenderBackend: seam towards the rendering engine

pub mod configuration;
pub mod defaults;
pub mod error;
pub mod graph;
pub mod mesh;
pub mod node;
pub mod properties;
pub mod shape;
pub mod substrate;
pub mod visitor;

pub use configuration::*;
pub use defaults::*;
pub use error::*;
pub use graph::*;
pub use mesh::*;
pub use node::*;
pub use properties::*;
pub use shape::*;
pub use substrate::*;
pub use visitor::*;
