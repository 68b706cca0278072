//! URDF robot import
//!
//! Parses a URDF with `urdf-rs` into a [`RobotModel`] and adds it to a
//! [`sceneview_core::SceneGraph`] as a group of per-link nodes.

pub mod import;
pub mod robot;

pub use import::*;
pub use robot::*;
