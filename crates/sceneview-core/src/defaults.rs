//! Process-wide scene defaults
//!
//! Created once at startup and handed to the [`SceneGraph`](crate::SceneGraph)
//! that needs them.

use glam::Vec4;
use serde::{Deserialize, Serialize};

pub const DEFAULT_LANDMARK_SIZE: f32 = 0.05;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneDefaults {
    /// Color of leaves created without an explicit color
    pub default_color: [f32; 4],
    /// Size of landmarks added without an explicit size
    pub landmark_size: f32,
    /// First and second colors of the floor checkerboard
    pub ground_colors: [[f32; 4]; 2],
    /// Side length of the floor created with a scene
    pub ground_size: f32,
    /// Side length of one floor cell
    pub ground_square_size: f32,
}

impl Default for SceneDefaults {
    fn default() -> Self {
        Self {
            default_color: [1.0, 1.0, 1.0, 1.0],
            landmark_size: DEFAULT_LANDMARK_SIZE,
            ground_colors: [[0.0, 0.0, 0.0, 1.0], [1.0, 1.0, 1.0, 1.0]],
            ground_size: 10.0,
            ground_square_size: 0.5,
        }
    }
}

impl SceneDefaults {
    pub fn default_color(&self) -> Vec4 {
        Vec4::from_array(self.default_color)
    }
}

/// Named colors accepted by the manager facade. Unknown names map to black.
pub fn color_by_name(name: &str) -> Vec4 {
    match name {
        "blue" => Vec4::new(0.0, 0.0, 1.0, 1.0),
        "green" => Vec4::new(0.0, 1.0, 0.0, 1.0),
        "red" => Vec4::new(1.0, 0.0, 0.0, 1.0),
        "white" => Vec4::ONE,
        _ => Vec4::new(0.0, 0.0, 0.0, 1.0),
    }
}
