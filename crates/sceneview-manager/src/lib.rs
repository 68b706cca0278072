//! Scene viewer manager
//!
//! Owns the scene graph behind the frame mutex and drives rendering:
//! - WindowsManager: name-based facade, queued configurations, transform capture
//! - RenderLoop: refresh thread
//! - ConfigManager: ron viewer configuration

pub mod config;
pub mod manager;
pub mod render_loop;

pub use config::{CaptureConfig, ConfigError, ConfigManager, SharedConfig, ViewerConfig};
pub use manager::{FrameStats, SharedManager, WindowsManager};
pub use render_loop::RenderLoop;
