//! Headless scene viewer
//!
//! Loads a URDF into a scene, animates the robot from a mutator thread
//! while the render loop refreshes, and optionally records transforms.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use glam::{Quat, Vec3};
use sceneview_core::{Configuration, HeadlessBackend, TransformFormat};
use sceneview_manager::{ConfigManager, RenderLoop, ViewerConfig, WindowsManager};
use sceneview_urdf::{GeometrySource, ImportOptions, LinkFrame};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Basic,
    Yaml,
}

#[derive(Parser)]
#[command(name = "sceneview", about = "Headless scene viewer")]
struct Cli {
    /// URDF file of the robot to load
    urdf: PathBuf,

    /// Node name of the robot inside the scene
    #[arg(long, default_value = "robot")]
    name: String,

    /// Viewer configuration (ron)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of animation steps
    #[arg(long, default_value_t = 100)]
    frames: u32,

    /// Load collision geometry instead of visual geometry
    #[arg(long)]
    collision: bool,

    /// Do not apply geometry origins as static transforms
    #[arg(long)]
    object_frame: bool,

    /// Additional package directory for package:// URIs
    #[arg(long = "package-path")]
    package_paths: Vec<PathBuf>,

    /// Append captured transforms to this file after every frame
    #[arg(long)]
    capture: Option<PathBuf>,

    #[arg(long, value_enum)]
    format: Option<Format>,

    /// Write a Blender script of the final scene
    #[arg(long)]
    blender: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sceneview=info,sceneview_manager=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    tracing::info!("Starting scene viewer");

    let mut config = match &cli.config {
        Some(path) => ConfigManager::load(path)?.config().clone(),
        None => ViewerConfig::default(),
    };
    if let Some(format) = cli.format {
        config.capture.format = match format {
            Format::Basic => TransformFormat::Basic,
            Format::Yaml => TransformFormat::Yaml,
        };
    }
    if cli.capture.is_some() {
        config.capture.auto_capture = true;
    }

    let manager = WindowsManager::shared(config);
    manager.create_scene_with_floor("world")?;

    let mut options = ImportOptions {
        geometry: if cli.collision {
            GeometrySource::Collision
        } else {
            GeometrySource::Visual
        },
        frame: if cli.object_frame {
            LinkFrame::Object
        } else {
            LinkFrame::Link
        },
        ..ImportOptions::default()
    };
    options.package_paths.extend(cli.package_paths.iter().cloned());

    let robot = format!("world/{}", cli.name);
    manager.add_urdf(&robot, &cli.urdf, &options)?;
    tracing::info!("Scene has {} nodes", manager.node_list().len());

    if let Some(path) = &cli.capture {
        manager.set_capture_transform(path, &["world"])?;
    }

    let render = RenderLoop::spawn(manager.clone(), HeadlessBackend::new());

    let mutator = {
        let manager = manager.clone();
        let robot = robot.clone();
        let frames = cli.frames;
        std::thread::spawn(move || {
            for step in 0..frames {
                let angle = step as f32 * 0.05;
                let pose = Configuration::new(Vec3::new(angle.cos(), angle.sin(), 0.0), Quat::from_rotation_z(angle));
                if let Err(e) = manager.apply_configuration(&robot, pose) {
                    tracing::warn!("Animation stopped: {}", e);
                    break;
                }
                std::thread::sleep(manager.refresh_period());
            }
        })
    };
    if mutator.join().is_err() {
        tracing::error!("Mutator thread panicked");
    }

    // Let the last queued pose reach the backend
    while manager.pending_configurations() > 0 {
        std::thread::sleep(Duration::from_millis(1));
    }
    let rendered = render.frames();
    while render.frames() == rendered && render.is_running() {
        std::thread::sleep(Duration::from_millis(1));
    }

    let backend = render.stop().ok_or("render thread panicked")?;
    tracing::info!(
        "Rendered {} frames, {} node syncs, {} captured frames",
        backend.frames(),
        backend.syncs(),
        manager.captured_frames()
    );

    if let Some(path) = &cli.blender {
        manager.write_blender_script("world", path)?;
    }
    Ok(())
}
