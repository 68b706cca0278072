//! Viewer configuration
//!
//! Loaded once at startup from a ron file and handed to the
//! [`WindowsManager`](crate::WindowsManager).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use sceneview_core::{SceneDefaults, TransformFormat};
use serde::{Deserialize, Serialize};

/// Shared configuration manager type
pub type SharedConfig = Arc<RwLock<ConfigManager>>;

/// Configuration error types
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// IO error during file operations
    #[error("IO error: {0}")]
    Io(String),
    /// Error during serialization
    #[error("Serialization error: {0}")]
    Serialize(String),
    /// Error during deserialization
    #[error("Deserialization error: {0}")]
    Deserialize(String),
}

/// Transform capture settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct CaptureConfig {
    /// Output format of captured frames
    pub format: TransformFormat,
    /// Capture a frame after every refresh once a capture file is set
    pub auto_capture: bool,
}

/// Complete viewer configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ViewerConfig {
    /// Configuration format version
    #[serde(default)]
    pub version: u32,
    /// Delay between two frames of the render loop
    #[serde(default = "default_refresh_period")]
    pub refresh_period_ms: u64,
    #[serde(default)]
    pub defaults: SceneDefaults,
    #[serde(default)]
    pub capture: CaptureConfig,
}

fn default_refresh_period() -> u64 {
    ViewerConfig::DEFAULT_REFRESH_PERIOD_MS
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            refresh_period_ms: Self::DEFAULT_REFRESH_PERIOD_MS,
            defaults: SceneDefaults::default(),
            capture: CaptureConfig::default(),
        }
    }
}

impl ViewerConfig {
    /// Current configuration version
    pub const CURRENT_VERSION: u32 = 1;

    pub const DEFAULT_REFRESH_PERIOD_MS: u64 = 20;

    pub fn refresh_period(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.refresh_period_ms.max(1))
    }
}

/// Loads, holds and saves the [`ViewerConfig`]
pub struct ConfigManager {
    config: ViewerConfig,
    config_path: PathBuf,
    dirty: bool,
}

impl ConfigManager {
    /// Load the configuration at `path`. A missing file yields defaults.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let config_path = path.into();
        let config = match Self::load_from_path(&config_path)? {
            Some(config) => config,
            None => {
                tracing::info!("No config file found at {:?}, using defaults", config_path);
                ViewerConfig::default()
            }
        };

        Ok(Self {
            config,
            config_path,
            dirty: false,
        })
    }

    /// Configuration held in memory only, saved to `path` on request
    pub fn with_config(path: impl Into<PathBuf>, config: ViewerConfig) -> Self {
        Self {
            config,
            config_path: path.into(),
            dirty: true,
        }
    }

    fn load_from_path(path: &Path) -> Result<Option<ViewerConfig>, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ConfigError::Io(e.to_string())),
        };
        let config = ron::from_str(&content).map_err(|e| {
            tracing::warn!("Failed to parse config file {:?}: {}", path, e);
            ConfigError::Deserialize(e.to_string())
        })?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(Some(config))
    }

    /// Get a reference to the current configuration
    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    /// Get a mutable reference to the configuration (marks as dirty)
    pub fn config_mut(&mut self) -> &mut ViewerConfig {
        self.dirty = true;
        &mut self.config
    }

    /// Check if the configuration has unsaved changes
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Save the configuration to disk
    pub fn save(&mut self) -> Result<(), ConfigError> {
        if !self.dirty {
            return Ok(());
        }

        if let Some(parent) = self.config_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Io(e.to_string()))?;
        }

        let content = ron::ser::to_string_pretty(&self.config, ron::ser::PrettyConfig::default())
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;

        std::fs::write(&self.config_path, &content).map_err(|e| ConfigError::Io(e.to_string()))?;

        tracing::info!("Saved config to {:?}", self.config_path);
        self.dirty = false;
        Ok(())
    }

    /// Reset configuration to defaults
    pub fn reset_to_defaults(&mut self) {
        self.config = ViewerConfig::default();
        self.dirty = true;
    }

    pub fn config_file_path(&self) -> &Path {
        &self.config_path
    }

    pub fn into_shared(self) -> SharedConfig {
        Arc::new(RwLock::new(self))
    }
}
