use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ConvertorError, Result};
use crate::CompressionMode;

fn default_true() -> bool {
    true
}

fn default_quality() -> u8 {
    80
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

/// Process-wide conversion settings, loaded once and passed to the convertor.
///
/// Read-only after construction; callers hand it to `Convertor` instead of
/// reaching into a global.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Master feature flag; when false nothing is converted and no file is written.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// When false, only pre-existing converted files are served (read-only mode).
    #[serde(default = "default_true")]
    pub allow_image_creation: bool,
    /// WebP compression quality (0-100), used by lossy and auto modes.
    #[serde(default = "default_quality")]
    pub quality: u8,
    #[serde(default)]
    pub mode: CompressionMode,
    /// Optional subdirectory (relative to the source image) for derived files.
    #[serde(default)]
    pub target_dir: Option<String>,
    /// Media root that URLs resolve against.
    #[serde(default = "default_root")]
    pub root: PathBuf,
    /// Public URL prefix stripped during URL resolution.
    #[serde(default)]
    pub base_url: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enabled: true,
            allow_image_creation: true,
            quality: 80,
            mode: CompressionMode::default(),
            target_dir: None,
            root: default_root(),
            base_url: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path).map_err(|e| {
            ConvertorError::InvalidConfiguration(format!("{}: {}", path.display(), e))
        })?;
        let config: Config = toml::from_str(&data).map_err(|e| {
            ConvertorError::InvalidConfiguration(format!("{}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load from the default location if a config file exists there, otherwise defaults.
    pub fn load_or_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Default config location: `<config_dir>/webpgen/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("webpgen").join("config.toml"))
    }

    pub fn validate(&self) -> Result<()> {
        if self.quality > 100 {
            return Err(ConvertorError::InvalidConfiguration(format!(
                "quality must be 0-100, got {}",
                self.quality
            )));
        }
        Ok(())
    }

    /// Builder pattern for setting the feature flag
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Builder pattern for toggling file creation (read-only mode when false)
    pub fn with_image_creation(mut self, allow: bool) -> Self {
        self.allow_image_creation = allow;
        self
    }

    /// Builder pattern for setting quality
    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality;
        self
    }

    /// Builder pattern for setting compression mode
    pub fn with_mode(mut self, mode: CompressionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Builder pattern for setting the derived-file subdirectory
    pub fn with_target_dir(mut self, target_dir: impl Into<String>) -> Self {
        self.target_dir = Some(target_dir.into());
        self
    }

    /// Builder pattern for setting the media root
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// Builder pattern for setting the public base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }
}
