//! Configuration file support for iv.
//!
//! Preferences live in `iv-config.json` under the user's config directory.
//! A missing or unreadable file means defaults; command-line flags override
//! whatever is loaded.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Verbosity of the `env_logger` output.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    /// Decode timings, uploads and stale results
    Debug,
    /// Every command and key press
    Trace,
}

impl LogLevel {
    /// The command line wins over the config file; Info when neither says.
    pub fn resolve(cli: Option<LogLevel>, config: Option<LogLevel>) -> LogLevel {
        cli.or(config).unwrap_or_default()
    }

    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Format version written by this build.
pub const CONFIG_VERSION: u32 = 1;

/// Persisted application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Newer versions are rejected
    pub version: u32,

    #[serde(default)]
    pub preferences: Preferences,
}

/// Viewer preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default)]
    pub log_level: LogLevel,

    /// Decode on the background thread instead of blocking the window
    #[serde(default = "default_true")]
    pub background_decode: bool,

    /// Magnification of the pixel-peek inset
    #[serde(default = "default_pixel_peek_zoom")]
    pub pixel_peek_zoom: f32,

    /// Edge length of the pixel-peek inset in window pixels
    #[serde(default = "default_pixel_peek_size")]
    pub pixel_peek_size: u32,

    #[serde(default = "default_true")]
    pub show_pixel_peek: bool,

    /// Longest edge of thumbnails (window icon)
    #[serde(default = "default_thumbnail_size")]
    pub thumbnail_size: u32,

    /// Window background as linear RGB
    #[serde(default = "default_clear_color")]
    pub clear_color: [f32; 3],

    /// Zoom newly shown images to fit the window
    #[serde(default = "default_true")]
    pub fit_on_open: bool,
}

fn default_true() -> bool {
    true
}

fn default_pixel_peek_zoom() -> f32 {
    16.0
}

fn default_pixel_peek_size() -> u32 {
    160
}

fn default_thumbnail_size() -> u32 {
    64
}

fn default_clear_color() -> [f32; 3] {
    [0.1, 0.1, 0.1]
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            background_decode: true,
            pixel_peek_zoom: default_pixel_peek_zoom(),
            pixel_peek_size: default_pixel_peek_size(),
            show_pixel_peek: true,
            thumbnail_size: default_thumbnail_size(),
            clear_color: default_clear_color(),
            fit_on_open: true,
        }
    }
}

impl AppConfig {
    pub fn new() -> Self {
        Self {
            version: CONFIG_VERSION,
            preferences: Preferences::default(),
        }
    }

    /// Pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parse JSON, rejecting files from a newer version.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;

        if config.version > CONFIG_VERSION {
            return Err(ConfigError::VersionTooNew {
                file_version: config.version,
                supported_version: CONFIG_VERSION,
            });
        }

        Ok(config)
    }

    pub fn default_filename() -> &'static str {
        "iv-config.json"
    }

    /// Default config file location: the XDG config dir, else `~/.config`.
    pub fn default_path() -> Option<PathBuf> {
        if let Some(config_dir) = dirs::config_dir() {
            Some(config_dir.join("iv").join(Self::default_filename()))
        } else {
            dirs::home_dir().map(|home| {
                home.join(".config")
                    .join("iv")
                    .join(Self::default_filename())
            })
        }
    }

    /// Load from `path`. `Ok(None)` when the file does not exist.
    pub fn load_from_path(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            log::debug!("No config at {:?}", path);
            return Ok(None);
        }
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json(&json)?;
        log::info!("Using config {:?}", path);
        Ok(Some(config))
    }

    /// Load from the default path, falling back to defaults on any problem.
    pub fn load_or_default() -> Self {
        let Some(path) = Self::default_path() else {
            return Self::default();
        };
        match Self::load_from_path(&path) {
            Ok(config) => config.unwrap_or_default(),
            Err(e) => {
                log::warn!("Ignoring config file {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    /// Save to `path`, creating parent directories.
    pub fn save_to_path(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;
        log::info!("Wrote config {:?}", path);
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Why a config file could not be used.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid config JSON: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Config version {file_version} is newer than this build ({supported_version})")]
    VersionTooNew {
        file_version: u32,
        supported_version: u32,
    },

    #[error("Config file I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
