//! Core configuration structures and loading logic

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Error type for configuration operations
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file
    Io(std::io::Error),
    /// TOML parsing error
    Parse(toml::de::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Failed to read config file: {}", e),
            ConfigError::Parse(e) => write!(f, "Failed to parse config: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

/// How output files are named when a file from a previous render exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveMode {
    /// Append `_vNNN` and pick the next free version.
    #[default]
    Incremental,
    /// Reuse the same path every time, replacing the previous render.
    Overwrite,
    /// Reuse the same path but refuse to replace an existing render.
    Protect,
}

impl SaveMode {
    /// Derive the mode from the pair of job flags. Incremental wins over overwrite.
    pub fn from_flags(incremental: bool, overwrite: bool) -> Self {
        match (incremental, overwrite) {
            (true, _) => SaveMode::Incremental,
            (false, true) => SaveMode::Overwrite,
            (false, false) => SaveMode::Protect,
        }
    }

    pub fn is_incremental(self) -> bool {
        self == SaveMode::Incremental
    }

    pub fn is_overwrite(self) -> bool {
        self == SaveMode::Overwrite
    }
}

impl FromStr for SaveMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "incremental" => Ok(SaveMode::Incremental),
            "overwrite" => Ok(SaveMode::Overwrite),
            "protect" => Ok(SaveMode::Protect),
            other => Err(format!("unknown save mode '{}'", other)),
        }
    }
}

impl std::fmt::Display for SaveMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SaveMode::Incremental => write!(f, "incremental"),
            SaveMode::Overwrite => write!(f, "overwrite"),
            SaveMode::Protect => write!(f, "protect"),
        }
    }
}

/// Output naming configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutputConfig {
    /// Directory for preview renders (derived from the document if None)
    #[serde(default)]
    pub directory: Option<PathBuf>,
    /// Save mode for newly queued jobs (default incremental)
    #[serde(default)]
    pub save_mode: SaveMode,
    /// Prefix file names with the scene name (default true)
    #[serde(default = "default_true")]
    pub include_scene_name: bool,
    /// Include the camera name in file names (default true)
    #[serde(default = "default_true")]
    pub include_camera: bool,
    /// Include the `SSS-EEE` frame range in file names (default true)
    #[serde(default = "default_true")]
    pub include_frame_range: bool,
    /// Keep a trailing `_v003` of the document name in the scene segment (default false)
    #[serde(default)]
    pub keep_scene_version: bool,
}

fn default_true() -> bool {
    true
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: None,
            save_mode: SaveMode::default(),
            include_scene_name: true,
            include_camera: true,
            include_frame_range: true,
            keep_scene_version: false,
        }
    }
}

/// Settings backup configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecoveryConfig {
    /// Write a settings backup to disk for the duration of a run (default true)
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Where backups are written (system temp dir if None)
    #[serde(default)]
    pub backup_dir: Option<PathBuf>,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backup_dir: None,
        }
    }
}

impl RecoveryConfig {
    /// Resolved backup directory.
    pub fn backup_dir(&self) -> PathBuf {
        self.backup_dir
            .clone()
            .unwrap_or_else(|| env::temp_dir().join("render-session"))
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level filter (e.g. "info", "render_session=debug,warn")
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit structured JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub recovery: RecoveryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Parses the config.toml file and handles missing optional fields with defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration
    ///
    /// Overrides the following values if environment variables are set:
    /// - RENDER_OUTPUT_DIR -> output.directory
    /// - RENDER_SAVE_MODE -> output.save_mode
    /// - RENDER_INCLUDE_CAMERA -> output.include_camera
    /// - RENDER_INCLUDE_SCENE_NAME -> output.include_scene_name
    /// - RENDER_RECOVERY_ENABLED -> recovery.enabled
    /// - RENDER_LOG_LEVEL -> logging.level
    /// - RENDER_LOG_JSON -> logging.json
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("RENDER_OUTPUT_DIR") {
            if !val.trim().is_empty() {
                self.output.directory = Some(PathBuf::from(val));
            }
        }

        if let Ok(val) = env::var("RENDER_SAVE_MODE") {
            if let Ok(mode) = val.parse::<SaveMode>() {
                self.output.save_mode = mode;
            }
        }

        if let Some(flag) = env_flag("RENDER_INCLUDE_CAMERA") {
            self.output.include_camera = flag;
        }

        if let Some(flag) = env_flag("RENDER_INCLUDE_SCENE_NAME") {
            self.output.include_scene_name = flag;
        }

        if let Some(flag) = env_flag("RENDER_RECOVERY_ENABLED") {
            self.recovery.enabled = flag;
        }

        if let Ok(val) = env::var("RENDER_LOG_LEVEL") {
            if !val.trim().is_empty() {
                self.logging.level = val;
            }
        }

        if let Some(flag) = env_flag("RENDER_LOG_JSON") {
            self.logging.json = flag;
        }
    }

    /// Load configuration from file and apply environment overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Directory where preview renders go.
    ///
    /// Uses the configured directory if set, otherwise a `previews` folder next
    /// to the document, otherwise a folder in the system temp dir (unsaved documents).
    pub fn output_dir(&self, document_dir: Option<&Path>) -> PathBuf {
        if let Some(dir) = &self.output.directory {
            return dir.clone();
        }
        match document_dir {
            Some(dir) => dir.join("previews"),
            None => env::temp_dir().join("render_previews"),
        }
    }
}

/// Read a boolean env var. Accepts "true", "1", "yes" / "false", "0", "no".
fn env_flag(name: &str) -> Option<bool> {
    let val = env::var(name).ok()?;
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None, // Invalid value, keep existing
    }
}
