//! Configuration management for toolhost
//!
//! Handles loading and merging configuration from multiple sources:
//! 1. Compiled defaults
//! 2. System config (/etc/toolhost/config.toml)
//! 3. User config (~/.toolhost/config.toml)
//! 4. Config file given on the command line
//! 5. Environment variables
//! 6. CLI arguments (applied by the binary)

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tools: ToolsConfig,
    pub logging: LoggingConfig,
}

/// Which unit loader turns package files into tool instances
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoaderKind {
    /// Tools compiled into this binary, selected by unit file name
    Builtin,
    /// Platform shared libraries opened at runtime
    Native,
}

impl std::str::FromStr for LoaderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "builtin" => Ok(LoaderKind::Builtin),
            "native" => Ok(LoaderKind::Native),
            other => Err(ConfigError::Invalid(format!(
                "tools.loader must be 'builtin' or 'native', got '{}'",
                other
            ))),
        }
    }
}

/// Tool discovery and execution configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Root directory holding one subdirectory per tool
    pub directory: PathBuf,
    /// Required descriptor file inside each package
    pub descriptor_file: String,
    /// Optional UI schema file inside each package
    pub ui_schema_file: String,
    /// Unit loader
    pub loader: LoaderKind,
    /// Override for the unit file extension
    pub unit_extension: Option<String>,
    /// Load timeout in seconds
    pub load_timeout: u64,
    /// Execution timeout in seconds
    pub execute_timeout: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is unset
    pub level: String,
    /// Emit JSON lines instead of human-readable output; unset means plain
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json: Option<bool>,
}

impl LoggingConfig {
    pub fn json(&self) -> bool {
        self.json.unwrap_or(false)
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("tools"),
            descriptor_file: "metadata.yaml".to_string(),
            ui_schema_file: "ui-schema.yaml".to_string(),
            loader: LoaderKind::Builtin,
            unit_extension: None,
            load_timeout: 30,
            execute_timeout: 30,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: None,
        }
    }
}

impl ToolsConfig {
    pub fn load_timeout(&self) -> Duration {
        Duration::from_secs(self.load_timeout)
    }

    pub fn execute_timeout(&self) -> Duration {
        Duration::from_secs(self.execute_timeout)
    }
}

impl Config {
    /// Load configuration from all sources
    pub fn load(cli_config: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        // Load system config
        let system_config = Path::new("/etc/toolhost/config.toml");
        if system_config.exists() {
            debug!("Loading system config from {:?}", system_config);
            config.merge_from_file(system_config)?;
        }

        // Load user config
        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".toolhost/config.toml");
            if user_config.exists() {
                debug!("Loading user config from {:?}", user_config);
                config.merge_from_file(&user_config)?;
            }
        }

        // Load CLI-specified config
        if let Some(path) = cli_config {
            debug!("Loading CLI config from {:?}", path);
            config.merge_from_file(path)?;
        }

        config.apply_env_overrides()?;

        Ok(config)
    }

    /// Merge configuration from a file
    fn merge_from_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(format!("{}: {}", path.display(), e)))?;

        let file_config: Config = toml::from_str(&contents)
            .map_err(|e| ConfigError::Parse(format!("{}: {}", path.display(), e)))?;

        self.merge(file_config);
        Ok(())
    }

    /// Merge another config into this one (other takes precedence)
    fn merge(&mut self, other: Config) {
        let defaults = ToolsConfig::default();

        if other.tools.directory != defaults.directory {
            self.tools.directory = other.tools.directory;
        }
        if other.tools.descriptor_file != defaults.descriptor_file {
            self.tools.descriptor_file = other.tools.descriptor_file;
        }
        if other.tools.ui_schema_file != defaults.ui_schema_file {
            self.tools.ui_schema_file = other.tools.ui_schema_file;
        }
        if other.tools.loader != defaults.loader {
            self.tools.loader = other.tools.loader;
        }
        if other.tools.unit_extension.is_some() {
            self.tools.unit_extension = other.tools.unit_extension;
        }
        if other.tools.load_timeout != defaults.load_timeout {
            self.tools.load_timeout = other.tools.load_timeout;
        }
        if other.tools.execute_timeout != defaults.execute_timeout {
            self.tools.execute_timeout = other.tools.execute_timeout;
        }

        if other.logging.level != LoggingConfig::default().level {
            self.logging.level = other.logging.level;
        }
        // Logging format - only when the file sets it
        if other.logging.json.is_some() {
            self.logging.json = other.logging.json;
        }
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(dir) = std::env::var("TOOLHOST_TOOLS_DIR") {
            self.tools.directory = PathBuf::from(dir);
        }
        if let Ok(loader) = std::env::var("TOOLHOST_LOADER") {
            self.tools.loader = loader.parse()?;
        }
        if let Ok(level) = std::env::var("TOOLHOST_LOG_LEVEL") {
            self.logging.level = level;
        }
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tools.descriptor_file.trim().is_empty() {
            return Err(ConfigError::MissingField("tools.descriptor_file".to_string()));
        }
        if self.tools.ui_schema_file.trim().is_empty() {
            return Err(ConfigError::MissingField("tools.ui_schema_file".to_string()));
        }
        if self.tools.load_timeout == 0 || self.tools.execute_timeout == 0 {
            return Err(ConfigError::Invalid(
                "tools.load_timeout and tools.execute_timeout must be positive".to_string(),
            ));
        }
        if let Some(ext) = &self.tools.unit_extension {
            if ext.is_empty() || ext.starts_with('.') {
                return Err(ConfigError::Invalid(format!(
                    "tools.unit_extension must be a bare extension, got '{}'",
                    ext
                )));
            }
        }
        Ok(())
    }
}
