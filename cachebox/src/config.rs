//! User configuration file.
//!
//! ```ini
//! [loader]
//! latency_ms = 0
//! max_concurrent_loads = 16
//!
//! [logging]
//! level = info
//! directory = /var/log/cachebox
//! file_name = cachebox.log
//!
//! [host]
//! owner_name = Session
//! ```
//!
//! # Loading priority
//!
//! 1. Explicit path (from `--config`)
//! 2. `CACHEBOX_CONFIG` environment variable
//! 3. `~/.config/cachebox/config.ini`
//! 4. Built-in defaults (a missing file is not an error)

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::Ini;
use thiserror::Error;

use crate::loader::{LoaderConfig, DEFAULT_MAX_CONCURRENT_LOADS};

/// Environment variable naming a config file.
pub const CONFIG_ENV_VAR: &str = "CACHEBOX_CONFIG";

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: ini::Error,
    },

    #[error("invalid value for [{section}] {key}: '{value}'")]
    InvalidValue {
        section: &'static str,
        key: &'static str,
        value: String,
    },
}

/// `[loader]` settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderSettings {
    pub latency: Duration,
    pub max_concurrent_loads: usize,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            latency: Duration::ZERO,
            max_concurrent_loads: DEFAULT_MAX_CONCURRENT_LOADS,
        }
    }
}

/// `[logging]` settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    /// Default filter directive, overridden by `RUST_LOG`.
    pub level: String,

    /// Directory for the rolling log file. No file output when unset.
    pub directory: Option<PathBuf>,

    pub file_name: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
            file_name: "cachebox.log".to_string(),
        }
    }
}

impl LoggingSettings {
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = Some(directory.into());
        self
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = file_name.into();
        self
    }
}

/// Parsed configuration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    pub loader: LoaderSettings,
    pub logging: LoggingSettings,
    /// Owner name used by hosts created from this configuration.
    pub owner_name: String,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            loader: LoaderSettings::default(),
            logging: LoggingSettings::default(),
            owner_name: "Session".to_string(),
        }
    }
}

impl ConfigFile {
    /// Load from the first location in the priority order that exists.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match Self::resolve_path(explicit) {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Resolve the config file path from an explicit path, the environment,
    /// or the platform config directory.
    pub fn resolve_path(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            return Some(PathBuf::from(path));
        }
        Self::default_path()
    }

    /// `<config dir>/cachebox/config.ini`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("cachebox").join("config.ini"))
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_file(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(section) = ini.section(Some("loader")) {
            if let Some(ms) = parse_value::<u64>(section.get("latency_ms"), "loader", "latency_ms")? {
                config.loader.latency = Duration::from_millis(ms);
            }
            if let Some(max) = parse_value::<usize>(
                section.get("max_concurrent_loads"),
                "loader",
                "max_concurrent_loads",
            )? {
                if max == 0 {
                    return Err(ConfigError::InvalidValue {
                        section: "loader",
                        key: "max_concurrent_loads",
                        value: max.to_string(),
                    });
                }
                config.loader.max_concurrent_loads = max;
            }
        }

        if let Some(section) = ini.section(Some("logging")) {
            if let Some(level) = non_empty(section.get("level")) {
                config.logging.level = level;
            }
            if let Some(directory) = non_empty(section.get("directory")) {
                config.logging.directory = Some(PathBuf::from(directory));
            }
            if let Some(file_name) = non_empty(section.get("file_name")) {
                config.logging.file_name = file_name;
            }
        }

        if let Some(owner) = ini
            .section(Some("host"))
            .and_then(|section| non_empty(section.get("owner_name")))
        {
            config.owner_name = owner;
        }

        Ok(config)
    }

    /// Loader configuration derived from `[loader]`.
    pub fn loader_config(&self) -> LoaderConfig {
        LoaderConfig::default()
            .with_latency(self.loader.latency)
            .with_max_concurrent_loads(self.loader.max_concurrent_loads)
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn parse_value<T: FromStr>(
    value: Option<&str>,
    section: &'static str,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    let Some(raw) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    raw.parse::<T>()
        .map(Some)
        .map_err(|_| ConfigError::InvalidValue {
            section,
            key,
            value: raw.to_string(),
        })
}
