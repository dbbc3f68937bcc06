use maestro_core::ZoomLevel;
use maestro_timeline::{NavigationConfig, ViewportSize};
use maestro_workspace::HistoryConfig;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const CONFIG_PATH_ENV: &str = "MAESTRO_CONFIG_PATH";
pub const DB_PATH_ENV: &str = "MAESTRO_DB_PATH";
pub const DEBOUNCE_ENV: &str = "MAESTRO_DEBOUNCE_MS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid value for {var}: {value:?}")]
    InvalidEnv { var: &'static str, value: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaestroConfig {
    pub persistence: PersistenceConfig,
    pub timeline: TimelineConfig,
    pub viewport: ViewportConfig,
    pub history: HistoryConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    pub db_path: Option<PathBuf>,
    pub debounce_ms: u64,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            debounce_ms: 1_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    pub tick_ms: u64,
    pub default_zoom: ZoomLevel,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            tick_ms: 1_000,
            default_zoom: ZoomLevel::Day,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    pub fallback_width: f64,
    pub fallback_height: f64,
    pub animation_ms: u64,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            fallback_width: 1_000.0,
            fallback_height: 800.0,
            animation_ms: 300,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub log_dir: Option<PathBuf>,
    pub log_stderr: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_dir: None,
            log_stderr: true,
        }
    }
}

impl MaestroConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.persistence.debounce_ms)
    }

    /// Never zero: `tokio::time::interval` rejects an empty period.
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.timeline.tick_ms.max(1))
    }

    pub fn navigation(&self) -> NavigationConfig {
        NavigationConfig {
            default_zoom: self.timeline.default_zoom,
            fallback_size: ViewportSize {
                width: self.viewport.fallback_width,
                height: self.viewport.fallback_height,
            },
            animation_ms: self.viewport.animation_ms,
        }
    }

    pub fn db_path(&self) -> PathBuf {
        match &self.persistence.db_path {
            Some(path) => expand_tilde(path),
            None => default_db_path(),
        }
    }
}

/// Missing file yields defaults; a file that does not parse is an error.
pub fn load_config(path: &Path) -> Result<MaestroConfig, ConfigError> {
    if !path.exists() {
        return Ok(MaestroConfig::default());
    }
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

pub fn config_path() -> PathBuf {
    if let Ok(path) = env::var(CONFIG_PATH_ENV) {
        return PathBuf::from(path);
    }
    config_dir().join("maestro/config.toml")
}

fn config_dir() -> PathBuf {
    if let Ok(path) = env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(path);
    }
    home_dir().join(".config")
}

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| home_dir().join(".local/share"))
        .join("maestro/workspace.db")
}

fn expand_tilde(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => home_dir().join(rest),
        Err(_) => path.to_path_buf(),
    }
}

/// Applies `MAESTRO_DB_PATH` and `MAESTRO_DEBOUNCE_MS`.
pub fn apply_env_overrides(config: &mut MaestroConfig) -> Result<(), ConfigError> {
    apply_overrides(config, |var| env::var(var).ok())
}

pub fn apply_overrides(
    config: &mut MaestroConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(), ConfigError> {
    if let Some(path) = lookup(DB_PATH_ENV).filter(|value| !value.trim().is_empty()) {
        config.persistence.db_path = Some(PathBuf::from(path));
    }
    if let Some(value) = lookup(DEBOUNCE_ENV) {
        config.persistence.debounce_ms =
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidEnv {
                    var: DEBOUNCE_ENV,
                    value: value.clone(),
                })?;
    }
    Ok(())
}
