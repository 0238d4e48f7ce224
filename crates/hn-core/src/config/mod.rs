//! Configuration management for hpc-notebook

mod cluster;
pub mod serde_utils;
mod settings;

pub use cluster::{resolve_var, ClusterConfig, ClusterOverrides};
pub use settings::SessionSettings;

use crate::error::ConfigError;
use std::path::{Path, PathBuf};

/// Get the default configuration directory
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("hpc-notebook")
}

/// Get the default configuration file path
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.toml")
}

/// Load configuration from a file
pub fn load_config<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Invalid(format!("Failed to read config: {}", e)))?;

    let config: T = toml::from_str(&content)?;
    Ok(config)
}

/// Save configuration to a file
pub fn save_config<T: serde::Serialize>(path: &Path, config: &T) -> Result<(), ConfigError> {
    let content = toml::to_string_pretty(config)?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| ConfigError::Invalid(format!("Failed to create config dir: {}", e)))?;
    }

    std::fs::write(path, content)
        .map_err(|e| ConfigError::Invalid(format!("Failed to write config: {}", e)))?;

    Ok(())
}

/// Load session settings from `path`, or from the default location.
///
/// An explicit path must exist. The default file is optional and falls
/// back to `SessionSettings::default()` when absent. Loaded settings are
/// validated before they are returned.
pub fn load_settings(path: Option<&Path>) -> Result<SessionSettings, ConfigError> {
    let settings: SessionSettings = match path {
        Some(path) => load_config(path)?,
        None => {
            let default_path = default_config_path();
            if default_path.exists() {
                load_config(&default_path)?
            } else {
                tracing::debug!("No config file at {:?}, using defaults", default_path);
                SessionSettings::default()
            }
        }
    };
    settings.validate()?;
    Ok(settings)
}
