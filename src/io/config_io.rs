use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::model::config::AppConfig;

/// Name of the configuration file looked up in the working directory
pub const CONFIG_FILE_NAME: &str = "goalkeeper.toml";

/// Error type for reading goalkeeper.toml
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    ReadError { path: PathBuf, source: io::Error },
    #[error("could not parse goalkeeper.toml: {0}")]
    ParseError(#[from] toml::de::Error),
}

/// Read `goalkeeper.toml` from `dir`. A missing file yields the defaults.
pub fn read_config(dir: &Path) -> Result<AppConfig, ConfigError> {
    let config_path = dir.join(CONFIG_FILE_NAME);
    let config_text = match fs::read_to_string(&config_path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(AppConfig::default()),
        Err(e) => {
            return Err(ConfigError::ReadError {
                path: config_path,
                source: e,
            });
        }
    };
    let config: AppConfig = toml::from_str(&config_text)?;
    Ok(config)
}
