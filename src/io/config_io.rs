use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::model::config::KbConfig;

/// Name of the optional config file in the project root
pub const CONFIG_FILE: &str = "kb.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse kb.toml: {0}")]
    ParseError(#[from] toml::de::Error),
}

/// Read `kb.toml` from the project root. A missing file yields defaults.
pub fn read_config(root: &Path) -> Result<KbConfig, ConfigError> {
    let path = root.join(CONFIG_FILE);
    let text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(KbConfig::default()),
        Err(e) => return Err(ConfigError::ReadError { path, source: e }),
    };
    Ok(toml::from_str(&text)?)
}
