//! The persisted `config.json`: just the download folder.
use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::ConfigError;

pub const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub download_path: PathBuf,
}

/// Reads and writes [`Config`] at a fixed path.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
    default_dir: PathBuf,
}

impl ConfigStore {
    pub fn new(path: PathBuf, default_dir: PathBuf) -> Self {
        Self { path, default_dir }
    }

    /// `config.json` and `downloads/` in the working directory.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(CONFIG_FILE), dir.join("downloads"))
    }

    /// Loads the config, falling back to the default folder when the file is
    /// missing, unreadable, or names a folder that no longer exists.
    pub fn load(&self) -> Config {
        match self.read() {
            Ok(config) if config.download_path.is_dir() => {
                info!(path = %config.download_path.display(), "loaded download folder");
                return config;
            }
            Ok(config) => warn!(
                path = %config.download_path.display(),
                "configured download folder is missing, using default"
            ),
            Err(ConfigError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(error = %e, file = %self.path.display(), "ignoring unreadable config"),
        }

        if let Err(e) = fs::create_dir_all(&self.default_dir) {
            warn!(error = %e, path = %self.default_dir.display(), "could not create default folder");
        }
        Config {
            download_path: self.default_dir.clone(),
        }
    }

    fn read(&self) -> Result<Config, ConfigError> {
        let text = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn save(&self, config: &Config) -> Result<(), ConfigError> {
        let text = serde_json::to_string(config)?;
        fs::write(&self.path, text)?;
        info!(file = %self.path.display(), "saved config");
        Ok(())
    }
}
