//! Config store for loading depgate.toml.

use std::path::{Path, PathBuf};

use super::{EngineConfig, parser};

pub const CONFIG_FILE_NAME: &str = "depgate.toml";

#[derive(Debug, Clone)]
pub struct ConfigStore {
    config_path: PathBuf,
}

impl ConfigStore {
    /// Store rooted at the user's config directory.
    pub fn from_default_location() -> crate::Result<Self> {
        let dir = dirs::config_dir()
            .ok_or_else(|| crate::Error::Config("Could not determine config directory".into()))?
            .join("depgate");
        Ok(Self::from_dir(&dir))
    }

    pub fn from_dir(dir: &Path) -> Self {
        Self::from_path(dir.join(CONFIG_FILE_NAME))
    }

    pub fn from_path(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Load the configuration; a missing file yields defaults.
    pub fn load(&self) -> crate::Result<EngineConfig> {
        if !self.config_path.exists() {
            tracing::debug!(path = %self.config_path.display(), "no config file, using defaults");
            return Ok(EngineConfig::new());
        }
        parser::parse_config(&self.config_path)
    }
}
