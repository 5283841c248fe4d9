use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use crate::config::RuntimeConfig;

/// Finds and loads the engine configuration.
///
/// Lookup order:
/// 1. an explicit path given by the caller,
/// 2. `$WSRT_CONFIG`,
/// 3. `~/.wsrt/config.yaml`.
///
/// A missing file at 2 or 3 is not an error; defaults are used. Environment
/// overrides are applied last in every case.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    explicit: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            explicit: Some(path.into()),
        }
    }

    pub fn load(&self) -> Result<RuntimeConfig> {
        let mut config = match self.locate() {
            Some(path) if path.exists() => {
                debug!("Loading engine config from: {}", path.display());
                Self::load_file(&path)?
            }
            Some(path) if self.explicit.is_some() => {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            _ => {
                debug!("No engine config found, using defaults");
                RuntimeConfig::default()
            }
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn locate(&self) -> Option<PathBuf> {
        if let Some(path) = &self.explicit {
            return Some(path.clone());
        }
        if let Ok(path) = std::env::var("WSRT_CONFIG") {
            if !path.is_empty() {
                return Some(PathBuf::from(path));
            }
        }
        dirs::home_dir().map(|home| home.join(".wsrt").join("config.yaml"))
    }

    pub fn load_file(path: &Path) -> Result<RuntimeConfig> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        serde_yaml_ng::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }
}
