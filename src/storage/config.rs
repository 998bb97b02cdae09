use super::{read_json, write_json};
use crate::playback::PlaybackConfig;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const CONFIG_FILE: &str = "config.json";

/// Persisted playback config
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    /// Store backed by `config.json` inside `dir`
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(CONFIG_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored config, or the defaults when nothing was saved yet
    ///
    /// A stored config that no longer validates is replaced by the defaults.
    pub fn load(&self) -> Result<PlaybackConfig> {
        let Some(config) = read_json::<PlaybackConfig>(&self.path)? else {
            debug!(path = %self.path.display(), "No stored config, using defaults");
            return Ok(PlaybackConfig::default());
        };

        if let Err(e) = config.validate() {
            warn!(path = %self.path.display(), "Ignoring stored config: {}", e);
            return Ok(PlaybackConfig::default());
        }
        Ok(config)
    }

    pub fn save(&self, config: &PlaybackConfig) -> Result<()> {
        config.validate().context("Refusing to store an invalid config")?;
        write_json(&self.path, config)?;
        debug!(path = %self.path.display(), "Config saved");
        Ok(())
    }
}
