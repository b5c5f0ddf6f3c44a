use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::viewer::{
    EngineConfig, FitPolicy, GestureConfig, LoadPolicy, DEFAULT_CACHE_SIZE, MAX_ATTEMPTS,
};

pub const CURRENT_VERSION: u32 = 1;
const SETTINGS_FILENAME: &str = "config.yaml";
const APP_NAME: &str = "docpane";

fn default_version() -> u32 {
    CURRENT_VERSION
}

fn default_load_timeout_secs() -> u64 {
    20
}

fn default_max_attempts() -> u32 {
    MAX_ATTEMPTS
}

fn default_cache_capacity() -> usize {
    DEFAULT_CACHE_SIZE
}

/// Persistent viewer settings, loaded from the user's config directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_version")]
    pub version: u32,

    /// Default fit policy for new viewers
    #[serde(default)]
    pub fit: FitPolicy,

    /// Budget for one fetch+decode attempt, in seconds
    #[serde(default = "default_load_timeout_secs")]
    pub load_timeout_secs: u64,

    /// Total load attempts per URL, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Painted-surface cache capacity, in pages
    #[serde(default = "default_cache_capacity")]
    pub surface_cache_capacity: usize,

    #[serde(default)]
    pub gesture: GestureConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            fit: FitPolicy::default(),
            load_timeout_secs: default_load_timeout_secs(),
            max_attempts: default_max_attempts(),
            surface_cache_capacity: default_cache_capacity(),
            gesture: GestureConfig::default(),
        }
    }
}

impl Settings {
    /// Load from disk, falling back to defaults on any problem
    #[must_use]
    pub fn load_or_default() -> Self {
        match Self::load() {
            Ok(Some(settings)) => settings,
            Ok(None) => Self::default(),
            Err(e) => {
                warn!("Failed to load settings, using defaults: {e}");
                Self::default()
            }
        }
    }

    /// Load from the user config directory; `None` when no file exists yet
    pub fn load() -> anyhow::Result<Option<Self>> {
        let Some(path) = Self::settings_path() else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&path)?;
        Ok(Some(serde_yaml::from_str(&contents)?))
    }

    /// Write back to the user config directory
    pub fn save(&self) -> anyhow::Result<()> {
        let Some(path) = Self::settings_path() else {
            anyhow::bail!("no config directory available");
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, serde_yaml::to_string(self)?)?;
        Ok(())
    }

    #[must_use]
    pub fn settings_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_NAME).join(SETTINGS_FILENAME))
    }

    #[must_use]
    pub fn load_timeout(&self) -> Duration {
        Duration::from_secs(self.load_timeout_secs)
    }

    /// Engine configuration derived from these settings
    #[must_use]
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            load: LoadPolicy {
                max_attempts: self.max_attempts.max(1),
                timeout: self.load_timeout(),
            },
            gesture: self.gesture,
            cache_capacity: self.surface_cache_capacity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_round_trip_through_yaml() {
        let settings = Settings::default();
        let yaml = serde_yaml::to_string(&settings).unwrap();
        let back: Settings = serde_yaml::from_str(&yaml).unwrap();

        assert_eq!(back.version, CURRENT_VERSION);
        assert_eq!(back.max_attempts, settings.max_attempts);
        assert_eq!(back.gesture, settings.gesture);
    }

    #[test]
    fn partial_files_fill_in_defaults() {
        let settings: Settings = serde_yaml::from_str("load_timeout_secs: 5\n").unwrap();

        assert_eq!(settings.load_timeout_secs, 5);
        assert_eq!(settings.max_attempts, MAX_ATTEMPTS);
        assert_eq!(settings.fit, FitPolicy::Width);
        assert_eq!(settings.gesture.double_tap_window_ms, 300);
    }

    #[test]
    fn engine_config_reflects_settings() {
        let settings = Settings {
            load_timeout_secs: 7,
            max_attempts: 2,
            ..Settings::default()
        };
        let config = settings.engine_config();

        assert_eq!(config.load.timeout, Duration::from_secs(7));
        assert_eq!(config.load.max_attempts, 2);
    }
}
