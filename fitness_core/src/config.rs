//! Configuration file support for fittrack.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/fittrack/config.toml`.

use crate::{Error, Intensity, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub calories: CalorieConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Account whose log and achievements are used
    #[serde(default = "default_user")]
    pub user: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            user: default_user(),
        }
    }
}

/// When rest periods are taken during a session
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RestPolicy {
    /// Rest after every set that leaves more work to do
    #[default]
    AfterEverySet,
    /// Rest only once an exercise is finished and another one remains
    BetweenExercises,
}

/// Session behaviour configuration
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SessionConfig {
    /// Rest used when an exercise does not specify one
    #[serde(default = "default_rest_seconds")]
    pub default_rest_seconds: i32,

    #[serde(default)]
    pub rest_policy: RestPolicy,

    /// Advance session timers by real time between commands
    #[serde(default = "default_track_wall_clock")]
    pub track_wall_clock: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_rest_seconds: default_rest_seconds(),
            rest_policy: RestPolicy::default(),
            track_wall_clock: default_track_wall_clock(),
        }
    }
}

/// Calorie estimation rates (kcal per minute) by intensity
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CalorieConfig {
    #[serde(default = "default_low_per_minute")]
    pub low_per_minute: f64,

    #[serde(default = "default_moderate_per_minute")]
    pub moderate_per_minute: f64,

    #[serde(default = "default_high_per_minute")]
    pub high_per_minute: f64,
}

impl Default for CalorieConfig {
    fn default() -> Self {
        Self {
            low_per_minute: default_low_per_minute(),
            moderate_per_minute: default_moderate_per_minute(),
            high_per_minute: default_high_per_minute(),
        }
    }
}

impl CalorieConfig {
    pub fn rate_for(&self, intensity: Intensity) -> f64 {
        match intensity {
            Intensity::Low => self.low_per_minute,
            Intensity::Moderate => self.moderate_per_minute,
            Intensity::High => self.high_per_minute,
        }
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| {
        std::env::var_os("HOME")
            .map(|home| PathBuf::from(home).join(".local/share"))
            .unwrap_or_else(|| PathBuf::from("."))
    });
    base.join("fittrack")
}

fn default_user() -> String {
    "local".into()
}

fn default_rest_seconds() -> i32 {
    60
}

fn default_track_wall_clock() -> bool {
    true
}

fn default_low_per_minute() -> f64 {
    5.0
}

fn default_moderate_per_minute() -> f64 {
    8.0
}

fn default_high_per_minute() -> f64 {
    11.0
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!(
                "No config file found at {:?}, using defaults",
                config_path
            );
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| {
            std::env::var_os("HOME")
                .map(|home| PathBuf::from(home).join(".config"))
                .unwrap_or_else(|| PathBuf::from("."))
        });
        base.join("fittrack").join("config.toml")
    }

    /// Reject values that would break calorie estimates or the user layout
    pub fn validate(&self) -> Result<()> {
        if self.data.user.trim().is_empty() {
            return Err(Error::Config("data.user must not be empty".into()));
        }
        let rates = [
            self.calories.low_per_minute,
            self.calories.moderate_per_minute,
            self.calories.high_per_minute,
        ];
        if rates.iter().any(|r| !r.is_finite() || *r < 0.0) {
            return Err(Error::Config(
                "calorie rates must be finite and non-negative".into(),
            ));
        }
        Ok(())
    }

    /// Save the current configuration to the default path
    pub fn save(&self) -> Result<()> {
        let config_path = Self::default_config_path();
        self.save_to(&config_path)
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }
}
