//! Configuration structs with sensible defaults and RON persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// File name of the persisted configuration inside the config directory.
const CONFIG_FILE: &str = "config.ron";

/// Top-level Plaza configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Realm template settings.
    pub world: WorldConfig,
    /// Player and presence settings.
    pub presence: PresenceConfig,
    /// Proximity audio/video settings.
    pub proximity: ProximityConfig,
    /// Network settings.
    pub network: NetworkConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Realm template configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorldConfig {
    /// Path to a realm template JSON document. `None` uses the built-in
    /// starter realm.
    pub template_path: Option<PathBuf>,
}

/// Player state machine and presence bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PresenceConfig {
    /// Remote players silent for longer than this are evicted (seconds).
    pub liveness_timeout_secs: u32,
    /// How long a departed uid is remembered so late moves don't resurrect it
    /// (seconds).
    pub tombstone_secs: u32,
    /// Number of frames in a walk cycle.
    pub walk_frame_count: u8,
    /// Walking speed in cells per second.
    pub walk_speed_cells: f32,
    /// Animation frames advanced per second while walking.
    pub animation_fps: f32,
}

/// Proximity audio/video configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProximityConfig {
    /// Players within this Euclidean cell distance share a media session.
    pub threshold_cells: f32,
    /// Extra attempts after a rejected media join/leave.
    pub media_retries: u32,
}

/// Network configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NetworkConfig {
    /// Maximum local move messages sent per second.
    pub move_send_rate_hz: u32,
    /// An idle local player re-sends its last update this often (seconds).
    /// Clamped below the liveness timeout.
    pub keepalive_secs: u32,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
}

// --- Default implementations ---

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            liveness_timeout_secs: 30,
            tombstone_secs: 30,
            walk_frame_count: 4,
            walk_speed_cells: 4.0,
            animation_fps: 8.0,
        }
    }
}

impl Default for ProximityConfig {
    fn default() -> Self {
        Self {
            threshold_cells: 3.0,
            media_retries: 1,
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            move_send_rate_hz: 10,
            keepalive_secs: 10,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Platform config directory for Plaza (e.g. `~/.config/plaza`), falling back
/// to the working directory when the platform has none.
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("plaza"))
        .unwrap_or_else(|| PathBuf::from("."))
}

// --- Load / Save / Reload ---

impl Config {
    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE);

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
            let config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;

        let config_path = config_dir.join(CONFIG_FILE);
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(&config_path, serialized).map_err(ConfigError::WriteError)?;
        Ok(())
    }

    /// Hot-reload: returns `Some(new_config)` if the file changed, `None` otherwise.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE);
        let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
        let new_config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;

        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }
}
