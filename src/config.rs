//! Configuration using Figment
//!
//! Settings are layered, lowest precedence first:
//! 1. Built-in defaults (the six tags of the installation, 115200 baud, 25 fps)
//! 2. A TOML file (`config/default.toml` unless `--config` names another)
//! 3. Environment variables prefixed with `SENSOR_PLAYBACK_`, using `__` to
//!    reach nested keys
//!
//! ```text
//! SENSOR_PLAYBACK_APPLICATION__LOG_LEVEL=debug
//! SENSOR_PLAYBACK_SERIAL__BAUD_RATE=9600
//! SENSOR_PLAYBACK_MAPPING__POLICY=keep_previous
//! ```
//!
//! # Example file
//!
//! ```toml
//! tags = ["0x00 0x00 0x00 0x00", "0xB4 0xE2 0xE7 0x53"]
//!
//! [serial]
//! baud_rate = 115200
//! read_timeout_ms = 6
//!
//! [video]
//! directory = "videos"
//! fps = 25
//!
//! [mapping]
//! policy = "strict"
//! generate = true
//!
//! [[mapping.entries]]
//! rfid = 1
//! photos = [true, false, false]
//! video = "special.mp4"
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::playback::{FallbackPolicy, PlaybackMapping};
use crate::sensor::{SensorState, TagTable};

/// Default configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Prefix of environment variable overrides.
pub const ENV_PREFIX: &str = "SENSOR_PLAYBACK_";

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A source could not be read or parsed.
    #[error("Configuration load error: {0}")]
    Load(#[from] figment::Error),
    /// An explicitly named file does not exist.
    #[error("Configuration file not found: {}", .0.display())]
    Missing(PathBuf),
    /// Values parsed but are not usable.
    #[error("Configuration validation error: {0}")]
    Validation(String),
    /// Settings could not be written as TOML.
    #[error("Configuration serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Top-level settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Known tag UIDs. Entry 0 is the no-tag sentinel; a tag's id is its index.
    pub tags: Vec<String>,
    /// Application name and logging.
    pub application: ApplicationSettings,
    /// Serial link.
    pub serial: SerialSettings,
    /// Video directory, rate and decoder executables.
    pub video: VideoSettings,
    /// Window title and mode.
    pub window: WindowSettings,
    /// State-to-video mapping.
    pub mapping: MappingSettings,
}

/// Application-level settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationSettings {
    /// Name shown in the startup log.
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
}

/// Serial link settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialSettings {
    /// Preferred device (e.g. "/dev/ttyACM0"). Any available port is used
    /// when unset or absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
    /// Line speed.
    pub baud_rate: u32,
    /// Read timeout in milliseconds. Kept short so a half-sent line never
    /// stalls the frame loop.
    pub read_timeout_ms: u64,
}

/// Video settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoSettings {
    /// Directory video identifiers are resolved against
    pub directory: PathBuf,
    /// Update rate of the control loop, also the playback rate of every video
    pub fps: u32,
    /// Blank frame size used before any video was opened
    pub blank_width: u32,
    /// Blank frame height.
    pub blank_height: u32,
    /// ffmpeg executable, looked up on `PATH` when relative.
    pub ffmpeg: PathBuf,
    /// ffprobe executable.
    pub ffprobe: PathBuf,
}

/// Window settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowSettings {
    /// Window title.
    pub title: String,
    /// Start fullscreen.
    pub fullscreen: bool,
}

/// State-to-video mapping settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingSettings {
    /// Behaviour when a state has no mapping entry
    pub policy: FallbackPolicy,
    /// Generate `video_{rfid}{p1}{p2}{p3}.mp4` for every state
    pub generate: bool,
    /// Explicit entries, applied over the generated ones
    pub entries: Vec<MappingEntry>,
}

/// One explicit mapping row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingEntry {
    /// Tag index, 0 for no tag
    pub rfid: usize,
    /// Covered flags of photoresistors 1-3
    #[serde(default)]
    pub photos: [bool; 3],
    /// Video identifier, relative to the video directory.
    pub video: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tags: [
                "0x00 0x00 0x00 0x00",
                "0xB4 0xE2 0xE7 0x53",
                "0xA4 0xE1 0xE7 0x53",
                "0xC4 0xE2 0xE7 0x53",
                "0x24 0xDD 0xE7 0x53",
                "0x44 0xDE 0xE7 0x53",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            application: ApplicationSettings::default(),
            serial: SerialSettings::default(),
            video: VideoSettings::default(),
            window: WindowSettings::default(),
            mapping: MappingSettings::default(),
        }
    }
}

impl Default for ApplicationSettings {
    fn default() -> Self {
        Self {
            name: "sensor-playback".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: 115_200,
            // ~80 characters at 115200 baud
            read_timeout_ms: 6,
        }
    }
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("videos"),
            fps: 25,
            blank_width: 640,
            blank_height: 480,
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
        }
    }
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            title: "window".to_string(),
            fullscreen: false,
        }
    }
}

impl Default for MappingSettings {
    fn default() -> Self {
        Self {
            policy: FallbackPolicy::Strict,
            generate: true,
            entries: Vec::new(),
        }
    }
}

impl Settings {
    /// Load from [`DEFAULT_CONFIG_PATH`] if it exists, then the environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::extract(Self::figment(Path::new(DEFAULT_CONFIG_PATH)))
    }

    /// Load from a specific file, which must exist, then the environment.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ConfigError::Missing(path.to_path_buf()));
        }
        Self::extract(Self::figment(path))
    }

    fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        let settings: Self = figment.extract()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate settings after loading or after CLI overrides.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.as_str()) {
            return Err(ConfigError::Validation(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            )));
        }

        if self.tags.is_empty() {
            return Err(ConfigError::Validation(
                "'tags' must list at least the no-tag UID".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for uid in &self.tags {
            if !seen.insert(uid) {
                return Err(ConfigError::Validation(format!("Duplicate tag UID: '{}'", uid)));
            }
        }

        if self.serial.baud_rate == 0 {
            return Err(ConfigError::Validation("serial.baud_rate must be positive".to_string()));
        }
        if self.video.fps == 0 {
            return Err(ConfigError::Validation("video.fps must be positive".to_string()));
        }
        if self.video.blank_width == 0 || self.video.blank_height == 0 {
            return Err(ConfigError::Validation(
                "video.blank_width and video.blank_height must be positive".to_string(),
            ));
        }

        for entry in &self.mapping.entries {
            if entry.rfid >= self.tags.len() {
                return Err(ConfigError::Validation(format!(
                    "Mapping entry for '{}' references tag {} but only {} tags are known",
                    entry.video,
                    entry.rfid,
                    self.tags.len()
                )));
            }
            if entry.video.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "Mapping entry for tag {} has an empty video name",
                    entry.rfid
                )));
            }
        }
        Ok(())
    }

    /// Tag table built from `tags`.
    pub fn tag_table(&self) -> Result<TagTable, ConfigError> {
        TagTable::new(self.tags.clone())
            .ok_or_else(|| ConfigError::Validation("'tags' is empty".to_string()))
    }

    /// Playback mapping: generated entries (if enabled) overlaid with the
    /// explicit ones.
    pub fn playback_mapping(&self, tags: &TagTable) -> Result<PlaybackMapping, ConfigError> {
        let mut mapping = if self.mapping.generate {
            PlaybackMapping::generate(tags)
        } else {
            PlaybackMapping::new()
        };
        for entry in &self.mapping.entries {
            let rfid = tags.id(entry.rfid).ok_or_else(|| {
                ConfigError::Validation(format!("Unknown tag index {}", entry.rfid))
            })?;
            let [p1, p2, p3] = entry.photos;
            mapping.insert(SensorState::new(rfid, p1, p2, p3), entry.video.clone());
        }
        Ok(mapping)
    }

    /// Effective settings as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}
