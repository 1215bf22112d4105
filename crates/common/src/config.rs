//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory where exported files are delivered.
    pub downloads_dir: PathBuf,

    /// Export engine defaults.
    #[serde(default)]
    pub export: ExportSettings,

    /// Playback clock defaults.
    #[serde(default)]
    pub playback: PlaybackSettings,

    /// Recording capture defaults.
    #[serde(default)]
    pub capture: CaptureSettings,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Parameters used by the export engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    /// Output height cap in pixels. Sources taller than this are scaled down.
    pub max_output_height: u32,

    /// Target encoder bitrate in bits per second.
    pub bitrate_bps: u64,

    /// Nominal encoder frame rate.
    pub framerate: u32,

    /// Fill used when no background can be resolved (hex colour).
    pub fallback_fill: String,

    /// Upper bound on background image preload, in milliseconds.
    pub image_timeout_ms: u64,

    /// File name used when the caller does not supply a title.
    pub default_file_name: String,
}

/// Parameters used by the playback clock.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackSettings {
    /// Display refresh rate driving playback position updates and
    /// real-time exports (Hz).
    pub refresh_hz: u32,

    /// Default skip distance for skip forward/backward, in seconds.
    pub skip_secs: f64,
}

/// Parameters used by the recording capture.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    /// Interval between data-available chunks, in milliseconds.
    pub timeslice_ms: u64,

    /// Recorder container/codec MIME type.
    pub mime_type: String,

    /// Capture frame rate.
    pub fps: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "snapreel=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            downloads_dir: default_downloads_dir(),
            export: ExportSettings::default(),
            playback: PlaybackSettings::default(),
            capture: CaptureSettings::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            max_output_height: 720,
            bitrate_bps: 5_000_000,
            framerate: 30,
            fallback_fill: "#ff0000".to_string(),
            image_timeout_ms: 5_000,
            default_file_name: "edited-recording".to_string(),
        }
    }
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            refresh_hz: 60,
            skip_secs: 5.0,
        }
    }
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            timeslice_ms: 100,
            mime_type: "video/webm;codecs=vp9".to_string(),
            fps: 30,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }
}

/// Standard config file location.
fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"));
    base.join("snapreel").join("config.json")
}

/// Default delivery directory for exported files.
fn default_downloads_dir() -> PathBuf {
    std::env::var("XDG_DOWNLOAD_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join("Downloads"))
}

fn home_dir() -> PathBuf {
    PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_defaults() {
        let settings = ExportSettings::default();
        assert_eq!(settings.max_output_height, 720);
        assert_eq!(settings.framerate, 30);
        assert_eq!(settings.fallback_fill, "#ff0000");
    }

    #[test]
    fn test_partial_config_fills_missing_sections() {
        let json = r#"{ "downloads_dir": "/srv/out", "export": { "max_output_height": 480 } }"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.downloads_dir, PathBuf::from("/srv/out"));
        assert_eq!(config.export.max_output_height, 480);
        assert_eq!(config.export.bitrate_bps, 5_000_000);
        assert_eq!(config.capture.timeslice_ms, 100);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.playback.refresh_hz, 60);
    }
}
