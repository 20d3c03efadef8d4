//! Persisted viewer settings (`rendercmp.json`).
//!
//! Every field has a default, so partial or older files still load.
//! Unknown keys are ignored.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::core::Layout;
use crate::core::session::SessionConfig;
use crate::core::timeline::{SPEED_PRESETS, TimelineConfig};
use crate::entities::AlphaBase;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read settings {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write settings {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid settings {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Scrub throttle interval
    pub throttle_ms: u64,
    /// Pause after scrubbing before neighbours are preloaded
    pub preload_delay_ms: u64,
    /// Frames preloaded on each side of the current one
    pub preload_radius: i32,
    /// Playback rate at 1x
    pub playback_fps: f32,
    /// Index into the speed presets (0.25x .. 4x)
    pub speed_index: usize,
    /// Decode threads
    pub loader_threads: usize,
    /// Decoded images kept in memory
    pub cache_capacity: usize,
    /// Stuck-load timeout; `null` waits forever
    pub load_timeout_ms: Option<u64>,
    pub default_alpha_base: AlphaBase,
    /// Scores beyond this mark problem frames
    pub score_threshold: Option<f64>,
    pub score_higher_is_worse: bool,
    pub default_layout: Layout,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            throttle_ms: 16,
            preload_delay_ms: 300,
            preload_radius: 2,
            playback_fps: 24.0,
            speed_index: 2,
            loader_threads: 2,
            cache_capacity: 20,
            load_timeout_ms: Some(10_000),
            default_alpha_base: AlphaBase::Test,
            score_threshold: None,
            score_higher_is_worse: true,
            default_layout: Layout::SideBySide,
        }
    }
}

impl Settings {
    /// Load settings from `path`. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            info!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Settings = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(settings.sanitized())
    }

    /// Load settings, falling back to defaults on any error
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_else(|e| {
            warn!("{}, using defaults", e);
            Self::default()
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let json = self.to_json()?;
        std::fs::write(path, json).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Clamp values into usable ranges
    pub fn sanitized(mut self) -> Self {
        self.speed_index = self.speed_index.min(SPEED_PRESETS.len() - 1);
        self.preload_radius = self.preload_radius.max(0);
        self.loader_threads = self.loader_threads.max(1);
        if !(self.playback_fps > 0.0) {
            self.playback_fps = Self::default().playback_fps;
        }
        self
    }

    /// Engine configuration derived from these settings
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            timeline: TimelineConfig {
                throttle_ms: self.throttle_ms,
                preload_delay_ms: self.preload_delay_ms,
                base_fps: self.playback_fps,
                speed_index: self.speed_index,
            },
            preload_radius: self.preload_radius,
            load_timeout: self.load_timeout_ms.map(Duration::from_millis),
            alpha_base: self.default_alpha_base,
            layout: self.default_layout,
            score_threshold: self.score_threshold,
            score_higher_is_worse: self.score_higher_is_worse,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let settings = Settings::load(&tmp.path().join("rendercmp.json")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("rendercmp.json");
        std::fs::write(&path, r#"{ "preload_radius": 5, "load_timeout_ms": null, "default_layout": "AlphaOnly" }"#)
            .unwrap();
        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.preload_radius, 5);
        assert_eq!(settings.load_timeout_ms, None);
        assert_eq!(settings.default_layout, Layout::AlphaOnly);
        assert_eq!(settings.throttle_ms, 16);
    }

    #[test]
    fn test_save_load_and_session_config() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("rendercmp.json");
        let settings = Settings {
            speed_index: 4,
            score_threshold: Some(0.25),
            ..Default::default()
        };
        settings.save(&path).unwrap();
        let loaded = Settings::load(&path).unwrap();
        assert_eq!(loaded, settings);

        let config = loaded.session_config();
        assert_eq!(config.timeline.speed_index, 4);
        assert_eq!(config.load_timeout, Some(Duration::from_secs(10)));
        assert_eq!(config.score_threshold, Some(0.25));
    }

    #[test]
    fn test_invalid_json_is_parse_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("rendercmp.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(Settings::load(&path), Err(ConfigError::Parse { .. })));
        assert_eq!(Settings::load_or_default(&path), Settings::default());
    }

    #[test]
    fn test_sanitized_clamps() {
        let settings = Settings {
            speed_index: 9,
            preload_radius: -3,
            loader_threads: 0,
            playback_fps: 0.0,
            ..Default::default()
        }
        .sanitized();
        assert_eq!(settings.speed_index, 4);
        assert_eq!(settings.preload_radius, 0);
        assert_eq!(settings.loader_threads, 1);
        assert_eq!(settings.playback_fps, 24.0);
    }
}
