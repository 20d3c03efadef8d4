//! Event descriptor: one test case of the comparison run.
//!
//! An event names a frame range, the four per-variant base paths and the
//! per-frame comparison score series. Base paths are opaque prefixes: the
//! file for frame N is `<base><NNNN>.<ext>` (see `core::resolver`).
//!
//! # JSON layout
//!
//! ```json
//! {
//!   "name": "stadium_cam03",
//!   "start_frame": 1,
//!   "end_frame": 240,
//!   "paths": {
//!     "original": "/results/stadium/orig/",
//!     "test": "/results/stadium/test/",
//!     "difference": "/results/stadium/diff/",
//!     "alpha": "/results/stadium/alpha/"
//!   },
//!   "min_val": 0.91,
//!   "max_val": 0.99,
//!   "scores": [{ "frame": 1, "value": 0.98 }]
//! }
//! ```

use log::info;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::variant::VariantKind;

#[derive(Debug, Error)]
pub enum EventError {
    #[error("failed to read event file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse event file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid frame range {start}..{end}")]
    InvalidRange { start: i32, end: i32 },
}

/// Per-variant base paths (opaque, unvalidated)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VariantPaths {
    pub original: String,
    pub test: String,
    pub difference: String,
    pub alpha: String,
}

impl VariantPaths {
    pub fn get(&self, kind: VariantKind) -> &str {
        match kind {
            VariantKind::Original => &self.original,
            VariantKind::Test => &self.test,
            VariantKind::Difference => &self.difference,
            VariantKind::Alpha => &self.alpha,
        }
    }
}

/// One point of the per-frame score series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScorePoint {
    pub frame: i32,
    pub value: f64,
}

/// Everything needed to open an event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventInfo {
    #[serde(default)]
    pub name: String,
    pub start_frame: i32,
    pub end_frame: i32,
    #[serde(default)]
    pub paths: VariantPaths,
    #[serde(default)]
    pub min_val: Option<f64>,
    #[serde(default)]
    pub max_val: Option<f64>,
    #[serde(default)]
    pub scores: Vec<ScorePoint>,
}

impl EventInfo {
    /// Minimal event with a frame range and base paths
    pub fn new(name: impl Into<String>, start_frame: i32, end_frame: i32, paths: VariantPaths) -> Self {
        Self {
            name: name.into(),
            start_frame,
            end_frame,
            paths,
            min_val: None,
            max_val: None,
            scores: Vec::new(),
        }
    }

    /// Parse and validate a JSON descriptor
    pub fn from_json(text: &str, origin: &Path) -> Result<Self, EventError> {
        let event: EventInfo = serde_json::from_str(text).map_err(|e| EventError::Parse {
            path: origin.to_path_buf(),
            source: e,
        })?;
        event.validate()?;
        Ok(event)
    }

    /// Load a JSON descriptor from disk
    pub fn load(path: &Path) -> Result<Self, EventError> {
        let text = std::fs::read_to_string(path).map_err(|e| EventError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let event = Self::from_json(&text, path)?;
        info!(
            "Loaded event '{}' frames {}..={} ({} scores)",
            event.name,
            event.start_frame,
            event.end_frame,
            event.scores.len()
        );
        Ok(event)
    }

    pub fn validate(&self) -> Result<(), EventError> {
        if self.end_frame < self.start_frame {
            return Err(EventError::InvalidRange {
                start: self.start_frame,
                end: self.end_frame,
            });
        }
        Ok(())
    }

    /// Number of frames in the event (inclusive range)
    pub fn frame_count(&self) -> i32 {
        self.end_frame - self.start_frame + 1
    }

    /// Clamp a requested frame into [start_frame, end_frame]
    pub fn clamp_frame(&self, frame: i32) -> i32 {
        frame.clamp(self.start_frame, self.end_frame)
    }
}
