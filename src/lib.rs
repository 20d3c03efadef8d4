//! rendercmp - frame-by-frame render comparison library
//!
//! Re-exports all modules for use by the binary and integration tests.

// Core engine (buffers, loaders, coordinator, timeline, workers)
pub mod core;

// Data types
pub mod entities;

// App modules
pub mod cli;
pub mod config;
pub mod paths;
pub mod timeslider;
pub mod ui;

// Re-export commonly used types from core
pub use crate::core::coordinator::Layout;
pub use crate::core::error_sink::{ErrorKind, LoadReport};
pub use crate::core::session::{Session, SessionConfig};
pub use crate::core::timeline::{PlaybackState, TimelineController};

// Re-export entities
pub use crate::entities::{AlphaBase, EventInfo, Frame, ScoreChart, VariantKind};
