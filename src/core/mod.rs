//! Core engine modules - resolver, buffers, loaders, timeline, workers
//!
//! These modules form the comparison engine, independent of UI.

pub mod buffer;
pub mod coordinator;
pub mod debounced_preloader;
pub mod error_sink;
pub mod fetch;
pub mod frame_cache;
pub mod guard;
pub mod loaders;
pub mod resolver;
pub mod session;
pub mod throttle;
pub mod timeline;
pub mod workers;

// Re-exports for convenience
pub use buffer::{BufferPair, BufferSlot, LoadState, ResourceRole};
pub use coordinator::{Coordinator, Layout};
pub use debounced_preloader::DebouncedPreloader;
pub use error_sink::{ChannelSink, ErrorKind, ErrorSink, LoadReport, LogSink};
pub use fetch::{DiskFetcher, ImageFetcher, LoadCompletion, LoadTicket};
pub use frame_cache::FrameCache;
pub use guard::FrameGuard;
pub use loaders::{FrameLoader, VariantLoader};
pub use resolver::{ImageLocator, resolve};
pub use session::{PumpStats, Session, SessionConfig};
pub use throttle::Throttle;
pub use timeline::{PlaybackState, TimelineController, TimelineSignal};
pub use workers::Workers;
