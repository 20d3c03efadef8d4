//! Error sink injected into every window loader at construction.
//!
//! Loaders never look up a parent to report problems; they call
//! `ErrorSink::report()` on the sink they were given. Only user-visible
//! kinds reach the UI message list, the rest are logged.

use crossbeam_channel::{Receiver, Sender};
use log::{debug, warn};
use std::fmt;

use crate::entities::VariantKind;

/// Failure taxonomy of the loading core.
///
/// Stale completions and out-of-range frame requests are not errors and
/// never reach a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Required image file missing for a requested frame
    ResourceNotFound,
    /// File present but could not be decoded
    DecodeFailed,
    /// Load stayed in flight longer than the configured timeout
    LoadTimeout,
    /// Window has no usable locator yet (empty base path); retried on next request
    UnresolvedComponent,
}

impl ErrorKind {
    pub fn is_user_visible(self) -> bool {
        !matches!(self, ErrorKind::UnresolvedComponent)
    }
}

/// One reported load problem
#[derive(Debug, Clone, PartialEq)]
pub struct LoadReport {
    pub kind: ErrorKind,
    /// Window the failed resource belongs to
    pub window: VariantKind,
    pub frame: i32,
    pub path: String,
    pub message: String,
}

impl fmt::Display for LoadReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ErrorKind::ResourceNotFound => write!(
                f,
                "{}: frame {} not found: {}",
                self.window, self.frame, self.path
            ),
            ErrorKind::DecodeFailed => write!(
                f,
                "{}: frame {} could not be decoded ({}): {}",
                self.window, self.frame, self.message, self.path
            ),
            ErrorKind::LoadTimeout => write!(
                f,
                "{}: frame {} timed out loading: {}",
                self.window, self.frame, self.path
            ),
            ErrorKind::UnresolvedComponent => write!(
                f,
                "{}: frame {} has no source path ({})",
                self.window, self.frame, self.message
            ),
        }
    }
}

/// Destination for load problems
pub trait ErrorSink: Send + Sync {
    fn report(&self, report: LoadReport);
}

/// Log-only sink (headless use)
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl ErrorSink for LogSink {
    fn report(&self, report: LoadReport) {
        if report.kind.is_user_visible() {
            warn!("{}", report);
        } else {
            debug!("{}", report);
        }
    }
}

/// Forwards user-visible reports over a channel (drained by the UI)
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: Sender<LoadReport>,
}

impl ChannelSink {
    /// Create sink and the receiving end
    pub fn channel() -> (Self, Receiver<LoadReport>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Self { tx }, rx)
    }
}

impl ErrorSink for ChannelSink {
    fn report(&self, report: LoadReport) {
        LogSink.report(report.clone());
        if report.kind.is_user_visible() {
            // Receiver gone means the UI is shutting down
            let _ = self.tx.send(report);
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Collects every report (tests only)
    #[derive(Debug, Default)]
    pub struct CollectingSink {
        pub reports: Mutex<Vec<LoadReport>>,
    }

    impl CollectingSink {
        pub fn take(&self) -> Vec<LoadReport> {
            std::mem::take(&mut *self.reports.lock().unwrap())
        }
    }

    impl ErrorSink for CollectingSink {
        fn report(&self, report: LoadReport) {
            self.reports.lock().unwrap().push(report);
        }
    }
}
