//! Filesystem change notifications.
//!
//! A [`Watcher`] turns registered paths into three streams: notifications,
//! errors and a one-shot closed signal. The pipeline only depends on
//! [`WatchStreams`], so any source of "this path changed" signals can drive
//! it.

pub mod backend;
pub mod native;
pub mod poll;

use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

pub use backend::{operation_for, NotifyWatcher};
pub use native::NativeWatcher;
pub use poll::PollWatcher;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Write,
    Create,
    Remove,
    Rename,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub path: PathBuf,
    pub operation: Operation,
}

impl Notification {
    pub fn new(path: impl Into<PathBuf>, operation: Operation) -> Self {
        Self {
            path: path.into(),
            operation,
        }
    }

    pub fn write(path: impl Into<PathBuf>) -> Self {
        Self::new(path, Operation::Write)
    }
}

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("failed to watch '{path}': {source}")]
    Register {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("notify error: {0}")]
    Native(#[from] notify::Error),

    #[error("watcher already started")]
    AlreadyStarted,
}

/// Receiving side of a watcher.
pub struct WatchStreams {
    pub notifications: mpsc::UnboundedReceiver<Notification>,
    pub errors: mpsc::UnboundedReceiver<WatchError>,
    pub closed: oneshot::Receiver<()>,
}

/// Sending side of a watcher. Dropping it without calling
/// [`WatchSenders::close`] also resolves the closed signal.
#[derive(Debug)]
pub struct WatchSenders {
    notifications: mpsc::UnboundedSender<Notification>,
    errors: mpsc::UnboundedSender<WatchError>,
    closed: Option<oneshot::Sender<()>>,
}

impl WatchSenders {
    /// Returns false once the receiving side is gone.
    pub fn notify(&self, notification: Notification) -> bool {
        self.notifications.send(notification).is_ok()
    }

    pub fn error(&self, error: WatchError) -> bool {
        self.errors.send(error).is_ok()
    }

    pub fn close(&mut self) {
        if let Some(closed) = self.closed.take() {
            let _ = closed.send(());
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_none()
    }

    /// Handles usable from a thread that does not own the senders.
    pub(crate) fn handles(
        &self,
    ) -> (
        mpsc::UnboundedSender<Notification>,
        mpsc::UnboundedSender<WatchError>,
    ) {
        (self.notifications.clone(), self.errors.clone())
    }
}

/// Create a connected sender/stream pair.
pub fn watch_channel() -> (WatchSenders, WatchStreams) {
    let (notification_tx, notification_rx) = mpsc::unbounded_channel();
    let (error_tx, error_rx) = mpsc::unbounded_channel();
    let (closed_tx, closed_rx) = oneshot::channel();

    (
        WatchSenders {
            notifications: notification_tx,
            errors: error_tx,
            closed: Some(closed_tx),
        },
        WatchStreams {
            notifications: notification_rx,
            errors: error_rx,
            closed: closed_rx,
        },
    )
}

/// A source of change notifications.
pub trait Watcher {
    /// Register a file or directory. Directories are watched one level deep.
    fn watch(&mut self, path: &Path) -> Result<(), WatchError>;

    /// Only report directory entries whose full path matches `filter`.
    /// Explicitly watched files are always reported.
    fn set_filter(&mut self, filter: Option<Regex>);

    /// Begin watching and hand back the streams.
    fn start(&mut self) -> Result<WatchStreams, WatchError>;

    /// Stop watching. The closed signal fires once pending notifications
    /// have been sent.
    fn stop(&mut self);
}

/// Pre-filter applied to notification paths before they reach the pipeline.
#[derive(Debug, Clone, Default)]
pub struct PathFilter {
    explicit: HashSet<PathBuf>,
    pattern: Option<Regex>,
}

impl PathFilter {
    pub fn new(pattern: Option<Regex>) -> Self {
        Self {
            explicit: HashSet::new(),
            pattern,
        }
    }

    pub fn set_pattern(&mut self, pattern: Option<Regex>) {
        self.pattern = pattern;
    }

    /// Mark `path` as always allowed.
    pub fn allow(&mut self, path: PathBuf) {
        self.explicit.insert(path);
    }

    pub fn allows(&self, path: &Path) -> bool {
        self.explicit.contains(path) || crate::source::registry::passes_filter(path, self.pattern.as_ref())
    }
}
