use super::{watch_channel, Notification, Operation, PathFilter, WatchError, WatchSenders, WatchStreams, Watcher};
use crate::source::registry::absolute;
use notify::event::{MetadataKind, ModifyKind};
use notify::{Config, Event, EventKind, RecursiveMode};
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::info;

/// A [`Watcher`] backed by any `notify` implementation.
///
/// Paths registered before [`Watcher::start`] are handed to the `notify`
/// watcher when it is created; later registrations go straight to it.
pub struct NotifyWatcher<W: notify::Watcher> {
    kind: &'static str,
    config: Config,
    paths: Vec<PathBuf>,
    filter: PathFilter,
    inner: Option<W>,
    senders: Option<WatchSenders>,
}

impl<W: notify::Watcher> NotifyWatcher<W> {
    pub(super) fn with_config(kind: &'static str, config: Config) -> Self {
        Self {
            kind,
            config,
            paths: Vec::new(),
            filter: PathFilter::default(),
            inner: None,
            senders: None,
        }
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }
}

impl<W: notify::Watcher> Watcher for NotifyWatcher<W> {
    fn watch(&mut self, path: &Path) -> Result<(), WatchError> {
        let path = absolute(path);
        let metadata = std::fs::metadata(&path).map_err(|source| WatchError::Register {
            path: path.clone(),
            source,
        })?;

        if !metadata.is_dir() {
            self.filter.allow(path.clone());
        }
        if let Some(inner) = self.inner.as_mut() {
            inner.watch(&path, RecursiveMode::NonRecursive)?;
        }
        if !self.paths.contains(&path) {
            self.paths.push(path);
        }
        Ok(())
    }

    fn set_filter(&mut self, filter: Option<Regex>) {
        self.filter.set_pattern(filter);
    }

    fn start(&mut self) -> Result<WatchStreams, WatchError> {
        if self.inner.is_some() {
            return Err(WatchError::AlreadyStarted);
        }

        let (senders, streams) = watch_channel();
        let (notification_tx, error_tx) = senders.handles();
        let filter = self.filter.clone();

        let handler = move |res: notify::Result<Event>| match res {
            Ok(event) => {
                let operation = operation_for(&event.kind);
                for path in event.paths {
                    if filter.allows(&path) {
                        let _ = notification_tx.send(Notification { path, operation });
                    }
                }
            }
            Err(e) => {
                let _ = error_tx.send(WatchError::Native(e));
            }
        };

        let mut inner = W::new(handler, self.config)?;
        for path in &self.paths {
            inner.watch(path, RecursiveMode::NonRecursive)?;
        }

        info!(kind = self.kind, paths = self.paths.len(), "Watcher started");
        self.inner = Some(inner);
        self.senders = Some(senders);
        Ok(streams)
    }

    fn stop(&mut self) {
        // Dropping the notify watcher ends its thread before closed fires.
        self.inner = None;
        if let Some(mut senders) = self.senders.take() {
            senders.close();
        }
    }
}

/// Map a `notify` event kind onto the operations the pipeline knows about.
///
/// A new modification time counts as a write: the polling backend reports
/// appends that way when the content hash is unchanged between scans.
pub fn operation_for(kind: &EventKind) -> Operation {
    match kind {
        EventKind::Modify(ModifyKind::Data(_))
        | EventKind::Modify(ModifyKind::Any)
        | EventKind::Modify(ModifyKind::Metadata(MetadataKind::WriteTime)) => Operation::Write,
        EventKind::Modify(ModifyKind::Name(_)) => Operation::Rename,
        EventKind::Create(_) => Operation::Create,
        EventKind::Remove(_) => Operation::Remove,
        _ => Operation::Other,
    }
}
