use crate::pipeline::coordinator::{Coordinator, StepOutcome};
use crate::pipeline::sink::EventSink;
use crate::watch::{Operation, WatchError, WatchStreams};
use thiserror::Error;
use tracing::{debug, info, trace, warn};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("watch subsystem failed: {0}")]
    Watch(#[from] WatchError),
}

/// Counters for one dispatch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub notifications: u64,
    pub ignored: u64,
    pub untracked: u64,
    pub read_failures: u64,
    pub steps: u64,
    pub events: u64,
}

/// Consume watcher signals until the watcher closes.
///
/// Write notifications for tracked paths trigger one extraction step each,
/// strictly in arrival order. Other operations are ignored. Any watcher
/// error ends the loop with an error; the watcher's guarantees no longer
/// hold once it has failed.
pub async fn dispatch<S: EventSink>(
    mut streams: WatchStreams,
    coordinator: &mut Coordinator<S>,
) -> Result<DispatchStats, DispatchError> {
    let mut stats = DispatchStats::default();
    let mut notifications_open = true;

    info!(files = coordinator.targets().len(), rules = coordinator.rules().len(), "Dispatcher started");

    loop {
        tokio::select! {
            biased;

            Some(err) = streams.errors.recv() => {
                return Err(DispatchError::Watch(err));
            }

            received = streams.notifications.recv(), if notifications_open => {
                let Some(notification) = received else {
                    notifications_open = false;
                    continue;
                };
                stats.notifications += 1;

                if notification.operation != Operation::Write {
                    trace!(path = %notification.path.display(), operation = ?notification.operation, "Ignoring notification");
                    stats.ignored += 1;
                    continue;
                }

                match coordinator.process_path(&notification.path) {
                    StepOutcome::Untracked => {
                        warn!(path = %notification.path.display(), "Got write notification for untracked file");
                        stats.untracked += 1;
                    }
                    StepOutcome::ReadFailed => {
                        stats.read_failures += 1;
                    }
                    StepOutcome::Extracted { bytes, events } => {
                        debug!(path = %notification.path.display(), bytes, events, "Extraction step complete");
                        stats.steps += 1;
                        stats.events += events as u64;
                    }
                }
            }

            _ = &mut streams.closed => {
                break;
            }
        }
    }

    info!(
        notifications = stats.notifications,
        steps = stats.steps,
        events = stats.events,
        "Dispatcher stopped"
    );
    Ok(stats)
}
