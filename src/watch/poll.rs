use super::backend::NotifyWatcher;
use notify::Config;
use std::time::Duration;

/// Watches paths by rescanning them on a fixed interval.
///
/// Contents are hashed on every scan so that several appends within the
/// same mtime tick are still reported.
pub type PollWatcher = NotifyWatcher<notify::PollWatcher>;

impl PollWatcher {
    pub fn new(interval: Duration) -> Self {
        let config = Config::default()
            .with_poll_interval(interval)
            .with_compare_contents(true);
        Self::with_config("poll", config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watch::{Notification, Operation, WatchError, WatchStreams, Watcher};
    use regex::Regex;
    use std::fs::{self, OpenOptions};
    use std::io::Write;
    use std::path::Path;
    use tempfile::TempDir;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(5);

    fn append(path: &Path, data: &str) {
        let mut file = OpenOptions::new().append(true).open(path).unwrap();
        file.write_all(data.as_bytes()).unwrap();
    }

    /// Next notification for `path` with the given operation. Directory
    /// events and other operations on the path are skipped.
    async fn next(streams: &mut WatchStreams, path: &Path, operation: Operation) -> Notification {
        timeout(WAIT, async {
            loop {
                let notification = streams.notifications.recv().await.unwrap();
                if notification.path == path && notification.operation == operation {
                    return notification;
                }
            }
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_reports_write_to_explicit_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("app.log");
        fs::write(&path, "").unwrap();

        let mut watcher = PollWatcher::new(Duration::from_millis(10));
        watcher.watch(&path).unwrap();
        let mut streams = watcher.start().unwrap();

        append(&path, "hello\n");
        next(&mut streams, &path, Operation::Write).await;

        // A second append right after the first is reported too.
        append(&path, "again\n");
        next(&mut streams, &path, Operation::Write).await;

        watcher.stop();
        assert!(timeout(WAIT, streams.closed).await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_directory_entries_respect_filter() {
        let temp_dir = TempDir::new().unwrap();
        let log = temp_dir.path().join("a.log");
        let txt = temp_dir.path().join("a.txt");
        fs::write(&log, "").unwrap();
        fs::write(&txt, "").unwrap();

        let mut watcher = PollWatcher::new(Duration::from_millis(10));
        watcher.set_filter(Some(Regex::new(r"\.log$").unwrap()));
        watcher.watch(temp_dir.path()).unwrap();
        let mut streams = watcher.start().unwrap();

        append(&txt, "ignored\n");
        append(&log, "seen\n");
        next(&mut streams, &log, Operation::Write).await;

        watcher.stop();
        timeout(WAIT, streams.closed).await.unwrap().unwrap();
        while let Ok(extra) = streams.notifications.try_recv() {
            assert_ne!(extra.path, txt);
        }
    }

    #[tokio::test]
    async fn test_create_and_remove_in_directory() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("new.log");

        let mut watcher = PollWatcher::new(Duration::from_millis(10));
        watcher.watch(temp_dir.path()).unwrap();
        let mut streams = watcher.start().unwrap();

        fs::write(&path, "x").unwrap();
        next(&mut streams, &path, Operation::Create).await;

        fs::remove_file(&path).unwrap();
        next(&mut streams, &path, Operation::Remove).await;

        watcher.stop();
    }

    #[test]
    fn test_watch_missing_path_fails() {
        let mut watcher = PollWatcher::new(Duration::from_millis(10));
        let result = watcher.watch(Path::new("/nonexistent/sest/app.log"));
        assert!(matches!(result, Err(WatchError::Register { .. })));
    }

    #[test]
    fn test_start_twice_fails() {
        let temp_dir = TempDir::new().unwrap();
        let mut watcher = PollWatcher::new(Duration::from_millis(10));
        watcher.watch(temp_dir.path()).unwrap();
        watcher.watch(temp_dir.path()).unwrap();
        assert_eq!(watcher.paths().len(), 1);

        let _streams = watcher.start().unwrap();
        assert!(matches!(watcher.start(), Err(WatchError::AlreadyStarted)));
        watcher.stop();
    }
}
