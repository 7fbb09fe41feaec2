use super::backend::NotifyWatcher;
use notify::{Config, RecommendedWatcher};

/// Watches paths with the platform's native notification API
/// (inotify, FSEvents, ReadDirectoryChangesW).
pub type NativeWatcher = NotifyWatcher<RecommendedWatcher>;

impl NativeWatcher {
    pub fn new() -> Self {
        Self::with_config("native", Config::default())
    }
}

impl Default for NativeWatcher {
    fn default() -> Self {
        Self::new()
    }
}
