use crate::config::types::{InputConfig, ReadStart};
use crate::source::cursor::{CursorError, FileCursor};
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// The set of tailed files, keyed by absolute path.
///
/// Built once at startup. A path reachable both as an explicit file and as
/// a directory entry gets a single cursor.
#[derive(Debug, Default)]
pub struct WatchTargets {
    cursors: BTreeMap<PathBuf, FileCursor>,
}

impl WatchTargets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the configured inputs and open a cursor for each file.
    ///
    /// Files that cannot be opened and directories that cannot be listed are
    /// reported and skipped.
    pub fn from_input(input: &InputConfig, filter: Option<&Regex>) -> Self {
        let paths = resolve_paths(&input.files, &input.directories, filter);

        let mut targets = Self::new();
        for path in paths {
            let opened = match input.start {
                ReadStart::Beginning => FileCursor::open(&path, 0),
                ReadStart::End => FileCursor::open_at_end(&path),
            };

            match opened {
                Ok(cursor) => {
                    debug!(path = %path.display(), offset = cursor.current_offset(), "Opened cursor");
                    targets.insert(cursor);
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Could not watch file");
                }
            }
        }
        targets
    }

    /// Register an already opened cursor. An existing cursor for the same
    /// path is kept and the new one is closed.
    pub fn insert(&mut self, mut cursor: FileCursor) -> bool {
        let key = absolute(cursor.path());
        if self.cursors.contains_key(&key) {
            cursor.close();
            return false;
        }
        self.cursors.insert(key, cursor);
        true
    }

    /// Open `path` at `initial_offset` and register it.
    pub fn open(&mut self, path: &Path, initial_offset: u64) -> Result<bool, CursorError> {
        let cursor = FileCursor::open(path, initial_offset)?;
        Ok(self.insert(cursor))
    }

    pub fn get(&self, path: &Path) -> Option<&FileCursor> {
        self.cursors.get(path)
    }

    pub fn get_mut(&mut self, path: &Path) -> Option<&mut FileCursor> {
        self.cursors.get_mut(path)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.cursors.contains_key(path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.cursors.keys().map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.cursors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cursors.is_empty()
    }

    /// Close every cursor. The registry keeps its keys.
    pub fn close_all(&mut self) {
        for cursor in self.cursors.values_mut() {
            cursor.close();
        }
    }
}

/// Explicit files plus filtered top-level entries of each directory,
/// deduplicated and in a stable order.
pub fn resolve_paths(
    files: &[PathBuf],
    directories: &[PathBuf],
    filter: Option<&Regex>,
) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = files.iter().map(|f| absolute(f)).collect();

    for dir in directories {
        match enumerate_directory(dir, filter) {
            Ok(entries) => paths.extend(entries),
            Err(e) => {
                warn!(directory = %dir.display(), error = %e, "Could not list directory");
            }
        }
    }

    let mut seen = std::collections::HashSet::new();
    paths.retain(|p| seen.insert(p.clone()));
    paths
}

/// Regular files directly inside `dir` (no recursion) whose full path
/// matches `filter`, sorted by path.
pub fn enumerate_directory(dir: &Path, filter: Option<&Regex>) -> std::io::Result<Vec<PathBuf>> {
    let dir = absolute(dir);
    let mut files = Vec::new();

    for entry in std::fs::read_dir(&dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            continue;
        }
        let path = entry.path();
        if passes_filter(&path, filter) {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

pub(crate) fn passes_filter(path: &Path, filter: Option<&Regex>) -> bool {
    match filter {
        Some(re) => re.is_match(&path.to_string_lossy()),
        None => true,
    }
}

pub(crate) fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}
