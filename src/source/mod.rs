pub mod cursor;
pub mod registry;

pub use cursor::{CursorError, FileCursor, ReadChunk};
pub use registry::{enumerate_directory, resolve_paths, WatchTargets};
