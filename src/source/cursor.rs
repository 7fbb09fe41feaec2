use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum CursorError {
    #[error("failed to open '{path}': {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot seek '{path}' to offset {offset}: file is only {size} bytes")]
    SeekPastEnd { path: PathBuf, offset: u64, size: u64 },

    #[error("failed to seek '{path}' to offset {offset}: {source}")]
    Seek {
        path: PathBuf,
        offset: u64,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to stat '{path}': {source}")]
    Stat {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read '{path}' at offset {offset}: {source}")]
    Read {
        path: PathBuf,
        offset: u64,
        #[source]
        source: std::io::Error,
    },

    #[error("cursor for '{path}' is closed")]
    Closed { path: PathBuf },
}

/// Bytes returned by one [`FileCursor::read_new`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadChunk {
    /// Newly appended bytes, possibly empty.
    pub bytes: Vec<u8>,
    /// File offset of the first byte in `bytes`.
    pub start_offset: u64,
    /// The file had shrunk below the tracked offset and was reread from 0.
    pub truncated: bool,
}

impl ReadChunk {
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// An open file plus the byte offset up to which it has been consumed.
///
/// The offset only moves forward, and only by the number of bytes a read
/// actually returned. The one exception is truncation: if the file is found
/// to be shorter than the offset, reading restarts from the beginning.
#[derive(Debug)]
pub struct FileCursor {
    path: PathBuf,
    file: Option<File>,
    offset: u64,
}

impl FileCursor {
    /// Open `path` and position the cursor at `initial_offset`.
    ///
    /// Fails with [`CursorError::SeekPastEnd`] if the offset lies beyond the
    /// current end of the file.
    pub fn open(path: impl Into<PathBuf>, initial_offset: u64) -> Result<Self, CursorError> {
        let path = path.into();
        let mut file = File::open(&path).map_err(|source| CursorError::Open {
            path: path.clone(),
            source,
        })?;

        if initial_offset > 0 {
            let size = file
                .metadata()
                .map_err(|source| CursorError::Stat {
                    path: path.clone(),
                    source,
                })?
                .len();
            if initial_offset > size {
                return Err(CursorError::SeekPastEnd {
                    path,
                    offset: initial_offset,
                    size,
                });
            }
            file.seek(SeekFrom::Start(initial_offset))
                .map_err(|source| CursorError::Seek {
                    path: path.clone(),
                    offset: initial_offset,
                    source,
                })?;
        }

        Ok(Self {
            path,
            file: Some(file),
            offset: initial_offset,
        })
    }

    /// Open `path` with the cursor at its current end, so only bytes
    /// appended from now on are returned.
    pub fn open_at_end(path: impl Into<PathBuf>) -> Result<Self, CursorError> {
        let mut cursor = Self::open(path, 0)?;
        let size = cursor.current_size()?;
        cursor.offset = size;
        Ok(cursor)
    }

    /// Read every byte appended since the previous read.
    ///
    /// The amount to read is taken from a fresh stat of the open handle;
    /// bytes a concurrent writer adds after that stat are left for the next
    /// call. Returns an empty chunk when nothing new is available.
    pub fn read_new(&mut self) -> Result<ReadChunk, CursorError> {
        let size = self.current_size()?;

        let mut truncated = false;
        if size < self.offset {
            warn!(
                path = %self.path.display(),
                offset = self.offset,
                size = size,
                "File shrank below read offset, rereading from start"
            );
            self.offset = 0;
            truncated = true;
        }

        let start_offset = self.offset;
        let available = size - start_offset;
        if available == 0 {
            return Ok(ReadChunk {
                bytes: Vec::new(),
                start_offset,
                truncated,
            });
        }

        let path = &self.path;
        let file = self.file.as_mut().ok_or_else(|| CursorError::Closed {
            path: path.clone(),
        })?;

        file.seek(SeekFrom::Start(start_offset))
            .map_err(|source| CursorError::Seek {
                path: path.clone(),
                offset: start_offset,
                source,
            })?;

        let mut bytes = Vec::with_capacity(available as usize);
        file.by_ref()
            .take(available)
            .read_to_end(&mut bytes)
            .map_err(|source| CursorError::Read {
                path: path.clone(),
                offset: start_offset,
                source,
            })?;

        self.offset = start_offset + bytes.len() as u64;

        Ok(ReadChunk {
            bytes,
            start_offset,
            truncated,
        })
    }

    /// The offset up to which the file has been consumed.
    pub fn current_offset(&self) -> u64 {
        self.offset
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// Release the file handle. Calling this more than once is a no-op.
    pub fn close(&mut self) {
        self.file = None;
    }

    fn current_size(&self) -> Result<u64, CursorError> {
        let file = self.file.as_ref().ok_or_else(|| CursorError::Closed {
            path: self.path.clone(),
        })?;
        file.metadata()
            .map(|metadata| metadata.len())
            .map_err(|source| CursorError::Stat {
                path: self.path.clone(),
                source,
            })
    }
}
