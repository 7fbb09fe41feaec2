use crate::pipeline::sink::EventSink;
use crate::rule::ExtractionRule;
use crate::source::{FileCursor, WatchTargets};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Most bytes held back waiting for a newline. A longer unterminated tail
/// is scanned as it is.
pub const MAX_HELD_BYTES: usize = 64 * 1024;

/// What one extraction step did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The path has no cursor; nothing was read.
    Untracked,
    /// The incremental read failed; no rule ran.
    ReadFailed,
    /// `bytes` were read and every rule ran over them, producing `events`.
    Extracted { bytes: usize, events: usize },
}

/// Owns the cursors, the rules and the sink, and runs one read plus one
/// pass of all rules per write notification.
pub struct Coordinator<S: EventSink> {
    targets: WatchTargets,
    rules: Vec<ExtractionRule>,
    sink: S,
    hold_partial_lines: bool,
    partial: HashMap<PathBuf, Vec<u8>>,
}

impl<S: EventSink> Coordinator<S> {
    pub fn new(targets: WatchTargets, rules: Vec<ExtractionRule>, sink: S) -> Self {
        Self {
            targets,
            rules,
            sink,
            hold_partial_lines: false,
            partial: HashMap::new(),
        }
    }

    /// Keep bytes after the last newline of each read back until the line
    /// is completed by a later write.
    pub fn with_partial_lines(mut self, hold: bool) -> Self {
        self.hold_partial_lines = hold;
        self
    }

    pub fn targets(&self) -> &WatchTargets {
        &self.targets
    }

    pub fn rules(&self) -> &[ExtractionRule] {
        &self.rules
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    pub fn is_tracked(&self, path: &Path) -> bool {
        self.targets.contains(path)
    }

    /// Read whatever was appended to `path` and run every rule over it.
    pub fn process_path(&mut self, path: &Path) -> StepOutcome {
        let Some(cursor) = self.targets.get_mut(path) else {
            return StepOutcome::Untracked;
        };

        let carry = if self.hold_partial_lines {
            Some(self.partial.entry(path.to_path_buf()).or_default())
        } else {
            None
        };

        run_extraction_step(cursor, &self.rules, &mut self.sink, carry)
    }

    /// Close every cursor.
    pub fn shutdown(&mut self) {
        self.targets.close_all();
        let held: usize = self.partial.values().map(Vec::len).sum();
        if held > 0 {
            warn!(bytes = held, "Discarding incomplete trailing lines at shutdown");
        }
        self.partial.clear();
        info!(files = self.targets.len(), "Closed all cursors");
    }
}

/// One incremental read of `cursor` followed by one pass of every rule, in
/// order, over the bytes read. Every rendered event goes to `sink`.
///
/// With `carry`, bytes after the last newline are held back and prepended to
/// the next read instead of being scanned now, up to [`MAX_HELD_BYTES`].
pub fn run_extraction_step<S: EventSink + ?Sized>(
    cursor: &mut FileCursor,
    rules: &[ExtractionRule],
    sink: &mut S,
    carry: Option<&mut Vec<u8>>,
) -> StepOutcome {
    let old_offset = cursor.current_offset();
    let chunk = match cursor.read_new() {
        Ok(chunk) => chunk,
        Err(e) => {
            warn!(path = %cursor.path().display(), error = %e, "Failed to read new bytes");
            return StepOutcome::ReadFailed;
        }
    };

    debug!(
        path = %cursor.path().display(),
        old_offset = old_offset,
        new_offset = cursor.current_offset(),
        bytes = chunk.bytes.len(),
        "Read new bytes"
    );

    let read = chunk.bytes.len();
    let buffer = match carry {
        Some(carry) => {
            if chunk.truncated {
                carry.clear();
            }
            complete_lines(carry, chunk.bytes, MAX_HELD_BYTES)
        }
        None => chunk.bytes,
    };

    let mut events = 0;
    for rule in rules {
        debug!(rule = %rule.name(), event_type = %rule.event_type(), "Looking for events");
        for mut event in rule.extract(&buffer) {
            event.source = Some(cursor.path().to_path_buf());
            sink.deliver(event);
            events += 1;
        }
    }

    StepOutcome::Extracted {
        bytes: read,
        events,
    }
}

/// Join `carry` and `fresh`, return everything up to and including the last
/// newline, and leave the remainder in `carry`. A remainder longer than
/// `limit` is returned too and `carry` is left empty.
fn complete_lines(carry: &mut Vec<u8>, fresh: Vec<u8>, limit: usize) -> Vec<u8> {
    let mut joined = std::mem::take(carry);
    joined.extend_from_slice(&fresh);

    let split = joined
        .iter()
        .rposition(|&b| b == b'\n')
        .map_or(0, |last_newline| last_newline + 1);

    let tail = joined.len() - split;
    if tail > limit {
        warn!(bytes = tail, limit = limit, "Unterminated line exceeds hold limit, scanning it as is");
        return joined;
    }

    *carry = joined.split_off(split);
    joined
}
