//! Append-only destinations for finished dump lines.
//!
//! A sink is shared by every worker of a process, so implementations take
//! `&self` and synchronize internally. Lines are passed without a trailing
//! newline; line-oriented sinks add their own terminator. No ordering is
//! promised between lines written by different workers.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::debug;

use crate::error::{DumpError, DumpResult};

/// Destination for finished dump lines.
pub trait DumpSink: Send + Sync {
    fn write_line(&self, line: String) -> DumpResult<()>;
}

impl<S: DumpSink + ?Sized> DumpSink for Arc<S> {
    fn write_line(&self, line: String) -> DumpResult<()> {
        (**self).write_line(line)
    }
}

/// Collects lines in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything written so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    /// Remove and return everything written so far.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.lines.lock())
    }

    pub fn len(&self) -> usize {
        self.lines.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DumpSink for MemorySink {
    fn write_line(&self, line: String) -> DumpResult<()> {
        self.lines.lock().push(line);
        Ok(())
    }
}

/// Buffered, newline-terminated file output.
///
/// Buffered lines reach the file on [`FileSink::flush`] or when the sink is
/// dropped.
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl FileSink {
    /// Create or truncate `path`.
    pub fn create(path: impl AsRef<Path>) -> DumpResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)?;
        debug!(path = %path.display(), "opened dump file");
        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn flush(&self) -> DumpResult<()> {
        self.writer.lock().flush()?;
        Ok(())
    }
}

impl DumpSink for FileSink {
    fn write_line(&self, line: String) -> DumpResult<()> {
        let mut writer = self.writer.lock();
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}

/// Hands lines to a single consumer over an unbounded channel.
///
/// Many workers can hold clones of the sender while one task drains the
/// receiver into a file or socket.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: UnboundedSender<String>,
}

impl ChannelSink {
    pub fn unbounded() -> (Self, UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl DumpSink for ChannelSink {
    fn write_line(&self, line: String) -> DumpResult<()> {
        self.tx.send(line).map_err(|_| DumpError::SinkClosed)
    }
}
