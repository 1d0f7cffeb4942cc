// src/sink.rs - Append-only destinations for pen records
use std::collections::HashMap;
use std::ffi::OsStr;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Destination for the lines produced by one pen's logger.
pub trait PenSink: Send + Sync {
    fn append(&mut self, line: &str) -> io::Result<()>;
}

/// Opens a sink for a pen when the pen is created.
pub trait SinkFactory: Send + Sync {
    fn open(&self, pen: &str) -> io::Result<Box<dyn PenSink>>;
}

/// Writes `<directory>/<pen>.log`, truncating any previous run's file.
pub struct FileSink {
    writer: BufWriter<File>,
}

impl FileSink {
    pub fn create(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }
}

impl PenSink for FileSink {
    fn append(&mut self, line: &str) -> io::Result<()> {
        // Blocking write under the state lock; one short line per pen per logging tick.
        writeln!(self.writer, "{}", line)?;
        // Records must be visible while the simulation is still running.
        self.writer.flush()
    }
}

#[derive(Debug, Clone)]
pub struct FileSinkFactory {
    directory: PathBuf,
}

impl FileSinkFactory {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    /// `None` unless `pen` is a single plain file name, so logs stay inside the directory.
    pub fn path_for(&self, pen: &str) -> Option<PathBuf> {
        if Path::new(pen).file_name() != Some(OsStr::new(pen)) {
            return None;
        }
        Some(self.directory.join(format!("{}.log", pen)))
    }
}

impl SinkFactory for FileSinkFactory {
    fn open(&self, pen: &str) -> io::Result<Box<dyn PenSink>> {
        let path = self.path_for(pen).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("pen name '{}' is not a plain file name", pen),
            )
        })?;
        tracing::debug!("Opening pen log {}", path.display());
        Ok(Box::new(FileSink::create(&path)?))
    }
}

/// Keeps every pen's lines in memory. Clones share the same store.
#[derive(Debug, Clone, Default)]
pub struct MemorySinkFactory {
    lines: Arc<Mutex<HashMap<String, Vec<String>>>>,
}

impl MemorySinkFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines written so far for `pen`, empty if the pen never logged.
    pub fn lines(&self, pen: &str) -> Vec<String> {
        match self.lines.lock() {
            Ok(map) => map.get(pen).cloned().unwrap_or_default(),
            Err(poisoned) => poisoned.into_inner().get(pen).cloned().unwrap_or_default(),
        }
    }
}

struct MemorySink {
    pen: String,
    lines: Arc<Mutex<HashMap<String, Vec<String>>>>,
}

impl PenSink for MemorySink {
    fn append(&mut self, line: &str) -> io::Result<()> {
        let mut map = self
            .lines
            .lock()
            .map_err(|_| io::Error::other("memory sink lock poisoned"))?;
        map.entry(self.pen.clone()).or_default().push(line.to_string());
        Ok(())
    }
}

impl SinkFactory for MemorySinkFactory {
    fn open(&self, pen: &str) -> io::Result<Box<dyn PenSink>> {
        if let Ok(mut map) = self.lines.lock() {
            map.entry(pen.to_string()).or_default();
        }
        Ok(Box::new(MemorySink {
            pen: pen.to_string(),
            lines: self.lines.clone(),
        }))
    }
}
