//! Newline-delimited event output

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::debug;

use crate::event::Event;

/// File name of the completion marker written next to the output file
pub const SENTINEL_FILE_NAME: &str = ".done";

/// Where events go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    Stdout,
    File(PathBuf),
}

impl OutputTarget {
    /// Build the target from an optional `--output-file` value
    pub fn from_option(path: Option<PathBuf>) -> Self {
        match path {
            Some(path) => Self::File(path),
            None => Self::Stdout,
        }
    }

    /// Sentinel path for file output; stdout has none
    pub fn sentinel_path(&self) -> Option<PathBuf> {
        match self {
            Self::Stdout => None,
            Self::File(path) => Some(sentinel_path_for(path)),
        }
    }
}

/// `.done` in the same directory as `output_file`
pub fn sentinel_path_for(output_file: &Path) -> PathBuf {
    match output_file.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.join(SENTINEL_FILE_NAME),
        _ => PathBuf::from(SENTINEL_FILE_NAME),
    }
}

/// Serializes one event per line and flushes after every write
///
/// The writer sits behind a mutex so a line is never interleaved with
/// another, whichever task writes it.
pub struct OutputSink {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl OutputSink {
    pub fn stdout() -> Self {
        Self::from_writer(io::stdout())
    }

    /// Open `path` for appending, creating its directory when missing
    pub fn file(path: &Path) -> io::Result<Self> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        debug!(path = %path.display(), "opened output file");
        Ok(Self::from_writer(file))
    }

    pub fn open(target: &OutputTarget) -> io::Result<Self> {
        match target {
            OutputTarget::Stdout => Ok(Self::stdout()),
            OutputTarget::File(path) => Self::file(path),
        }
    }

    pub fn from_writer<W: Write + Send + 'static>(writer: W) -> Self {
        Self {
            writer: Mutex::new(Box::new(writer)),
        }
    }

    /// Write `event` as one JSON line and flush
    pub fn write_event(&self, event: &Event) -> io::Result<()> {
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');

        let mut writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        writer.write_all(&line)?;
        writer.flush()
    }
}
