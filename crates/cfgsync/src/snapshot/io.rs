//! Snapshot readers and writers.
//!
//! Two interchangeable encodings share one document format: a text stream
//! over any [`Read`]/[`Write`], and a file written atomically.

use std::ffi::OsString;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use super::{ConfigSnapshot, SnapshotError, format};

/// Persists snapshots.
pub trait SnapshotWriter {
    /// Writes `snapshot`.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError`] if encoding or I/O fails.
    fn write(&mut self, snapshot: &ConfigSnapshot) -> Result<(), SnapshotError>;
}

/// Loads snapshots.
pub trait SnapshotReader {
    /// Reads one snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError`] if I/O fails or the document is invalid.
    fn read(&mut self) -> Result<ConfigSnapshot, SnapshotError>;
}

const STREAM: &str = "stream";

/// Writes snapshots as text to any [`Write`].
#[derive(Debug)]
pub struct TextSnapshotWriter<W> {
    inner: W,
}

impl<W: Write> TextSnapshotWriter<W> {
    /// Wraps `inner`.
    pub const fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Returns the wrapped writer.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> SnapshotWriter for TextSnapshotWriter<W> {
    fn write(&mut self, snapshot: &ConfigSnapshot) -> Result<(), SnapshotError> {
        let text = format::encode(snapshot)?;

        self.inner
            .write_all(text.as_bytes())
            .and_then(|()| self.inner.write_all(b"\n"))
            .and_then(|()| self.inner.flush())
            .map_err(|e| SnapshotError::io(STREAM, e))
    }
}

/// Reads one text snapshot from any [`Read`], consuming it to the end.
#[derive(Debug)]
pub struct TextSnapshotReader<R> {
    inner: R,
}

impl<R: Read> TextSnapshotReader<R> {
    /// Wraps `inner`.
    pub const fn new(inner: R) -> Self {
        Self { inner }
    }
}

impl<R: Read> SnapshotReader for TextSnapshotReader<R> {
    fn read(&mut self) -> Result<ConfigSnapshot, SnapshotError> {
        let mut content = String::new();
        self.inner
            .read_to_string(&mut content)
            .map_err(|e| SnapshotError::io(STREAM, e))?;

        format::decode(STREAM, &content)
    }
}

/// Writes snapshots to a file.
///
/// The document goes to a temporary sibling first and is renamed into
/// place, so readers never observe a half-written file.
#[derive(Clone, Debug)]
pub struct FileSnapshotWriter {
    path: PathBuf,
}

impl FileSnapshotWriter {
    /// Writes to `path`.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map_or_else(|| OsString::from("snapshot"), ToOwned::to_owned);
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl SnapshotWriter for FileSnapshotWriter {
    fn write(&mut self, snapshot: &ConfigSnapshot) -> Result<(), SnapshotError> {
        let text = format::encode(snapshot)?;
        let temp = self.temp_path();
        let target = self.path.display().to_string();

        fs::write(&temp, text + "\n").map_err(|e| SnapshotError::io(&target, e))?;
        fs::rename(&temp, &self.path).map_err(|e| {
            let _ = fs::remove_file(&temp);
            SnapshotError::io(&target, e)
        })?;

        tracing::debug!(path = %target, generation = snapshot.generation(), "snapshot written");
        Ok(())
    }
}

/// Reads a snapshot file.
#[derive(Clone, Debug)]
pub struct FileSnapshotReader {
    path: PathBuf,
}

impl FileSnapshotReader {
    /// Reads from `path`.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl SnapshotReader for FileSnapshotReader {
    fn read(&mut self) -> Result<ConfigSnapshot, SnapshotError> {
        let target = self.path.display().to_string();
        let content = fs::read_to_string(&self.path).map_err(|e| SnapshotError::io(&target, e))?;

        format::decode(&target, &content)
    }
}
