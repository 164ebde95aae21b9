//! Rotating-file destination.
//!
//! The rotation capability is its own type so the destination stays a thin
//! async wrapper: `RotatingFileWriter` owns the open handle, tracks the
//! current size, and shifts backup generations when a write would exceed
//! the configured maximum.

use super::SinkState;
use crate::config::FileConfig;
use crate::core::{
    DeliveryError, DeliveryResult, Destination, DestinationKind, DirectMessage, Record, Severity,
};
use crate::formatting;
use async_trait::async_trait;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task;

/// A size-bounded, append-only log file with numbered backup generations.
///
/// When a write would push the active file past `max_size`, the file is
/// rotated: `path.1` is the most recent backup, `path.N` the oldest, and
/// at most `backup_count` generations are retained. With `backup_count`
/// zero the active file is simply started over.
///
/// The file opens lazily on the first write, so constructing a writer for
/// a destination that never fires touches nothing on disk.
#[derive(Debug)]
pub struct RotatingFileWriter {
    path: PathBuf,
    max_size: u64,
    backup_count: u32,
    file: Option<File>,
    written: u64,
}

impl RotatingFileWriter {
    pub fn new(path: impl Into<PathBuf>, max_size: u64, backup_count: u32) -> Self {
        Self {
            path: path.into(),
            max_size,
            backup_count,
            file: None,
            written: 0,
        }
    }

    /// Appends one line, rotating first if the line would not fit.
    pub fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.ensure_open()?;
        let needed = line.len() as u64 + 1;
        if self.written > 0 && self.written + needed > self.max_size {
            self.rotate()?;
            self.ensure_open()?;
        }
        if let Some(file) = self.file.as_mut() {
            file.write_all(line.as_bytes())?;
            file.write_all(b"\n")?;
            file.flush()?;
            self.written += needed;
        }
        Ok(())
    }

    fn ensure_open(&mut self) -> io::Result<()> {
        if self.file.is_some() {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        self.written = file.metadata()?.len();
        self.file = Some(file);
        Ok(())
    }

    /// Shifts backup generations and leaves the active path vacant; the
    /// next `write_line` reopens it fresh.
    fn rotate(&mut self) -> io::Result<()> {
        // Close the active handle before renaming under it.
        self.file = None;
        self.written = 0;

        if self.backup_count == 0 {
            return match fs::remove_file(&self.path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e),
            };
        }

        let backup = |generation: u32| {
            PathBuf::from(format!("{}.{}", self.path.display(), generation))
        };

        let oldest = backup(self.backup_count);
        if oldest.exists() {
            fs::remove_file(&oldest)?;
        }
        for generation in (1..self.backup_count).rev() {
            let from = backup(generation);
            if from.exists() {
                fs::rename(&from, backup(generation + 1))?;
            }
        }
        if self.path.exists() {
            fs::rename(&self.path, backup(1))?;
        }
        Ok(())
    }
}

/// A destination that appends formatted lines to a rotating log file.
pub struct FileDestination {
    state: SinkState,
    template: String,
    date_format: String,
    writer: Arc<Mutex<RotatingFileWriter>>,
}

impl FileDestination {
    pub fn new(config: &FileConfig) -> Self {
        Self {
            state: SinkState::new(config.enabled, config.level),
            template: config.format.clone(),
            date_format: config.date_format.clone(),
            writer: Arc::new(Mutex::new(RotatingFileWriter::new(
                config.filename.clone(),
                config.max_size,
                config.backup_count,
            ))),
        }
    }

    async fn write_line(&self, line: &str) -> DeliveryResult {
        let writer = Arc::clone(&self.writer);
        let line = line.to_string();
        task::spawn_blocking(move || {
            let mut writer = writer.lock().unwrap_or_else(PoisonError::into_inner);
            writer.write_line(&line).map_err(DeliveryError::from)
        })
        .await
        .map_err(|e| DeliveryError::Task(e.to_string()))?
    }
}

#[async_trait]
impl Destination for FileDestination {
    fn kind(&self) -> DestinationKind {
        DestinationKind::File
    }

    fn is_enabled(&self) -> bool {
        self.state.enabled()
    }

    fn set_enabled(&self, enabled: bool) {
        self.state.set_enabled(enabled);
    }

    fn threshold(&self) -> Severity {
        self.state.threshold()
    }

    fn set_threshold(&self, threshold: Severity) {
        self.state.set_threshold(threshold);
    }

    fn format(&self, record: &Record) -> String {
        formatting::render(&self.template, &self.date_format, record)
    }

    async fn deliver(&self, _record: &Record, rendered: &str) -> DeliveryResult {
        self.write_line(rendered).await
    }

    async fn direct_send(&self, message: &DirectMessage) -> Vec<DeliveryResult> {
        vec![self.write_line(&message.body).await]
    }
}
