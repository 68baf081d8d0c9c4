use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Lines, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

use crate::schema::ChatRecord;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record store i/o: {0}")]
    Io(#[from] io::Error),
    #[error("record store encode: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Append-only log of chat records, one JSON object per line. The file is
/// the durable contract between restarts, so lines are never rewritten or
/// reordered; the only destructive operation is `reset`.
#[derive(Debug, Clone)]
pub struct RecordStore {
    path: PathBuf,
}

impl RecordStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Appends the batch in the given order. The whole batch is written with
    /// a single append-mode write so a concurrent scan never observes a
    /// partially written line.
    pub fn append(&self, records: &[ChatRecord]) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }

        let mut buf = String::new();
        for record in records {
            buf.push_str(&serde_json::to_string(record)?);
            buf.push('\n');
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(buf.as_bytes())?;
        Ok(())
    }

    /// Lazy pass over the full current file in append order. Each call opens
    /// a fresh read; a store that does not exist yet scans as empty.
    pub fn scan(&self) -> Result<RecordScan, StoreError> {
        match File::open(&self.path) {
            Ok(file) => Ok(RecordScan {
                lines: Some(BufReader::new(file).lines()),
            }),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(RecordScan { lines: None }),
            Err(err) => Err(err.into()),
        }
    }

    /// Raw file contents for bulk export, byte-for-byte as stored.
    pub fn raw_contents(&self) -> Result<String, StoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => Ok(contents),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(String::new()),
            Err(err) => Err(err.into()),
        }
    }

    /// Destroys all persisted records. A missing store is already reset.
    pub fn reset(&self) -> Result<(), StoreError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

pub struct RecordScan {
    lines: Option<Lines<BufReader<File>>>,
}

impl Iterator for RecordScan {
    type Item = ChatRecord;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.as_mut()?.next() {
                Some(Ok(line)) => line,
                Some(Err(err)) => {
                    warn!(error = %err, "record scan stopped on read error");
                    self.lines = None;
                    return None;
                }
                None => return None,
            };

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str(trimmed) {
                Ok(record) => return Some(record),
                Err(err) => debug!(error = %err, "skipping unparseable store line"),
            }
        }
    }
}
