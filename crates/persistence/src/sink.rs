// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Durable [`LogSink`] backed by a log file.
//!
//! # Safety Guarantees
//! - One frame per record, written in full then `sync_data`'d before `persist` returns
//! - Opening an existing file truncates a torn trailing frame before appending
//! - A failed write is cut back to the last complete frame

use crate::error::{PersistenceError, Result};
use crate::wal::{self, encode_frame, LogHeader};
use annal_kernel::event::{EventRecord, RecordRow};
use annal_kernel::log::sink::{LogSink, SinkError};
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    file: File,
    frames: u64,
    /// Length of the file through the last complete frame.
    len: u64,
    /// Frame index whose write is cut after the given number of bytes.
    #[cfg(test)]
    torn_write: Option<(u64, usize)>,
}

impl FileSink {
    /// Create a new log file with a fresh header. Fails if the file exists.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new().write(true).create_new(true).open(&path)?;
        file.write_all(&LogHeader::default().to_bytes())?;
        file.sync_all()?;

        Ok(Self {
            path,
            file,
            frames: 0,
            len: LogHeader::SIZE as u64,
            #[cfg(test)]
            torn_write: None,
        })
    }

    /// Open an existing log for appending.
    ///
    /// Returns the rows already on disk so the caller can restore the chain.
    pub fn open(path: impl AsRef<Path>) -> Result<(Self, Vec<RecordRow>)> {
        let path = path.as_ref().to_path_buf();
        let (rows, valid_len) = wal::scan(&path)?;

        let mut file = OpenOptions::new().write(true).open(&path)?;
        let on_disk = file.metadata()?.len();
        if on_disk > valid_len {
            warn!(path = %path.display(), dropped = on_disk - valid_len, "Truncating torn tail");
            file.set_len(valid_len)?;
            file.sync_all()?;
        }
        file.seek(SeekFrom::Start(valid_len))?;

        let frames = rows.len() as u64;
        Ok((
            Self {
                path,
                file,
                frames,
                len: valid_len,
                #[cfg(test)]
                torn_write: None,
            },
            rows,
        ))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Frames in the file, including those written by earlier processes.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    fn write_frame(&mut self, record: &EventRecord) -> Result<()> {
        let row = RecordRow::try_from(record)?;
        let bytes = serde_json::to_vec(&row)?;
        let frame = encode_frame(row.index, &bytes)?;

        if let Err(e) = self.write_synced(row.index, &frame) {
            self.discard_partial();
            return Err(e.into());
        }
        self.frames += 1;
        self.len += frame.len() as u64;
        Ok(())
    }

    fn write_synced(&mut self, index: u64, frame: &[u8]) -> std::io::Result<()> {
        if let Some(cut) = self.take_torn_write(index) {
            self.file.write_all(&frame[..cut.min(frame.len())])?;
            return Err(std::io::Error::new(std::io::ErrorKind::WriteZero, "frame write cut short"));
        }
        self.file.write_all(frame)?;
        self.file.sync_data()
    }

    /// Make the write of frame `index` stop after `bytes` bytes and fail, once.
    #[cfg(test)]
    pub(crate) fn tear_write_at(&mut self, index: u64, bytes: usize) {
        self.torn_write = Some((index, bytes));
    }

    #[cfg(test)]
    fn take_torn_write(&mut self, index: u64) -> Option<usize> {
        match self.torn_write {
            Some((at, bytes)) if at == index => {
                self.torn_write = None;
                Some(bytes)
            }
            _ => None,
        }
    }

    #[cfg(not(test))]
    fn take_torn_write(&mut self, _index: u64) -> Option<usize> {
        None
    }

    /// Cut a half-written frame so the next append starts on a boundary.
    fn discard_partial(&mut self) {
        let restored = self
            .file
            .set_len(self.len)
            .and_then(|_| self.file.seek(SeekFrom::Start(self.len)).map(|_| ()));
        if let Err(e) = restored {
            warn!(path = %self.path.display(), error = %e, "Could not discard partial frame");
        }
    }
}

impl LogSink for FileSink {
    fn persist(&mut self, record: &EventRecord) -> std::result::Result<(), SinkError> {
        match self.write_frame(record) {
            Ok(()) => {
                debug!(index = record.index(), frames = self.frames, "Frame persisted");
                Ok(())
            }
            Err(PersistenceError::Io(e)) => Err(SinkError::Io(e)),
            Err(e) => Err(SinkError::Rejected {
                index: record.index(),
                reason: e.to_string(),
            }),
        }
    }
}
