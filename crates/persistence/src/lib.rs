// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! annal-persistence: durable storage for the event log.
//!
//! The file is the persisted form of the chain; the kernel re-verifies every
//! row on restore and refuses a broken chain.

pub mod error;
pub mod fixtures;
pub mod sink;
pub mod wal;

pub use error::{PersistenceError, Result};
pub use sink::FileSink;

use annal_kernel::clock::Clock;
use annal_kernel::event::{EventRecord, RecordRow};
use annal_kernel::log::EventLog;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

pub fn rows_to_records(rows: Vec<RecordRow>) -> Result<Vec<EventRecord>> {
    rows.into_iter()
        .map(|row| EventRecord::try_from(row).map_err(PersistenceError::from))
        .collect()
}

/// Read every complete record without verifying the chain.
pub fn load_records(path: impl AsRef<Path>) -> Result<Vec<EventRecord>> {
    rows_to_records(wal::read_rows(path)?)
}

/// Open (or create) a durable log at `path`.
///
/// An existing file is verified and restored; appends then continue the
/// same chain. A new file starts with a persisted genesis record.
pub fn open_log(path: impl AsRef<Path>, clock: Arc<dyn Clock>) -> Result<EventLog> {
    let path = path.as_ref();
    if !path.exists() {
        let sink = FileSink::create(path)?;
        info!(path = %path.display(), "Creating event log file");
        return Ok(EventLog::with_parts(Box::new(sink), clock)?);
    }

    let (sink, rows) = FileSink::open(path)?;
    let records = rows_to_records(rows)?;
    info!(path = %path.display(), records = records.len(), "Opening event log file");
    Ok(EventLog::restore(records, Box::new(sink), clock)?)
}
