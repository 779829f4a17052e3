// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Durability hook for appends.
//!
//! The log hands every linked record to its sink before the record becomes
//! visible. If `persist` fails the append fails and the chain is unchanged.

use crate::event::EventRecord;
use std::fmt::Debug;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Sink rejected record {index}: {reason}")]
    Rejected { index: u64, reason: String },
}

pub trait LogSink: Send + Debug {
    /// Durably store `record`. Only return `Ok` once the record survives a restart.
    fn persist(&mut self, record: &EventRecord) -> Result<(), SinkError>;
}

/// No durability. Records live only as long as the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct MemorySink;

impl LogSink for MemorySink {
    fn persist(&mut self, _record: &EventRecord) -> Result<(), SinkError> {
        Ok(())
    }
}
