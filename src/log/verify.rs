// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Chain Verification
//!
//! Walks a record sequence once, in index order, and reports the first
//! broken link. Checks per record:
//! 1. stored index equals position
//! 2. `prev_hash` equals the genesis constant (record 0) or the previous hash
//! 3. stored hash equals the recomputed hash
//!
//! Read-only: a broken chain is reported, never repaired.

use crate::config::GENESIS_HASH;
use crate::error::{BreakReason, IntegrityError};
use crate::event::EventRecord;
use serde::{Deserialize, Serialize};

/// Outcome of verifying a record sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub ok: bool,
    /// Index of the first broken record.
    pub broken_at: Option<u64>,
    pub reason: Option<BreakReason>,
    /// Records that passed before the walk stopped.
    pub checked: u64,
}

impl IntegrityReport {
    fn intact(checked: u64) -> Self {
        Self {
            ok: true,
            broken_at: None,
            reason: None,
            checked,
        }
    }

    fn broken(index: u64, reason: BreakReason, checked: u64) -> Self {
        Self {
            ok: false,
            broken_at: Some(index),
            reason: Some(reason),
            checked,
        }
    }

    pub fn into_result(self) -> Result<(), IntegrityError> {
        match (self.broken_at, self.reason) {
            (Some(index), Some(reason)) => Err(IntegrityError { index, reason }),
            _ => Ok(()),
        }
    }
}

pub fn verify_records(records: &[EventRecord]) -> IntegrityReport {
    let mut prev: Option<&EventRecord> = None;

    for (position, record) in records.iter().enumerate() {
        let expected = position as u64;
        if record.index() != expected {
            return IntegrityReport::broken(expected, BreakReason::IndexGap { expected }, expected);
        }

        match prev {
            None if *record.prev_hash() != GENESIS_HASH => {
                return IntegrityReport::broken(expected, BreakReason::BadGenesis, expected);
            }
            Some(previous) if record.prev_hash() != previous.hash() => {
                return IntegrityReport::broken(expected, BreakReason::PrevHashMismatch, expected);
            }
            _ => {}
        }

        let recomputed = record.compute_hash().ok();
        if recomputed.as_ref() != Some(record.hash()) {
            return IntegrityReport::broken(expected, BreakReason::HashMismatch, expected);
        }

        prev = Some(record);
    }

    IntegrityReport::intact(records.len() as u64)
}
