// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Error types.

use crate::log::sink::SinkError;
use crate::types::EventId;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum KernelError {
    /// Request rejected before touching the log. The log is unchanged.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The hash chain is broken. Never auto-repaired.
    #[error("Integrity error: {0}")]
    Integrity(#[from] IntegrityError),

    /// The durable write failed; the record was not committed.
    #[error("Durability error: {0}")]
    Durability(#[from] SinkError),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Event log lock poisoned")]
    LockPoisoned,

    #[error("Unknown challenge: {0}")]
    UnknownChallenge(EventId),

    #[error("Challenge already resolved: {0}")]
    ChallengeResolved(EventId),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("domain must not be empty")]
    EmptyDomain,

    #[error("kind must not be empty")]
    EmptyKind,

    #[error("kind {found} does not match payload kind {expected}")]
    KindMismatch { expected: String, found: String },

    #[error("cannot roll back from point {from_point} to later point {to_point}")]
    RollbackBeyondHead { from_point: u64, to_point: u64 },

    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

/// First broken link found by chain verification.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("chain broken at index {index}: {reason}")]
pub struct IntegrityError {
    pub index: u64,
    pub reason: BreakReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakReason {
    /// Record 0 does not link to the genesis constant.
    BadGenesis,
    /// Record position and stored index disagree.
    IndexGap { expected: u64 },
    /// `prev_hash` differs from the previous record's hash.
    PrevHashMismatch,
    /// Stored hash differs from the recomputed one.
    HashMismatch,
}

impl fmt::Display for BreakReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BreakReason::BadGenesis => write!(f, "genesis prev_hash is not the genesis constant"),
            BreakReason::IndexGap { expected } => write!(f, "expected index {}", expected),
            BreakReason::PrevHashMismatch => write!(f, "prev_hash does not match previous record"),
            BreakReason::HashMismatch => write!(f, "stored hash does not match recomputed hash"),
        }
    }
}

impl From<serde_json::Error> for KernelError {
    fn from(e: serde_json::Error) -> Self {
        KernelError::Encoding(e.to_string())
    }
}

impl From<bincode::error::EncodeError> for KernelError {
    fn from(e: bincode::error::EncodeError) -> Self {
        KernelError::Encoding(e.to_string())
    }
}

pub type KernelResult<T> = std::result::Result<T, KernelError>;
pub type Result<T> = KernelResult<T>;
