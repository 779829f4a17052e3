// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Challenges and their log-derived answers.
//!
//! Every challenge is anchored to the head index at issuance, so its
//! expected answer never changes as the log grows:
//! - capability: hex hash of the anchor record, recomputed from its contents
//! - consistency: kind of the anchor record
//! - integrity: `ok` if records `0..=anchor` verify, else `broken:<index>`

use crate::event::EventRecord;
use crate::log::verify::verify_records;
use crate::types::{hash_hex, EventId};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeType {
    Capability,
    Consistency,
    Integrity,
}

impl ChallengeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChallengeType::Capability => "capability",
            ChallengeType::Consistency => "consistency",
            ChallengeType::Integrity => "integrity",
        }
    }

    pub fn question(&self, target: &str, anchor_index: u64) -> String {
        match self {
            ChallengeType::Capability => format!(
                "{}: report the hex hash of record {}",
                target, anchor_index
            ),
            ChallengeType::Consistency => format!(
                "{}: report the kind of record {}",
                target, anchor_index
            ),
            ChallengeType::Integrity => format!(
                "{}: does the chain through record {} verify? answer ok or broken:<index>",
                target, anchor_index
            ),
        }
    }

    /// Expected answer computed from `records`, which must start at genesis.
    pub fn expected_answer(&self, records: &[EventRecord], anchor_index: u64) -> Result<String, Unanswerable> {
        let anchor = usize::try_from(anchor_index)
            .ok()
            .and_then(|i| records.get(i))
            .ok_or(Unanswerable::MissingAnchor(anchor_index))?;
        let answer = match self {
            ChallengeType::Capability => {
                let recomputed = anchor
                    .compute_hash()
                    .map_err(|_| Unanswerable::Unhashable(anchor_index))?;
                hash_hex(&recomputed)
            }
            ChallengeType::Consistency => anchor.kind().to_string(),
            ChallengeType::Integrity => {
                let end = usize::try_from(anchor_index)
                    .ok()
                    .and_then(|i| i.checked_add(1))
                    .ok_or(Unanswerable::MissingAnchor(anchor_index))?;
                match verify_records(&records[..end]).broken_at {
                    None => "ok".to_string(),
                    Some(index) => format!("broken:{}", index),
                }
            }
        };
        Ok(answer)
    }
}

/// Why the log cannot supply an expected answer. The challenge then fails.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Unanswerable {
    MissingAnchor(u64),
    Unhashable(u64),
}

impl fmt::Display for Unanswerable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unanswerable::MissingAnchor(index) => write!(f, "anchor record {} not found", index),
            Unanswerable::Unhashable(index) => write!(f, "anchor record {} could not be re-hashed", index),
        }
    }
}

impl fmt::Display for ChallengeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Answers compare trimmed and lowercased.
pub fn normalize_answer(answer: &str) -> String {
    answer.trim().to_lowercase()
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    /// Id of the `CHALLENGE_ISSUED` record.
    pub id: EventId,
    pub target: String,
    pub challenge_type: ChallengeType,
    pub question: String,
    pub anchor_index: u64,
    pub answer: Option<String>,
    pub passed: Option<bool>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeVerdict {
    pub passed: bool,
    pub reason: Option<String>,
}
