// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Event Records and Typed Payloads
//!
//! Every fact in the system is an [`EventRecord`] appended to the
//! [`EventLog`](crate::log::EventLog). Payloads are a sum type over the
//! known kinds, with an [`EventPayload::Opaque`] fallback so that records
//! written by a newer producer still load, hash and verify.
//!
//! # Invariants
//! - `hash = H(index, timestamp, domain, kind, payload, prev_hash)`
//! - Records are only constructed by the log (or decoded from persisted rows)
//! - A known kind always carries its typed payload when appended
//!
//! # Persisted Row
//! ```text
//! {index, timestamp, domain, kind, payload, prev_hash, hash}
//! ```
//! `payload` is a JSON value; hashes are lowercase hex. The record id is not
//! stored: it is derived from the hash on load.

use crate::arbiter::hypothesis::Hypothesis;
use crate::arbiter::StopReason;
use crate::error::{KernelError, Result};
use crate::log::hash::record_hash;
use crate::referee::challenge::ChallengeType;
use crate::referee::Residue;
use crate::types::{hash_hex, parse_hash_hex, Domain, EventId, Hash, HypothesisId, MatchId, PlayerId};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Canonical kind tags.
pub mod kinds {
    pub const GENESIS: &str = "GENESIS";
    pub const PLAYER_JOIN: &str = "PLAYER_JOIN";
    pub const PLAYER_MOVE: &str = "PLAYER_MOVE";
    pub const MOVE_REJECTED: &str = "MOVE_REJECTED";
    pub const ROLLBACK: &str = "ROLLBACK";
    pub const RECURRENCE_CYCLE: &str = "RECURRENCE_CYCLE";
    pub const RECURRENCE_STOP_CONDITION: &str = "RECURRENCE_STOP_CONDITION";
    pub const MULTI_VIEW_CONSISTENT: &str = "MULTI_VIEW_CONSISTENT";
    pub const MULTI_VIEW_MISMATCH: &str = "MULTI_VIEW_MISMATCH";
    pub const CHALLENGE_ISSUED: &str = "CHALLENGE_ISSUED";
    pub const CHALLENGE_RESPONSE: &str = "CHALLENGE_RESPONSE";
    pub const PROJECTION_CHECKPOINT: &str = "PROJECTION_CHECKPOINT";
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genesis {
    pub format_version: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerJoin {
    pub match_id: MatchId,
    pub player_id: PlayerId,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerMove {
    pub match_id: MatchId,
    pub player_id: PlayerId,
    pub dx: i64,
    pub dy: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    NotJoined,
    OutOfBounds,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::NotJoined => "not_joined",
            RejectReason::OutOfBounds => "out_of_bounds",
        }
    }
}

/// Audit record for a `PLAYER_MOVE` that was not applied.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRejected {
    pub match_id: MatchId,
    pub player_id: PlayerId,
    /// Index of the offending `PLAYER_MOVE` record.
    pub move_index: u64,
    pub dx: i64,
    pub dy: i64,
    pub reason: RejectReason,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rollback {
    pub match_id: MatchId,
    pub from_point: u64,
    pub to_point: u64,
    pub events_replayed: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecurrenceCycle {
    pub target: String,
    pub cycle: u32,
    pub invariants: Vec<String>,
    /// Hypotheses after prior normalization, in generation order.
    pub hypotheses: Vec<Hypothesis>,
    /// `scores[i]` belongs to `hypotheses[i]`.
    pub scores: Vec<f64>,
    pub chosen: Option<HypothesisId>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceStopCondition {
    pub target: String,
    pub cycles: u32,
    pub reason: StopReason,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiViewConsistent {
    pub sources: Vec<String>,
    /// Hex digest of the agreed payload; absent when no view was supplied.
    pub digest: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiViewMismatch {
    pub sources: Vec<String>,
    pub residue: Residue,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeIssued {
    pub target: String,
    pub challenge_type: ChallengeType,
    pub question: String,
    /// Head index pinned when the challenge was issued.
    pub anchor_index: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeResponse {
    pub challenge_id: EventId,
    pub target: String,
    pub challenge_type: ChallengeType,
    pub answer: String,
    pub passed: bool,
    pub reason: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectionCheckpoint {
    pub domain: Option<Domain>,
    pub through_index: u64,
    pub digest: String,
}

macro_rules! event_payloads {
    ($($variant:ident => $kind:ident),* $(,)?) => {
        /// Kind-dependent payload of an [`EventRecord`].
        #[derive(Clone, Debug, PartialEq)]
        pub enum EventPayload {
            $($variant($variant),)*
            /// Payload of a kind this build does not model.
            Opaque(Value),
        }

        impl EventPayload {
            /// Canonical kind for typed payloads; `None` for `Opaque`.
            pub fn kind(&self) -> Option<&'static str> {
                match self {
                    $(EventPayload::$variant(_) => Some(kinds::$kind),)*
                    EventPayload::Opaque(_) => None,
                }
            }

            pub fn to_value(&self) -> Result<Value> {
                let value = match self {
                    $(EventPayload::$variant(inner) => serde_json::to_value(inner)?,)*
                    EventPayload::Opaque(value) => value.clone(),
                };
                Ok(value)
            }

            /// Decode a persisted payload.
            ///
            /// A known kind whose value does not re-encode to exactly the same
            /// JSON falls back to `Opaque`, so the stored hash stays verifiable.
            pub fn decode(kind: &str, value: Value) -> Self {
                let typed = match kind {
                    $(kinds::$kind => serde_json::from_value(value.clone()).map(EventPayload::$variant),)*
                    _ => return EventPayload::Opaque(value),
                };
                match typed {
                    Ok(payload) if payload.to_value().ok().as_ref() == Some(&value) => payload,
                    _ => EventPayload::Opaque(value),
                }
            }

            pub fn is_known_kind(kind: &str) -> bool {
                matches!(kind, $(kinds::$kind)|*)
            }
        }
    };
}

event_payloads! {
    Genesis => GENESIS,
    PlayerJoin => PLAYER_JOIN,
    PlayerMove => PLAYER_MOVE,
    MoveRejected => MOVE_REJECTED,
    Rollback => ROLLBACK,
    RecurrenceCycle => RECURRENCE_CYCLE,
    RecurrenceStopCondition => RECURRENCE_STOP_CONDITION,
    MultiViewConsistent => MULTI_VIEW_CONSISTENT,
    MultiViewMismatch => MULTI_VIEW_MISMATCH,
    ChallengeIssued => CHALLENGE_ISSUED,
    ChallengeResponse => CHALLENGE_RESPONSE,
    ProjectionCheckpoint => PROJECTION_CHECKPOINT,
}

impl EventPayload {
    /// Hash input: compact JSON with object keys in sorted order.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.to_value()?)?)
    }
}

/// One immutable, hash-linked fact.
#[derive(Clone, Debug, PartialEq)]
pub struct EventRecord {
    id: EventId,
    index: u64,
    timestamp: u64,
    domain: Domain,
    kind: String,
    payload: EventPayload,
    prev_hash: Hash,
    hash: Hash,
}

impl EventRecord {
    /// Link a new record. Only the log calls this.
    pub(crate) fn link(
        index: u64,
        timestamp: u64,
        domain: Domain,
        kind: String,
        payload: EventPayload,
        prev_hash: Hash,
    ) -> Result<Self> {
        // The hash covers only the name, so a built-in domain spelled as `Custom`
        // must be stored as the built-in variant it decodes to.
        let domain = match domain {
            Domain::Custom(name) => Domain::from_name(&name),
            known => known,
        };
        let payload_bytes = payload.canonical_bytes()?;
        let hash = record_hash(index, timestamp, &domain, &kind, &payload_bytes, &prev_hash);
        Ok(Self {
            id: EventId::from_hash(&hash),
            index,
            timestamp,
            domain,
            kind,
            payload,
            prev_hash,
            hash,
        })
    }

    pub fn id(&self) -> &EventId {
        &self.id
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn payload(&self) -> &EventPayload {
        &self.payload
    }

    pub fn prev_hash(&self) -> &Hash {
        &self.prev_hash
    }

    pub fn hash(&self) -> &Hash {
        &self.hash
    }

    /// Recompute the hash from the record's own fields.
    pub fn compute_hash(&self) -> Result<Hash> {
        let payload_bytes = self.payload.canonical_bytes()?;
        Ok(record_hash(
            self.index,
            self.timestamp,
            &self.domain,
            &self.kind,
            &payload_bytes,
            &self.prev_hash,
        ))
    }

    #[cfg(test)]
    pub(crate) fn tamper_payload(&mut self, payload: EventPayload) {
        self.payload = payload;
    }

    #[cfg(test)]
    pub(crate) fn tamper_prev_hash(&mut self, prev_hash: Hash) {
        self.prev_hash = prev_hash;
    }
}

/// Storage-agnostic persisted form of a record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordRow {
    pub index: u64,
    pub timestamp: u64,
    pub domain: String,
    pub kind: String,
    pub payload: Value,
    pub prev_hash: String,
    pub hash: String,
}

impl TryFrom<&EventRecord> for RecordRow {
    type Error = KernelError;

    fn try_from(record: &EventRecord) -> Result<Self> {
        Ok(Self {
            index: record.index,
            timestamp: record.timestamp,
            domain: record.domain.as_str().to_string(),
            kind: record.kind.clone(),
            payload: record.payload.to_value()?,
            prev_hash: hash_hex(&record.prev_hash),
            hash: hash_hex(&record.hash),
        })
    }
}

impl TryFrom<RecordRow> for EventRecord {
    type Error = KernelError;

    /// Rebuild a record from a row without checking its hash; that is
    /// [`verify_records`](crate::log::verify::verify_records)'s job.
    fn try_from(row: RecordRow) -> Result<Self> {
        let prev_hash = parse_hash_hex(&row.prev_hash).ok_or_else(|| {
            KernelError::Encoding(format!("row {}: bad prev_hash {:?}", row.index, row.prev_hash))
        })?;
        let hash = parse_hash_hex(&row.hash).ok_or_else(|| {
            KernelError::Encoding(format!("row {}: bad hash {:?}", row.index, row.hash))
        })?;
        let payload = EventPayload::decode(&row.kind, row.payload);

        Ok(Self {
            id: EventId::from_hash(&hash),
            index: row.index,
            timestamp: row.timestamp,
            domain: Domain::from_name(&row.domain),
            kind: row.kind,
            payload,
            prev_hash,
            hash,
        })
    }
}

impl Serialize for EventRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let row = RecordRow::try_from(self).map_err(serde::ser::Error::custom)?;
        row.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for EventRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let row = RecordRow::deserialize(deserializer)?;
        EventRecord::try_from(row).map_err(serde::de::Error::custom)
    }
}
