// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Append-Only Event Log
//!
//! This is the CANONICAL source of truth. Every other component derives its
//! state from the chain and writes only through [`EventLog::append`].
//!
//! # Guarantees
//! - Appends are linearizable: tail read, link and commit happen under one lock
//! - A record is handed to the sink before it becomes visible
//! - A failed append leaves the chain exactly as it was
//! - Readers pin an immutable [`Chain`] and never block the writer for long
//!
//! # Layout
//! ```text
//! [Genesis][Record 1][Record 2]...
//!     prev_hash = GENESIS_HASH, then prev_hash = hash of record i-1
//! ```

pub mod hash;
pub mod sink;
pub mod verify;

use crate::clock::{Clock, SystemClock};
use crate::config::{GENESIS_HASH, LOG_FORMAT_VERSION};
use crate::error::{KernelError, Result, ValidationError};
use crate::event::{kinds, EventPayload, EventRecord, Genesis};
use crate::types::{Domain, EventId};
use sink::{LogSink, MemorySink};
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, error, info, warn};
use verify::{verify_records, IntegrityReport};

/// Immutable point-in-time view of all committed records, in index order.
#[derive(Clone, Debug)]
pub struct Chain {
    records: Arc<Vec<EventRecord>>,
}

impl Chain {
    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }

    /// Last committed record. `None` only for an empty record set; a log
    /// always holds at least its genesis record.
    pub fn head(&self) -> Option<&EventRecord> {
        self.records.last()
    }

    pub fn get(&self, index: u64) -> Option<&EventRecord> {
        usize::try_from(index).ok().and_then(|i| self.records.get(i))
    }

    pub fn find(&self, id: &EventId) -> Option<&EventRecord> {
        self.records.iter().find(|record| record.id() == id)
    }

    /// Records `0..=index`.
    pub fn prefix_through(&self, index: u64) -> &[EventRecord] {
        let end = usize::try_from(index)
            .map(|i| i.saturating_add(1))
            .unwrap_or(usize::MAX)
            .min(self.records.len());
        &self.records[..end]
    }

    pub fn verify(&self) -> IntegrityReport {
        verify_records(&self.records)
    }
}

impl Deref for Chain {
    type Target = [EventRecord];

    fn deref(&self) -> &Self::Target {
        &self.records
    }
}

struct Writer {
    sink: Box<dyn LogSink>,
    clock: Arc<dyn Clock>,
}

/// Append-only, hash-linked event log.
///
/// Constructed explicitly and shared by `Arc`; there is no global instance.
pub struct EventLog {
    writer: Mutex<Writer>,
    published: RwLock<Arc<Vec<EventRecord>>>,
    /// Appends that had to copy the records because a [`Chain`] pinned them.
    pinned_copies: AtomicU64,
}

impl std::fmt::Debug for EventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let len = self.published.read().map(|records| records.len()).unwrap_or(0);
        f.debug_struct("EventLog").field("len", &len).finish()
    }
}

impl EventLog {
    /// In-memory log on the wall clock.
    pub fn new() -> Result<Self> {
        Self::with_parts(Box::new(MemorySink), Arc::new(SystemClock))
    }

    /// Fresh log: writes the genesis record through `sink`.
    pub fn with_parts(sink: Box<dyn LogSink>, clock: Arc<dyn Clock>) -> Result<Self> {
        let log = Self {
            writer: Mutex::new(Writer { sink, clock }),
            published: RwLock::new(Arc::new(Vec::new())),
            pinned_copies: AtomicU64::new(0),
        };
        log.commit(
            Domain::Kernel,
            kinds::GENESIS.to_string(),
            EventPayload::Genesis(Genesis {
                format_version: LOG_FORMAT_VERSION,
            }),
        )?;
        info!("Event log created with genesis record");
        Ok(log)
    }

    /// Rebuild a log from persisted records.
    ///
    /// The records are verified first; a broken chain is refused, never
    /// repaired. An empty set bootstraps a fresh genesis through `sink`.
    pub fn restore(
        records: Vec<EventRecord>,
        sink: Box<dyn LogSink>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        if records.is_empty() {
            return Self::with_parts(sink, clock);
        }

        let report = verify_records(&records);
        if let Err(e) = report.into_result() {
            warn!(index = e.index, reason = %e.reason, "Refusing to restore broken chain");
            return Err(e.into());
        }

        info!(records = records.len(), "Event log restored");
        Ok(Self {
            writer: Mutex::new(Writer { sink, clock }),
            published: RwLock::new(Arc::new(records)),
            pinned_copies: AtomicU64::new(0),
        })
    }

    /// Append one record.
    ///
    /// Assigns index, timestamp and hash link. Either the fully linked record
    /// is committed and returned, or nothing changes.
    pub fn append(&self, domain: Domain, kind: &str, payload: EventPayload) -> Result<EventRecord> {
        validate_append(&domain, kind, &payload)?;
        self.commit(domain, kind.to_string(), payload)
    }

    fn commit(&self, domain: Domain, kind: String, payload: EventPayload) -> Result<EventRecord> {
        let mut writer = self.writer.lock().map_err(|_| KernelError::LockPoisoned)?;

        // Only the writer replaces `published`, so the tail cannot move under us.
        let (index, prev_hash) = {
            let published = self.published.read().map_err(|_| KernelError::LockPoisoned)?;
            match published.last() {
                Some(tail) => (tail.index() + 1, *tail.hash()),
                None => (0, GENESIS_HASH),
            }
        };

        let timestamp = writer.clock.now_millis();
        let record = EventRecord::link(index, timestamp, domain, kind, payload, prev_hash)?;

        if let Err(e) = writer.sink.persist(&record) {
            error!(index, kind = record.kind(), error = %e, "Durable write failed, record not committed");
            return Err(e.into());
        }

        {
            let mut published = self.published.write().map_err(|_| KernelError::LockPoisoned)?;
            if Arc::get_mut(&mut *published).is_none() {
                self.pinned_copies.fetch_add(1, Ordering::Relaxed);
                debug!(index, "Records pinned by a reader, copying before append");
            }
            Arc::make_mut(&mut *published).push(record.clone());
        }

        debug!(index, domain = %record.domain(), kind = record.kind(), id = %record.id(), "Appended event");
        Ok(record)
    }

    /// Pin the committed records as of now.
    pub fn chain(&self) -> Result<Chain> {
        let published = self.published.read().map_err(|_| KernelError::LockPoisoned)?;
        Ok(Chain {
            records: Arc::clone(&published),
        })
    }

    /// Recompute every hash and link on a pinned snapshot. Read-only.
    pub fn verify(&self) -> Result<IntegrityReport> {
        let report = self.chain()?.verify();
        if let (Some(index), Some(reason)) = (report.broken_at, report.reason) {
            warn!(index, %reason, "Event log integrity check failed");
        }
        Ok(report)
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.chain()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Number of appends that copied the record vector instead of pushing in place.
    pub fn pinned_copies(&self) -> u64 {
        self.pinned_copies.load(Ordering::Relaxed)
    }
}

fn validate_append(domain: &Domain, kind: &str, payload: &EventPayload) -> Result<()> {
    if domain.is_empty() {
        return Err(ValidationError::EmptyDomain.into());
    }
    if kind.trim().is_empty() {
        return Err(ValidationError::EmptyKind.into());
    }
    match payload.kind() {
        Some(expected) if expected != kind => Err(ValidationError::KindMismatch {
            expected: expected.to_string(),
            found: kind.to_string(),
        }
        .into()),
        None if EventPayload::is_known_kind(kind) => Err(ValidationError::KindMismatch {
            expected: "opaque".to_string(),
            found: kind.to_string(),
        }
        .into()),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::BreakReason;
    use crate::event::PlayerJoin;
    use crate::log::sink::SinkError;
    use serde_json::json;

    fn test_log() -> EventLog {
        EventLog::with_parts(Box::new(MemorySink), Arc::new(ManualClock::new(1_000))).unwrap()
    }

    fn join(player: &str) -> EventPayload {
        EventPayload::PlayerJoin(PlayerJoin {
            match_id: "m1".into(),
            player_id: player.into(),
        })
    }

    #[derive(Debug)]
    struct FailingSink {
        fail_from: u64,
    }

    impl LogSink for FailingSink {
        fn persist(&mut self, record: &EventRecord) -> std::result::Result<(), SinkError> {
            if record.index() >= self.fail_from {
                return Err(SinkError::Rejected {
                    index: record.index(),
                    reason: "disk full".to_string(),
                });
            }
            Ok(())
        }
    }

    #[test]
    fn test_genesis_links_to_constant() {
        let log = test_log();
        let chain = log.chain().unwrap();

        assert_eq!(chain.len(), 1);
        assert_eq!(chain.head().map(|r| r.index()), Some(0));
        let genesis = &chain[0];
        assert_eq!(genesis.index(), 0);
        assert_eq!(genesis.kind(), kinds::GENESIS);
        assert_eq!(genesis.domain(), &Domain::Kernel);
        assert_eq!(*genesis.prev_hash(), GENESIS_HASH);
        assert_ne!(*genesis.hash(), GENESIS_HASH);
    }

    #[test]
    fn test_append_links_to_tail() {
        let log = test_log();
        let a = log.append(Domain::Game, kinds::PLAYER_JOIN, join("p1")).unwrap();
        let b = log.append(Domain::Game, kinds::PLAYER_JOIN, join("p2")).unwrap();

        assert_eq!(a.index(), 1);
        assert_eq!(b.index(), 2);
        assert_eq!(b.prev_hash(), a.hash());
        assert_eq!(a.timestamp(), 1_001);
        assert!(log.verify().unwrap().ok);
    }

    #[test]
    fn test_append_validation_leaves_log_unchanged() {
        let log = test_log();

        let empty_domain = log.append(Domain::Custom(String::new()), "NOTE", EventPayload::Opaque(json!({})));
        assert!(matches!(empty_domain, Err(KernelError::Validation(ValidationError::EmptyDomain))));

        let empty_kind = log.append(Domain::Atlas, "  ", EventPayload::Opaque(json!({})));
        assert!(matches!(empty_kind, Err(KernelError::Validation(ValidationError::EmptyKind))));

        let mismatch = log.append(Domain::Game, kinds::PLAYER_MOVE, join("p1"));
        assert!(matches!(mismatch, Err(KernelError::Validation(ValidationError::KindMismatch { .. }))));

        let untyped = log.append(Domain::Game, kinds::PLAYER_JOIN, EventPayload::Opaque(json!({})));
        assert!(matches!(untyped, Err(KernelError::Validation(ValidationError::KindMismatch { .. }))));

        assert_eq!(log.len().unwrap(), 1);
    }

    #[test]
    fn test_unknown_kind_is_accepted_as_opaque() {
        let log = test_log();
        let record = log
            .append(Domain::Atlas, "TERRAIN_SCANNED", EventPayload::Opaque(json!({"cells": 4})))
            .unwrap();
        assert_eq!(record.kind(), "TERRAIN_SCANNED");
        assert!(log.verify().unwrap().ok);
    }

    #[test]
    fn test_sink_failure_commits_nothing() {
        let log = EventLog::with_parts(Box::new(FailingSink { fail_from: 2 }), Arc::new(ManualClock::new(0))).unwrap();
        log.append(Domain::Game, kinds::PLAYER_JOIN, join("p1")).unwrap();
        let before = log.chain().unwrap();

        let result = log.append(Domain::Game, kinds::PLAYER_JOIN, join("p2"));
        assert!(matches!(result, Err(KernelError::Durability(_))));

        let after = log.chain().unwrap();
        assert_eq!(after.len(), 2);
        assert_eq!(after.head().unwrap().hash(), before.head().unwrap().hash());
        assert!(log.verify().unwrap().ok);
    }

    #[test]
    fn test_pinned_chain_ignores_later_appends() {
        let log = test_log();
        let pinned = log.chain().unwrap();
        log.append(Domain::Game, kinds::PLAYER_JOIN, join("p1")).unwrap();

        assert_eq!(pinned.len(), 1);
        assert_eq!(log.chain().unwrap().len(), 2);
        assert_eq!(log.pinned_copies(), 1);

        drop(pinned);
        log.append(Domain::Game, kinds::PLAYER_JOIN, join("p2")).unwrap();
        assert_eq!(log.pinned_copies(), 1);
    }

    #[test]
    fn test_tampered_payload_is_detected() {
        let log = test_log();
        log.append(Domain::Game, kinds::PLAYER_JOIN, join("p1")).unwrap();
        log.append(Domain::Game, kinds::PLAYER_JOIN, join("p2")).unwrap();

        let mut records = log.chain().unwrap().records().to_vec();
        records[1].tamper_payload(join("mallory"));

        let report = verify_records(&records);
        assert!(!report.ok);
        assert_eq!(report.broken_at, Some(1));
        assert_eq!(report.reason, Some(BreakReason::HashMismatch));
        assert_eq!(report.checked, 1);
    }

    #[test]
    fn test_tampered_genesis_link_is_detected() {
        let log = test_log();
        let mut records = log.chain().unwrap().records().to_vec();
        records[0].tamper_prev_hash([7u8; 32]);

        let report = verify_records(&records);
        assert_eq!(report.broken_at, Some(0));
        assert_eq!(report.reason, Some(BreakReason::BadGenesis));
    }

    #[test]
    fn test_missing_record_is_index_gap() {
        let log = test_log();
        log.append(Domain::Game, kinds::PLAYER_JOIN, join("p1")).unwrap();
        log.append(Domain::Game, kinds::PLAYER_JOIN, join("p2")).unwrap();

        let mut records = log.chain().unwrap().records().to_vec();
        records.remove(1);

        let err = verify_records(&records).into_result().unwrap_err();
        assert_eq!(err.index, 1);
        assert_eq!(err.reason, BreakReason::IndexGap { expected: 1 });
    }

    #[test]
    fn test_restore_continues_chain() {
        let log = test_log();
        log.append(Domain::Game, kinds::PLAYER_JOIN, join("p1")).unwrap();
        let records = log.chain().unwrap().records().to_vec();

        let restored = EventLog::restore(records, Box::new(MemorySink), Arc::new(ManualClock::new(5_000))).unwrap();
        let next = restored.append(Domain::Game, kinds::PLAYER_JOIN, join("p2")).unwrap();

        assert_eq!(next.index(), 2);
        assert!(restored.verify().unwrap().ok);
    }

    #[test]
    fn test_restore_refuses_broken_chain() {
        let log = test_log();
        log.append(Domain::Game, kinds::PLAYER_JOIN, join("p1")).unwrap();
        let mut records = log.chain().unwrap().records().to_vec();
        records[1].tamper_payload(join("p9"));

        let result = EventLog::restore(records, Box::new(MemorySink), Arc::new(ManualClock::new(0)));
        assert!(matches!(result, Err(KernelError::Integrity(_))));
    }

    #[test]
    fn test_restore_empty_bootstraps_genesis() {
        let log = EventLog::restore(Vec::new(), Box::new(MemorySink), Arc::new(ManualClock::new(0))).unwrap();
        assert_eq!(log.len().unwrap(), 1);
        assert_eq!(log.chain().unwrap()[0].kind(), kinds::GENESIS);
    }
}
