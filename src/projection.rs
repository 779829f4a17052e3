// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Projections: derived read-models folded from the chain.
//!
//! A projection is a pure function of the records it is given. Folding the
//! same prefix twice yields equal projections, and extending the prefix only
//! ever adds to the aggregate. Payloads of kinds this build does not model
//! are counted in `ignored` and otherwise skipped.

use crate::arbiter::StopReason;
use crate::error::Result;
use crate::event::{kinds, EventPayload, EventRecord, ProjectionCheckpoint};
use crate::log::EventLog;
use crate::types::{hash_hex, Domain, EventId, Hash, HypothesisId, MatchId, PlayerId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSummary {
    pub players: BTreeSet<PlayerId>,
    pub moves_submitted: u64,
    pub moves_rejected: u64,
    pub rollbacks: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArbitrationSummary {
    pub cycles: u64,
    pub last_chosen: Option<HypothesisId>,
    pub stopped: Option<StopReason>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefereeSummary {
    pub views_consistent: u64,
    pub views_mismatched: u64,
    pub challenges_issued: u64,
    pub challenges_passed: u64,
    pub challenges_failed: u64,
}

/// Aggregate over a filtered, ordered subsequence of the chain.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Projection {
    pub domain: Option<Domain>,
    /// Records that passed the domain filter.
    pub event_count: u64,
    pub through_index: Option<u64>,
    pub head_hash: Option<String>,
    pub kinds: BTreeMap<String, u64>,
    pub matches: BTreeMap<MatchId, MatchSummary>,
    pub arbitration: BTreeMap<String, ArbitrationSummary>,
    pub referee: RefereeSummary,
    pub checkpoints: u64,
    /// Records whose kind this build does not model.
    pub ignored: u64,
}

impl Projection {
    pub fn new(domain: Option<Domain>) -> Self {
        Self {
            domain,
            ..Self::default()
        }
    }

    /// Fold one record. Records outside the domain filter are skipped.
    pub fn apply(&mut self, record: &EventRecord) {
        if let Some(domain) = &self.domain {
            if record.domain() != domain {
                return;
            }
        }

        self.event_count += 1;
        self.through_index = Some(record.index());
        self.head_hash = Some(hash_hex(record.hash()));

        if let EventPayload::Opaque(_) = record.payload() {
            self.ignored += 1;
            return;
        }
        *self.kinds.entry(record.kind().to_string()).or_insert(0) += 1;

        match record.payload() {
            EventPayload::PlayerJoin(join) => {
                self.matches
                    .entry(join.match_id.clone())
                    .or_default()
                    .players
                    .insert(join.player_id.clone());
            }
            EventPayload::PlayerMove(mv) => {
                self.matches.entry(mv.match_id.clone()).or_default().moves_submitted += 1;
            }
            EventPayload::MoveRejected(rejected) => {
                self.matches.entry(rejected.match_id.clone()).or_default().moves_rejected += 1;
            }
            EventPayload::Rollback(rollback) => {
                self.matches.entry(rollback.match_id.clone()).or_default().rollbacks += 1;
            }
            EventPayload::RecurrenceCycle(cycle) => {
                let summary = self.arbitration.entry(cycle.target.clone()).or_default();
                summary.cycles += 1;
                if cycle.chosen.is_some() {
                    summary.last_chosen = cycle.chosen.clone();
                }
            }
            EventPayload::RecurrenceStopCondition(stop) => {
                self.arbitration.entry(stop.target.clone()).or_default().stopped = Some(stop.reason);
            }
            EventPayload::MultiViewConsistent(_) => self.referee.views_consistent += 1,
            EventPayload::MultiViewMismatch(_) => self.referee.views_mismatched += 1,
            EventPayload::ChallengeIssued(_) => self.referee.challenges_issued += 1,
            EventPayload::ChallengeResponse(response) => {
                if response.passed {
                    self.referee.challenges_passed += 1;
                } else {
                    self.referee.challenges_failed += 1;
                }
            }
            EventPayload::ProjectionCheckpoint(_) => self.checkpoints += 1,
            EventPayload::Genesis(_) | EventPayload::Opaque(_) => {}
        }
    }

    /// BLAKE3 over the bincode encoding.
    pub fn digest(&self) -> Result<Hash> {
        let bytes = bincode::serde::encode_to_vec(self, bincode::config::standard())?;
        Ok(*blake3::hash(&bytes).as_bytes())
    }
}

/// Fold `events` in order under an optional domain filter.
pub fn project(events: &[EventRecord], domain: Option<&Domain>) -> Projection {
    let mut projection = Projection::new(domain.cloned());
    for record in events {
        projection.apply(record);
    }
    projection
}

/// Result of re-folding the prefix a checkpoint covered.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointCheck {
    pub checkpoint: EventId,
    pub through_index: u64,
    pub recorded: String,
    pub recomputed: String,
}

impl CheckpointCheck {
    pub fn matches(&self) -> bool {
        self.recorded == self.recomputed
    }
}

pub struct ProjectionEngine {
    log: Arc<EventLog>,
}

impl ProjectionEngine {
    pub fn new(log: Arc<EventLog>) -> Self {
        Self { log }
    }

    pub fn project(&self, events: &[EventRecord], domain: Option<&Domain>) -> Projection {
        project(events, domain)
    }

    /// Project the chain as pinned now.
    pub fn project_current(&self, domain: Option<&Domain>) -> Result<Projection> {
        let chain = self.log.chain()?;
        Ok(project(&chain, domain))
    }

    /// Record the digest of the current projection.
    pub fn checkpoint(&self, domain: Option<Domain>) -> Result<EventRecord> {
        let (projection, through_index) = {
            let chain = self.log.chain()?;
            let through_index = chain.head().map(|r| r.index()).unwrap_or(0);
            (project(&chain, domain.as_ref()), through_index)
        };
        let digest = hash_hex(&projection.digest()?);

        let record = self.log.append(
            Domain::Projection,
            kinds::PROJECTION_CHECKPOINT,
            EventPayload::ProjectionCheckpoint(ProjectionCheckpoint {
                domain,
                through_index,
                digest,
            }),
        )?;
        info!(through_index, id = %record.id(), "Projection checkpoint recorded");
        Ok(record)
    }

    /// Re-fold the prefix behind checkpoint `id`.
    ///
    /// `None` when `id` is not a checkpoint record in the current chain.
    pub fn verify_checkpoint(&self, id: &EventId) -> Result<Option<CheckpointCheck>> {
        let chain = self.log.chain()?;
        let checkpoint = match chain.find(id).map(|r| r.payload()) {
            Some(EventPayload::ProjectionCheckpoint(checkpoint)) => checkpoint.clone(),
            _ => return Ok(None),
        };

        let prefix = chain.prefix_through(checkpoint.through_index);
        let recomputed = hash_hex(&project(prefix, checkpoint.domain.as_ref()).digest()?);
        let check = CheckpointCheck {
            checkpoint: id.clone(),
            through_index: checkpoint.through_index,
            recorded: checkpoint.digest,
            recomputed,
        };

        if check.matches() {
            debug!(id = %id, "Projection checkpoint still matches");
        } else {
            warn!(id = %id, through_index = check.through_index, "Projection checkpoint diverged");
        }
        Ok(Some(check))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::event::{PlayerJoin, PlayerMove};
    use crate::log::sink::MemorySink;
    use serde_json::json;

    fn seeded_log() -> Arc<EventLog> {
        let log = Arc::new(EventLog::with_parts(Box::new(MemorySink), Arc::new(ManualClock::new(0))).unwrap());
        log.append(
            Domain::Game,
            kinds::PLAYER_JOIN,
            EventPayload::PlayerJoin(PlayerJoin {
                match_id: "m1".into(),
                player_id: "p1".into(),
            }),
        )
        .unwrap();
        log.append(
            Domain::Game,
            kinds::PLAYER_MOVE,
            EventPayload::PlayerMove(PlayerMove {
                match_id: "m1".into(),
                player_id: "p1".into(),
                dx: 1,
                dy: 0,
            }),
        )
        .unwrap();
        log.append(Domain::Game, "WEATHER_CHANGED", EventPayload::Opaque(json!({"rain": true})))
            .unwrap();
        log.append(Domain::Atlas, "REGION_MAPPED", EventPayload::Opaque(json!({"id": 1})))
            .unwrap();
        log
    }

    #[test]
    fn test_project_is_idempotent() {
        let log = seeded_log();
        let chain = log.chain().unwrap();

        let a = project(&chain, Some(&Domain::Game));
        let b = project(&chain, Some(&Domain::Game));
        assert_eq!(a, b);
        assert_eq!(a.digest().unwrap(), b.digest().unwrap());
    }

    #[test]
    fn test_project_is_monotonic() {
        let log = seeded_log();
        let chain = log.chain().unwrap();

        let mut previous = project(&chain[..0], None);
        for end in 1..=chain.len() {
            let current = project(&chain[..end], None);
            assert!(current.event_count >= previous.event_count);
            for (kind, count) in &previous.kinds {
                assert!(current.kinds.get(kind).copied().unwrap_or(0) >= *count);
            }
            previous = current;
        }
    }

    #[test]
    fn test_filter_and_unknown_kinds() {
        let log = seeded_log();
        let chain = log.chain().unwrap();
        let game = project(&chain, Some(&Domain::Game));

        assert_eq!(game.event_count, 3);
        assert_eq!(game.ignored, 1);
        assert!(!game.kinds.contains_key("WEATHER_CHANGED"));

        let summary = &game.matches[&MatchId::from("m1")];
        assert!(summary.players.contains(&PlayerId::from("p1")));
        assert_eq!(summary.moves_submitted, 1);
    }

    #[test]
    fn test_checkpoint_verifies_after_growth() {
        let log = seeded_log();
        let engine = ProjectionEngine::new(Arc::clone(&log));

        let checkpoint = engine.checkpoint(Some(Domain::Game)).unwrap();
        log.append(Domain::Game, "WEATHER_CHANGED", EventPayload::Opaque(json!({"rain": false})))
            .unwrap();

        let check = engine.verify_checkpoint(checkpoint.id()).unwrap().unwrap();
        assert!(check.matches());
        assert_eq!(check.through_index, 4);

        assert!(engine.verify_checkpoint(&EventId::from("evt_missing")).unwrap().is_none());
    }
}
