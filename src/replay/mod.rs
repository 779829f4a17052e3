// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Replay Engine
//!
//! Reconstructs match state from the log and records the outcome of every
//! transition that could not be applied. Rejections and rollbacks are new
//! events; prior history is never edited.
//!
//! # Reconciliation
//! `replay` and `rollback` run under one lock, so each rejected move gets
//! exactly one `MOVE_REJECTED` record even with concurrent callers.

pub mod state;

use crate::error::{KernelError, Result, ValidationError};
use crate::event::{kinds, EventPayload, EventRecord, PlayerJoin, PlayerMove, RejectReason, Rollback};
use crate::log::EventLog;
use crate::types::{Domain, MatchId, PlayerId};
use state::{derive, Derivation, GameRules, GameState};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MoveOutcome {
    Accepted,
    Rejected(RejectReason),
}

pub struct ReplayEngine {
    log: Arc<EventLog>,
    rules: GameRules,
    reconcile: Mutex<()>,
}

impl ReplayEngine {
    pub fn new(log: Arc<EventLog>, rules: GameRules) -> Self {
        Self {
            log,
            rules,
            reconcile: Mutex::new(()),
        }
    }

    pub fn rules(&self) -> &GameRules {
        &self.rules
    }

    /// Pure derivation over `events`. Appends nothing.
    pub fn derive_state(&self, domain: &Domain, key: &MatchId, events: &[EventRecord]) -> GameState {
        derive(&self.rules, domain, key, events).state
    }

    /// Derive from the pinned chain and record pending rejections.
    pub fn replay(&self, domain: &Domain, key: &MatchId) -> Result<GameState> {
        let _guard = self.reconcile.lock().map_err(|_| KernelError::LockPoisoned)?;
        let derivation = self.reconcile(domain, key)?;
        Ok(derivation.state)
    }

    /// Reset `key` to its state after `to_point` accepted moves.
    ///
    /// Records `ROLLBACK {from_point, to_point, events_replayed}`; later folds
    /// continue from the restored state.
    pub fn rollback(&self, domain: &Domain, key: &MatchId, to_point: u64) -> Result<GameState> {
        let _guard = self.reconcile.lock().map_err(|_| KernelError::LockPoisoned)?;
        let derivation = self.reconcile(domain, key)?;

        let from_point = derivation.state.tick;
        let frame = derivation
            .frame_at(to_point)
            .filter(|_| to_point <= from_point)
            .ok_or(ValidationError::RollbackBeyondHead { from_point, to_point })?;

        self.log.append(
            domain.clone(),
            kinds::ROLLBACK,
            EventPayload::Rollback(Rollback {
                match_id: key.clone(),
                from_point,
                to_point,
                events_replayed: frame.events_folded,
            }),
        )?;
        info!(match_id = %key, from_point, to_point, events_replayed = frame.events_folded, "Rolled back match");
        Ok(frame.state.clone())
    }

    pub fn join(&self, domain: &Domain, key: &MatchId, player: &PlayerId) -> Result<GameState> {
        self.log.append(
            domain.clone(),
            kinds::PLAYER_JOIN,
            EventPayload::PlayerJoin(PlayerJoin {
                match_id: key.clone(),
                player_id: player.clone(),
            }),
        )?;
        self.replay(domain, key)
    }

    /// Record a move intent, then reconcile and report whether it applied.
    pub fn submit_move(
        &self,
        domain: &Domain,
        key: &MatchId,
        player: &PlayerId,
        dx: i64,
        dy: i64,
    ) -> Result<MoveOutcome> {
        let record = self.log.append(
            domain.clone(),
            kinds::PLAYER_MOVE,
            EventPayload::PlayerMove(PlayerMove {
                match_id: key.clone(),
                player_id: player.clone(),
                dx,
                dy,
            }),
        )?;

        let _guard = self.reconcile.lock().map_err(|_| KernelError::LockPoisoned)?;
        let derivation = self.reconcile(domain, key)?;
        Ok(match derivation.rejected.get(&record.index()) {
            Some(reason) => MoveOutcome::Rejected(*reason),
            None => MoveOutcome::Accepted,
        })
    }

    /// Caller holds `reconcile`.
    ///
    /// The pinned chain is released before appending, so the log can push in place.
    fn reconcile(&self, domain: &Domain, key: &MatchId) -> Result<Derivation> {
        let derivation = {
            let chain = self.log.chain()?;
            derive(&self.rules, domain, key, &chain)
        };
        for rejection in &derivation.pending {
            warn!(
                match_id = %rejection.match_id,
                player_id = %rejection.player_id,
                move_index = rejection.move_index,
                reason = rejection.reason.as_str(),
                "Move rejected"
            );
            self.log.append(
                domain.clone(),
                kinds::MOVE_REJECTED,
                EventPayload::MoveRejected(rejection.clone()),
            )?;
        }
        Ok(derivation)
    }
}
