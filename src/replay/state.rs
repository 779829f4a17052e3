// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Game State Derivation
//!
//! Pure fold from matching records to [`GameState`]. No clock, randomness or
//! I/O: identical record prefixes give byte-identical state.
//!
//! # Transitions
//! - `PLAYER_JOIN`: insert the player at the origin with default health, if absent
//! - `PLAYER_MOVE`: apply the delta if the player exists and the target stays
//!   within bounds; otherwise the move is rejected and left unapplied
//! - `MOVE_REJECTED`: marks a rejection as already recorded, no state change
//! - `ROLLBACK`: restore the state at `to_point`
//!
//! Tick advances once per accepted move.

use crate::config::KernelConfig;
use crate::error::Result;
use crate::event::{EventPayload, EventRecord, MoveRejected, PlayerMove, RejectReason};
use crate::types::{Domain, Hash, MatchId, PlayerId};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerState {
    pub x: i64,
    pub y: i64,
    pub health: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastMove {
    pub player_id: PlayerId,
    pub dx: i64,
    pub dy: i64,
    /// Index of the accepted `PLAYER_MOVE` record.
    pub index: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameState {
    pub match_id: MatchId,
    pub tick: u64,
    pub players: BTreeMap<PlayerId, PlayerState>,
    pub last_move: Option<LastMove>,
}

/// Replay output for a single match.
pub type DomainState = GameState;

impl GameState {
    pub fn new(match_id: MatchId) -> Self {
        Self {
            match_id,
            tick: 0,
            players: BTreeMap::new(),
            last_move: None,
        }
    }

    /// BLAKE3 over the bincode encoding.
    pub fn digest(&self) -> Result<Hash> {
        let bytes = bincode::serde::encode_to_vec(self, bincode::config::standard())?;
        Ok(*blake3::hash(&bytes).as_bytes())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRules {
    /// Positions must satisfy `|x| <= bound` and `|y| <= bound`.
    pub arena_bound: i64,
    pub default_health: u32,
}

impl Default for GameRules {
    fn default() -> Self {
        Self::from(&KernelConfig::default())
    }
}

impl From<&KernelConfig> for GameRules {
    fn from(config: &KernelConfig) -> Self {
        Self {
            arena_bound: config.arena_bound,
            default_health: config.default_health,
        }
    }
}

impl GameRules {
    /// Check a move against the current state and return the new position.
    pub fn check_move(&self, state: &GameState, mv: &PlayerMove) -> std::result::Result<(i64, i64), RejectReason> {
        let player = state.players.get(&mv.player_id).ok_or(RejectReason::NotJoined)?;
        let x = player.x.checked_add(mv.dx).ok_or(RejectReason::OutOfBounds)?;
        let y = player.y.checked_add(mv.dy).ok_or(RejectReason::OutOfBounds)?;
        if x.abs() > self.arena_bound || y.abs() > self.arena_bound {
            return Err(RejectReason::OutOfBounds);
        }
        Ok((x, y))
    }
}

/// State at a given tick plus the number of intent records folded to reach it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub state: GameState,
    pub events_folded: u64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Derivation {
    pub state: GameState,
    /// Join and move records folded into `state`, counting rejected moves.
    pub events_folded: u64,
    /// `frames[t]` is the latest state reached at tick `t`.
    pub frames: Vec<Frame>,
    /// Every rejected move in the fold, keyed by `PLAYER_MOVE` index.
    pub rejected: BTreeMap<u64, RejectReason>,
    /// Rejections with no `MOVE_REJECTED` record yet, in index order.
    pub pending: Vec<MoveRejected>,
}

impl Derivation {
    pub fn frame_at(&self, tick: u64) -> Option<&Frame> {
        usize::try_from(tick).ok().and_then(|t| self.frames.get(t))
    }
}

pub fn match_of(payload: &EventPayload) -> Option<&MatchId> {
    match payload {
        EventPayload::PlayerJoin(p) => Some(&p.match_id),
        EventPayload::PlayerMove(p) => Some(&p.match_id),
        EventPayload::MoveRejected(p) => Some(&p.match_id),
        EventPayload::Rollback(p) => Some(&p.match_id),
        _ => None,
    }
}

/// Fold the records of `domain` belonging to `key`, in index order.
pub fn derive(rules: &GameRules, domain: &Domain, key: &MatchId, events: &[EventRecord]) -> Derivation {
    let matching: Vec<&EventRecord> = events
        .iter()
        .filter(|r| r.domain() == domain && match_of(r.payload()) == Some(key))
        .collect();

    let recorded: FxHashSet<u64> = matching
        .iter()
        .filter_map(|r| match r.payload() {
            EventPayload::MoveRejected(rejected) => Some(rejected.move_index),
            _ => None,
        })
        .collect();

    let mut state = GameState::new(key.clone());
    let mut events_folded = 0u64;
    let mut frames = vec![Frame {
        state: state.clone(),
        events_folded,
    }];
    let mut rejected = BTreeMap::new();
    let mut pending = Vec::new();

    for record in matching {
        match record.payload() {
            EventPayload::PlayerJoin(join) => {
                state.players.entry(join.player_id.clone()).or_insert(PlayerState {
                    x: 0,
                    y: 0,
                    health: rules.default_health,
                });
                events_folded += 1;
            }
            EventPayload::PlayerMove(mv) => {
                events_folded += 1;
                match rules.check_move(&state, mv) {
                    Ok((x, y)) => {
                        if let Some(player) = state.players.get_mut(&mv.player_id) {
                            player.x = x;
                            player.y = y;
                        }
                        state.tick += 1;
                        state.last_move = Some(LastMove {
                            player_id: mv.player_id.clone(),
                            dx: mv.dx,
                            dy: mv.dy,
                            index: record.index(),
                        });
                        frames.push(Frame {
                            state: state.clone(),
                            events_folded,
                        });
                        continue;
                    }
                    Err(reason) => {
                        rejected.insert(record.index(), reason);
                        if !recorded.contains(&record.index()) {
                            pending.push(MoveRejected {
                                match_id: mv.match_id.clone(),
                                player_id: mv.player_id.clone(),
                                move_index: record.index(),
                                dx: mv.dx,
                                dy: mv.dy,
                                reason,
                            });
                        }
                    }
                }
            }
            EventPayload::Rollback(rollback) => {
                let target = usize::try_from(rollback.to_point).ok().filter(|t| *t < frames.len());
                if let Some(t) = target {
                    frames.truncate(t + 1);
                    if let Some(frame) = frames.last() {
                        state = frame.state.clone();
                        events_folded = frame.events_folded;
                    }
                }
                continue;
            }
            _ => continue,
        }

        // Same tick: replace the latest frame.
        if let Some(frame) = frames.last_mut() {
            frame.state = state.clone();
            frame.events_folded = events_folded;
        }
    }

    Derivation {
        state,
        events_folded,
        frames,
        rejected,
        pending,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mv(player: &str, dx: i64, dy: i64) -> PlayerMove {
        PlayerMove {
            match_id: "m1".into(),
            player_id: player.into(),
            dx,
            dy,
        }
    }

    #[test]
    fn test_check_move_bounds() {
        let rules = GameRules::default();
        let mut state = GameState::new("m1".into());
        state.players.insert("p1".into(), PlayerState { x: 9, y: -10, health: 100 });

        assert_eq!(rules.check_move(&state, &mv("p1", 1, 0)), Ok((10, -10)));
        assert_eq!(rules.check_move(&state, &mv("p1", 2, 0)), Err(RejectReason::OutOfBounds));
        assert_eq!(rules.check_move(&state, &mv("p1", 0, -1)), Err(RejectReason::OutOfBounds));
        assert_eq!(rules.check_move(&state, &mv("p2", 0, 0)), Err(RejectReason::NotJoined));
    }

    #[test]
    fn test_check_move_overflow_is_out_of_bounds() {
        let rules = GameRules::default();
        let mut state = GameState::new("m1".into());
        state.players.insert("p1".into(), PlayerState { x: 1, y: 0, health: 100 });

        assert_eq!(rules.check_move(&state, &mv("p1", i64::MAX, 0)), Err(RejectReason::OutOfBounds));
    }

    #[test]
    fn test_digest_tracks_state() {
        let a = GameState::new("m1".into());
        let mut b = a.clone();
        assert_eq!(a.digest().unwrap(), b.digest().unwrap());

        b.tick = 1;
        assert_ne!(a.digest().unwrap(), b.digest().unwrap());
    }
}
