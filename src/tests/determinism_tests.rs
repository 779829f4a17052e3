// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use super::test_kernel;
use crate::clock::ManualClock;
use crate::event::EventRecord;
use crate::kernel::Kernel;
use crate::log::sink::MemorySink;
use crate::log::verify::verify_records;
use crate::log::EventLog;
use crate::projection::project;
use crate::replay::state::{derive, GameRules};
use crate::replay::MoveOutcome;
use crate::types::{Domain, Hash, MatchId, PlayerId};
use std::sync::Arc;

/// A simple deterministic RNG for tests.
struct Pcg32 {
    state: u64,
    inc: u64,
}

impl Pcg32 {
    fn new(seed: u64) -> Self {
        Self { state: seed, inc: 1 }
    }

    fn next_u32(&mut self) -> u32 {
        let oldstate = self.state;
        self.state = oldstate.wrapping_mul(6364136223846793005).wrapping_add(self.inc);
        let xorshifted = (((oldstate >> 18) ^ oldstate) >> 27) as u32;
        let rot = (oldstate >> 59) as u32;
        xorshifted.rotate_right(rot)
    }

    fn delta(&mut self) -> i64 {
        (self.next_u32() % 9) as i64 - 4
    }
}

/// Drives a seeded mix of joins, moves, rollbacks and arbitration cycles.
fn run_simulation(seed: u64, steps: usize) -> Kernel {
    let kernel = test_kernel();
    let mut rng = Pcg32::new(seed);
    let game = Domain::Game;
    let matches = [MatchId::from("m1"), MatchId::from("m2")];
    let players = [PlayerId::from("p1"), PlayerId::from("p2"), PlayerId::from("p3")];

    for _ in 0..steps {
        let m = &matches[(rng.next_u32() % 2) as usize];
        let p = &players[(rng.next_u32() % 3) as usize];
        match rng.next_u32() % 10 {
            0..=1 => {
                kernel.replay().join(&game, m, p).unwrap();
            }
            2..=7 => {
                let (dx, dy) = (rng.delta(), rng.delta());
                kernel.replay().submit_move(&game, m, p, dx, dy).unwrap();
            }
            8 => {
                let tick = kernel.replay().replay(&game, m).unwrap().tick;
                let to = if tick == 0 { 0 } else { rng.next_u32() as u64 % tick };
                kernel.replay().rollback(&game, m, to).unwrap();
            }
            _ => {
                kernel.arbiter().run_cycle("src/lib.rs", &["bounded".to_string()]).unwrap();
            }
        }
    }
    kernel
}

fn head_hash(kernel: &Kernel) -> Hash {
    *kernel.log().chain().unwrap().head().unwrap().hash()
}

#[test]
fn test_identical_runs_identical_chains() {
    let a = run_simulation(7, 200);
    let b = run_simulation(7, 200);
    assert_eq!(head_hash(&a), head_hash(&b));

    let c = run_simulation(8, 200);
    assert_ne!(head_hash(&a), head_hash(&c));
}

#[test]
fn test_derive_state_byte_identical() {
    let kernel = run_simulation(42, 300);
    let chain = kernel.log().chain().unwrap();
    let rules = GameRules::default();

    for key in ["m1", "m2"] {
        let key = MatchId::from(key);
        let first = derive(&rules, &Domain::Game, &key, &chain).state;
        let second = derive(&rules, &Domain::Game, &key, &chain).state;

        let bytes_a = bincode::serde::encode_to_vec(&first, bincode::config::standard()).unwrap();
        let bytes_b = bincode::serde::encode_to_vec(&second, bincode::config::standard()).unwrap();
        assert_eq!(bytes_a, bytes_b);
        assert_eq!(first.digest().unwrap(), second.digest().unwrap());
    }
}

#[test]
fn test_states_stay_within_bounds() {
    let kernel = run_simulation(99, 400);
    for key in ["m1", "m2"] {
        let state = kernel.replay().replay(&Domain::Game, &MatchId::from(key)).unwrap();
        for player in state.players.values() {
            assert!(player.x.abs() <= 10 && player.y.abs() <= 10);
        }
    }
    assert!(kernel.verify().unwrap().ok);
}

#[test]
fn test_persisted_rows_reload_identically() {
    let kernel = run_simulation(3, 150);
    let chain = kernel.log().chain().unwrap();

    let rows: Vec<String> = chain.iter().map(|r| serde_json::to_string(r).unwrap()).collect();
    let reloaded: Vec<EventRecord> = rows.iter().map(|row| serde_json::from_str(row).unwrap()).collect();

    assert!(verify_records(&reloaded).ok);
    assert_eq!(reloaded.as_slice(), chain.records());

    let rules = GameRules::default();
    let key = MatchId::from("m1");
    assert_eq!(
        derive(&rules, &Domain::Game, &key, &reloaded).state.digest().unwrap(),
        derive(&rules, &Domain::Game, &key, &chain).state.digest().unwrap()
    );
    assert_eq!(
        project(&reloaded, None).digest().unwrap(),
        project(&chain, None).digest().unwrap()
    );

    let restored = EventLog::restore(reloaded, Box::new(MemorySink), Arc::new(ManualClock::new(0))).unwrap();
    assert!(restored.verify().unwrap().ok);
}

#[test]
fn test_custom_spelling_of_builtin_domain_reloads_identically() {
    let kernel = test_kernel();
    let spelled = Domain::Custom("game".to_string());
    let key = MatchId::from("m1");
    let player = PlayerId::from("p1");

    let join = kernel.replay().join(&spelled, &key, &player).unwrap();
    assert_eq!(join.players.len(), 1);
    assert_eq!(kernel.replay().submit_move(&spelled, &key, &player, 1, 0).unwrap(), MoveOutcome::Accepted);

    let chain = kernel.log().chain().unwrap();
    assert!(chain.iter().skip(1).all(|r| matches!(r.domain(), Domain::Game)));

    let reloaded: Vec<EventRecord> = chain
        .iter()
        .map(|r| serde_json::from_str(&serde_json::to_string(r).unwrap()).unwrap())
        .collect();
    assert_eq!(reloaded.as_slice(), chain.records());

    let rules = GameRules::default();
    let live = derive(&rules, &Domain::Game, &key, &chain).state;
    let restored = derive(&rules, &Domain::Game, &key, &reloaded).state;
    assert_eq!(live.tick, 1);
    assert_eq!(live, restored);
}
