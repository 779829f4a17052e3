// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use super::{count_kind, test_kernel};
use crate::event::{kinds, EventPayload};
use crate::log::verify::verify_records;
use crate::log::EventLog;
use crate::types::{Domain, MatchId, PlayerId};
use serde_json::json;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;

const WRITERS: usize = 8;
const PER_WRITER: usize = 50;

#[test]
fn test_concurrent_appends_stay_linear() {
    let log = Arc::new(EventLog::new().unwrap());

    let handles: Vec<_> = (0..WRITERS)
        .map(|w| {
            let log = Arc::clone(&log);
            thread::spawn(move || {
                for i in 0..PER_WRITER {
                    log.append(
                        Domain::Agents,
                        "AGENT_TICK",
                        EventPayload::Opaque(json!({"writer": w, "seq": i})),
                    )
                    .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let chain = log.chain().unwrap();
    assert_eq!(chain.len(), 1 + WRITERS * PER_WRITER);
    assert!(chain.verify().ok);

    let prev_hashes: BTreeSet<_> = chain.iter().map(|r| *r.prev_hash()).collect();
    assert_eq!(prev_hashes.len(), chain.len());
}

#[test]
fn test_readers_see_consistent_snapshots() {
    let log = Arc::new(EventLog::new().unwrap());

    let writer = {
        let log = Arc::clone(&log);
        thread::spawn(move || {
            for i in 0..300 {
                log.append(Domain::Atlas, "REGION_MAPPED", EventPayload::Opaque(json!({"id": i})))
                    .unwrap();
            }
        })
    };
    let reader = {
        let log = Arc::clone(&log);
        thread::spawn(move || {
            let mut last_len = 0;
            for _ in 0..100 {
                let pinned = log.chain().unwrap();
                assert!(verify_records(&pinned).ok);
                assert!(pinned.len() >= last_len);
                last_len = pinned.len();
            }
        })
    };

    writer.join().unwrap();
    reader.join().unwrap();
    assert!(log.verify().unwrap().ok);
}

#[test]
fn test_concurrent_moves_reject_once_each() {
    let kernel = Arc::new(test_kernel());
    let game = Domain::Game;
    let m1 = MatchId::from("m1");

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let kernel = Arc::clone(&kernel);
            let (game, m1) = (game.clone(), m1.clone());
            thread::spawn(move || {
                // Nobody joins, so every move is rejected.
                let player = PlayerId(format!("p{}", t));
                for _ in 0..10 {
                    kernel.replay().submit_move(&game, &m1, &player, 1, 0).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    kernel.replay().replay(&game, &m1).unwrap();
    assert_eq!(count_kind(&kernel, kinds::PLAYER_MOVE), 40);
    assert_eq!(count_kind(&kernel, kinds::MOVE_REJECTED), 40);
    assert!(kernel.verify().unwrap().ok);
}
