// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Reproducible log files for tests and demos.

use crate::error::Result;
use crate::{open_log, wal};
use annal_kernel::clock::ManualClock;
use annal_kernel::config::KernelConfig;
use annal_kernel::kernel::Kernel;
use annal_kernel::referee::challenge::ChallengeType;
use annal_kernel::referee::View;
use annal_kernel::types::{Domain, MatchId, PlayerId};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Timestamp of the genesis record in generated logs.
pub const FIXTURE_EPOCH_MS: u64 = 1_700_000_000_000;

/// Index of the row altered in the tampered copy.
pub const TAMPERED_INDEX: u64 = 3;

pub struct TestPaths {
    pub log: PathBuf,
    pub tampered: PathBuf,
}

/// Writes `events.annal` (a valid log touching every component) and
/// `tampered.annal` (the same rows with one payload edited, frames re-checksummed).
///
/// Match `m1` ends at tick 2 after a rollback, with `p1` at (2, 0) and `p2`
/// at the origin.
pub fn generate_test_scenario(dir: &Path) -> Result<TestPaths> {
    if !dir.exists() {
        fs::create_dir_all(dir)?;
    }

    let log_path = dir.join("events.annal");
    if log_path.exists() {
        fs::remove_file(&log_path)?;
    }
    let clock = Arc::new(ManualClock::with_step(FIXTURE_EPOCH_MS, 1_000));
    let log = Arc::new(open_log(&log_path, clock)?);
    let kernel = Kernel::with_log(log, KernelConfig::default())?;

    let game = Domain::Game;
    let m1 = MatchId::from("m1");
    let (p1, p2, p3) = (PlayerId::from("p1"), PlayerId::from("p2"), PlayerId::from("p3"));

    // 1. Match play, including both rejection reasons and a rollback
    let replay = kernel.replay();
    replay.join(&game, &m1, &p1)?;
    replay.join(&game, &m1, &p2)?;
    for _ in 0..3 {
        replay.submit_move(&game, &m1, &p1, 1, 0)?;
    }
    replay.submit_move(&game, &m1, &p2, 0, 1)?;
    replay.submit_move(&game, &m1, &p1, 20, 0)?;
    replay.submit_move(&game, &m1, &p3, 1, 0)?;
    replay.rollback(&game, &m1, 2)?;

    // 2. Two arbitration cycles, then the budget stop
    kernel
        .arbiter()
        .run("src/lib.rs", &["bounded positions".to_string()], Some(2))?;

    // 3. Referee traffic
    let view = |source: &str| View {
        source: source.to_string(),
        timestamp: FIXTURE_EPOCH_MS,
        data: json!({"tick": 2}),
    };
    kernel.referee().verify_views(&[view("node-a"), view("node-b")])?;
    let challenge = kernel.referee().issue_challenge("node-a", ChallengeType::Integrity)?;
    kernel.referee().verify_challenge(&challenge.id, "ok")?;

    // 4. Checkpoint the game projection
    kernel.projections().checkpoint(Some(Domain::Game))?;
    drop(kernel);

    let tampered_path = dir.join("tampered.annal");
    let mut rows = wal::read_rows(&log_path)?;
    if let Some(row) = rows.iter_mut().find(|row| row.index == TAMPERED_INDEX) {
        row.payload = json!({"match_id": "m1", "player_id": "p1", "dx": 9, "dy": 9});
    }
    wal::write_rows(&tampered_path, &rows)?;

    Ok(TestPaths {
        log: log_path,
        tampered: tampered_path,
    })
}
