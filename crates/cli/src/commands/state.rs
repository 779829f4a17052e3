// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use crate::engine::ForensicEngine;
use annal_kernel::types::{hash_hex, MatchId};
use anyhow::Context;
use comfy_table::presets::UTF8_FULL;
use comfy_table::Table;
use std::path::Path;

pub fn run(log_path: &Path, config: Option<&Path>, match_id: &str, at: Option<u64>) -> anyhow::Result<()> {
    let engine = ForensicEngine::open(log_path, config)?;
    let key = MatchId::from(match_id);

    let frame = engine
        .state_at(&key, at)
        .with_context(|| format!("Match {} never reached tick {}", match_id, at.unwrap_or_default()))?;
    let digest = frame.state.digest().context("Failed to digest state")?;

    println!("\nMatch {} at tick {}\n", frame.state.match_id, frame.state.tick);
    println!("Events Folded: {}", frame.events_folded);
    println!("State Digest:  {}\n", hash_hex(&digest));

    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec!["Player", "X", "Y", "Health"]);
    for (player, p) in &frame.state.players {
        table.add_row(vec![player.to_string(), p.x.to_string(), p.y.to_string(), p.health.to_string()]);
    }
    println!("{table}\n");

    if let Some(last) = &frame.state.last_move {
        println!("Last Move: {} ({}, {}) at index {}\n", last.player_id, last.dx, last.dy, last.index);
    }

    Ok(())
}
