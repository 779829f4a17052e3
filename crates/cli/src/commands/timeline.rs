// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use crate::engine::ForensicEngine;
use annal_kernel::event::EventPayload;
use annal_kernel::types::{hash_hex, Domain};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};
use std::path::Path;

pub fn run(log_path: &Path, domain: Option<&str>) -> anyhow::Result<()> {
    let engine = ForensicEngine::open(log_path, None)?;
    let domain = domain.map(Domain::from_name);

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Index", "Timestamp", "Domain", "Kind", "Summary", "Hash"]);

    let mut shown = 0;
    for record in engine.timeline(domain.as_ref()) {
        let ts = chrono::DateTime::from_timestamp_millis(record.timestamp() as i64)
            .unwrap_or_default()
            .to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
        let hash = hash_hex(record.hash());

        table.add_row(vec![
            record.index().to_string(),
            ts,
            record.domain().to_string(),
            record.kind().to_string(),
            summarize(record.payload()),
            hash[..16].to_string(),
        ]);
        shown += 1;
    }

    println!("\nEvent Timeline ({} of {} records)\n", shown, engine.records.len());
    println!("{table}\n");

    Ok(())
}

pub fn summarize(payload: &EventPayload) -> String {
    match payload {
        EventPayload::Genesis(g) => format!("format v{}", g.format_version),
        EventPayload::PlayerJoin(p) => format!("{} joins {}", p.player_id, p.match_id),
        EventPayload::PlayerMove(p) => format!("{} moves ({}, {}) in {}", p.player_id, p.dx, p.dy, p.match_id),
        EventPayload::MoveRejected(p) => {
            format!("move #{} by {} rejected: {}", p.move_index, p.player_id, p.reason.as_str())
        }
        EventPayload::Rollback(p) => format!(
            "{} tick {} -> {} ({} replayed)",
            p.match_id, p.from_point, p.to_point, p.events_replayed
        ),
        EventPayload::RecurrenceCycle(c) => format!(
            "{} cycle {} chose {}",
            c.target,
            c.cycle,
            c.chosen.as_ref().map(|id| id.to_string()).unwrap_or_else(|| "none".to_string())
        ),
        EventPayload::RecurrenceStopCondition(s) => format!("{} stopped after {} cycles", s.target, s.cycles),
        EventPayload::MultiViewConsistent(v) => format!("{} views agree", v.sources.len()),
        EventPayload::MultiViewMismatch(v) => format!(
            "{} diverges from {}",
            v.residue.divergent_source, v.residue.baseline_source
        ),
        EventPayload::ChallengeIssued(c) => format!("{} challenge to {}", c.challenge_type, c.target),
        EventPayload::ChallengeResponse(c) => {
            format!("{} {}", c.challenge_id, if c.passed { "passed" } else { "failed" })
        }
        EventPayload::ProjectionCheckpoint(c) => format!("digest {} through {}", &c.digest[..16.min(c.digest.len())], c.through_index),
        EventPayload::Opaque(_) => "(opaque)".to_string(),
    }
}
