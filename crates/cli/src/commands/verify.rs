// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use crate::engine::ForensicEngine;
use annal_kernel::types::hash_hex;
use std::path::Path;

pub fn run(log_path: &Path) -> anyhow::Result<()> {
    let engine = ForensicEngine::open(log_path, None)?;
    let report = engine.integrity();

    if report.ok {
        println!("\n✅ VERIFIED\n");
        println!("Records:   {}", report.checked);
        if let Some(head) = engine.records.last() {
            println!("Head Hash: {}", hash_hex(head.hash()));
        }
        println!("Confidence: STRONG (BLAKE3 hash chain)\n");
        Ok(())
    } else {
        println!("\n❌ BROKEN\n");
        println!("Verified:  {} records", report.checked);
        if let (Some(index), Some(reason)) = (report.broken_at, report.reason) {
            println!("Broken At: {}", index);
            println!("Reason:    {}", reason);
        }
        Err(report
            .into_result()
            .err()
            .map(anyhow::Error::from)
            .unwrap_or_else(|| anyhow::anyhow!("chain verification failed")))
    }
}
