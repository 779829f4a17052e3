// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use crate::engine::ForensicEngine;
use annal_kernel::types::{hash_hex, Domain};
use anyhow::Context;
use std::path::Path;

/// Prints the projection as pretty JSON, followed by its digest.
pub fn run(log_path: &Path, domain: Option<&str>) -> anyhow::Result<()> {
    let engine = ForensicEngine::open(log_path, None)?;
    let domain = domain.map(Domain::from_name);

    let projection = engine.projection(domain.as_ref());
    let digest = projection.digest().context("Failed to digest projection")?;

    println!("{}", serde_json::to_string_pretty(&projection)?);
    println!("\nDigest: {}", hash_hex(&digest));
    Ok(())
}
