// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Canonical Record Hashing
//!
//! BLAKE3 is the only hash primitive used for chain links, challenge
//! answers and state digests.
//!
//! # Hash Input Structure
//! ```text
//! index      (u64 LE)
//! timestamp  (u64 LE)
//! domain     (u64 LE length, UTF-8 bytes)
//! kind       (u64 LE length, UTF-8 bytes)
//! payload    (u64 LE length, canonical JSON bytes)
//! prev_hash  (32 bytes)
//! ```
//! Length prefixes keep field boundaries unambiguous.

use crate::types::{Domain, Hash};

pub fn record_hash(
    index: u64,
    timestamp: u64,
    domain: &Domain,
    kind: &str,
    payload_bytes: &[u8],
    prev_hash: &Hash,
) -> Hash {
    let mut hasher = blake3::Hasher::new();

    hasher.update(&index.to_le_bytes());
    hasher.update(&timestamp.to_le_bytes());
    write_field(&mut hasher, domain.as_str().as_bytes());
    write_field(&mut hasher, kind.as_bytes());
    write_field(&mut hasher, payload_bytes);
    hasher.update(prev_hash);

    *hasher.finalize().as_bytes()
}

fn write_field(hasher: &mut blake3::Hasher, bytes: &[u8]) {
    hasher.update(&(bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}
