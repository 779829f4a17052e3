// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Identity, domain and hash types shared by every component.

pub mod domain;
pub mod id;

pub use domain::Domain;
pub use id::{EventId, HypothesisId, MatchId, PlayerId};

/// BLAKE3 digest.
pub type Hash = [u8; 32];

/// Lowercase hex rendering of a digest.
pub fn hash_hex(hash: &Hash) -> String {
    hex::encode(hash)
}

/// Parse a 64-character hex digest.
pub fn parse_hash_hex(raw: &str) -> Option<Hash> {
    let bytes = hex::decode(raw).ok()?;
    bytes.try_into().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_hex_roundtrip() {
        let mut hash = [0u8; 32];
        hash[0] = 0xab;
        hash[31] = 0x01;

        let rendered = hash_hex(&hash);
        assert_eq!(rendered.len(), 64);
        assert_eq!(parse_hash_hex(&rendered), Some(hash));
    }

    #[test]
    fn test_parse_rejects_short_digest() {
        assert_eq!(parse_hash_hex("abcd"), None);
        assert_eq!(parse_hash_hex("not hex"), None);
    }
}
