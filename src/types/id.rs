// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Identity types.

use super::Hash;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Log-assigned record id: the first 8 bytes of the record hash, hex encoded.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub String);

impl EventId {
    pub(crate) fn from_hash(hash: &Hash) -> Self {
        EventId(format!("evt_{}", hex::encode(&hash[..8])))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HypothesisId(pub String);

macro_rules! string_id {
    ($($name:ident),*) => {
        $(
            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(&self.0)
                }
            }

            impl From<&str> for $name {
                fn from(raw: &str) -> Self {
                    $name(raw.to_string())
                }
            }
        )*
    };
}

string_id!(EventId, MatchId, PlayerId, HypothesisId);
