// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Event domains.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Namespace grouping related event kinds.
///
/// Open enumeration: names outside the built-in set parse as `Custom`.
///
/// A domain is its name. `Custom("game")` and `Game` compare, order and hash
/// alike, matching how records are hashed and reloaded.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Domain {
    Kernel,
    Atlas,
    Game,
    Governance,
    Agents,
    Recurrence,
    Referee,
    Projection,
    Custom(String),
}

impl Domain {
    pub fn from_name(name: &str) -> Self {
        match name {
            "kernel" => Domain::Kernel,
            "atlas" => Domain::Atlas,
            "game" => Domain::Game,
            "governance" => Domain::Governance,
            "agents" => Domain::Agents,
            "recurrence" => Domain::Recurrence,
            "referee" => Domain::Referee,
            "projection" => Domain::Projection,
            other => Domain::Custom(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Domain::Kernel => "kernel",
            Domain::Atlas => "atlas",
            Domain::Game => "game",
            Domain::Governance => "governance",
            Domain::Agents => "agents",
            Domain::Recurrence => "recurrence",
            Domain::Referee => "referee",
            Domain::Projection => "projection",
            Domain::Custom(name) => name,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.as_str().trim().is_empty()
    }
}

impl PartialEq for Domain {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for Domain {}

impl PartialOrd for Domain {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Domain {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl Hash for Domain {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_str().hash(state);
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Domain {
    fn from(name: String) -> Self {
        Domain::from_name(&name)
    }
}

impl From<Domain> for String {
    fn from(domain: Domain) -> Self {
        domain.as_str().to_string()
    }
}
