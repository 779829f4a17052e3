// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Configuration constants and the tunable kernel configuration.

use crate::error::{KernelError, Result, ValidationError};
use crate::types::Hash;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// `prev_hash` of the genesis record. Never the hash of any record.
pub const GENESIS_HASH: Hash = [0u8; 32];

/// Kind of the bootstrap record at index 0.
pub const GENESIS_KIND: &str = crate::event::kinds::GENESIS;

/// Version of the record row layout, stamped into the genesis payload.
pub const LOG_FORMAT_VERSION: u32 = 1;

/// Positions must stay within `[-bound, bound]` on both axes.
pub const DEFAULT_ARENA_BOUND: i64 = 10;

/// Health assigned to a player on join.
pub const DEFAULT_HEALTH: u32 = 100;

/// Cycle budget used when a caller does not supply one.
pub const DEFAULT_MAX_CYCLES: u32 = 8;

/// Subtracted from every score when the invariant set is empty.
pub const DEFAULT_EMPTY_INVARIANT_PENALTY: f64 = 0.25;

/// Top-level kernel configuration.
///
/// Every field has a default, so a partial JSON document is a valid config.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    pub arena_bound: i64,
    pub default_health: u32,
    pub arbiter: ArbiterConfig,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            arena_bound: DEFAULT_ARENA_BOUND,
            default_health: DEFAULT_HEALTH,
            arbiter: ArbiterConfig::default(),
        }
    }
}

impl KernelConfig {
    /// Parse and validate a JSON config document.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)
            .map_err(|e| ValidationError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ValidationError::InvalidConfig(format!("{}: {}", path.as_ref().display(), e))
        })?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        if self.arena_bound <= 0 {
            return Err(invalid(format!(
                "arena_bound must be positive, got {}",
                self.arena_bound
            )));
        }
        self.arbiter.validate()
    }
}

/// Tuning for the hypothesis arbitration loop.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArbiterConfig {
    pub max_cycles: u32,
    pub empty_invariant_penalty: f64,
    /// Scores strictly below this value do not survive collapse.
    pub survival_threshold: f64,
    /// Verifier weight per hypothesis label. These are fixed heuristics,
    /// not measured coverage.
    pub label_weights: BTreeMap<String, f64>,
    pub default_label_weight: f64,
}

impl Default for ArbiterConfig {
    fn default() -> Self {
        let label_weights = [
            ("tighten-invariants", 0.8),
            ("add-regression-test", 0.7),
            ("extract-module", 0.5),
            ("inline-helper", 0.3),
        ]
        .into_iter()
        .map(|(label, weight)| (label.to_string(), weight))
        .collect();

        Self {
            max_cycles: DEFAULT_MAX_CYCLES,
            empty_invariant_penalty: DEFAULT_EMPTY_INVARIANT_PENALTY,
            survival_threshold: 0.0,
            label_weights,
            default_label_weight: 0.5,
        }
    }
}

impl ArbiterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_cycles == 0 {
            return Err(invalid("max_cycles must be at least 1".to_string()));
        }
        if !self.empty_invariant_penalty.is_finite() || self.empty_invariant_penalty <= 0.0 {
            return Err(invalid(format!(
                "empty_invariant_penalty must be positive and finite, got {}",
                self.empty_invariant_penalty
            )));
        }
        if !self.survival_threshold.is_finite() {
            return Err(invalid("survival_threshold must be finite".to_string()));
        }
        let weights = self
            .label_weights
            .iter()
            .map(|(label, w)| (label.as_str(), *w))
            .chain(std::iter::once(("<default>", self.default_label_weight)));
        for (label, weight) in weights {
            if !weight.is_finite() || weight < 0.0 {
                return Err(invalid(format!(
                    "label weight for {} must be finite and non-negative, got {}",
                    label, weight
                )));
            }
        }
        Ok(())
    }
}

fn invalid(message: String) -> KernelError {
    KernelError::Validation(ValidationError::InvalidConfig(message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        KernelConfig::default().validate().unwrap();
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config = KernelConfig::from_json_str(r#"{"arena_bound": 4, "arbiter": {"max_cycles": 2}}"#).unwrap();

        assert_eq!(config.arena_bound, 4);
        assert_eq!(config.default_health, DEFAULT_HEALTH);
        assert_eq!(config.arbiter.max_cycles, 2);
        assert_eq!(config.arbiter.empty_invariant_penalty, DEFAULT_EMPTY_INVARIANT_PENALTY);
        assert!(config.arbiter.label_weights.contains_key("tighten-invariants"));
    }

    #[test]
    fn test_rejects_zero_cycles_and_bad_penalty() {
        let zero = KernelConfig::from_json_str(r#"{"arbiter": {"max_cycles": 0}}"#);
        assert!(matches!(
            zero,
            Err(KernelError::Validation(ValidationError::InvalidConfig(_)))
        ));

        let penalty = KernelConfig::from_json_str(r#"{"arbiter": {"empty_invariant_penalty": -1.0}}"#);
        assert!(penalty.is_err());

        let bound = KernelConfig::from_json_str(r#"{"arena_bound": 0}"#);
        assert!(bound.is_err());
    }
}
