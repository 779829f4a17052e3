// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Verifier signals.
//!
//! Each signal maps a hypothesis to `[0, 1]`. These are deterministic
//! heuristics, not measurements: label weights are configured, and coverage
//! only checks whether a hypothesis names the invariants it claims to guard.

use super::hypothesis::Hypothesis;
use std::collections::BTreeMap;

pub trait Signal: Send + Sync {
    fn name(&self) -> &str;

    /// Relative weight in the combined score.
    fn weight(&self) -> f64 {
        1.0
    }

    fn evaluate(&self, hypothesis: &Hypothesis, invariants: &[String]) -> f64;
}

/// Clamp to `[0, 1]`; non-finite values score zero.
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// The normalized prior itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct PriorSignal;

impl Signal for PriorSignal {
    fn name(&self) -> &str {
        "prior"
    }

    fn evaluate(&self, hypothesis: &Hypothesis, _invariants: &[String]) -> f64 {
        hypothesis.prior
    }
}

/// Fixed weight per hypothesis label.
#[derive(Debug, Clone)]
pub struct LabelWeightSignal {
    weights: BTreeMap<String, f64>,
    default_weight: f64,
}

impl LabelWeightSignal {
    pub fn new(weights: BTreeMap<String, f64>, default_weight: f64) -> Self {
        Self {
            weights,
            default_weight,
        }
    }
}

impl Signal for LabelWeightSignal {
    fn name(&self) -> &str {
        "label_weight"
    }

    fn evaluate(&self, hypothesis: &Hypothesis, _invariants: &[String]) -> f64 {
        self.weights
            .get(&hypothesis.diff.label)
            .copied()
            .unwrap_or(self.default_weight)
    }
}

/// Share of invariants the hypothesis intent names. Zero with no invariants.
#[derive(Debug, Default, Clone, Copy)]
pub struct InvariantCoverageSignal;

impl Signal for InvariantCoverageSignal {
    fn name(&self) -> &str {
        "invariant_coverage"
    }

    fn evaluate(&self, hypothesis: &Hypothesis, invariants: &[String]) -> f64 {
        if invariants.is_empty() {
            return 0.0;
        }
        let intent = hypothesis.diff.intent.to_lowercase();
        let covered = invariants
            .iter()
            .filter(|inv| intent.contains(&inv.to_lowercase()))
            .count();
        covered as f64 / invariants.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arbiter::hypothesis::DiffDescription;

    fn hypothesis(label: &str, intent: &str) -> Hypothesis {
        Hypothesis {
            id: "c0-h0".into(),
            prior: 0.5,
            diff: DiffDescription {
                label: label.to_string(),
                target_files: vec![],
                intent: intent.to_string(),
            },
        }
    }

    #[test]
    fn test_clamp_unit() {
        assert_eq!(clamp_unit(1.5), 1.0);
        assert_eq!(clamp_unit(-0.2), 0.0);
        assert_eq!(clamp_unit(f64::NAN), 0.0);
        assert_eq!(clamp_unit(0.3), 0.3);
    }

    #[test]
    fn test_label_weight_falls_back_to_default() {
        let signal = LabelWeightSignal::new(BTreeMap::from([("keep".to_string(), 0.9)]), 0.1);
        assert_eq!(signal.evaluate(&hypothesis("keep", ""), &[]), 0.9);
        assert_eq!(signal.evaluate(&hypothesis("other", ""), &[]), 0.1);
    }

    #[test]
    fn test_coverage_counts_named_invariants() {
        let invariants = vec!["No Panics".to_string(), "sorted output".to_string()];
        let h = hypothesis("tighten-invariants", "guarding: no panics");

        assert_eq!(InvariantCoverageSignal.evaluate(&h, &invariants), 0.5);
        assert_eq!(InvariantCoverageSignal.evaluate(&h, &[]), 0.0);
    }
}
