// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Hypotheses and their generation.

use crate::types::HypothesisId;
use serde::{Deserialize, Serialize};

/// What a hypothesis proposes to change. Never applied by the kernel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffDescription {
    pub label: String,
    pub target_files: Vec<String>,
    pub intent: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Hypothesis {
    pub id: HypothesisId,
    pub prior: f64,
    pub diff: DiffDescription,
}

/// Proposes candidate changes for one cycle.
pub trait HypothesisBuilder: Send + Sync {
    /// Candidates in generation order. An empty result skips the cycle.
    fn generate(&self, target: &str, invariants: &[String], cycle: u32) -> Vec<Hypothesis>;
}

#[derive(Clone, Debug, PartialEq)]
pub struct Template {
    pub label: String,
    pub base_prior: f64,
    /// Whether the intent enumerates the invariants it guards.
    pub cites_invariants: bool,
}

impl Template {
    fn new(label: &str, base_prior: f64, cites_invariants: bool) -> Self {
        Self {
            label: label.to_string(),
            base_prior,
            cites_invariants,
        }
    }
}

/// Fixed label templates. Priors rotate with the cycle index so successive
/// cycles explore different orderings.
#[derive(Clone, Debug)]
pub struct TemplateBuilder {
    templates: Vec<Template>,
}

impl Default for TemplateBuilder {
    fn default() -> Self {
        Self::new(vec![
            Template::new("tighten-invariants", 4.0, true),
            Template::new("extract-module", 3.0, false),
            Template::new("add-regression-test", 2.0, true),
            Template::new("inline-helper", 1.0, false),
        ])
    }
}

impl TemplateBuilder {
    pub fn new(templates: Vec<Template>) -> Self {
        Self { templates }
    }

    fn intent(template: &Template, target: &str, invariants: &[String]) -> String {
        if template.cites_invariants && !invariants.is_empty() {
            format!("{} in {} guarding: {}", template.label, target, invariants.join(", "))
        } else {
            format!("{} in {}", template.label, target)
        }
    }
}

impl HypothesisBuilder for TemplateBuilder {
    fn generate(&self, target: &str, invariants: &[String], cycle: u32) -> Vec<Hypothesis> {
        let n = self.templates.len();
        self.templates
            .iter()
            .enumerate()
            .map(|(i, template)| {
                let rotated = &self.templates[(i + cycle as usize) % n];
                Hypothesis {
                    id: HypothesisId(format!("c{}-h{}", cycle, i)),
                    prior: rotated.base_prior,
                    diff: DiffDescription {
                        label: template.label.clone(),
                        target_files: vec![target.to_string()],
                        intent: Self::intent(template, target, invariants),
                    },
                }
            })
            .collect()
    }
}

/// Rescale priors to sum to 1.
///
/// Negative and non-finite priors count as zero. If nothing positive
/// remains, every hypothesis gets an equal share.
pub fn normalize(hypotheses: &mut [Hypothesis]) {
    if hypotheses.is_empty() {
        return;
    }
    for h in hypotheses.iter_mut() {
        if !h.prior.is_finite() || h.prior < 0.0 {
            h.prior = 0.0;
        }
    }

    let total: f64 = hypotheses.iter().map(|h| h.prior).sum();
    if total > 0.0 {
        for h in hypotheses.iter_mut() {
            h.prior /= total;
        }
    } else {
        let share = 1.0 / hypotheses.len() as f64;
        for h in hypotheses.iter_mut() {
            h.prior = share;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priors_rotate_with_cycle() {
        let builder = TemplateBuilder::default();
        let first = builder.generate("src/lib.rs", &[], 0);
        let second = builder.generate("src/lib.rs", &[], 1);

        assert_eq!(first.len(), 4);
        assert_eq!(first[0].diff.label, second[0].diff.label);
        assert_eq!(first[0].prior, 4.0);
        assert_eq!(second[0].prior, 3.0);
        assert_eq!(second[0].id, HypothesisId::from("c1-h0"));
    }

    #[test]
    fn test_intent_cites_invariants() {
        let builder = TemplateBuilder::default();
        let invariants = vec!["no panics".to_string()];
        let hypotheses = builder.generate("parser", &invariants, 0);

        assert!(hypotheses[0].diff.intent.contains("no panics"));
        assert!(!hypotheses[1].diff.intent.contains("no panics"));
    }

    #[test]
    fn test_normalize_sums_to_one() {
        let mut hypotheses = TemplateBuilder::default().generate("t", &[], 0);
        normalize(&mut hypotheses);

        let total: f64 = hypotheses.iter().map(|h| h.prior).sum();
        assert!((total - 1.0).abs() < 1e-12);
        assert!((hypotheses[0].prior - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_normalize_degenerate_priors_are_uniform() {
        let mut hypotheses = TemplateBuilder::default().generate("t", &[], 0);
        for h in hypotheses.iter_mut() {
            h.prior = -1.0;
        }
        hypotheses[1].prior = f64::NAN;
        normalize(&mut hypotheses);

        assert!(hypotheses.iter().all(|h| h.prior == 0.25));
    }
}
