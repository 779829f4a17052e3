// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Hypothesis Arbitration
//!
//! Cyclic decision loop over candidate changes to a target:
//! ```text
//! GENERATE → NORMALIZE → SCORE → COLLAPSE → RECORD
//! ```
//! Normalization rescales priors to sum to one; collapse is arg-max over the
//! surviving scores with ties going to the earliest generated candidate.
//! Each completed cycle is one `RECURRENCE_CYCLE` record. The chosen
//! hypothesis is recorded, never applied.
//!
//! # Termination
//! - no candidates: the cycle is skipped and nothing is recorded
//! - no survivor: the cycle is recorded with `chosen = None` and the loop stops
//! - budget spent: one `RECURRENCE_STOP_CONDITION {reason: max_cycles_reached}`

pub mod hypothesis;
pub mod signal;

use crate::config::ArbiterConfig;
use crate::error::{KernelError, Result, ValidationError};
use crate::event::{kinds, EventPayload, EventRecord, RecurrenceCycle, RecurrenceStopCondition};
use crate::log::EventLog;
use crate::types::{Domain, EventId, HypothesisId};
use hypothesis::{normalize, Hypothesis, HypothesisBuilder, TemplateBuilder};
use serde::{Deserialize, Serialize};
use signal::{clamp_unit, InvariantCoverageSignal, LabelWeightSignal, PriorSignal, Signal};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    MaxCyclesReached,
    NoSurvivors,
    NoCandidates,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CycleOutcome {
    pub cycle: u32,
    /// `None` when the cycle was skipped for lack of candidates.
    pub record: Option<EventRecord>,
    pub chosen: Option<HypothesisId>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ArbitrationReport {
    pub target: String,
    pub cycles_run: u32,
    pub chosen: Option<HypothesisId>,
    pub stop: StopReason,
    pub cycle_records: Vec<EventId>,
    pub stop_record: Option<EventId>,
}

pub struct HypothesisArbiter {
    log: Arc<EventLog>,
    config: ArbiterConfig,
    builder: Box<dyn HypothesisBuilder>,
    signals: Vec<Box<dyn Signal>>,
    running: Mutex<()>,
}

impl HypothesisArbiter {
    /// Template builder with prior, label-weight and coverage signals.
    pub fn new(log: Arc<EventLog>, config: ArbiterConfig) -> Self {
        let signals: Vec<Box<dyn Signal>> = vec![
            Box::new(PriorSignal),
            Box::new(LabelWeightSignal::new(
                config.label_weights.clone(),
                config.default_label_weight,
            )),
            Box::new(InvariantCoverageSignal),
        ];
        Self::with_parts(log, config, Box::new(TemplateBuilder::default()), signals)
    }

    pub fn with_parts(
        log: Arc<EventLog>,
        config: ArbiterConfig,
        builder: Box<dyn HypothesisBuilder>,
        signals: Vec<Box<dyn Signal>>,
    ) -> Self {
        Self {
            log,
            config,
            builder,
            signals,
            running: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &ArbiterConfig {
        &self.config
    }

    pub fn generate(&self, target: &str, invariants: &[String], cycle: u32) -> Vec<Hypothesis> {
        self.builder.generate(target, invariants, cycle)
    }

    /// Weighted mean of clamped signals, minus the penalty when no
    /// invariants are given. `scores[i]` belongs to `hypotheses[i]`.
    pub fn score(&self, hypotheses: &[Hypothesis], invariants: &[String]) -> Vec<f64> {
        let total_weight: f64 = self.signals.iter().map(|s| clamp_weight(s.weight())).sum();
        let penalty = if invariants.is_empty() {
            self.config.empty_invariant_penalty
        } else {
            0.0
        };

        hypotheses
            .iter()
            .map(|h| {
                let weighted: f64 = self
                    .signals
                    .iter()
                    .map(|s| clamp_weight(s.weight()) * clamp_unit(s.evaluate(h, invariants)))
                    .sum();
                let base = if total_weight > 0.0 { weighted / total_weight } else { 0.0 };
                base - penalty
            })
            .collect()
    }

    /// Index of the best surviving score; ties go to the earliest.
    pub fn collapse(&self, scores: &[f64]) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (i, &score) in scores.iter().enumerate() {
            if !score.is_finite() || score < self.config.survival_threshold {
                continue;
            }
            match best {
                Some((_, top)) if score <= top => {}
                _ => best = Some((i, score)),
            }
        }
        best.map(|(i, _)| i)
    }

    /// Run one cycle for `target`, continuing its cycle numbering.
    pub fn run_cycle(&self, target: &str, invariants: &[String]) -> Result<CycleOutcome> {
        let _guard = self.running.lock().map_err(|_| KernelError::LockPoisoned)?;
        self.cycle_locked(target, invariants)
    }

    /// Loop until no survivor, no candidates, or `max_cycles` cycles ran.
    ///
    /// `None` uses the configured budget.
    pub fn run(&self, target: &str, invariants: &[String], max_cycles: Option<u32>) -> Result<ArbitrationReport> {
        let budget = max_cycles.unwrap_or(self.config.max_cycles);
        if budget == 0 {
            return Err(ValidationError::InvalidConfig("max_cycles must be at least 1".to_string()).into());
        }

        let _guard = self.running.lock().map_err(|_| KernelError::LockPoisoned)?;
        let mut report = ArbitrationReport {
            target: target.to_string(),
            cycles_run: 0,
            chosen: None,
            stop: StopReason::MaxCyclesReached,
            cycle_records: Vec::new(),
            stop_record: None,
        };

        while report.cycles_run < budget {
            let outcome = self.cycle_locked(target, invariants)?;
            let Some(record) = outcome.record else {
                report.stop = StopReason::NoCandidates;
                info!(subject = target, cycles = report.cycles_run, "Arbitration stopped: no candidates");
                return Ok(report);
            };

            report.cycles_run += 1;
            report.cycle_records.push(record.id().clone());

            match outcome.chosen {
                Some(chosen) => report.chosen = Some(chosen),
                None => {
                    report.stop = StopReason::NoSurvivors;
                    info!(subject = target, cycles = report.cycles_run, "Arbitration stopped: no survivors");
                    return Ok(report);
                }
            }
        }

        let stop = self.log.append(
            Domain::Recurrence,
            kinds::RECURRENCE_STOP_CONDITION,
            EventPayload::RecurrenceStopCondition(RecurrenceStopCondition {
                target: target.to_string(),
                cycles: report.cycles_run,
                reason: StopReason::MaxCyclesReached,
            }),
        )?;
        info!(subject = target, cycles = report.cycles_run, "Arbitration stopped: max cycles reached");
        report.stop_record = Some(stop.id().clone());
        Ok(report)
    }

    fn cycle_locked(&self, target: &str, invariants: &[String]) -> Result<CycleOutcome> {
        let cycle = self.next_cycle_index(target)?;

        let mut hypotheses = self.generate(target, invariants, cycle);
        if hypotheses.is_empty() {
            debug!(subject = target, cycle, "Cycle skipped: no candidates");
            return Ok(CycleOutcome {
                cycle,
                record: None,
                chosen: None,
            });
        }

        normalize(&mut hypotheses);
        let scores = self.score(&hypotheses, invariants);
        let chosen = self.collapse(&scores).map(|i| hypotheses[i].id.clone());

        let record = self.log.append(
            Domain::Recurrence,
            kinds::RECURRENCE_CYCLE,
            EventPayload::RecurrenceCycle(RecurrenceCycle {
                target: target.to_string(),
                cycle,
                invariants: invariants.to_vec(),
                hypotheses,
                scores,
                chosen: chosen.clone(),
            }),
        )?;
        debug!(subject = target, cycle, chosen = ?chosen, "Recorded arbitration cycle");

        Ok(CycleOutcome {
            cycle,
            record: Some(record),
            chosen,
        })
    }

    fn next_cycle_index(&self, target: &str) -> Result<u32> {
        let chain = self.log.chain()?;
        let count = chain
            .iter()
            .filter(|r| matches!(r.payload(), EventPayload::RecurrenceCycle(c) if c.target == target))
            .count();
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }
}

fn clamp_weight(weight: f64) -> f64 {
    if weight.is_finite() && weight > 0.0 {
        weight
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::log::sink::MemorySink;

    fn arbiter() -> HypothesisArbiter {
        let log = Arc::new(EventLog::with_parts(Box::new(MemorySink), Arc::new(ManualClock::new(0))).unwrap());
        HypothesisArbiter::new(log, ArbiterConfig::default())
    }

    struct NoIdeas;

    impl HypothesisBuilder for NoIdeas {
        fn generate(&self, _target: &str, _invariants: &[String], _cycle: u32) -> Vec<Hypothesis> {
            Vec::new()
        }
    }

    #[test]
    fn test_collapse_ties_go_to_earliest() {
        let arbiter = arbiter();
        assert_eq!(arbiter.collapse(&[0.2, 0.7, 0.7, 0.1]), Some(1));
        assert_eq!(arbiter.collapse(&[-0.1, f64::NAN]), None);
        assert_eq!(arbiter.collapse(&[]), None);
    }

    #[test]
    fn test_empty_generation_records_nothing() {
        let log = Arc::new(EventLog::with_parts(Box::new(MemorySink), Arc::new(ManualClock::new(0))).unwrap());
        let arbiter = HypothesisArbiter::with_parts(
            Arc::clone(&log),
            ArbiterConfig::default(),
            Box::new(NoIdeas),
            vec![Box::new(PriorSignal)],
        );

        let report = arbiter.run("target", &[], Some(3)).unwrap();
        assert_eq!(report.stop, StopReason::NoCandidates);
        assert_eq!(report.cycles_run, 0);
        assert_eq!(log.len().unwrap(), 1);
    }

    #[test]
    fn test_no_survivor_records_cycle_and_stops() {
        let log = Arc::new(EventLog::with_parts(Box::new(MemorySink), Arc::new(ManualClock::new(0))).unwrap());
        let config = ArbiterConfig {
            survival_threshold: 2.0,
            ..ArbiterConfig::default()
        };
        let arbiter = HypothesisArbiter::new(Arc::clone(&log), config);

        let report = arbiter.run("target", &["inv".to_string()], Some(5)).unwrap();
        assert_eq!(report.stop, StopReason::NoSurvivors);
        assert_eq!(report.cycles_run, 1);
        assert!(report.stop_record.is_none());

        let chain = log.chain().unwrap();
        assert_eq!(chain.len(), 2);
        match chain[1].payload() {
            EventPayload::RecurrenceCycle(cycle) => assert!(cycle.chosen.is_none()),
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_zero_budget_is_rejected() {
        let result = arbiter().run("target", &[], Some(0));
        assert!(matches!(
            result,
            Err(KernelError::Validation(ValidationError::InvalidConfig(_)))
        ));
    }

    #[test]
    fn test_cycle_indices_continue_across_runs() {
        let arbiter = arbiter();
        let invariants = vec!["no panics".to_string()];

        arbiter.run("parser", &invariants, Some(2)).unwrap();
        let next = arbiter.run_cycle("parser", &invariants).unwrap();
        assert_eq!(next.cycle, 2);

        let other = arbiter.run_cycle("lexer", &invariants).unwrap();
        assert_eq!(other.cycle, 0);
    }
}
