// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Kernel: one log and the four collaborators built on it.
//!
//! The collaborators share the log by `Arc` and never reference each other.

use crate::arbiter::HypothesisArbiter;
use crate::config::KernelConfig;
use crate::error::Result;
use crate::log::verify::IntegrityReport;
use crate::log::EventLog;
use crate::projection::ProjectionEngine;
use crate::referee::ConsistencyReferee;
use crate::replay::state::GameRules;
use crate::replay::ReplayEngine;
use std::sync::Arc;

pub struct Kernel {
    config: KernelConfig,
    log: Arc<EventLog>,
    projections: ProjectionEngine,
    replay: ReplayEngine,
    arbiter: HypothesisArbiter,
    referee: ConsistencyReferee,
}

impl Kernel {
    /// In-memory kernel on the wall clock.
    pub fn new(config: KernelConfig) -> Result<Self> {
        Self::with_log(Arc::new(EventLog::new()?), config)
    }

    /// Wire the collaborators around an existing log.
    pub fn with_log(log: Arc<EventLog>, config: KernelConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            projections: ProjectionEngine::new(Arc::clone(&log)),
            replay: ReplayEngine::new(Arc::clone(&log), GameRules::from(&config)),
            arbiter: HypothesisArbiter::new(Arc::clone(&log), config.arbiter.clone()),
            referee: ConsistencyReferee::new(Arc::clone(&log)),
            config,
            log,
        })
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn log(&self) -> &Arc<EventLog> {
        &self.log
    }

    pub fn projections(&self) -> &ProjectionEngine {
        &self.projections
    }

    pub fn replay(&self) -> &ReplayEngine {
        &self.replay
    }

    pub fn arbiter(&self) -> &HypothesisArbiter {
        &self.arbiter
    }

    pub fn referee(&self) -> &ConsistencyReferee {
        &self.referee
    }

    pub fn verify(&self) -> Result<IntegrityReport> {
        self.log.verify()
    }
}
