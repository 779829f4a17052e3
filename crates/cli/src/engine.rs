// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use anyhow::{Context, Result};
use std::path::Path;
use tracing::debug;

use annal_kernel::config::KernelConfig;
use annal_kernel::event::EventRecord;
use annal_kernel::log::verify::{verify_records, IntegrityReport};
use annal_kernel::projection::{project, Projection};
use annal_kernel::replay::state::{derive, Frame, GameRules};
use annal_kernel::types::{Domain, MatchId};
use annal_persistence::load_records;

/// Read-only view over the records of one log file.
///
/// Records are loaded without restoring a log, so a broken chain can still
/// be inspected.
pub struct ForensicEngine {
    pub records: Vec<EventRecord>,
    pub config: KernelConfig,
}

impl ForensicEngine {
    pub fn open(log_path: &Path, config_path: Option<&Path>) -> Result<Self> {
        let records = load_records(log_path)
            .with_context(|| format!("Failed to read log {}", log_path.display()))?;
        let config = match config_path {
            Some(path) => KernelConfig::from_json_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => KernelConfig::default(),
        };
        debug!(path = %log_path.display(), records = records.len(), "log loaded");
        Ok(Self { records, config })
    }

    pub fn integrity(&self) -> IntegrityReport {
        verify_records(&self.records)
    }

    pub fn timeline(&self, domain: Option<&Domain>) -> impl Iterator<Item = &EventRecord> {
        let domain = domain.cloned();
        self.records
            .iter()
            .filter(move |r| domain.as_ref().map_or(true, |d| r.domain() == d))
    }

    /// State of `key` after `at` accepted moves, or its latest state.
    ///
    /// `None` when `at` is past the last recorded tick.
    pub fn state_at(&self, key: &MatchId, at: Option<u64>) -> Option<Frame> {
        let rules = GameRules::from(&self.config);
        let derivation = derive(&rules, &Domain::Game, key, &self.records);
        match at {
            None => Some(Frame {
                state: derivation.state.clone(),
                events_folded: derivation.events_folded,
            }),
            Some(tick) => derivation.frame_at(tick).cloned(),
        }
    }

    pub fn projection(&self, domain: Option<&Domain>) -> Projection {
        project(&self.records, domain)
    }
}
