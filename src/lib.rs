// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! annal-kernel: a tamper-evident, event-sourced kernel.
//!
//! The [`EventLog`] is the single source of truth. Four collaborators are
//! built on it and nothing else:
//! - [`ProjectionEngine`]: derived read-models
//! - [`ReplayEngine`]: deterministic match state, with rollback
//! - [`HypothesisArbiter`]: recorded propose/score/select cycles
//! - [`ConsistencyReferee`]: view cross-checks and challenges

pub mod arbiter;
pub mod clock;
pub mod config;
pub mod error;
pub mod event;
pub mod kernel;
pub mod log;
pub mod projection;
pub mod referee;
pub mod replay;
pub mod types;

pub use arbiter::HypothesisArbiter;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::KernelConfig;
pub use error::{KernelError, KernelResult};
pub use event::{EventPayload, EventRecord};
pub use kernel::Kernel;
pub use log::{Chain, EventLog};
pub use projection::ProjectionEngine;
pub use referee::ConsistencyReferee;
pub use replay::ReplayEngine;

#[cfg(test)]
pub mod tests;
