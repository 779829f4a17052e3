// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
pub mod concurrency_tests;
pub mod determinism_tests;

use crate::clock::ManualClock;
use crate::config::KernelConfig;
use crate::kernel::Kernel;
use crate::log::sink::MemorySink;
use crate::log::EventLog;
use std::sync::Arc;

/// In-memory kernel with reproducible timestamps.
pub(crate) fn test_kernel() -> Kernel {
    let log = EventLog::with_parts(Box::new(MemorySink), Arc::new(ManualClock::new(1_700_000_000_000))).unwrap();
    Kernel::with_log(Arc::new(log), KernelConfig::default()).unwrap()
}

pub(crate) fn count_kind(kernel: &Kernel, kind: &str) -> usize {
    kernel
        .log()
        .chain()
        .unwrap()
        .iter()
        .filter(|r| r.kind() == kind)
        .count()
}
