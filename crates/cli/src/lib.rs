// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Forensic commands over a persisted event log. All of them are read-only.

pub mod commands;
pub mod engine;
pub mod telemetry;
