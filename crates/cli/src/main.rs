// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use annal_cli::commands::{project, state, timeline, verify};
use annal_cli::telemetry;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "annal")]
#[command(about = "Annal Forensic CLI - inspect and verify hash-chained event logs", long_about = None)]
struct Cli {
    /// Kernel config (JSON). Only rule-dependent commands read it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify the hash chain of a log file
    Verify { log: PathBuf },
    /// List the event timeline
    Timeline {
        log: PathBuf,

        /// Only show records of this domain
        #[arg(long, short)]
        domain: Option<String>,
    },
    /// Reconstruct a match state, optionally at an earlier tick
    State {
        log: PathBuf,

        #[arg(long = "match", short)]
        match_id: String,

        /// Tick to rewind to
        #[arg(long, short)]
        at: Option<u64>,
    },
    /// Print the projection of the log as JSON
    Project {
        log: PathBuf,

        #[arg(long, short)]
        domain: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    telemetry::init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Verify { log } => verify::run(&log),
        Commands::Timeline { log, domain } => timeline::run(&log, domain.as_deref()),
        Commands::State { log, match_id, at } => state::run(&log, cli.config.as_deref(), &match_id, at),
        Commands::Project { log, domain } => project::run(&log, domain.as_deref()),
    }
}
