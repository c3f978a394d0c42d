//! CLI definitions for the conformance harness.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Drive a ledger node cluster through a signed workload and check that all
/// nodes converge on the same chain.
#[derive(Parser, Debug)]
#[command(name = "conformance")]
pub struct ConformanceCli {
    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the full conformance scenario
    Run(RunArgs),
    /// Check consensus on an already-running cluster, without managing
    /// processes
    Verify(VerifyArgs),
    /// Generate an Ed25519 keypair for harness fixtures
    Keygen,
}

/// Arguments for `conformance run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to a YAML harness configuration
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the number of submission rounds
    #[arg(long)]
    pub rounds: Option<u32>,

    /// Override the settlement window, in seconds
    #[arg(long)]
    pub settlement_secs: Option<u64>,

    /// Override the inter-submission pacing, in milliseconds
    #[arg(long)]
    pub pacing_ms: Option<u64>,

    /// Override the consensus quorum
    #[arg(long)]
    pub quorum: Option<usize>,

    /// Override the node binary to launch
    #[arg(long)]
    pub node_binary: Option<PathBuf>,
}

/// Arguments for `conformance verify`.
#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Path to a YAML harness configuration
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the consensus quorum
    #[arg(long)]
    pub quorum: Option<usize>,
}
