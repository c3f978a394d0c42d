//! CLI binary driving the conformance harness.

use std::path::Path;

use clap::Parser;
use conformance_harness::{
    cli::{Command, ConformanceCli, RunArgs, VerifyArgs},
    config::HarnessConfig,
    orchestrator::TestOrchestrator,
    signal::setup_signal_handler,
    signer,
    verifier::ConsensusVerifier,
};
use eyre::Result;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = ConformanceCli::parse();
    match cli.command {
        Command::Run(args) => run(args).await,
        Command::Verify(args) => verify(args).await,
        Command::Keygen => keygen(),
    }
}

async fn run(args: RunArgs) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(rounds) = args.rounds {
        config = config.with_rounds(rounds);
    }
    if let Some(secs) = args.settlement_secs {
        config = config.with_settlement(std::time::Duration::from_secs(secs));
    }
    if let Some(ms) = args.pacing_ms {
        config = config.with_pacing(std::time::Duration::from_millis(ms));
    }
    if let Some(quorum) = args.quorum {
        config = config.with_quorum(quorum);
    }
    if let Some(node_binary) = args.node_binary {
        config = config.with_node_binary(node_binary);
    }

    let orchestrator = TestOrchestrator::new(config)?;
    let cancel = CancellationToken::new();
    setup_signal_handler(cancel.clone());

    let report = orchestrator.run(cancel).await?;
    println!("{report}");

    if report.passed() {
        Ok(())
    } else {
        std::process::exit(1);
    }
}

async fn verify(args: VerifyArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    config.validate()?;
    let quorum = args.quorum.unwrap_or_else(|| config.effective_quorum());

    let http = reqwest::Client::builder().timeout(config.request_timeout).build()?;
    let verifier = ConsensusVerifier::new(http, config.host.clone(), quorum);
    let verdict = verifier.verify(&config.nodes).await;
    println!("{verdict}");

    if verdict.is_agreement() {
        Ok(())
    } else {
        std::process::exit(1);
    }
}

fn keygen() -> Result<()> {
    let (private, public) = signer::generate_keypair();
    println!("private key (seed || public key): {private}");
    println!("address / public key:             {public}");
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<HarnessConfig> {
    match path {
        Some(path) => HarnessConfig::load(path),
        None => Ok(HarnessConfig::default()),
    }
}
