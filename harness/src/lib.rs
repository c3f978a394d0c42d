//! Consensus conformance harness for replicated ledger nodes.
//!
//! Drives an independently built ledger node cluster through a workload of
//! signed transactions and verifies that every reachable node converges on
//! an identical, ordered chain. The node itself (mining, validation,
//! gossip) is a black box reached through two HTTP endpoints:
//! `POST /transactions/new` and `GET /chain`.
//!
//! # Overview
//!
//! The harness is organized into layers:
//!
//! - **Config**: cluster roster, key material, workload and timing knobs
//! - **Cluster**: external node process lifecycle with guaranteed teardown
//! - **Signer / Tx**: deterministic Ed25519 signing and the wire format
//! - **Client**: per-node HTTP access for submission and snapshots
//! - **Verifier**: quorum-aware snapshot equality over canonical JSON
//! - **Orchestrator**: run sequencing tying the layers together
//!
//! # Example
//!
//! ```rust,ignore
//! use conformance_harness::{HarnessConfig, TestOrchestrator};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> eyre::Result<()> {
//! let config = HarnessConfig::load("harness.yaml".as_ref())?;
//! let orchestrator = TestOrchestrator::new(config)?;
//! let report = orchestrator.run(CancellationToken::new()).await?;
//! assert!(report.passed());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

// Used by the binaries only.
use axum as _;
use tracing_subscriber as _;

pub mod cli;
pub mod client;
pub mod cluster;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod signal;
pub mod signer;
pub mod tx;
pub mod verifier;

pub use client::{LedgerClient, LedgerSnapshot};
pub use cluster::{ClusterManager, ManagedNode, NodeSpec};
pub use config::HarnessConfig;
pub use orchestrator::{RunReport, TestOrchestrator};
pub use tx::{Transaction, TransactionFactory};
pub use verifier::{ConsensusVerdict, ConsensusVerifier};
