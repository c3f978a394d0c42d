//! Top-level run sequencing: start cluster, submit workload, settle,
//! verify, report, tear down.

use std::fmt;

use eyre::{Result, WrapErr};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::LedgerClient;
use crate::cluster::{ClusterManager, ManagedNode};
use crate::config::HarnessConfig;
use crate::tx::TransactionFactory;
use crate::verifier::{ConsensusVerdict, ConsensusVerifier};

/// Everything a run observed, for reporting and for test assertions.
#[derive(Debug)]
pub struct RunReport {
    /// Nodes in the configuration.
    pub configured_nodes: usize,
    /// Nodes whose process actually launched.
    pub launched_nodes: usize,
    /// Launch failures, rendered for the summary.
    pub launch_failures: Vec<String>,
    /// Transactions accepted by a node.
    pub submitted: u64,
    /// Transactions that failed to submit.
    pub submit_failures: u64,
    /// The consensus verdict, if the run got that far.
    pub verdict: Option<ConsensusVerdict>,
    /// Final chain length per node port, best effort.
    pub final_lengths: Vec<(u16, Option<u64>)>,
    /// Whether the run was cut short by an external interrupt.
    pub interrupted: bool,
}

impl RunReport {
    fn new(configured_nodes: usize) -> Self {
        Self {
            configured_nodes,
            launched_nodes: 0,
            launch_failures: Vec::new(),
            submitted: 0,
            submit_failures: 0,
            verdict: None,
            final_lengths: Vec::new(),
            interrupted: false,
        }
    }

    /// Whether the run completed and ended in agreement.
    pub fn passed(&self) -> bool {
        !self.interrupted && self.verdict.as_ref().is_some_and(ConsensusVerdict::is_agreement)
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "conformance run summary")?;
        writeln!(f, "  nodes launched:     {}/{}", self.launched_nodes, self.configured_nodes)?;
        for failure in &self.launch_failures {
            writeln!(f, "    launch failure:   {failure}")?;
        }
        writeln!(f, "  transactions sent:  {}", self.submitted)?;
        writeln!(f, "  submit failures:    {}", self.submit_failures)?;
        for (port, length) in &self.final_lengths {
            match length {
                Some(length) => writeln!(f, "  node {port} chain length: {length}")?,
                None => writeln!(f, "  node {port} chain length: unreachable")?,
            }
        }
        if self.interrupted {
            writeln!(f, "  interrupted before completion")?;
        }
        match &self.verdict {
            Some(verdict) => write!(f, "  verdict: {verdict}"),
            None => write!(f, "  verdict: not reached"),
        }
    }
}

/// Sequences a full conformance run with guaranteed cluster teardown.
#[derive(Debug)]
pub struct TestOrchestrator {
    config: HarnessConfig,
    http: reqwest::Client,
}

impl TestOrchestrator {
    /// Validates the configuration and prepares the shared HTTP client.
    pub fn new(config: HarnessConfig) -> Result<Self> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .wrap_err("failed to build HTTP client")?;
        Ok(Self { config, http })
    }

    /// Runs the full scenario.
    ///
    /// Teardown is unconditional: it runs after normal completion, after an
    /// error in any phase, and after `cancel` fires mid-run. On
    /// cancellation the report is returned with `interrupted` set rather
    /// than an error.
    pub async fn run(&self, cancel: CancellationToken) -> Result<RunReport> {
        let manager = ClusterManager::new(
            &self.config.node_binary,
            self.config.readiness_delay,
            self.config.shutdown_grace,
            &self.config.log_dir,
        );
        let mut nodes = Vec::new();
        let mut report = RunReport::new(self.config.nodes.len());

        let outcome = tokio::select! {
            () = cancel.cancelled() => {
                warn!("run interrupted, tearing the cluster down");
                report.interrupted = true;
                Ok(())
            }
            outcome = self.drive(&manager, &mut nodes, &mut report) => outcome,
        };

        // Every exit path out of the select lands here before the caller
        // sees a result.
        manager.stop(&mut nodes).await;

        outcome?;
        Ok(report)
    }

    async fn drive(
        &self,
        manager: &ClusterManager,
        nodes: &mut Vec<ManagedNode>,
        report: &mut RunReport,
    ) -> Result<()> {
        info!(nodes = self.config.nodes.len(), "starting node cluster");
        let (started, failures) = manager.start(&self.config.nodes).await;
        *nodes = started;
        report.launched_nodes = nodes.len();
        report.launch_failures = failures.iter().map(ToString::to_string).collect();
        if !failures.is_empty() {
            warn!(
                launched = nodes.len(),
                configured = self.config.nodes.len(),
                "cluster is degraded, proceeding with the nodes that launched"
            );
        }

        self.submit_workload(report).await?;

        info!(settlement = ?self.config.settlement, "waiting for the cluster to settle");
        sleep(self.config.settlement).await;

        let verifier = ConsensusVerifier::new(
            self.http.clone(),
            self.config.host.clone(),
            self.config.effective_quorum(),
        );
        let verdict = verifier.verify(&self.config.nodes).await;
        info!(%verdict, agreement = verdict.is_agreement(), "consensus verdict");
        report.verdict = Some(verdict);

        self.collect_final_lengths(report).await;
        Ok(())
    }

    /// Submits `rounds × node_count` transactions round-robin with a fixed
    /// pacing delay. Submission failures are counted, not fatal; only a
    /// signing failure aborts, since it would otherwise put an unverifiable
    /// transaction on the wire.
    async fn submit_workload(&self, report: &mut RunReport) -> Result<()> {
        let factory = TransactionFactory::new(
            &self.config.sender,
            &self.config.receiver,
            &self.config.signing_key,
        );
        let total = u64::from(self.config.rounds) * self.config.nodes.len() as u64;
        info!(total, rounds = self.config.rounds, "submitting workload");

        for round in 0..self.config.rounds {
            for (i, spec) in self.config.nodes.iter().enumerate() {
                let message = format!("conformance tx for node {}, round {}", i + 1, round + 1);
                let tx = factory
                    .build(&message, false, "")
                    .wrap_err("transaction signing failed")?;

                let client = LedgerClient::new(self.http.clone(), &self.config.host, spec.port);
                match client.submit(&tx).await {
                    Ok(()) => report.submitted += 1,
                    Err(err) => {
                        report.submit_failures += 1;
                        debug!(port = spec.port, %err, "submission failed");
                    }
                }
                sleep(self.config.pacing).await;
            }
            debug!(
                completed = report.submitted + report.submit_failures,
                total,
                "submission progress"
            );
        }

        info!(
            submitted = report.submitted,
            failed = report.submit_failures,
            "workload submitted"
        );
        Ok(())
    }

    /// Best-effort final chain length per node.
    async fn collect_final_lengths(&self, report: &mut RunReport) {
        for spec in &self.config.nodes {
            let client = LedgerClient::new(self.http.clone(), &self.config.host, spec.port);
            let length = match client.fetch_snapshot().await {
                Ok(snapshot) => Some(snapshot.length),
                Err(err) => {
                    warn!(port = spec.port, %err, "could not fetch final chain length");
                    None
                }
            };
            report.final_lengths.push((spec.port, length));
        }
    }
}
