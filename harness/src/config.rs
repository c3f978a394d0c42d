//! Harness configuration.
//!
//! Everything the original hard-coded (three nodes, one keypair, fixed
//! delays) lives here as data: the node roster, key material, and the
//! workload/timing knobs, with builder-style setters and an optional YAML
//! file representation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use eyre::{Result, WrapErr, ensure};
use serde::Deserialize;

use crate::cluster::NodeSpec;
use crate::error::SigningError;
use crate::signer;
use crate::tx;

/// Ed25519 keypair (seed || public key, hex) used by the bundled example
/// configuration. Test material only.
pub const EXAMPLE_SIGNING_KEY: &str = "d24cb18f2225cdf48f17560d8803e5a4285a8c2b17dd94d6b942cb686ba6a92c6adb5500f467f004523d0f9e37acbbdaffc033b5f98fcb6c97fb601060b68f90";

/// Sender address derived from [`EXAMPLE_SIGNING_KEY`].
pub const EXAMPLE_SENDER: &str =
    "6adb5500f467f004523d0f9e37acbbdaffc033b5f98fcb6c97fb601060b68f90";

/// Receiver address used by the bundled example configuration.
pub const EXAMPLE_RECEIVER: &str =
    "69c5f684026e6bd3e2a8f175a892ca6858cb9936b3c525ce11b981f848a69fc2";

/// Full configuration for a conformance run.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Path of the node binary to launch, once per cluster member.
    pub node_binary: PathBuf,
    /// Host the nodes listen on.
    pub host: String,
    /// Cluster members, in order. The first reachable one is the reference
    /// for consensus comparison.
    pub nodes: Vec<NodeSpec>,
    /// Private key used to sign every workload transaction. Its public half
    /// must equal `sender`: the node verifies signatures against the sender
    /// address.
    pub signing_key: String,
    /// Sender address stamped on every transaction.
    pub sender: String,
    /// Receiver address stamped on every transaction.
    pub receiver: String,
    /// Submission rounds; each round submits one transaction per node.
    pub rounds: u32,
    /// Delay between consecutive submissions.
    pub pacing: Duration,
    /// Wait after launching each node, letting its listener bind.
    pub readiness_delay: Duration,
    /// Wait between the last submission and verification, the time budget
    /// for the cluster to finish ordering the workload. Fixed, not adaptive.
    pub settlement: Duration,
    /// How long a node gets to exit on SIGTERM before being killed.
    pub shutdown_grace: Duration,
    /// Per-request HTTP timeout.
    pub request_timeout: Duration,
    /// Minimum reachable snapshots for a meaningful verdict. `None` means a
    /// strict majority of the configured nodes.
    pub quorum: Option<usize>,
    /// Directory for per-node process logs.
    pub log_dir: PathBuf,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        let nodes = (0..3)
            .map(|i| NodeSpec {
                port: 8080 + i,
                config_path: PathBuf::from(format!("configs/node{}.yaml", i + 1)),
            })
            .collect();
        Self {
            node_binary: PathBuf::from("./ledger-node"),
            host: "127.0.0.1".to_string(),
            nodes,
            signing_key: EXAMPLE_SIGNING_KEY.to_string(),
            sender: EXAMPLE_SENDER.to_string(),
            receiver: EXAMPLE_RECEIVER.to_string(),
            rounds: 10,
            pacing: Duration::from_millis(100),
            readiness_delay: Duration::from_secs(3),
            settlement: Duration::from_secs(20),
            shutdown_grace: Duration::from_secs(10),
            request_timeout: Duration::from_secs(5),
            quorum: None,
            log_dir: PathBuf::from("conformance-logs"),
        }
    }
}

impl HarnessConfig {
    /// Builds a configuration whose sender address is derived from the
    /// signing key, the pairing the node's authentication rule requires.
    pub fn self_signed(
        signing_key: impl Into<String>,
        receiver: impl Into<String>,
    ) -> Result<Self, SigningError> {
        let signing_key = signing_key.into();
        let sender = signer::derive_public_key(&signing_key)?;
        Ok(Self {
            signing_key,
            sender,
            receiver: receiver.into(),
            ..Self::default()
        })
    }

    /// Loads a configuration from a YAML file.
    ///
    /// `sender` may be omitted, in which case it is derived from the signing
    /// key. Call [`HarnessConfig::validate`] before running.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read config file {}", path.display()))?;
        let file: ConfigFile = serde_yaml::from_str(&raw)
            .wrap_err_with(|| format!("failed to parse config file {}", path.display()))?;
        file.into_config()
    }

    /// Sets the node binary.
    pub fn with_node_binary(mut self, node_binary: impl Into<PathBuf>) -> Self {
        self.node_binary = node_binary.into();
        self
    }

    /// Sets the cluster roster.
    pub fn with_nodes(mut self, nodes: Vec<NodeSpec>) -> Self {
        self.nodes = nodes;
        self
    }

    /// Sets the number of submission rounds.
    pub fn with_rounds(mut self, rounds: u32) -> Self {
        self.rounds = rounds;
        self
    }

    /// Sets the inter-submission pacing delay.
    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    /// Sets the post-launch readiness delay.
    pub fn with_readiness_delay(mut self, readiness_delay: Duration) -> Self {
        self.readiness_delay = readiness_delay;
        self
    }

    /// Sets the settlement window.
    pub fn with_settlement(mut self, settlement: Duration) -> Self {
        self.settlement = settlement;
        self
    }

    /// Sets the SIGTERM grace period.
    pub fn with_shutdown_grace(mut self, shutdown_grace: Duration) -> Self {
        self.shutdown_grace = shutdown_grace;
        self
    }

    /// Sets an explicit quorum.
    pub fn with_quorum(mut self, quorum: usize) -> Self {
        self.quorum = Some(quorum);
        self
    }

    /// Sets the process log directory.
    pub fn with_log_dir(mut self, log_dir: impl Into<PathBuf>) -> Self {
        self.log_dir = log_dir.into();
        self
    }

    /// The quorum in effect: the configured value, or a strict majority of
    /// the configured nodes. A single reachable node out of three is not
    /// consensus.
    pub fn effective_quorum(&self) -> usize {
        self.quorum.unwrap_or(self.nodes.len() / 2 + 1)
    }

    /// Checks internal consistency: a non-empty roster, well-formed
    /// addresses, a decodable signing key whose public half matches the
    /// sender, and a quorum within bounds.
    pub fn validate(&self) -> Result<()> {
        ensure!(!self.nodes.is_empty(), "at least one node is required");
        ensure!(self.rounds >= 1, "at least one submission round is required");
        ensure!(
            tx::is_valid_address(&self.sender),
            "sender is not a 64-hex-character address"
        );
        ensure!(
            tx::is_valid_address(&self.receiver),
            "receiver is not a 64-hex-character address"
        );

        let derived = signer::derive_public_key(&self.signing_key)
            .wrap_err("signing key does not decode")?;
        ensure!(
            derived == self.sender,
            "signing key public half {derived} does not match sender {}; \
             the node verifies signatures against the sender address",
            self.sender
        );

        let quorum = self.effective_quorum();
        ensure!(
            quorum >= 1 && quorum <= self.nodes.len(),
            "quorum {quorum} is outside 1..={}",
            self.nodes.len()
        );
        Ok(())
    }
}

/// On-disk YAML shape of [`HarnessConfig`]. Durations are spelled out in
/// explicit units.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    node_binary: PathBuf,
    #[serde(default = "defaults::host")]
    host: String,
    nodes: Vec<NodeSpec>,
    signing_key: String,
    sender: Option<String>,
    receiver: String,
    #[serde(default = "defaults::rounds")]
    rounds: u32,
    #[serde(default = "defaults::pacing_ms")]
    pacing_ms: u64,
    #[serde(default = "defaults::readiness_secs")]
    readiness_secs: u64,
    #[serde(default = "defaults::settlement_secs")]
    settlement_secs: u64,
    #[serde(default = "defaults::shutdown_grace_secs")]
    shutdown_grace_secs: u64,
    #[serde(default = "defaults::request_timeout_secs")]
    request_timeout_secs: u64,
    quorum: Option<usize>,
    #[serde(default = "defaults::log_dir")]
    log_dir: PathBuf,
}

impl ConfigFile {
    fn into_config(self) -> Result<HarnessConfig> {
        let sender = match self.sender {
            Some(sender) => sender,
            None => signer::derive_public_key(&self.signing_key)
                .wrap_err("cannot derive sender from signing key")?,
        };
        Ok(HarnessConfig {
            node_binary: self.node_binary,
            host: self.host,
            nodes: self.nodes,
            signing_key: self.signing_key,
            sender,
            receiver: self.receiver,
            rounds: self.rounds,
            pacing: Duration::from_millis(self.pacing_ms),
            readiness_delay: Duration::from_secs(self.readiness_secs),
            settlement: Duration::from_secs(self.settlement_secs),
            shutdown_grace: Duration::from_secs(self.shutdown_grace_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            quorum: self.quorum,
            log_dir: self.log_dir,
        })
    }
}

mod defaults {
    use std::path::PathBuf;

    pub(super) fn host() -> String {
        "127.0.0.1".to_string()
    }
    pub(super) fn rounds() -> u32 {
        10
    }
    pub(super) fn pacing_ms() -> u64 {
        100
    }
    pub(super) fn readiness_secs() -> u64 {
        3
    }
    pub(super) fn settlement_secs() -> u64 {
        20
    }
    pub(super) fn shutdown_grace_secs() -> u64 {
        10
    }
    pub(super) fn request_timeout_secs() -> u64 {
        5
    }
    pub(super) fn log_dir() -> PathBuf {
        PathBuf::from("conformance-logs")
    }
}
