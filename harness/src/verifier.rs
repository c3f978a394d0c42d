//! Consensus equality checking across node snapshots.

use std::fmt;

use serde_json::Value;
use tracing::warn;

use crate::client::{LedgerClient, LedgerSnapshot};
use crate::cluster::NodeSpec;

/// Outcome of a consensus check, with enough detail to diagnose a failure.
///
/// Only [`ConsensusVerdict::Agreement`] counts as consensus; every other
/// variant is a `false` verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsensusVerdict {
    /// Every compared snapshot matched the reference.
    Agreement {
        /// Number of snapshots that agreed.
        nodes: usize,
        /// The agreed chain length.
        length: u64,
    },
    /// No node produced a snapshot; agreement cannot be claimed with zero
    /// data.
    NoData,
    /// Fewer nodes were reachable than the quorum requires.
    InsufficientQuorum {
        /// Snapshots actually collected.
        reachable: usize,
        /// Minimum required by configuration.
        quorum: usize,
    },
    /// A node's chain length differed from the reference node's.
    LengthMismatch {
        /// Port of the disagreeing node.
        port: u16,
        /// Length reported by the reference node.
        expected: u64,
        /// Length reported by the disagreeing node.
        found: u64,
    },
    /// A node's chain content differed from the reference despite equal
    /// length.
    ContentMismatch {
        /// Port of the disagreeing node.
        port: u16,
    },
}

impl ConsensusVerdict {
    /// Whether the cluster is in agreement.
    pub const fn is_agreement(&self) -> bool {
        matches!(self, Self::Agreement { .. })
    }
}

impl fmt::Display for ConsensusVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Agreement { nodes, length } => {
                write!(f, "{nodes} reachable node(s) agree at chain length {length}")
            }
            Self::NoData => write!(f, "no node produced a snapshot"),
            Self::InsufficientQuorum { reachable, quorum } => {
                write!(f, "only {reachable} node(s) reachable, quorum requires {quorum}")
            }
            Self::LengthMismatch { port, expected, found } => {
                write!(f, "node {port} has chain length {found}, reference has {expected}")
            }
            Self::ContentMismatch { port } => {
                write!(f, "node {port} has diverging chain content at equal length")
            }
        }
    }
}

/// Fetches snapshots from every node and decides whether they agree.
#[derive(Debug, Clone)]
pub struct ConsensusVerifier {
    http: reqwest::Client,
    host: String,
    quorum: usize,
}

impl ConsensusVerifier {
    /// Creates a verifier requiring at least `quorum` reachable snapshots
    /// before agreement can be declared.
    pub fn new(http: reqwest::Client, host: impl Into<String>, quorum: usize) -> Self {
        Self {
            http,
            host: host.into(),
            quorum,
        }
    }

    /// Fetches snapshots in configured node order and compares them.
    ///
    /// Fetch failures exclude a node from the comparison rather than failing
    /// the verdict; the quorum check decides whether enough nodes remain.
    pub async fn verify(&self, specs: &[NodeSpec]) -> ConsensusVerdict {
        let snapshots = self.collect_snapshots(specs).await;
        compare(&snapshots, self.quorum)
    }

    /// Fetches one snapshot per node, preserving node order and skipping
    /// unreachable nodes.
    pub async fn collect_snapshots(&self, specs: &[NodeSpec]) -> Vec<(u16, LedgerSnapshot)> {
        let mut snapshots = Vec::with_capacity(specs.len());
        for spec in specs {
            let client = LedgerClient::new(self.http.clone(), &self.host, spec.port);
            match client.fetch_snapshot().await {
                Ok(snapshot) => snapshots.push((spec.port, snapshot)),
                Err(err) => {
                    warn!(port = spec.port, %err, "snapshot fetch failed, excluding node");
                }
            }
        }
        snapshots
    }
}

/// Compares snapshots against the first one collected (the reference, which
/// is deterministic because collection preserves configured node order).
///
/// Chain content is compared through its canonical JSON encoding: object
/// keys are emitted in sorted order, so value equality is tested rather than
/// incidental field order.
pub fn compare(snapshots: &[(u16, LedgerSnapshot)], quorum: usize) -> ConsensusVerdict {
    let Some(((_, reference), rest)) = snapshots.split_first() else {
        return ConsensusVerdict::NoData;
    };

    if snapshots.len() < quorum {
        return ConsensusVerdict::InsufficientQuorum {
            reachable: snapshots.len(),
            quorum,
        };
    }

    let reference_chain = canonical(&reference.chain);
    for (port, snapshot) in rest {
        if snapshot.length != reference.length {
            return ConsensusVerdict::LengthMismatch {
                port: *port,
                expected: reference.length,
                found: snapshot.length,
            };
        }
        if canonical(&snapshot.chain) != reference_chain {
            return ConsensusVerdict::ContentMismatch { port: *port };
        }
    }

    ConsensusVerdict::Agreement {
        nodes: snapshots.len(),
        length: reference.length,
    }
}

/// Canonical JSON encoding of a chain. `serde_json` maps are sorted by key,
/// so this is a total, deterministic equality key over otherwise opaque
/// block values.
fn canonical(chain: &[Value]) -> String {
    serde_json::to_string(chain).expect("JSON values always serialize")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot(port: u16, length: u64, chain: Value) -> (u16, LedgerSnapshot) {
        let chain = chain.as_array().cloned().unwrap_or_default();
        (port, LedgerSnapshot { length, chain })
    }

    fn block(index: u64, message: &str) -> Value {
        json!({"index": index, "previous_hash": "00", "transactions": [{"message": message}]})
    }

    #[test]
    fn identical_snapshots_agree() {
        let chain = json!([block(0, "genesis"), block(1, "a")]);
        let snapshots = vec![
            snapshot(8080, 2, chain.clone()),
            snapshot(8081, 2, chain.clone()),
            snapshot(8082, 2, chain),
        ];
        assert_eq!(
            compare(&snapshots, 2),
            ConsensusVerdict::Agreement { nodes: 3, length: 2 }
        );
    }

    #[test]
    fn zero_snapshots_never_agree() {
        assert_eq!(compare(&[], 1), ConsensusVerdict::NoData);
    }

    #[test]
    fn length_mismatch_is_reported_with_the_node() {
        let snapshots = vec![
            snapshot(8080, 2, json!([block(0, "g"), block(1, "a")])),
            snapshot(8081, 3, json!([block(0, "g"), block(1, "a"), block(2, "b")])),
        ];
        assert_eq!(
            compare(&snapshots, 2),
            ConsensusVerdict::LengthMismatch { port: 8081, expected: 2, found: 3 }
        );
    }

    #[test]
    fn content_mismatch_at_equal_length_is_detected() {
        let snapshots = vec![
            snapshot(8080, 2, json!([block(0, "g"), block(1, "mined a")])),
            snapshot(8081, 2, json!([block(0, "g"), block(1, "mined b")])),
        ];
        assert_eq!(
            compare(&snapshots, 2),
            ConsensusVerdict::ContentMismatch { port: 8081 }
        );
    }

    #[test]
    fn field_order_does_not_affect_equality() {
        let first: Value =
            serde_json::from_str(r#"[{"index": 1, "previous_hash": "aa", "nonce": 4}]"#).unwrap();
        let second: Value =
            serde_json::from_str(r#"[{"nonce": 4, "previous_hash": "aa", "index": 1}]"#).unwrap();
        let snapshots = vec![snapshot(8080, 1, first), snapshot(8081, 1, second)];
        assert!(compare(&snapshots, 2).is_agreement());
    }

    #[test]
    fn single_snapshot_below_quorum_is_not_consensus() {
        let snapshots = vec![snapshot(8080, 5, json!([]))];
        assert_eq!(
            compare(&snapshots, 2),
            ConsensusVerdict::InsufficientQuorum { reachable: 1, quorum: 2 }
        );
    }

    #[test]
    fn single_snapshot_with_quorum_of_one_agrees() {
        let snapshots = vec![snapshot(8080, 5, json!([block(0, "g")]))];
        assert_eq!(
            compare(&snapshots, 1),
            ConsensusVerdict::Agreement { nodes: 1, length: 5 }
        );
    }
}
