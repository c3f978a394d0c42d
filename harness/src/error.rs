//! Error types for the conformance harness.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while signing or verifying transaction payloads.
///
/// Signing failures are the only hard stop in the harness: a transaction
/// must never be submitted with a signature that cannot verify.
#[derive(Debug, Error)]
pub enum SigningError {
    /// The private key was not valid hex or had the wrong byte length.
    #[error("invalid private key encoding: {0}")]
    InvalidKeyEncoding(String),

    /// A public key or signature could not be decoded for verification.
    #[error("invalid signature material: {0}")]
    InvalidSignatureMaterial(String),
}

/// A submission or snapshot fetch against one node failed.
///
/// Network errors are non-fatal: the run continues and the affected node is
/// excluded from that round's consensus comparison.
#[derive(Debug, Error)]
pub enum NetworkError {
    /// The request never completed (connection refused, timeout, ...).
    #[error("request to node {port} failed: {source}")]
    Transport {
        /// Port of the node the request targeted.
        port: u16,
        /// Underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// The node answered with a non-success status code.
    #[error("node {port} returned status {status}")]
    BadStatus {
        /// Port of the node the request targeted.
        port: u16,
        /// Status code returned by the node.
        status: reqwest::StatusCode,
    },

    /// The node's response body did not parse as the expected JSON shape.
    #[error("node {port} returned a malformed body: {source}")]
    BadBody {
        /// Port of the node the request targeted.
        port: u16,
        /// Underlying decode error.
        #[source]
        source: reqwest::Error,
    },
}

impl NetworkError {
    /// Port of the node the failed request targeted.
    pub const fn port(&self) -> u16 {
        match self {
            Self::Transport { port, .. }
            | Self::BadStatus { port, .. }
            | Self::BadBody { port, .. } => *port,
        }
    }
}

/// A node process could not be launched.
///
/// Reported and recorded, but the remaining nodes still launch; the cluster
/// proceeds in degraded form.
#[derive(Debug, Error)]
#[error("failed to launch node for port {port} ({config_path:?}): {source}")]
pub struct ProcessLaunchError {
    /// Port the failed node was meant to serve.
    pub port: u16,
    /// Configuration file the node was given.
    pub config_path: PathBuf,
    /// Underlying spawn error.
    #[source]
    pub source: std::io::Error,
}
