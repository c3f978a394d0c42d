//! HTTP accessor for a single ledger node.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::NetworkError;
use crate::tx::Transaction;

/// A point-in-time read of one node's full ledger state, from `GET /chain`.
///
/// Block contents are opaque to the harness; they are only ever compared for
/// equality through their canonical JSON encoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    /// Number of blocks the node reports.
    pub length: u64,
    /// The blocks themselves, in chain order.
    pub chain: Vec<Value>,
}

/// Stateless HTTP client for one node's transaction and chain endpoints.
///
/// Cheap to build per call or per node; requests share the underlying
/// `reqwest` connection pool.
#[derive(Debug, Clone)]
pub struct LedgerClient {
    http: reqwest::Client,
    base_url: String,
    port: u16,
}

impl LedgerClient {
    /// Creates a client for the node at `http://<host>:<port>`.
    pub fn new(http: reqwest::Client, host: &str, port: u16) -> Self {
        Self {
            http,
            base_url: format!("http://{host}:{port}"),
            port,
        }
    }

    /// Submits a transaction via `POST /transactions/new`.
    ///
    /// The response body is not interpreted beyond the status code; any
    /// transport failure or non-success status is a [`NetworkError`], which
    /// the caller records without aborting the run.
    pub async fn submit(&self, tx: &Transaction) -> Result<(), NetworkError> {
        let response = self
            .http
            .post(format!("{}/transactions/new", self.base_url))
            .json(tx)
            .send()
            .await
            .map_err(|source| NetworkError::Transport { port: self.port, source })?;

        let status = response.status();
        if !status.is_success() {
            return Err(NetworkError::BadStatus { port: self.port, status });
        }
        Ok(())
    }

    /// Fetches the node's current ledger via `GET /chain`.
    pub async fn fetch_snapshot(&self) -> Result<LedgerSnapshot, NetworkError> {
        let response = self
            .http
            .get(format!("{}/chain", self.base_url))
            .send()
            .await
            .map_err(|source| NetworkError::Transport { port: self.port, source })?;

        let status = response.status();
        if !status.is_success() {
            return Err(NetworkError::BadStatus { port: self.port, status });
        }

        response
            .json::<LedgerSnapshot>()
            .await
            .map_err(|source| NetworkError::BadBody { port: self.port, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn free_port() -> u16 {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    #[tokio::test]
    async fn unreachable_node_yields_transport_error() {
        let port = free_port();
        let client = LedgerClient::new(reqwest::Client::new(), "127.0.0.1", port);
        let err = client.fetch_snapshot().await.unwrap_err();
        assert!(matches!(err, NetworkError::Transport { .. }));
        assert_eq!(err.port(), port);
    }

    #[test]
    fn snapshot_parses_the_chain_response_shape() {
        let snapshot: LedgerSnapshot = serde_json::from_str(
            r#"{"length": 2, "chain": [{"index": 0}, {"index": 1, "transactions": []}]}"#,
        )
        .unwrap();
        assert_eq!(snapshot.length, 2);
        assert_eq!(snapshot.chain.len(), 2);
    }
}
