//! Minimal in-memory ledger node used by the harness self-tests.
//!
//! Speaks just enough of the node HTTP surface for the harness: accepts
//! transactions on `POST /transactions/new` and serves a static single-block
//! chain on `GET /chain`. It never mines, so a cluster of stubs stays
//! trivially in agreement while exercising the full orchestration path.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use clap::Parser;
use conformance_harness::signal::setup_signal_handler;
use eyre::{Result, WrapErr, eyre};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Stub ledger node for harness self-tests
#[derive(Parser, Debug)]
#[command(name = "stub-node")]
struct StubNodeArgs {
    /// Node configuration file; only the `port` key is honored
    #[arg(long)]
    config: PathBuf,
}

#[derive(Debug, Default)]
struct StubState {
    accepted: AtomicU64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = StubNodeArgs::parse();
    let port = read_port(&args.config)?;

    let state = Arc::new(StubState::default());
    let app = Router::new()
        .route("/transactions/new", post(new_transaction))
        .route("/chain", get(chain))
        .with_state(state);

    let listener = TcpListener::bind(("127.0.0.1", port))
        .await
        .wrap_err_with(|| format!("failed to bind port {port}"))?;
    info!(port, "stub node listening");

    let cancel = CancellationToken::new();
    setup_signal_handler(cancel.clone());

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .wrap_err("stub node server failed")?;

    info!(port, "stub node shut down");
    Ok(())
}

async fn new_transaction(
    State(state): State<Arc<StubState>>,
    Json(_tx): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let accepted = state.accepted.fetch_add(1, Ordering::Relaxed) + 1;
    (
        StatusCode::CREATED,
        Json(json!({ "message": "transaction accepted", "accepted": accepted })),
    )
}

async fn chain(State(_state): State<Arc<StubState>>) -> Json<Value> {
    Json(json!({ "length": 1, "chain": [genesis_block()] }))
}

fn genesis_block() -> Value {
    json!({
        "index": 0,
        "previous_hash": "0",
        "timestamp": 0,
        "nonce": 0,
        "transactions": [],
    })
}

fn read_port(config: &PathBuf) -> Result<u16> {
    let raw = std::fs::read_to_string(config)
        .wrap_err_with(|| format!("failed to read config file {}", config.display()))?;
    let doc: Value = serde_yaml::from_str::<serde_yaml::Value>(&raw)
        .wrap_err("config file is not valid YAML")
        .and_then(|value| serde_json::to_value(value).wrap_err("config file is not plain data"))?;

    let port = doc
        .get("port")
        .ok_or_else(|| eyre!("config file has no `port` key"))?;
    let port = match port {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
    .ok_or_else(|| eyre!("`port` is not a number"))?;

    u16::try_from(port).wrap_err("`port` is out of range")
}
