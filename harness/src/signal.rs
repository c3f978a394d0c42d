//! Interrupt handling for guaranteed teardown.

use tokio_util::sync::CancellationToken;
use tracing::info;

/// Installs SIGINT + SIGTERM handlers that cancel the given token.
///
/// The orchestrator races its run against this token, so an interrupt in
/// any phase still reaches cluster teardown before the process exits.
pub fn setup_signal_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        wait_for_interrupt().await;
        cancel.cancel();
    });
}

#[cfg(unix)]
async fn wait_for_interrupt() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate()).expect("failed to register SIGTERM handler");
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.expect("failed to listen for SIGINT");
            info!("received SIGINT");
        }
        _ = sigterm.recv() => {
            info!("received SIGTERM");
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_interrupt() {
    tokio::signal::ctrl_c().await.expect("failed to listen for SIGINT");
    info!("received SIGINT");
}
