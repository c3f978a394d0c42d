//! Teardown invariant: after any run, no managed node process survives.

#![cfg(unix)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use conformance_harness::{
    ClusterManager, HarnessConfig, NodeSpec, TestOrchestrator,
    cluster::{process_alive, write_node_config},
};
use tokio_util::sync::CancellationToken;

fn stub_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_stub-node"))
}

fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

fn manager(dir: &Path) -> ClusterManager {
    ClusterManager::new(
        stub_binary(),
        Duration::from_millis(300),
        Duration::from_secs(5),
        dir.join("logs"),
    )
}

fn specs(dir: &Path, ports: &[u16]) -> Vec<NodeSpec> {
    ports
        .iter()
        .map(|&port| NodeSpec {
            port,
            config_path: write_node_config(dir, port).unwrap(),
        })
        .collect()
}

#[tokio::test]
async fn stop_terminates_every_started_node() {
    let dir = tempfile::tempdir().unwrap();
    let ports = [free_port(), free_port(), free_port()];
    let manager = manager(dir.path());

    let (mut nodes, failures) = manager.start(&specs(dir.path(), &ports)).await;
    assert!(failures.is_empty());
    assert_eq!(nodes.len(), 3);

    let pids: Vec<u32> = nodes.iter().map(|node| node.pid().unwrap()).collect();
    for node in &mut nodes {
        assert!(node.is_running(), "node {} died prematurely", node.port());
    }

    manager.stop(&mut nodes).await;

    assert!(nodes.is_empty());
    for pid in pids {
        assert!(!process_alive(pid), "pid {pid} still running after stop");
    }
}

#[tokio::test]
async fn stop_is_safe_on_a_partially_started_cluster() {
    let dir = tempfile::tempdir().unwrap();
    let manager = manager(dir.path());

    // One healthy node, one whose configuration makes the process exit
    // immediately at startup.
    let healthy = free_port();
    let mut cluster = specs(dir.path(), &[healthy]);
    let broken = dir.path().join("broken.yaml");
    std::fs::write(&broken, "no port here\n").unwrap();
    cluster.push(NodeSpec {
        port: free_port(),
        config_path: broken,
    });

    let (mut nodes, failures) = manager.start(&cluster).await;
    assert!(failures.is_empty(), "spawn itself succeeds for both");
    assert_eq!(nodes.len(), 2);

    manager.stop(&mut nodes).await;
    assert!(nodes.is_empty());

    // Calling stop again is a no-op.
    manager.stop(&mut nodes).await;
}

#[tokio::test]
async fn launch_failures_are_reported_and_stop_still_works() {
    let dir = tempfile::tempdir().unwrap();
    let manager = ClusterManager::new(
        dir.path().join("no-such-binary"),
        Duration::from_millis(10),
        Duration::from_secs(1),
        dir.path().join("logs"),
    );

    let (mut nodes, failures) = manager.start(&specs(dir.path(), &[free_port()])).await;
    assert!(nodes.is_empty());
    assert_eq!(failures.len(), 1);

    manager.stop(&mut nodes).await;
}

#[tokio::test]
async fn interrupt_during_submission_still_tears_the_cluster_down() {
    let dir = tempfile::tempdir().unwrap();
    let ports = [free_port(), free_port(), free_port()];
    let nodes = specs(dir.path(), &ports);

    // A workload far too large to finish, so cancellation lands in the
    // submitting phase.
    let config = HarnessConfig::default()
        .with_node_binary(stub_binary())
        .with_nodes(nodes)
        .with_rounds(100_000)
        .with_pacing(Duration::from_millis(20))
        .with_readiness_delay(Duration::from_millis(200))
        .with_settlement(Duration::from_secs(60))
        .with_shutdown_grace(Duration::from_secs(5))
        .with_log_dir(dir.path().join("logs"));

    let orchestrator = TestOrchestrator::new(config).unwrap();
    let cancel = CancellationToken::new();

    let run = {
        let cancel = cancel.clone();
        tokio::spawn(async move { orchestrator.run(cancel).await })
    };

    // Let the cluster come up and some submissions go through.
    tokio::time::sleep(Duration::from_millis(1500)).await;
    cancel.cancel();

    let report = run.await.unwrap().unwrap();
    assert!(report.interrupted);
    assert!(!report.passed());
    assert!(report.verdict.is_none());

    // No stub is listening any more.
    for port in ports {
        let addr = format!("127.0.0.1:{port}").parse().unwrap();
        let result = std::net::TcpStream::connect_timeout(&addr, Duration::from_millis(500));
        assert!(result.is_err(), "port {port} still accepting connections");
    }
}
