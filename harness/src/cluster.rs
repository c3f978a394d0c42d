//! External node process lifecycle.
//!
//! The harness owns every node process it launches: processes are started
//! with `start`, handed back as an explicit collection, and reclaimed with
//! `stop`. Nothing else may touch them, and none may outlive the run.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use serde::Deserialize;
use tokio::process::{Child, Command};
use tokio::time::{sleep, timeout};
use tracing::{info, warn};

use crate::error::ProcessLaunchError;

/// Address and configuration of one cluster member, in cluster order.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NodeSpec {
    /// TCP port the node's HTTP listener binds.
    pub port: u16,
    /// Path of the node's configuration file, passed through verbatim.
    pub config_path: PathBuf,
}

/// A node process owned by the harness.
///
/// The underlying child is spawned with `kill_on_drop`, so even a panicking
/// run cannot leak a node process past the orchestrator.
#[derive(Debug)]
pub struct ManagedNode {
    port: u16,
    child: Child,
}

impl ManagedNode {
    /// Port of the node this process serves.
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// OS process id, if the process has not been reaped yet.
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Whether the process has not yet exited.
    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }
}

/// Launches and tears down the external node processes of the cluster.
#[derive(Debug, Clone)]
pub struct ClusterManager {
    node_binary: PathBuf,
    readiness_delay: Duration,
    shutdown_grace: Duration,
    log_dir: PathBuf,
}

impl ClusterManager {
    /// Creates a manager that launches `node_binary --config <path>` per
    /// node, waits `readiness_delay` after each launch, and allows
    /// `shutdown_grace` for a node to exit on SIGTERM before force-killing.
    pub fn new(
        node_binary: impl Into<PathBuf>,
        readiness_delay: Duration,
        shutdown_grace: Duration,
        log_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            node_binary: node_binary.into(),
            readiness_delay,
            shutdown_grace,
            log_dir: log_dir.into(),
        }
    }

    /// Starts one process per spec, in order.
    ///
    /// Node stdout/stderr are appended to `<log_dir>/node-<port>.log`. After
    /// each launch the manager sleeps the readiness delay so the node's
    /// listener can bind before the next step.
    ///
    /// A launch failure does not stop the remaining launches; failures are
    /// returned alongside the successfully started subset so the caller can
    /// decide how to treat a degraded cluster.
    pub async fn start(&self, specs: &[NodeSpec]) -> (Vec<ManagedNode>, Vec<ProcessLaunchError>) {
        let mut nodes = Vec::with_capacity(specs.len());
        let mut failures = Vec::new();

        for spec in specs {
            match self.launch(spec) {
                Ok(node) => {
                    info!(port = spec.port, "node process started");
                    nodes.push(node);
                }
                Err(err) => {
                    warn!(port = spec.port, %err, "node launch failed");
                    failures.push(err);
                }
            }
            sleep(self.readiness_delay).await;
        }

        (nodes, failures)
    }

    fn launch(&self, spec: &NodeSpec) -> Result<ManagedNode, ProcessLaunchError> {
        let stdout = self
            .open_log(spec.port)
            .map_err(|source| self.launch_error(spec, source))?;
        let stderr = stdout
            .try_clone()
            .map_err(|source| self.launch_error(spec, source))?;

        let child = Command::new(&self.node_binary)
            .arg("--config")
            .arg(&spec.config_path)
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| self.launch_error(spec, source))?;

        Ok(ManagedNode { port: spec.port, child })
    }

    /// Stops every process in `nodes`: graceful SIGTERM first, then a
    /// bounded wait, then SIGKILL for stragglers.
    ///
    /// Drains the collection, so calling it again (or on a partially started
    /// set) is safe.
    pub async fn stop(&self, nodes: &mut Vec<ManagedNode>) {
        for mut node in nodes.drain(..) {
            if let Err(err) = terminate_gracefully(&node.child) {
                // Process may already be gone; wait() below reaps it.
                warn!(port = node.port, %err, "failed to signal node");
            }

            match timeout(self.shutdown_grace, node.child.wait()).await {
                Ok(Ok(status)) => info!(port = node.port, %status, "node stopped"),
                Ok(Err(err)) => warn!(port = node.port, %err, "waiting for node failed"),
                Err(_) => {
                    warn!(port = node.port, "node ignored SIGTERM, killing");
                    if node.child.start_kill().is_ok() {
                        let _ = node.child.wait().await;
                    }
                }
            }
        }
    }

    fn open_log(&self, port: u16) -> std::io::Result<File> {
        std::fs::create_dir_all(&self.log_dir)?;
        OpenOptions::new()
            .append(true)
            .create(true)
            .open(self.log_dir.join(format!("node-{port}.log")))
    }

    fn launch_error(&self, spec: &NodeSpec, source: std::io::Error) -> ProcessLaunchError {
        ProcessLaunchError {
            port: spec.port,
            config_path: spec.config_path.clone(),
            source,
        }
    }
}

#[cfg(unix)]
fn terminate_gracefully(child: &Child) -> std::io::Result<()> {
    let Some(pid) = child.id() else {
        return Ok(()); // already reaped
    };
    let result = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
    if result == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn terminate_gracefully(_child: &Child) -> std::io::Result<()> {
    // No SIGTERM equivalent; the bounded wait in `stop` falls through to a
    // hard kill.
    Ok(())
}

/// Whether a process with `pid` is still alive, via a null signal probe.
#[cfg(unix)]
pub fn process_alive(pid: u32) -> bool {
    unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
}

/// Writes a minimal node configuration file containing the listen port.
///
/// Convenience for tests and smoke runs against the bundled stub node; real
/// node configurations are opaque to the harness and passed through as-is.
pub fn write_node_config(dir: &Path, port: u16) -> std::io::Result<PathBuf> {
    let path = dir.join(format!("node-{port}.yaml"));
    std::fs::write(&path, format!("port: {port}\n"))?;
    Ok(path)
}
