//! Abstraction over the container lifecycle. The scheduler and health
//! monitor only ever see this trait; `FakeRuntime` backs the default binary
//! config and every test, `ProcessRuntime` shells out to a real container
//! tool (default `docker`) the way an operator would run it in production.

use async_trait::async_trait;
use orka_types::{NodeId, OrkaError};
use std::collections::HashMap;
use std::process::Command;
use std::sync::Mutex;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InspectReport {
    pub running: bool,
    pub status: String,
}

#[async_trait]
pub trait NodeRuntime: Send + Sync {
    async fn launch(&self, node_id: NodeId, cpu_cores: u32, api_endpoint: &str) -> Result<(), OrkaError>;
    async fn stop(&self, node_id: NodeId) -> Result<(), OrkaError>;
    async fn remove(&self, node_id: NodeId) -> Result<(), OrkaError>;
    async fn inspect(&self, node_id: NodeId) -> Result<InspectReport, OrkaError>;
}

/// In-process fake used by the default binary config and by every test.
/// Every node it has "launched" and not yet stopped/removed reports running.
pub struct FakeRuntime {
    nodes: Mutex<HashMap<NodeId, bool>>,
}

impl FakeRuntime {
    pub fn new() -> Self {
        FakeRuntime {
            nodes: Mutex::new(HashMap::new()),
        }
    }

    /// Test hook: flip a node to "crashed" without going through `stop`, so
    /// the health monitor's inspect-on-timeout path can be exercised.
    pub fn crash(&self, node_id: NodeId) {
        self.nodes.lock().unwrap().insert(node_id, false);
    }
}

impl Default for FakeRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeRuntime for FakeRuntime {
    async fn launch(&self, node_id: NodeId, _cpu_cores: u32, _api_endpoint: &str) -> Result<(), OrkaError> {
        self.nodes.lock().unwrap().insert(node_id, true);
        Ok(())
    }

    async fn stop(&self, node_id: NodeId) -> Result<(), OrkaError> {
        let mut nodes = self.nodes.lock().unwrap();
        match nodes.get_mut(&node_id) {
            Some(running) => {
                *running = false;
                Ok(())
            }
            None => Err(OrkaError::NotFound(format!("runtime has no record of node {node_id}"))),
        }
    }

    async fn remove(&self, node_id: NodeId) -> Result<(), OrkaError> {
        self.nodes.lock().unwrap().remove(&node_id);
        Ok(())
    }

    async fn inspect(&self, node_id: NodeId) -> Result<InspectReport, OrkaError> {
        let nodes = self.nodes.lock().unwrap();
        match nodes.get(&node_id) {
            Some(running) => Ok(InspectReport {
                running: *running,
                status: if *running { "running".into() } else { "exited".into() },
            }),
            None => Err(OrkaError::NotFound(format!("runtime has no record of node {node_id}"))),
        }
    }
}

/// Shells out to a container tool. The command name is configurable
/// (`ORKA_RUNTIME_CMD`, default `docker`) so the same code path works
/// against podman or a test double binary.
pub struct ProcessRuntime {
    command: String,
}

impl ProcessRuntime {
    pub fn new(command: impl Into<String>) -> Self {
        ProcessRuntime {
            command: command.into(),
        }
    }

    fn run(&self, args: &[&str]) -> Result<std::process::Output, OrkaError> {
        Command::new(&self.command)
            .args(args)
            .output()
            .map_err(|e| OrkaError::RuntimeFailure(format!("failed to spawn {}: {e}", self.command)))
    }
}

#[async_trait]
impl NodeRuntime for ProcessRuntime {
    async fn launch(&self, node_id: NodeId, cpu_cores: u32, api_endpoint: &str) -> Result<(), OrkaError> {
        let node_id_str = node_id.to_string();
        let cpu_cores_str = cpu_cores.to_string();
        let node_env = format!("NODE_ID={node_id_str}");
        let cpu_env = format!("CPU_CORES={cpu_cores_str}");
        let api_env = format!("API_SERVER={api_endpoint}");
        let args = vec![
            "run", "-d", "--name", node_id_str.as_str(),
            "-e", node_env.as_str(),
            "-e", cpu_env.as_str(),
            "-e", api_env.as_str(),
            "--network", "host",
            "orka-worker",
        ];
        debug!(node_id = %node_id, "launching worker container");
        let output = self.run(&args)?;
        if !output.status.success() {
            return Err(OrkaError::RuntimeFailure(format!(
                "{} run failed: {}",
                self.command,
                String::from_utf8_lossy(&output.stderr)
            )));
        }
        Ok(())
    }

    async fn stop(&self, node_id: NodeId) -> Result<(), OrkaError> {
        let node_id_str = node_id.to_string();
        let output = self.run(&["stop", node_id_str.as_str()])?;
        if !output.status.success() {
            return Err(OrkaError::RuntimeFailure(format!(
                "{} stop failed: {}",
                self.command,
                String::from_utf8_lossy(&output.stderr)
            )));
        }
        Ok(())
    }

    async fn remove(&self, node_id: NodeId) -> Result<(), OrkaError> {
        let node_id_str = node_id.to_string();
        let output = self.run(&["rm", "-f", node_id_str.as_str()])?;
        if !output.status.success() {
            warn!(node_id = %node_id, "container remove failed, continuing");
        }
        Ok(())
    }

    async fn inspect(&self, node_id: NodeId) -> Result<InspectReport, OrkaError> {
        let node_id_str = node_id.to_string();
        let output = self.run(&[
            "inspect", "-f", "{{.State.Running}} {{.State.Status}}", node_id_str.as_str(),
        ])?;
        if !output.status.success() {
            return Err(OrkaError::RuntimeFailure(format!(
                "{} inspect failed: {}",
                self.command,
                String::from_utf8_lossy(&output.stderr)
            )));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut parts = stdout.trim().split_whitespace();
        let running = parts.next() == Some("true");
        let status = parts.next().unwrap_or("unknown").to_string();
        Ok(InspectReport { running, status })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn fake_runtime_tracks_launch_stop_remove() {
        let runtime = FakeRuntime::new();
        let id = Uuid::new_v4();
        runtime.launch(id, 2, "http://127.0.0.1:8080").await.unwrap();
        assert!(runtime.inspect(id).await.unwrap().running);

        runtime.stop(id).await.unwrap();
        assert!(!runtime.inspect(id).await.unwrap().running);

        runtime.remove(id).await.unwrap();
        assert!(runtime.inspect(id).await.is_err());
    }

    #[tokio::test]
    async fn fake_runtime_crash_hook_flips_to_not_running() {
        let runtime = FakeRuntime::new();
        let id = Uuid::new_v4();
        runtime.launch(id, 2, "http://127.0.0.1:8080").await.unwrap();
        runtime.crash(id);
        assert!(!runtime.inspect(id).await.unwrap().running);
    }
}
