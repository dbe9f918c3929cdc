// Shared Entity and Wire Types
// Core data model shared between the control plane, worker, and CLI

//! # orka-types
//!
//! Entity and wire-format definitions providing a consistent data model
//! across the control plane, the worker simulator, and the CLI.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

pub type NodeId = Uuid;
pub type PodId = Uuid;

/// Milliseconds elapsed on a monotonic clock. Not wall-clock time — only
/// meaningful relative to other timestamps produced by the same clock.
pub type Timestamp = u64;

#[derive(Error, Debug)]
pub enum OrkaError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("no capacity available for request")]
    NoCapacity,
    #[error("runtime failure: {0}")]
    RuntimeFailure(String),
    #[error("internal error: {0}")]
    Internal(String),
}

/// Node health. `Failed` and `Stopped` are sticky terminal states — nothing
/// in the system transitions a node out of them except deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeHealth {
    Healthy,
    Failed,
    Stopped,
}

impl fmt::Display for NodeHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeHealth::Healthy => write!(f, "Healthy"),
            NodeHealth::Failed => write!(f, "Failed"),
            NodeHealth::Stopped => write!(f, "Stopped"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PodStatus {
    Running,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PodHealth {
    Healthy,
    Unhealthy,
}

/// Accounting record for a worker process with fixed declared CPU capacity.
///
/// `pods` is kept in insertion order (a `Vec`, not a `HashSet`) so reschedule
/// decisions are reproducible across runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub cpu_cores: u32,
    pub available_cpu: u32,
    pub pods: Vec<PodId>,
    pub health_status: NodeHealth,
    pub is_running: bool,
    pub last_heartbeat: Timestamp,
    pub heartbeat_count: u64,
}

impl Node {
    pub fn new(id: NodeId, cpu_cores: u32, now: Timestamp) -> Self {
        Node {
            id,
            cpu_cores,
            available_cpu: cpu_cores,
            pods: Vec::new(),
            health_status: NodeHealth::Healthy,
            is_running: true,
            last_heartbeat: now,
            heartbeat_count: 0,
        }
    }

    pub fn is_schedulable(&self) -> bool {
        matches!(self.health_status, NodeHealth::Healthy) && self.is_running
    }
}

/// Accounting record for a workload unit requiring a fixed CPU quantity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pod {
    pub id: PodId,
    pub cpu_required: u32,
    pub node_id: NodeId,
    pub status: PodStatus,
    pub health_status: PodHealth,
    pub created_at: Timestamp,
    pub last_updated: Timestamp,
}

impl Pod {
    pub fn new(id: PodId, cpu_required: u32, node_id: NodeId, now: Timestamp) -> Self {
        Pod {
            id,
            cpu_required,
            node_id,
            status: PodStatus::Running,
            health_status: PodHealth::Healthy,
            created_at: now,
            last_updated: now,
        }
    }

    pub fn mark_failed(&mut self, now: Timestamp) {
        self.status = PodStatus::Failed;
        self.health_status = PodHealth::Unhealthy;
        self.last_updated = now;
    }
}

// ---- Wire DTOs -------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateNodeRequest {
    #[serde(rename = "cpuCores")]
    pub cpu_cores: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchPodRequest {
    #[serde(rename = "cpuRequired")]
    pub cpu_required: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatRequest {
    #[serde(rename = "nodeId")]
    pub node_id: NodeId,
    pub status: String,
    pub pods: Vec<PodId>,
    #[serde(rename = "cpuCores")]
    pub cpu_cores: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatResponse {
    pub message: String,
    pub pods: Vec<PodId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl From<&OrkaError> for ErrorResponse {
    fn from(err: &OrkaError) -> Self {
        ErrorResponse {
            error: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_starts_fully_available() {
        let id = Uuid::new_v4();
        let node = Node::new(id, 4, 1_000);
        assert_eq!(node.available_cpu, 4);
        assert!(node.pods.is_empty());
        assert!(node.is_schedulable());
    }

    #[test]
    fn pod_mark_failed_updates_health_and_status() {
        let mut pod = Pod::new(Uuid::new_v4(), 2, Uuid::new_v4(), 10);
        pod.mark_failed(20);
        assert!(matches!(pod.status, PodStatus::Failed));
        assert!(matches!(pod.health_status, PodHealth::Unhealthy));
        assert_eq!(pod.last_updated, 20);
    }
}
