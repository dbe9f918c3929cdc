//! The authoritative in-memory store of nodes and pods. Every mutator here
//! is called with the single exclusive lock already held by the caller (see
//! `AppState` in `lib.rs`) — this module knows nothing about HTTP, runtimes,
//! or locking itself, only about preserving the invariants in the data
//! model: available_cpu accounting, pod-set membership, and sticky health
//! states.

use orka_types::{Node, NodeHealth, NodeId, OrkaError, Pod, PodHealth, PodId, PodStatus, Timestamp};
use std::collections::HashMap;
use tracing::{info, warn};
use uuid::Uuid;

/// `HashMap` iteration order is arbitrary, so first-fit determinism and
/// reschedule ordering are driven by these parallel insertion-order
/// ledgers rather than by map iteration.
#[derive(Default)]
pub struct ClusterState {
    nodes: HashMap<NodeId, Node>,
    pods: HashMap<PodId, Pod>,
    node_order: Vec<NodeId>,
    pod_order: Vec<PodId>,
}

impl ClusterState {
    pub fn new() -> Self {
        ClusterState {
            nodes: HashMap::new(),
            pods: HashMap::new(),
            node_order: Vec::new(),
            pod_order: Vec::new(),
        }
    }

    pub fn create_node(&mut self, cpu_cores: i64, now: Timestamp) -> Result<NodeId, OrkaError> {
        if cpu_cores <= 0 {
            return Err(OrkaError::InvalidArgument("cpuCores must be positive".into()));
        }
        let id = Uuid::new_v4();
        let node = Node::new(id, cpu_cores as u32, now);
        self.nodes.insert(id, node);
        self.node_order.push(id);
        info!(node_id = %id, cpu_cores, "node created");
        Ok(id)
    }

    /// Unconditional removal. Any pods still on the node are transitioned to
    /// `Failed`/`Unhealthy` first; the set of affected pod ids is returned so
    /// the caller can log/report them.
    pub fn delete_node(&mut self, node_id: NodeId, now: Timestamp) -> Result<Vec<PodId>, OrkaError> {
        let node = self
            .nodes
            .remove(&node_id)
            .ok_or_else(|| OrkaError::NotFound(format!("node {node_id} not found")))?;

        self.node_order.retain(|id| *id != node_id);
        let orphaned = node.pods.clone();
        for pod_id in &orphaned {
            if let Some(pod) = self.pods.get_mut(pod_id) {
                pod.mark_failed(now);
            }
        }
        info!(node_id = %node_id, orphaned = orphaned.len(), "node deleted");
        Ok(orphaned)
    }

    /// Marks the node stopped and drains its pod set, returning the drained
    /// pod ids so the scheduler can attempt to reschedule them elsewhere.
    /// `available_cpu` resets to `cpu_cores` since the pod set is now empty.
    pub fn stop_node(&mut self, node_id: NodeId) -> Result<Vec<PodId>, OrkaError> {
        let node = self
            .nodes
            .get_mut(&node_id)
            .ok_or_else(|| OrkaError::NotFound(format!("node {node_id} not found")))?;

        node.is_running = false;
        node.health_status = NodeHealth::Stopped;
        let drained = std::mem::take(&mut node.pods);
        node.available_cpu = node.cpu_cores;
        info!(node_id = %node_id, drained = drained.len(), "node stopped");
        Ok(drained)
    }

    /// Marks the node `Failed` and drains its pod set. Used by the health
    /// monitor; distinct from `stop_node` only in the resulting health
    /// status, but kept as its own method since the monitor never calls the
    /// administrative stop path.
    pub fn fail_node(&mut self, node_id: NodeId) -> Result<Vec<PodId>, OrkaError> {
        let node = self
            .nodes
            .get_mut(&node_id)
            .ok_or_else(|| OrkaError::NotFound(format!("node {node_id} not found")))?;

        node.health_status = NodeHealth::Failed;
        let drained = std::mem::take(&mut node.pods);
        node.available_cpu = node.cpu_cores;
        warn!(node_id = %node_id, drained = drained.len(), "node marked failed by health monitor");
        Ok(drained)
    }

    pub fn create_pod(&mut self, cpu_required: u32, node_id: NodeId, now: Timestamp) -> PodId {
        let id = Uuid::new_v4();
        let pod = Pod::new(id, cpu_required, node_id, now);
        self.pods.insert(id, pod);
        self.pod_order.push(id);
        id
    }

    /// Atomically reserves capacity on `node_id` and records the pod as
    /// placed there. Requires the node be healthy, running, and have enough
    /// `available_cpu` — callers must have already selected `node_id` via
    /// the scheduler's placement policy under the same lock acquisition.
    pub fn place_pod(&mut self, pod_id: PodId, node_id: NodeId, cpu_required: u32) -> Result<(), OrkaError> {
        let node = self
            .nodes
            .get_mut(&node_id)
            .ok_or_else(|| OrkaError::NotFound(format!("node {node_id} not found")))?;

        if !node.is_schedulable() {
            return Err(OrkaError::Conflict(format!("node {node_id} is not schedulable")));
        }
        if node.available_cpu < cpu_required {
            return Err(OrkaError::Conflict(format!("node {node_id} has insufficient capacity")));
        }

        node.available_cpu -= cpu_required;
        node.pods.push(pod_id);
        Ok(())
    }

    /// Reverses `place_pod`: returns capacity to the node and removes the
    /// pod from its pod set.
    pub fn remove_pod_from_node(&mut self, pod_id: PodId, node_id: NodeId) -> Result<(), OrkaError> {
        let node = self
            .nodes
            .get_mut(&node_id)
            .ok_or_else(|| OrkaError::NotFound(format!("node {node_id} not found")))?;

        let before = node.pods.len();
        node.pods.retain(|id| *id != pod_id);
        if node.pods.len() == before {
            return Err(OrkaError::NotFound(format!("pod {pod_id} not hosted on node {node_id}")));
        }

        if let Some(pod) = self.pods.get(&pod_id) {
            node.available_cpu += pod.cpu_required;
        }
        Ok(())
    }

    pub fn delete_pod(&mut self, pod_id: PodId) -> Result<Pod, OrkaError> {
        let pod = self
            .pods
            .remove(&pod_id)
            .ok_or_else(|| OrkaError::NotFound(format!("pod {pod_id} not found")))?;
        self.pod_order.retain(|id| *id != pod_id);
        Ok(pod)
    }

    /// Records a heartbeat, overwriting the node's declared `cpu_cores` with
    /// the worker's self-report unconditionally. `available_cpu` is
    /// deliberately NOT reconciled — see the design notes on
    /// heartbeat-carried capacity. A negative report clamps to zero rather
    /// than being rejected, since `cpu_cores` has no signed representation.
    pub fn record_heartbeat(
        &mut self,
        node_id: NodeId,
        cpu_cores: i64,
        now: Timestamp,
    ) -> Result<Vec<PodId>, OrkaError> {
        let node = self
            .nodes
            .get_mut(&node_id)
            .ok_or_else(|| OrkaError::NotFound(format!("node {node_id} not found")))?;

        if !node.is_running {
            return Err(OrkaError::Conflict(format!("node {node_id} is stopped")));
        }

        node.cpu_cores = u32::try_from(cpu_cores).unwrap_or(0);
        node.last_heartbeat = now;
        node.heartbeat_count += 1;
        Ok(node.pods.clone())
    }

    pub fn get_node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    pub fn list_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn get_pod(&self, pod_id: PodId) -> Option<&Pod> {
        self.pods.get(&pod_id)
    }

    pub fn list_pods(&self) -> impl Iterator<Item = &Pod> {
        self.pods.values()
    }

    pub fn get_pod_mut(&mut self, pod_id: PodId) -> Option<&mut Pod> {
        self.pods.get_mut(&pod_id)
    }

    /// Node ids in insertion order.
    pub fn node_ids_snapshot(&self) -> Vec<NodeId> {
        self.node_order.clone()
    }

    /// Pod ids in insertion order.
    pub fn pod_ids_snapshot(&self) -> Vec<PodId> {
        self.pod_order.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_node_rejects_non_positive_cpu() {
        let mut state = ClusterState::new();
        assert!(matches!(
            state.create_node(0, 0),
            Err(OrkaError::InvalidArgument(_))
        ));
        assert!(matches!(
            state.create_node(-1, 0),
            Err(OrkaError::InvalidArgument(_))
        ));
    }

    #[test]
    fn place_pod_enforces_capacity() {
        let mut state = ClusterState::new();
        let node_id = state.create_node(2, 0).unwrap();
        let pod_id = state.create_pod(3, node_id, 0);
        assert!(matches!(
            state.place_pod(pod_id, node_id, 3),
            Err(OrkaError::Conflict(_))
        ));
    }

    #[test]
    fn stop_node_drains_pods_and_resets_capacity() {
        let mut state = ClusterState::new();
        let node_id = state.create_node(4, 0).unwrap();
        let pod_id = state.create_pod(2, node_id, 0);
        state.place_pod(pod_id, node_id, 2).unwrap();
        assert_eq!(state.get_node(node_id).unwrap().available_cpu, 2);

        let drained = state.stop_node(node_id).unwrap();
        assert_eq!(drained, vec![pod_id]);
        let node = state.get_node(node_id).unwrap();
        assert_eq!(node.available_cpu, node.cpu_cores);
        assert!(node.pods.is_empty());
        assert!(matches!(node.health_status, NodeHealth::Stopped));
    }

    #[test]
    fn delete_node_marks_orphans_failed() {
        let mut state = ClusterState::new();
        let node_id = state.create_node(4, 0).unwrap();
        let pod_id = state.create_pod(2, node_id, 0);
        state.place_pod(pod_id, node_id, 2).unwrap();

        let orphaned = state.delete_node(node_id, 10).unwrap();
        assert_eq!(orphaned, vec![pod_id]);
        let pod = state.get_pod(pod_id).unwrap();
        assert!(matches!(pod.status, PodStatus::Failed));
        assert!(matches!(pod.health_status, PodHealth::Unhealthy));
    }

    #[test]
    fn heartbeat_to_stopped_node_conflicts() {
        let mut state = ClusterState::new();
        let node_id = state.create_node(4, 0).unwrap();
        state.stop_node(node_id).unwrap();
        assert!(matches!(
            state.record_heartbeat(node_id, 4, 10),
            Err(OrkaError::Conflict(_))
        ));
    }

    #[test]
    fn heartbeat_is_monotonic() {
        let mut state = ClusterState::new();
        let node_id = state.create_node(4, 0).unwrap();
        state.record_heartbeat(node_id, 4, 10).unwrap();
        state.record_heartbeat(node_id, 4, 20).unwrap();
        let node = state.get_node(node_id).unwrap();
        assert_eq!(node.heartbeat_count, 2);
        assert_eq!(node.last_heartbeat, 20);
    }

    #[test]
    fn second_delete_is_not_found() {
        let mut state = ClusterState::new();
        let node_id = state.create_node(4, 0).unwrap();
        state.delete_node(node_id, 0).unwrap();
        assert!(matches!(
            state.delete_node(node_id, 0),
            Err(OrkaError::NotFound(_))
        ));
    }
}
