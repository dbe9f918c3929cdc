//! Placement policy and the reschedule workflow triggered by node stop/fail
//! events. The policy only decides *which* node; reservation and pod
//! bookkeeping stay in `ClusterState` so the critical section boundaries in
//! the design notes hold regardless of which policy is configured.

use crate::clock::Clock;
use crate::cluster_state::ClusterState;
use orka_types::{NodeId, OrkaError, PodId};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Node-selection strategy. `select` sees only the node ids and must not
/// mutate state — `Scheduler` performs the reservation itself, atomically,
/// while still holding the lock `select` was called under.
pub trait Policy: Send + Sync {
    fn select(&self, state: &ClusterState, cpu_required: u32, exclude: Option<NodeId>) -> Option<NodeId>;
    fn name(&self) -> &'static str;
}

/// Required default: the first node (insertion order) that is healthy,
/// running, and has enough available capacity.
pub struct FirstFit;

impl Policy for FirstFit {
    fn select(&self, state: &ClusterState, cpu_required: u32, exclude: Option<NodeId>) -> Option<NodeId> {
        state
            .node_ids_snapshot()
            .into_iter()
            .filter(|id| Some(*id) != exclude)
            .find(|id| {
                state
                    .get_node(*id)
                    .map(|n| n.is_schedulable() && n.available_cpu >= cpu_required)
                    .unwrap_or(false)
            })
    }

    fn name(&self) -> &'static str {
        "first-fit"
    }
}

/// Demonstrates the `Policy` seam is real: picks the eligible node with the
/// smallest `available_cpu` (tightest fit), ties broken by insertion order.
pub struct BestFit;

impl Policy for BestFit {
    fn select(&self, state: &ClusterState, cpu_required: u32, exclude: Option<NodeId>) -> Option<NodeId> {
        state
            .node_ids_snapshot()
            .into_iter()
            .filter(|id| Some(*id) != exclude)
            .filter_map(|id| {
                state.get_node(id).and_then(|n| {
                    (n.is_schedulable() && n.available_cpu >= cpu_required).then_some((id, n.available_cpu))
                })
            })
            .min_by_key(|(_, available)| *available)
            .map(|(id, _)| id)
    }

    fn name(&self) -> &'static str {
        "best-fit"
    }
}

pub struct Scheduler {
    state: Arc<RwLock<ClusterState>>,
    clock: Arc<dyn Clock>,
    policy: Box<dyn Policy>,
}

impl Scheduler {
    pub fn new(state: Arc<RwLock<ClusterState>>, clock: Arc<dyn Clock>, policy: Box<dyn Policy>) -> Self {
        Scheduler { state, clock, policy }
    }

    /// Selects a node and places a freshly created pod on it in one critical
    /// section, so the predicate and the capacity decrement never straddle
    /// a lock release under concurrent placement.
    pub async fn place(&self, cpu_required: u32) -> Result<(NodeId, PodId), OrkaError> {
        if cpu_required == 0 {
            return Err(OrkaError::InvalidArgument("cpuRequired must be positive".into()));
        }
        let now = self.clock.now_millis();
        let mut state = self.state.write().await;
        let node_id = self
            .policy
            .select(&state, cpu_required, None)
            .ok_or(OrkaError::NoCapacity)?;

        let pod_id = state.create_pod(cpu_required, node_id, now);
        state.place_pod(pod_id, node_id, cpu_required)?;
        info!(pod_id = %pod_id, node_id = %node_id, cpu_required, policy = self.policy.name(), "pod placed");
        Ok((node_id, pod_id))
    }

    /// Attempts to place each orphaned pod on a node other than
    /// `source_node_id`, one independent atomic placement per pod, in
    /// insertion order. Pods that find no host are marked `Failed`.
    pub async fn reschedule(&self, source_node_id: NodeId, pod_ids: Vec<PodId>) {
        for pod_id in pod_ids {
            let now = self.clock.now_millis();
            let mut state = self.state.write().await;

            let cpu_required = match state.get_pod(pod_id) {
                Some(pod) => pod.cpu_required,
                None => continue,
            };

            match self.policy.select(&state, cpu_required, Some(source_node_id)) {
                Some(target) => {
                    if state.place_pod(pod_id, target, cpu_required).is_ok() {
                        if let Some(pod) = state.get_pod_mut(pod_id) {
                            pod.node_id = target;
                            pod.last_updated = now;
                        }
                        info!(pod_id = %pod_id, from = %source_node_id, to = %target, "pod rescheduled");
                        continue;
                    }
                }
                None => {}
            }

            if let Some(pod) = state.get_pod_mut(pod_id) {
                pod.mark_failed(now);
            }
            warn!(pod_id = %pod_id, from = %source_node_id, "pod could not be rescheduled, marked failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FakeClock;

    fn scheduler_with(policy: Box<dyn Policy>) -> (Scheduler, Arc<RwLock<ClusterState>>) {
        let state = Arc::new(RwLock::new(ClusterState::new()));
        let clock: Arc<dyn Clock> = Arc::new(FakeClock::new());
        (Scheduler::new(state.clone(), clock, policy), state)
    }

    #[tokio::test]
    async fn first_fit_picks_first_eligible_node_in_insertion_order() {
        let (scheduler, state) = scheduler_with(Box::new(FirstFit));
        let n1;
        let n2;
        {
            let mut s = state.write().await;
            n1 = s.create_node(4, 0).unwrap();
            n2 = s.create_node(4, 0).unwrap();
        }

        let (node_id, _) = scheduler.place(3).await.unwrap();
        assert_eq!(node_id, n1);

        let (node_id, _) = scheduler.place(3).await.unwrap();
        assert_eq!(node_id, n2, "first node no longer has capacity");
    }

    #[tokio::test]
    async fn place_fails_with_no_capacity() {
        let (scheduler, state) = scheduler_with(Box::new(FirstFit));
        {
            let mut s = state.write().await;
            s.create_node(2, 0).unwrap();
        }
        assert!(matches!(scheduler.place(3).await, Err(OrkaError::NoCapacity)));
    }

    #[tokio::test]
    async fn best_fit_prefers_tightest_node() {
        let (scheduler, state) = scheduler_with(Box::new(BestFit));
        let n_small;
        {
            let mut s = state.write().await;
            s.create_node(8, 0).unwrap();
            n_small = s.create_node(2, 0).unwrap();
        }
        let (node_id, _) = scheduler.place(2).await.unwrap();
        assert_eq!(node_id, n_small);
    }

    #[tokio::test]
    async fn reschedule_excludes_source_node_and_fails_pods_with_no_home() {
        let (scheduler, state) = scheduler_with(Box::new(FirstFit));
        let n1;
        let n2;
        let p1;
        let p2;
        {
            let mut s = state.write().await;
            n1 = s.create_node(4, 0).unwrap();
            n2 = s.create_node(1, 0).unwrap();
            p1 = s.create_pod(3, n1, 0);
            s.place_pod(p1, n1, 3).unwrap();
            p2 = s.create_pod(1, n1, 0);
            s.place_pod(p2, n1, 1).unwrap();
            s.stop_node(n1).unwrap();
        }

        scheduler.reschedule(n1, vec![p1, p2]).await;

        let s = state.read().await;
        let pod1 = s.get_pod(p1).unwrap();
        let pod2 = s.get_pod(p2).unwrap();
        assert!(matches!(pod1.status, orka_types::PodStatus::Failed), "pod1 needs more cpu than n2 has free");
        assert_eq!(pod2.node_id, n2, "pod2 fits on the remaining node");
    }
}
