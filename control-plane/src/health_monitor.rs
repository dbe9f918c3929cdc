//! Periodic liveness sweep. Ticks on its own schedule (independent of
//! request handlers), consults the `NodeRuntime` to tell "silent but alive"
//! from "crashed" once a node's heartbeat has gone stale, and hands any
//! crashed node's orphaned pods to the scheduler.

use crate::clock::Clock;
use crate::cluster_state::ClusterState;
use crate::runtime::NodeRuntime;
use crate::scheduler::Scheduler;
use orka_types::{NodeHealth, NodeId, Timestamp};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

pub struct HealthMonitor {
    state: Arc<RwLock<ClusterState>>,
    clock: Arc<dyn Clock>,
    runtime: Arc<dyn NodeRuntime>,
    scheduler: Arc<Scheduler>,
    tick_interval: Duration,
    heartbeat_timeout_millis: u64,
}

impl HealthMonitor {
    pub fn new(
        state: Arc<RwLock<ClusterState>>,
        clock: Arc<dyn Clock>,
        runtime: Arc<dyn NodeRuntime>,
        scheduler: Arc<Scheduler>,
        tick_interval: Duration,
        heartbeat_timeout_millis: u64,
    ) -> Self {
        HealthMonitor {
            state,
            clock,
            runtime,
            scheduler,
            tick_interval,
            heartbeat_timeout_millis,
        }
    }

    /// Runs forever, ticking every `tick_interval`. Spawn this as its own
    /// tokio task; there is no cancellation handoff beyond dropping it.
    pub async fn run(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.tick_interval);
        loop {
            interval.tick().await;
            self.tick().await;
        }
    }

    /// One sweep, exposed separately so tests can drive it deterministically
    /// against a `FakeClock` instead of waiting on a real timer.
    pub async fn tick(&self) {
        let now = self.clock.now_millis();
        let timed_out = self.snapshot_timed_out(now).await;

        for node_id in timed_out {
            self.handle_timeout(node_id).await;
        }
    }

    async fn snapshot_timed_out(&self, now: Timestamp) -> Vec<NodeId> {
        let state = self.state.read().await;
        state
            .list_nodes()
            .filter(|n| n.is_running)
            .filter(|n| now.saturating_sub(n.last_heartbeat) > self.heartbeat_timeout_millis)
            .map(|n| n.id)
            .collect()
    }

    /// `inspect` always runs with the lock released so a slow runtime never
    /// blocks request handlers; the node is re-checked under the write lock
    /// before acting on the result, since it may have been stopped or
    /// already failed in the meantime.
    async fn handle_timeout(&self, node_id: NodeId) {
        let inspect_result = self.runtime.inspect(node_id).await;

        let drained = {
            let mut state = self.state.write().await;
            let still_candidate = state
                .get_node(node_id)
                .map(|n| n.is_running && matches!(n.health_status, NodeHealth::Healthy))
                .unwrap_or(false);
            if !still_candidate {
                return;
            }

            match inspect_result {
                Ok(report) if report.running => {
                    warn!(node_id = %node_id, "heartbeat stale but container still running, leaving node healthy");
                    None
                }
                Ok(report) => {
                    info!(node_id = %node_id, status = %report.status, "container not running, marking node failed");
                    state.fail_node(node_id).ok()
                }
                Err(err) => {
                    error!(node_id = %node_id, error = %err, "inspect failed, marking node failed");
                    state.fail_node(node_id).ok()
                }
            }
        };

        if let Some(drained) = drained {
            self.scheduler.reschedule(node_id, drained).await;
        }
    }
}
