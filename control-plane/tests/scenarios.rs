//! End-to-end scenarios driven directly against `ClusterState` + `Scheduler`
//! + `HealthMonitor` with fake time and a fake runtime, no HTTP involved.
//! Mirrors the concrete scenarios in the design notes.

use orka_control_plane::clock::{Clock, FakeClock};
use orka_control_plane::cluster_state::ClusterState;
use orka_control_plane::health_monitor::HealthMonitor;
use orka_control_plane::runtime::{FakeRuntime, NodeRuntime};
use orka_control_plane::scheduler::{FirstFit, Scheduler};
use orka_types::{NodeHealth, OrkaError, PodStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

fn setup() -> (Arc<RwLock<ClusterState>>, Arc<FakeClock>, Arc<FakeRuntime>, Arc<Scheduler>) {
    let state = Arc::new(RwLock::new(ClusterState::new()));
    let clock = Arc::new(FakeClock::new());
    let runtime = Arc::new(FakeRuntime::new());
    let clock_dyn: Arc<dyn Clock> = clock.clone();
    let scheduler = Arc::new(Scheduler::new(state.clone(), clock_dyn, Box::new(FirstFit)));
    (state, clock, runtime, scheduler)
}

#[tokio::test]
async fn scenario_basic_placement() {
    let (state, _clock, _runtime, scheduler) = setup();
    let n1 = state.write().await.create_node(4, 0).unwrap();
    let n2 = state.write().await.create_node(2, 0).unwrap();

    let (node_id, _) = scheduler.place(3).await.unwrap();
    assert_eq!(node_id, n1);
    assert_eq!(state.read().await.get_node(n1).unwrap().available_cpu, 1);

    assert!(matches!(scheduler.place(3).await, Err(OrkaError::NoCapacity)));

    let (node_id, _) = scheduler.place(2).await.unwrap();
    assert_eq!(node_id, n2);
    assert_eq!(state.read().await.get_node(n2).unwrap().available_cpu, 0);
}

#[tokio::test]
async fn scenario_reschedule_on_stop() {
    let (state, _clock, _runtime, scheduler) = setup();
    let n1 = state.write().await.create_node(4, 0).unwrap();
    let n2 = state.write().await.create_node(4, 0).unwrap();

    let (_, p1) = scheduler.place(2).await.unwrap();
    let (_, p2) = scheduler.place(2).await.unwrap();

    let drained = state.write().await.stop_node(n1).unwrap();
    assert_eq!(drained.len(), 2);
    {
        let s = state.read().await;
        let node = s.get_node(n1).unwrap();
        assert!(matches!(node.health_status, NodeHealth::Stopped));
        assert!(node.pods.is_empty());
    }

    scheduler.reschedule(n1, drained).await;

    let s = state.read().await;
    let n2_state = s.get_node(n2).unwrap();
    assert_eq!(n2_state.available_cpu, 0);
    assert!(n2_state.pods.contains(&p1));
    assert!(n2_state.pods.contains(&p2));
}

#[tokio::test]
async fn scenario_reschedule_partial_failure() {
    let (state, _clock, _runtime, scheduler) = setup();
    let n1 = state.write().await.create_node(4, 0).unwrap();
    let n2 = state.write().await.create_node(1, 0).unwrap();

    let (_, p1) = scheduler.place(3).await.unwrap();
    let (_, p2) = scheduler.place(1).await.unwrap();

    let drained = state.write().await.stop_node(n1).unwrap();
    scheduler.reschedule(n1, drained).await;

    let s = state.read().await;
    assert!(matches!(s.get_pod(p1).unwrap().status, PodStatus::Failed));
    assert_eq!(s.get_pod(p2).unwrap().node_id, n2);
}

#[tokio::test]
async fn scenario_heartbeat_timeout_with_live_container() {
    let (state, clock, runtime, scheduler) = setup();
    let n1 = state.write().await.create_node(2, 0).unwrap();
    runtime.launch(n1, 2, "http://127.0.0.1:8080").await.unwrap();

    let monitor = HealthMonitor::new(
        state.clone(),
        clock.clone() as Arc<dyn Clock>,
        runtime.clone(),
        scheduler.clone(),
        Duration::from_secs(5),
        15_000,
    );

    clock.advance(20_000);
    monitor.tick().await;

    let s = state.read().await;
    assert!(matches!(s.get_node(n1).unwrap().health_status, NodeHealth::Healthy));
}

#[tokio::test]
async fn scenario_heartbeat_timeout_with_dead_container() {
    let (state, clock, runtime, scheduler) = setup();
    let n1 = state.write().await.create_node(2, 0).unwrap();
    runtime.launch(n1, 2, "http://127.0.0.1:8080").await.unwrap();
    let (_, p1) = scheduler.place(1).await.unwrap();
    runtime.crash(n1);

    let monitor = HealthMonitor::new(
        state.clone(),
        clock.clone() as Arc<dyn Clock>,
        runtime.clone(),
        scheduler.clone(),
        Duration::from_secs(5),
        15_000,
    );

    clock.advance(20_000);
    monitor.tick().await;

    let s = state.read().await;
    assert!(matches!(s.get_node(n1).unwrap().health_status, NodeHealth::Failed));
    assert!(matches!(s.get_pod(p1).unwrap().status, PodStatus::Failed));
}

#[tokio::test]
async fn scenario_heartbeat_after_stop_is_conflict() {
    let (state, _clock, _runtime, _scheduler) = setup();
    let n1 = state.write().await.create_node(2, 0).unwrap();
    state.write().await.stop_node(n1).unwrap();

    let result = state.write().await.record_heartbeat(n1, 2, 100);
    assert!(matches!(result, Err(OrkaError::Conflict(_))));
}
