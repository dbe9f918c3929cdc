//! Orka control plane — cluster state, scheduler, health monitor, and the
//! HTTP API that composes them.

pub mod api;
pub mod clock;
pub mod cluster_state;
pub mod config;
pub mod health_monitor;
pub mod runtime;
pub mod scheduler;

use clock::Clock;
use cluster_state::ClusterState;
use runtime::NodeRuntime;
use scheduler::Scheduler;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared state handed to every axum handler. Cheap to clone — everything
/// inside is already behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub cluster: Arc<RwLock<ClusterState>>,
    pub scheduler: Arc<Scheduler>,
    pub runtime: Arc<dyn NodeRuntime>,
    pub clock: Arc<dyn Clock>,
    /// Address workers should heartbeat back to, handed to `NodeRuntime::launch`.
    pub advertise_addr: String,
}
