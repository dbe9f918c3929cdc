// Orka Control Plane - cluster state machine, scheduler, and failure detector
// behind a thin HTTP API.

use anyhow::Result;
use clap::Parser;
use orka_control_plane::clock::{Clock, SystemClock};
use orka_control_plane::cluster_state::ClusterState;
use orka_control_plane::config::{RuntimeBackend, SchedulerPolicy, ServerConfig};
use orka_control_plane::health_monitor::HealthMonitor;
use orka_control_plane::runtime::{FakeRuntime, NodeRuntime, ProcessRuntime};
use orka_control_plane::scheduler::{BestFit, FirstFit, Policy, Scheduler};
use orka_control_plane::{api, AppState};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

#[derive(Parser)]
#[command(name = "orka-control-plane")]
#[command(about = "Orka control plane - cluster state, scheduler, and health monitor")]
#[command(version)]
struct Args {
    /// Path to a TOML config file.
    #[arg(short, long)]
    config: Option<String>,

    /// Enable verbose (debug-level) logging.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = ServerConfig::load(args.config.as_deref())?;
    info!(bind_addr = %config.bind_addr, "starting orka control plane");

    let cluster = Arc::new(RwLock::new(ClusterState::new()));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
    let runtime: Arc<dyn NodeRuntime> = match config.runtime_backend {
        RuntimeBackend::Fake => Arc::new(FakeRuntime::new()),
        RuntimeBackend::Process => Arc::new(ProcessRuntime::new(config.runtime_command.clone())),
    };
    let policy: Box<dyn Policy> = match config.scheduler_policy {
        SchedulerPolicy::FirstFit => Box::new(FirstFit),
        SchedulerPolicy::BestFit => Box::new(BestFit),
    };
    let scheduler = Arc::new(Scheduler::new(cluster.clone(), clock.clone(), policy));

    let monitor = Arc::new(HealthMonitor::new(
        cluster.clone(),
        clock.clone(),
        runtime.clone(),
        scheduler.clone(),
        config.tick_interval(),
        config.heartbeat_timeout_ms,
    ));
    tokio::spawn(monitor.run());

    let state = AppState {
        cluster,
        scheduler,
        runtime,
        clock,
        advertise_addr: config.bind_addr.clone(),
    };
    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %config.bind_addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .init();
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received, draining in-flight requests");
}
