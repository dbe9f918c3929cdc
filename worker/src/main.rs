//! Reference worker: a standalone process that stands in for a real node
//! agent. It sends a heartbeat to the control plane every tick and adopts
//! whatever pod list the control plane hands back, so a human watching logs
//! can see reschedule decisions take effect without a real container runtime.

use anyhow::{bail, Context, Result};
use orka_types::{HeartbeatRequest, HeartbeatResponse, NodeId, PodId};
use std::time::Duration;
use tracing::{error, info, warn};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
const RETRY_BACKOFF: Duration = Duration::from_secs(1);
const ATTEMPTS_PER_CYCLE: u32 = 3;
const MAX_CONSECUTIVE_FAILURES: u32 = 3;

struct WorkerConfig {
    node_id: NodeId,
    api_server: String,
    cpu_cores: i64,
}

impl WorkerConfig {
    fn from_env() -> Result<Self> {
        let node_id = std::env::var("NODE_ID").context("NODE_ID must be set")?;
        let node_id: NodeId = node_id.parse().context("NODE_ID must be a uuid")?;
        let api_server = std::env::var("API_SERVER").context("API_SERVER must be set")?;
        let cpu_cores = std::env::var("CPU_CORES")
            .unwrap_or_else(|_| "2".to_string())
            .parse()
            .context("CPU_CORES must be an integer")?;
        Ok(WorkerConfig {
            node_id,
            api_server,
            cpu_cores,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = WorkerConfig::from_env()?;
    let client = reqwest::Client::new();
    let mut pods: Vec<PodId> = Vec::new();
    let mut consecutive_failures = 0u32;

    info!(node_id = %config.node_id, api_server = %config.api_server, "worker starting");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                break;
            }
            result = send_heartbeat_with_retry(&client, &config, &pods) => {
                match result {
                    Ok(response) => {
                        consecutive_failures = 0;
                        pods = response.pods;
                        info!(pod_count = pods.len(), "heartbeat successful");
                    }
                    Err(err) => {
                        consecutive_failures += 1;
                        error!(error = %err, consecutive_failures, "all heartbeat attempts failed");
                    }
                }
            }
        }

        if consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
            error!(consecutive_failures, "too many consecutive failures, shutting down");
            bail!("control plane unreachable after {MAX_CONSECUTIVE_FAILURES} cycles");
        }

        tokio::time::sleep(HEARTBEAT_INTERVAL).await;
    }

    Ok(())
}

/// Sends one heartbeat, retrying up to `ATTEMPTS_PER_CYCLE` times with a
/// fixed backoff between attempts. Returns the first successful response.
async fn send_heartbeat_with_retry(
    client: &reqwest::Client,
    config: &WorkerConfig,
    pods: &[PodId],
) -> Result<HeartbeatResponse> {
    let body = HeartbeatRequest {
        node_id: config.node_id,
        status: "Healthy".to_string(),
        pods: pods.to_vec(),
        cpu_cores: config.cpu_cores,
    };

    let mut last_err = None;
    for attempt in 1..=ATTEMPTS_PER_CYCLE {
        match try_heartbeat(client, &config.api_server, &body).await {
            Ok(response) => return Ok(response),
            Err(err) => {
                warn!(attempt, error = %err, "heartbeat attempt failed");
                last_err = Some(err);
                if attempt < ATTEMPTS_PER_CYCLE {
                    tokio::time::sleep(RETRY_BACKOFF).await;
                }
            }
        }
    }
    Err(last_err.unwrap())
}

async fn try_heartbeat(
    client: &reqwest::Client,
    api_server: &str,
    body: &HeartbeatRequest,
) -> Result<HeartbeatResponse> {
    let response = client
        .post(format!("{api_server}/heartbeat"))
        .json(body)
        .timeout(Duration::from_secs(5))
        .send()
        .await?;

    if !response.status().is_success() {
        bail!("control plane returned {}", response.status());
    }
    Ok(response.json().await?)
}
