//! orkactl - command-line client for the control plane HTTP API.

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use orka_types::{CreateNodeRequest, LaunchPodRequest, MessageResponse, Node, Pod};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "orkactl")]
#[command(about = "Command-line client for the orka control plane")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Control plane base URL.
    #[arg(long, global = true, default_value = "http://127.0.0.1:8080")]
    server: String,

    /// Output format.
    #[arg(long, global = true, default_value = "human")]
    format: OutputFormat,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum OutputFormat {
    Human,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a new node with the given CPU core count.
    AddNode { cpu_cores: i64 },
    /// Stop a node, draining and rescheduling its pods.
    StopNode { node_id: Uuid },
    /// Delete a node permanently.
    DeleteNode { node_id: Uuid },
    /// Launch a pod requiring the given CPU amount.
    LaunchPod { cpu_required: i64 },
    /// Delete a pod.
    DeletePod { pod_id: Uuid },
    /// List all nodes and their health status.
    ListNodes,
    /// List all pods and their placement.
    ListPods,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let client = reqwest::Client::new();
    match cli.command {
        Commands::AddNode { cpu_cores } => {
            let body = CreateNodeRequest { cpu_cores };
            let resp: MessageResponse = post(&client, &cli.server, "/nodes", &body).await?;
            print_message(cli.format, &resp.message);
        }
        Commands::StopNode { node_id } => {
            let resp: MessageResponse = post_empty(&client, &cli.server, &format!("/nodes/{node_id}/stop")).await?;
            print_message(cli.format, &resp.message);
        }
        Commands::DeleteNode { node_id } => {
            let resp: MessageResponse = delete(&client, &cli.server, &format!("/nodes/{node_id}")).await?;
            print_message(cli.format, &resp.message);
        }
        Commands::LaunchPod { cpu_required } => {
            let body = LaunchPodRequest { cpu_required };
            let resp: MessageResponse = post(&client, &cli.server, "/pods", &body).await?;
            print_message(cli.format, &resp.message);
        }
        Commands::DeletePod { pod_id } => {
            let resp: MessageResponse = delete(&client, &cli.server, &format!("/pods/{pod_id}")).await?;
            print_message(cli.format, &resp.message);
        }
        Commands::ListNodes => {
            let nodes: HashMap<Uuid, Node> = get(&client, &cli.server, "/nodes").await?;
            print_nodes(cli.format, &nodes);
        }
        Commands::ListPods => {
            let pods: Vec<Pod> = get(&client, &cli.server, "/pods").await?;
            print_pods(cli.format, &pods);
        }
    }
    Ok(())
}

async fn get<T: serde::de::DeserializeOwned>(client: &reqwest::Client, server: &str, path: &str) -> Result<T> {
    let resp = client.get(format!("{server}{path}")).send().await?;
    ensure_success(&resp).await?;
    Ok(resp.json().await?)
}

async fn post<B: serde::Serialize, T: serde::de::DeserializeOwned>(
    client: &reqwest::Client,
    server: &str,
    path: &str,
    body: &B,
) -> Result<T> {
    let resp = client.post(format!("{server}{path}")).json(body).send().await?;
    ensure_success(&resp).await?;
    Ok(resp.json().await?)
}

async fn post_empty<T: serde::de::DeserializeOwned>(client: &reqwest::Client, server: &str, path: &str) -> Result<T> {
    let resp = client.post(format!("{server}{path}")).send().await?;
    ensure_success(&resp).await?;
    Ok(resp.json().await?)
}

async fn delete<T: serde::de::DeserializeOwned>(client: &reqwest::Client, server: &str, path: &str) -> Result<T> {
    let resp = client.delete(format!("{server}{path}")).send().await?;
    ensure_success(&resp).await?;
    Ok(resp.json().await?)
}

async fn ensure_success(resp: &reqwest::Response) -> Result<()> {
    if !resp.status().is_success() {
        bail!("server returned {}", resp.status());
    }
    Ok(())
}

fn print_message(format: OutputFormat, message: &str) {
    match format {
        OutputFormat::Human => println!("{message}"),
        OutputFormat::Json => println!("{}", serde_json::json!({ "message": message })),
    }
}

fn print_nodes(format: OutputFormat, nodes: &HashMap<Uuid, Node>) {
    match format {
        OutputFormat::Human => {
            for (id, node) in nodes {
                println!(
                    "Node {id}: CPU {}/{}, Status: {}, Pods: {}",
                    node.available_cpu,
                    node.cpu_cores,
                    node.health_status,
                    node.pods.len()
                );
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(nodes).unwrap()),
    }
}

fn print_pods(format: OutputFormat, pods: &[Pod]) {
    match format {
        OutputFormat::Human => {
            for pod in pods {
                println!(
                    "Pod {}: {} cores on node {}, status: {:?}",
                    pod.id, pod.cpu_required, pod.node_id, pod.status
                );
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(pods).unwrap()),
    }
}
