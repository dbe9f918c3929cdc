//! HTTP API. Every handler is a thin adapter: translate the request, call
//! into `ClusterState`/`Scheduler`/`NodeRuntime`, translate the result.

use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post},
    Router,
};
use orka_types::{
    CreateNodeRequest, ErrorResponse, HeartbeatRequest, HeartbeatResponse, LaunchPodRequest,
    MessageResponse, NodeId, OrkaError, PodId,
};
use serde_json::json;
use std::collections::HashMap;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};
use uuid::Uuid;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/nodes", post(add_node).get(list_nodes))
        .route("/nodes/:id/stop", post(stop_node))
        .route("/nodes/:id", delete(delete_node))
        .route("/pods", post(launch_pod).get(list_pods))
        .route("/pods/:id", delete(delete_pod))
        .route("/heartbeat", post(heartbeat))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub struct ApiError(OrkaError);

impl From<OrkaError> for ApiError {
    fn from(err: OrkaError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            OrkaError::InvalidArgument(_) | OrkaError::NoCapacity => StatusCode::BAD_REQUEST,
            OrkaError::NotFound(_) => StatusCode::NOT_FOUND,
            OrkaError::Conflict(_) => StatusCode::FORBIDDEN,
            OrkaError::RuntimeFailure(_) | OrkaError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body: ErrorResponse = (&self.0).into();
        (status, Json(body)).into_response()
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// `POST /nodes`: create the state record, launch the backing container,
/// then verify it actually came up. Either launch failure or a failed
/// post-launch inspect rolls the in-memory node record back.
async fn add_node(
    State(state): State<AppState>,
    Json(req): Json<CreateNodeRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let now = state.clock.now_millis();
    let node_id = {
        let mut cluster = state.cluster.write().await;
        cluster.create_node(req.cpu_cores, now)?
    };

    let api_endpoint = format!("http://{}", state.advertise_addr);
    if let Err(err) = state.runtime.launch(node_id, req.cpu_cores as u32, &api_endpoint).await {
        error!(node_id = %node_id, error = %err, "launch failed, rolling back node record");
        let _ = state.cluster.write().await.delete_node(node_id, now);
        return Err(ApiError(OrkaError::RuntimeFailure(err.to_string())));
    }

    match state.runtime.inspect(node_id).await {
        Ok(report) if report.running => {}
        _ => {
            error!(node_id = %node_id, "post-launch inspect failed, rolling back node record");
            let _ = state.cluster.write().await.delete_node(node_id, now);
            return Err(ApiError(OrkaError::RuntimeFailure(
                "container failed to start properly".into(),
            )));
        }
    }

    info!(node_id = %node_id, cpu_cores = req.cpu_cores, "node added");
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: format!("Node {node_id} added with {} CPU cores", req.cpu_cores),
        }),
    ))
}

async fn list_nodes(State(state): State<AppState>) -> Json<HashMap<NodeId, orka_types::Node>> {
    let cluster = state.cluster.read().await;
    let nodes = cluster.list_nodes().map(|n| (n.id, n.clone())).collect();
    Json(nodes)
}

/// `POST /nodes/{id}/stop`: drain the node's pods in state, stop the
/// container, then try to reschedule the drained pods elsewhere. If the
/// runtime stop fails the node stays marked `Stopped` — reviving a
/// partially torn-down worker would be worse than leaving it stopped.
async fn stop_node(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, ApiError> {
    let drained = {
        let mut cluster = state.cluster.write().await;
        cluster.stop_node(id)?
    };

    if let Err(err) = state.runtime.stop(id).await {
        warn!(node_id = %id, error = %err, "runtime stop failed, node left marked stopped");
        state.scheduler.reschedule(id, drained).await;
        return Err(ApiError(OrkaError::RuntimeFailure(err.to_string())));
    }

    state.scheduler.reschedule(id, drained).await;
    Ok(Json(MessageResponse {
        message: format!("Node {id} stopped"),
    }))
}

/// `DELETE /nodes/{id}`: unconditional. Orphaned pods are marked `Failed`
/// inside `delete_node` before the record is dropped; the container is
/// force-removed regardless of its current state.
async fn delete_node(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, ApiError> {
    let now = state.clock.now_millis();
    let orphaned = {
        let mut cluster = state.cluster.write().await;
        cluster.delete_node(id, now)?
    };
    if !orphaned.is_empty() {
        warn!(node_id = %id, orphaned = orphaned.len(), "pods failed by node deletion");
    }
    if let Err(err) = state.runtime.remove(id).await {
        warn!(node_id = %id, error = %err, "runtime remove failed, continuing");
    }
    Ok(Json(MessageResponse {
        message: format!("Node {id} deleted"),
    }))
}

async fn launch_pod(
    State(state): State<AppState>,
    Json(req): Json<LaunchPodRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    if req.cpu_required <= 0 {
        return Err(ApiError(OrkaError::InvalidArgument("cpuRequired must be positive".into())));
    }
    let (node_id, pod_id) = state.scheduler.place(req.cpu_required as u32).await?;
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: format!("Pod {pod_id} launched on node {node_id}"),
        }),
    ))
}

async fn list_pods(State(state): State<AppState>) -> Json<Vec<orka_types::Pod>> {
    let cluster = state.cluster.read().await;
    Json(cluster.list_pods().cloned().collect())
}

async fn delete_pod(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, ApiError> {
    let mut cluster = state.cluster.write().await;
    let pod = cluster.delete_pod(id)?;
    // The pod may already be homeless (status=Failed after a reschedule
    // miss); only reverse the reservation if it is still on a node.
    if matches!(pod.status, orka_types::PodStatus::Running) {
        let _ = cluster.remove_pod_from_node(id, pod.node_id);
    }
    Ok(Json(MessageResponse {
        message: format!("Pod {id} deleted"),
    }))
}

async fn heartbeat(
    State(state): State<AppState>,
    Json(req): Json<HeartbeatRequest>,
) -> Result<Json<HeartbeatResponse>, ApiError> {
    let now = state.clock.now_millis();
    let pods: Vec<PodId> = {
        let mut cluster = state.cluster.write().await;
        cluster.record_heartbeat(req.node_id, req.cpu_cores, now)?
    };
    Ok(Json(HeartbeatResponse {
        message: "Heartbeat received".to_string(),
        pods,
    }))
}
