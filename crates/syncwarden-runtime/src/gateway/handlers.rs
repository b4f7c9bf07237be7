use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::{Extension, Json};
use serde::Serialize;
use tokio::sync::watch;

use syncwarden_core::cluster::{connect_options, NodeRole};
use syncwarden_core::error::{Result, WardenError};

use super::request::NodeRequest;
use super::response::ApiResponse;
use super::server::RequestContext;
use crate::cluster::{CoordinatorStatus, FailoverController, NodeRegistry};

/// Shared state behind every management handler.
pub struct GatewayState {
    registry: Arc<NodeRegistry>,
    failover: Arc<FailoverController>,
    status: watch::Receiver<CoordinatorStatus>,
    node_name: String,
}

impl GatewayState {
    pub fn new(
        registry: Arc<NodeRegistry>,
        failover: Arc<FailoverController>,
        status: watch::Receiver<CoordinatorStatus>,
        node_name: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            failover,
            status,
            node_name: node_name.into(),
        }
    }
}

/// Body of `GET /status`.
#[derive(Debug, Serialize)]
pub struct StatusView {
    pub node: String,
    pub role: NodeRole,
    pub sync_active: bool,
    pub node_count: usize,
    pub capacity: usize,
    pub coordinator: CoordinatorStatus,
}

#[derive(Debug, Serialize)]
struct HealthView {
    status: &'static str,
    version: &'static str,
}

fn respond<T: Serialize>(ctx: &RequestContext, result: Result<T>) -> ApiResponse {
    let response = match result.and_then(|data| Ok(serde_json::to_value(data)?)) {
        Ok(data) => ApiResponse::success(data),
        Err(e) => {
            tracing::debug!(error = %e, "Management request failed");
            ApiResponse::from(e)
        }
    };
    response.with_request_id(ctx.request_id.clone())
}

/// Decode a node request. The endpoint must be one the probe can connect to.
fn body(payload: std::result::Result<Json<NodeRequest>, JsonRejection>) -> Result<NodeRequest> {
    let Json(req) = payload.map_err(|e| WardenError::InvalidArgument(e.body_text()))?;
    connect_options(&req.endpoint)?;
    Ok(req)
}

/// `GET /health`
pub async fn health(Extension(ctx): Extension<RequestContext>) -> ApiResponse {
    respond(
        &ctx,
        Ok(HealthView {
            status: "healthy",
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
}

/// `GET /nodes`
pub async fn list_nodes(
    State(state): State<Arc<GatewayState>>,
    Extension(ctx): Extension<RequestContext>,
) -> ApiResponse {
    respond(&ctx, Ok(state.registry.snapshot()))
}

/// `POST /nodes`
pub async fn add_node(
    State(state): State<Arc<GatewayState>>,
    Extension(ctx): Extension<RequestContext>,
    payload: std::result::Result<Json<NodeRequest>, JsonRejection>,
) -> ApiResponse {
    let result = body(payload)
        .and_then(|req| state.registry.add(&req.name, &req.endpoint, false, false));
    respond(&ctx, result)
}

/// `DELETE /nodes/{name}`
pub async fn delete_node(
    State(state): State<Arc<GatewayState>>,
    Extension(ctx): Extension<RequestContext>,
    Path(name): Path<String>,
) -> ApiResponse {
    respond(&ctx, state.registry.remove(&name))
}

/// `POST /join`
///
/// Registers the caller (idempotently) and returns the full membership.
pub async fn join(
    State(state): State<Arc<GatewayState>>,
    Extension(ctx): Extension<RequestContext>,
    payload: std::result::Result<Json<NodeRequest>, JsonRejection>,
) -> ApiResponse {
    let result = body(payload).and_then(|req| {
        if !state.registry.local_role().is_primary() {
            return Err(WardenError::NotPrimary(format!(
                "{} is a standby and cannot accept joins",
                state.node_name
            )));
        }
        state.registry.add(&req.name, &req.endpoint, false, true)?;
        tracing::info!(node = %req.name, "Node joined");
        Ok(state.registry.members())
    });
    respond(&ctx, result)
}

/// `GET /status`
pub async fn status(
    State(state): State<Arc<GatewayState>>,
    Extension(ctx): Extension<RequestContext>,
) -> ApiResponse {
    let view = StatusView {
        node: state.node_name.clone(),
        role: state.registry.local_role(),
        sync_active: state.failover.is_sync_active(),
        node_count: state.registry.count(),
        capacity: state.registry.capacity(),
        coordinator: state.status.borrow().clone(),
    };
    respond(&ctx, Ok(view))
}
