use std::future::Future;
use std::sync::Arc;

use axum::http::HeaderValue;
use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use syncwarden_core::config::ApiConfig;

use super::handlers::{self, GatewayState};

/// Header carrying the request ID.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Per-request context inserted by the request-id middleware.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
}

/// Management API server configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Address to bind.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self::from(&ApiConfig::default())
    }
}

impl From<&ApiConfig> for GatewayConfig {
    fn from(config: &ApiConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
        }
    }
}

/// HTTP server exposing the node registry.
pub struct GatewayServer {
    config: GatewayConfig,
    state: Arc<GatewayState>,
}

impl GatewayServer {
    /// Create a new gateway server.
    pub fn new(config: GatewayConfig, state: GatewayState) -> Self {
        Self {
            config,
            state: Arc::new(state),
        }
    }

    /// Build the Axum router.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/health", get(handlers::health))
            .route("/status", get(handlers::status))
            .route("/nodes", get(handlers::list_nodes).post(handlers::add_node))
            .route("/nodes/{name}", delete(handlers::delete_node))
            .route("/join", post(handlers::join))
            .with_state(self.state.clone())
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(middleware::from_fn(request_id_middleware)),
            )
    }

    /// Serve until `shutdown` resolves.
    pub async fn run(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), std::io::Error> {
        let router = self.router();
        let listener =
            tokio::net::TcpListener::bind((self.config.host.as_str(), self.config.port)).await?;

        tracing::info!("Management API listening on {}", listener.local_addr()?);

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
    }
}

/// Propagates or generates a request ID and echoes it on the response.
async fn request_id_middleware(
    mut req: axum::extract::Request,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let request_id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    req.extensions_mut().insert(RequestContext {
        request_id: request_id.clone(),
    });

    let mut response = next.run(req).await;

    if let Ok(val) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, val);
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use syncwarden_core::cluster::NodeRole;

    use crate::cluster::{CoordinatorLoop, FailoverController, NodeRegistry, Tunables};
    use crate::testing::{MockReplication, ScriptedProbe};

    fn router(role: NodeRole, capacity: usize) -> (Arc<NodeRegistry>, Router) {
        let registry = Arc::new(NodeRegistry::new(capacity, role));
        registry.add("me", "postgres://me/postgres", true, false).unwrap();

        let control = Arc::new(MockReplication::new(!role.is_primary(), "*"));
        let failover = Arc::new(FailoverController::new(control, registry.clone(), None));
        let coordinator = CoordinatorLoop::new(
            registry.clone(),
            Arc::new(ScriptedProbe::new()),
            failover.clone(),
            Box::new(Tunables::default()),
            Tunables::default(),
        );

        let state = GatewayState::new(registry.clone(), failover, coordinator.status(), "me");
        let server = GatewayServer::new(GatewayConfig::default(), state);
        (registry, server.router())
    }

    async fn call(
        router: &Router,
        method: &str,
        uri: &str,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn node(name: &str) -> serde_json::Value {
        serde_json::json!({ "name": name, "endpoint": format!("postgres://{}/postgres", name) })
    }

    #[test]
    fn test_gateway_config_default() {
        let config = GatewayConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 7400);
    }

    #[tokio::test]
    async fn test_health() {
        let (_, router) = router(NodeRole::Primary, 3);
        let (status, body) = call(&router, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "healthy");
        assert!(body["request_id"].is_string());
    }

    #[tokio::test]
    async fn test_request_id_is_echoed() {
        let (_, router) = router(NodeRole::Primary, 3);
        let response = router
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header(REQUEST_ID_HEADER, "req-42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.headers()[REQUEST_ID_HEADER], "req-42");
    }

    #[tokio::test]
    async fn test_add_list_delete() {
        let (registry, router) = router(NodeRole::Primary, 3);

        let (status, body) = call(&router, "POST", "/nodes", Some(node("b"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], true);

        let (_, body) = call(&router, "GET", "/nodes", None).await;
        let nodes = body["data"].as_array().unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[1]["name"], "b");
        assert_eq!(nodes[1]["failure_count"], 0);

        let (status, body) = call(&router, "DELETE", "/nodes/b", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], true);
        assert_eq!(registry.count(), 1);
    }

    #[tokio::test]
    async fn test_add_errors() {
        let (_, router) = router(NodeRole::Primary, 2);

        call(&router, "POST", "/nodes", Some(node("b"))).await;
        let (status, body) = call(&router, "POST", "/nodes", Some(node("b"))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "DUPLICATE_NAME");

        let (status, body) = call(&router, "POST", "/nodes", Some(node("c"))).await;
        assert_eq!(status, StatusCode::INSUFFICIENT_STORAGE);
        assert_eq!(body["error"]["code"], "CAPACITY_EXCEEDED");

        let (status, body) =
            call(&router, "POST", "/nodes", Some(serde_json::json!({"name": "x"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_ARGUMENT");
    }

    #[tokio::test]
    async fn test_endpoint_forms() {
        let (registry, router) = router(NodeRole::Primary, 4);

        let keyword = serde_json::json!({
            "name": "kw",
            "endpoint": "host=10.0.0.7 port=5432 dbname=postgres user=postgres"
        });
        let (status, _) = call(&router, "POST", "/nodes", Some(keyword)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(registry.get("kw").is_some());

        let garbage = serde_json::json!({ "name": "bad", "endpoint": "db1:5432" });
        let (status, body) = call(&router, "POST", "/nodes", Some(garbage.clone())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_ARGUMENT");

        let (status, _) = call(&router, "POST", "/join", Some(garbage)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(registry.get("bad").is_none());
    }

    #[tokio::test]
    async fn test_delete_missing() {
        let (_, router) = router(NodeRole::Primary, 3);
        let (status, body) = call(&router, "DELETE", "/nodes/zzz", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_join_is_idempotent_on_primary() {
        let (registry, router) = router(NodeRole::Primary, 3);

        for _ in 0..2 {
            let (status, body) = call(&router, "POST", "/join", Some(node("s1"))).await;
            assert_eq!(status, StatusCode::OK);
            let names: Vec<&str> = body["data"]
                .as_array()
                .unwrap()
                .iter()
                .map(|m| m["name"].as_str().unwrap())
                .collect();
            assert_eq!(names, vec!["me", "s1"]);
        }
        assert_eq!(registry.count(), 2);
    }

    #[tokio::test]
    async fn test_join_rejected_on_standby() {
        let (registry, router) = router(NodeRole::Standby, 3);
        let (status, body) = call(&router, "POST", "/join", Some(node("s1"))).await;
        assert_eq!(status, StatusCode::MISDIRECTED_REQUEST);
        assert_eq!(body["error"]["code"], "NOT_PRIMARY");
        assert_eq!(registry.count(), 1);
    }

    #[tokio::test]
    async fn test_status() {
        let (_, router) = router(NodeRole::Primary, 3);
        let (status, body) = call(&router, "GET", "/status", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["node"], "me");
        assert_eq!(body["data"]["role"], "primary");
        assert_eq!(body["data"]["node_count"], 1);
        assert_eq!(body["data"]["capacity"], 3);
        assert_eq!(body["data"]["coordinator"]["state"], "idle");
        assert_eq!(body["data"]["coordinator"]["retry_threshold"], 4);
    }
}
