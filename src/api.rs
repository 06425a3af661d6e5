use std::net::SocketAddr;
use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;

use crate::inventory::Inventory;
use crate::metrics::ImageMetrics;

pub const HEALTH_PATH: &str = "/healthz";
pub const INVENTORY_PATH: &str = "/inventory";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to bind `{addr}`: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serve HTTP: {0}")]
    Serve(#[source] std::io::Error),
}

type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone)]
pub struct AppState {
    inventory: Arc<Inventory>,
    metrics: ImageMetrics,
}

impl AppState {
    pub fn new(inventory: Arc<Inventory>, metrics: ImageMetrics) -> Self {
        Self { inventory, metrics }
    }
}

async fn export_metrics(state: State<AppState>) -> Response {
    match state.metrics.render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)],
            body,
        )
            .into_response(),
        Err(err) => {
            log::error!("Failed to render metrics: {}", err);
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to render metrics").into_response()
        }
    }
}

async fn export_inventory(state: State<AppState>) -> Response {
    (StatusCode::OK, Json(state.inventory.snapshot())).into_response()
}

async fn health() -> &'static str {
    "ok"
}

pub struct APIServer {
    router: axum::Router,
}

impl APIServer {
    pub fn new(state: AppState, metrics_path: &str) -> Self {
        let router = axum::Router::new()
            .route(metrics_path, get(export_metrics))
            .route(HEALTH_PATH, get(health))
            .route(INVENTORY_PATH, get(export_inventory))
            .with_state(state);
        Self { router }
    }

    /// Binds the listener up front so that an unusable address fails startup.
    pub async fn bind(addr: SocketAddr) -> Result<tokio::net::TcpListener> {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|source| Error::Bind { addr, source })?;
        log::info!("Listening on {}", addr);
        Ok(listener)
    }

    /// Serves requests until `shutdown` resolves, then drains open connections.
    pub async fn serve(
        self,
        listener: tokio::net::TcpListener,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<()> {
        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(Error::Serve)
    }
}

#[cfg(test)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tower::ServiceExt;

    use super::*;
    use crate::reconciler::Reconciler;
    use crate::workload::Workload;

    fn server() -> (APIServer, Reconciler) {
        let inventory = Arc::new(Inventory::default());
        let metrics = ImageMetrics::new().unwrap();
        let reconciler = Reconciler::new(Arc::clone(&inventory), metrics.clone());
        (
            APIServer::new(AppState::new(inventory, metrics), "/metrics"),
            reconciler,
        )
    }

    async fn get_body(server: APIServer, uri: &str) -> (StatusCode, String) {
        let response = server
            .router
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let (server, _) = server();
        assert_eq!(
            get_body(server, HEALTH_PATH).await,
            (StatusCode::OK, "ok".to_owned())
        );
    }

    #[tokio::test]
    async fn test_metrics_lists_inventory_samples() {
        let (server, reconciler) = server();
        reconciler.on_workload_added(&Workload::new("p1", "ns", ["nginx:1.25"]));
        reconciler.on_workload_removed(&Workload::new("p2", "ns", ["redis@sha256:beef"]));

        let (status, body) = get_body(server, "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains(
            r#"deployed_images{digest="",namespace="ns",pod="p1",repo="nginx",tag="1.25"} 1"#
        ));
        assert!(body.contains(
            r#"deployed_images{digest="sha256:beef",namespace="ns",pod="p2",repo="redis",tag=""} 0"#
        ));
    }

    #[tokio::test]
    async fn test_metrics_path_is_configurable() {
        let (_, reconciler) = server();
        let server = APIServer::new(
            AppState::new(
                Arc::clone(reconciler.inventory()),
                ImageMetrics::new().unwrap(),
            ),
            "/images",
        );
        let (status, _) = get_body(server, "/images").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_inventory_snapshot_as_json() {
        let (server, reconciler) = server();
        reconciler.on_workload_added(&Workload::new("p1", "ns", ["nginx:1.25"]));

        let (status, body) = get_body(server, INVENTORY_PATH).await;
        assert_eq!(status, StatusCode::OK);
        let value: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(
            value,
            serde_json::json!([{
                "repository": "nginx",
                "tag": "1.25",
                "digest": "",
                "pod": "p1",
                "namespace": "ns",
                "count": 1,
            }])
        );
    }
}
