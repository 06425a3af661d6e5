//! Kubernetes Images Exporter: keeps an inventory of the container images running
//! in a cluster and exposes it as the `deployed_images` Prometheus gauge.
//!
//! Pods are watched through the Kubernetes API; every container of a pod is counted
//! under its image repository, tag, digest, pod and namespace.
use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod image;
pub mod inventory;
pub mod logging;
pub mod metrics;
pub mod reconciler;
pub mod source;
pub mod workload;

pub use config::Config;
pub use error::{Error, Result};

/// Runs the exporter until SIGINT or SIGTERM.
///
/// Connects to the cluster, starts the HTTP server and then processes pod
/// notifications on the calling task.
///
/// # Errors
///
/// Possible errors include:
/// - No usable cluster configuration or credentials.
/// - The listen address cannot be bound.
/// - The pod watch or the HTTP server stops on its own.
pub async fn run(config: Config) -> Result<()> {
    let inventory = Arc::new(inventory::Inventory::default());
    let metrics = metrics::ImageMetrics::new()?;
    let reconciler = reconciler::Reconciler::new(Arc::clone(&inventory), metrics.clone());

    let source =
        source::KubernetesSource::connect(config.kubeconfig.as_deref(), &config.namespaces)
            .await?;
    log::debug!("Connected to cluster");

    let listener = api::APIServer::bind(config.listen_addr()).await?;
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let mut server = {
        let server = api::APIServer::new(
            api::AppState::new(inventory, metrics),
            &config.metrics_path,
        );
        tokio::spawn(server.serve(listener, async move {
            let _ = stop_rx.await;
        }))
    };

    tokio::select! {
        result = source.subscribe(&reconciler, shutdown_signal()) => {
            result?;
            let inventory = reconciler.inventory();
            if inventory.is_empty() {
                log::info!("Shutting down, no images were observed");
            } else {
                log::info!("Shutting down with {} inventory entries", inventory.len());
            }
            let _ = stop_tx.send(());
            server.await.map_err(Error::ApiTask)??;
            Ok(())
        }
        result = &mut server => {
            result.map_err(Error::ApiTask)??;
            Err(Error::ApiStopped)
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            log::error!("failed to listen for SIGINT: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                log::error!("failed to listen for SIGTERM: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
