use clap::Parser;

/// Entry point for the Kubernetes Images Exporter.
///
/// Watches the pods of a cluster, counts the container images they run, and serves
/// the counts for Prometheus to scrape.
///
/// # Examples
///
/// ```bash
/// KUBECONFIG=~/.kube/config cargo run -- --port 9090 --endpoint /metrics
/// ```
#[tokio::main]
async fn main() -> std::process::ExitCode {
    let config = kubernetes_images_exporter::Config::parse();
    kubernetes_images_exporter::logging::init(config.log_format);

    match kubernetes_images_exporter::run(config).await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            std::process::ExitCode::FAILURE
        }
    }
}
