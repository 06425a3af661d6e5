use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read kubeconfig `{path}`: {source}")]
    Kubeconfig {
        path: PathBuf,
        #[source]
        source: kube::config::KubeconfigError,
    },
    #[error("failed to infer cluster configuration: {0}")]
    InferConfig(#[source] kube::config::InferConfigError),
    #[error("failed to create cluster client: {0}")]
    Client(#[source] kube::Error),
    #[error("failed to list pods in {scope}: {source}")]
    Connect {
        scope: String,
        #[source]
        source: kube::Error,
    },
    #[error("workload event stream ended unexpectedly")]
    StreamEnded,
}

pub type Result<T> = std::result::Result<T, Error>;
