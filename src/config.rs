use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use crate::api::{HEALTH_PATH, INVENTORY_PATH};

/// Line format of the log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// One JSON object per line.
    Json,
    /// env_logger's human readable format.
    Text,
}

/// Exports the container images running in a Kubernetes cluster as Prometheus metrics
#[derive(Debug, Clone, clap::Parser)]
#[command(name = "kubernetes-images-exporter", version, about, long_about = None)]
pub struct Config {
    /// Port for the metrics HTTP endpoint
    #[arg(long, env = "EXPORTER_PORT", default_value_t = 9090)]
    pub port: u16,

    /// Address to listen on
    #[arg(long, env = "EXPORTER_ADDRESS", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub address: IpAddr,

    /// Path under which metrics are served
    #[arg(
        long = "endpoint",
        env = "EXPORTER_METRICS_PATH",
        default_value = "/metrics",
        value_parser = parse_metrics_path
    )]
    pub metrics_path: String,

    /// Kubeconfig file; inferred from the environment when omitted
    #[arg(long)]
    pub kubeconfig: Option<PathBuf>,

    /// Comma separated namespaces to watch; all namespaces when omitted
    #[arg(long, env = "EXPORTER_NAMESPACES", value_delimiter = ',')]
    pub namespaces: Vec<String>,

    /// Log line format
    #[arg(long, env = "EXPORTER_LOG_FORMAT", value_enum, default_value_t = LogFormat::Json)]
    pub log_format: LogFormat,
}

impl Config {
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.port)
    }
}

fn parse_metrics_path(path: &str) -> Result<String, String> {
    if !path.starts_with('/') {
        return Err(format!("metrics path `{path}` must start with `/`"));
    }
    if path == HEALTH_PATH || path == INVENTORY_PATH {
        return Err(format!("metrics path `{path}` is reserved"));
    }
    // the router would read these as captures or wildcards
    let is_pattern =
        |segment: &str| segment.starts_with([':', '*']) || segment.contains(['{', '}']);
    if path.split('/').any(is_pattern) {
        return Err(format!(
            "metrics path `{path}` must not contain `:`/`*` segments or braces"
        ));
    }
    Ok(path.to_owned())
}
