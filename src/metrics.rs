use prometheus::{Encoder, IntGaugeVec, Opts, Registry, TextEncoder};

use crate::inventory::InventoryKey;

pub const METRIC_NAME: &str = "deployed_images";

const METRIC_HELP: &str = "The number of deployed images";

const LABELS: [&str; 5] = ["repo", "tag", "digest", "pod", "namespace"];

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to register metric `{name}`: {source}")]
    Register {
        name: &'static str,
        #[source]
        source: prometheus::Error,
    },
    #[error("failed to encode metrics: {0}")]
    Encode(#[source] prometheus::Error),
    #[error("encoded metrics are not valid UTF-8: {0}")]
    Utf8(#[source] std::string::FromUtf8Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Gauge cache of the inventory, exposed in the text exposition format.
///
/// Each sample is set to the inventory count of its key right after the inventory
/// changes, so scrapes never have to walk and re-label the inventory.
#[derive(Clone)]
pub struct ImageMetrics {
    registry: Registry,
    images: IntGaugeVec,
}

impl std::fmt::Debug for ImageMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageMetrics")
            .field("metric", &METRIC_NAME)
            .finish_non_exhaustive()
    }
}

impl ImageMetrics {
    /// Creates the `deployed_images` gauge in a registry owned by this instance.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Register`] if the gauge cannot be created or registered.
    pub fn new() -> Result<Self> {
        let register_err = |source: prometheus::Error| Error::Register {
            name: METRIC_NAME,
            source,
        };
        let images = IntGaugeVec::new(Opts::new(METRIC_NAME, METRIC_HELP), &LABELS)
            .map_err(register_err)?;
        let registry = Registry::new();
        registry
            .register(Box::new(images.clone()))
            .map_err(register_err)?;

        Ok(Self { registry, images })
    }

    /// Sets the sample for `key` to `count`.
    pub fn observe(&self, key: &InventoryKey, count: u64) {
        self.images
            .with_label_values(&key.label_values())
            .set(i64::try_from(count).unwrap_or(i64::MAX));
    }

    /// Renders all samples in the Prometheus text format.
    pub fn render(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(Error::Encode)?;
        String::from_utf8(buffer).map_err(Error::Utf8)
    }
}
