use crate::image::ImageIdentity;

/// Composite key of the inventory: one image identity as used by one workload.
///
/// Keys compare by full structural equality. The derived ordering (identity,
/// workload, namespace) is the order of [`super::Inventory::snapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct InventoryKey {
    #[serde(flatten)]
    pub identity: ImageIdentity,
    #[serde(rename = "pod")]
    pub workload: String,
    pub namespace: String,
}

impl InventoryKey {
    pub fn new(
        identity: ImageIdentity,
        workload: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            identity,
            workload: workload.into(),
            namespace: namespace.into(),
        }
    }

    /// Label values in the order `repo, tag, digest, pod, namespace`.
    pub fn label_values(&self) -> [&str; 5] {
        [
            &self.identity.repository,
            &self.identity.tag,
            &self.identity.digest,
            &self.workload,
            &self.namespace,
        ]
    }
}

/// A key together with its current occurrence count.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct InventoryEntry {
    #[serde(flatten)]
    pub key: InventoryKey,
    pub count: u64,
}
