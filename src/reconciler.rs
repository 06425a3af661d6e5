use std::sync::Arc;

use crate::image::ImageIdentity;
use crate::inventory::{Inventory, InventoryKey};
use crate::metrics::ImageMetrics;
use crate::workload::{Workload, WorkloadHandler};

/// Applies workload notifications to the [`Inventory`] and mirrors the resulting
/// counts into [`ImageMetrics`].
///
/// Notifications are not deduplicated: a repeated add counts twice and removes rely
/// on the inventory's clamp at zero.
#[derive(Debug, Clone)]
pub struct Reconciler {
    inventory: Arc<Inventory>,
    metrics: ImageMetrics,
}

impl Reconciler {
    pub fn new(inventory: Arc<Inventory>, metrics: ImageMetrics) -> Self {
        Self { inventory, metrics }
    }

    pub fn inventory(&self) -> &Arc<Inventory> {
        &self.inventory
    }

    /// Counts every container of `workload` once.
    pub fn on_workload_added(&self, workload: &Workload) {
        for key in inventory_keys(workload) {
            let count = self.inventory.increment(&key);
            self.publish("added", &key, count);
        }
    }

    /// Uncounts every container of `workload` once, never below zero.
    pub fn on_workload_removed(&self, workload: &Workload) {
        for key in inventory_keys(workload) {
            let count = self.inventory.decrement(&key);
            self.publish("removed", &key, count);
        }
    }

    fn publish(&self, action: &str, key: &InventoryKey, count: u64) {
        self.metrics.observe(key, count);
        log::info!(
            "{action} image {}: repo={}, tag={}, digest={}, pod={}, namespace={}, count={}",
            key.identity,
            key.identity.repository,
            key.identity.tag,
            key.identity.digest,
            key.workload,
            key.namespace,
            count
        );
    }
}

impl WorkloadHandler for Reconciler {
    fn on_added(&self, workload: &Workload) {
        self.on_workload_added(workload);
    }

    fn on_removed(&self, workload: &Workload) {
        self.on_workload_removed(workload);
    }
}

fn inventory_keys(workload: &Workload) -> impl Iterator<Item = InventoryKey> + '_ {
    workload.containers.iter().map(|container| {
        let identity = ImageIdentity::try_parse(&container.image).unwrap_or_else(|err| {
            log::warn!(
                "counting unparsable image of pod `{}/{}` as-is: {}",
                workload.namespace,
                workload.name,
                err
            );
            ImageIdentity::fallback(&container.image)
        });
        InventoryKey::new(identity, workload.name.as_str(), workload.namespace.as_str())
    })
}
