//! Inventory of running container images.
//!
//! The inventory maps an [`InventoryKey`] (image identity, workload, namespace) to
//! the number of containers currently observed for it. It is the single owner of
//! these counts; the metrics gauge and the HTTP surface only read from it.
mod key;
mod store;

pub use key::{InventoryEntry, InventoryKey};
pub use store::Inventory;
