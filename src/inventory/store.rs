use dashmap::DashMap;

use super::key::{InventoryEntry, InventoryKey};

/// Occurrence counts of running images, keyed by [`InventoryKey`].
///
/// Counts never fall below zero and entries are never removed, so a key that was
/// seen once keeps being reported, at zero once its workloads are gone.
#[derive(Debug, Default)]
pub struct Inventory {
    entries: DashMap<InventoryKey, u64>,
}

impl Inventory {
    /// Adds one occurrence of `key`, creating the entry if needed.
    ///
    /// # Returns
    ///
    /// The count after the increment.
    pub fn increment(&self, key: &InventoryKey) -> u64 {
        if let Some(mut count) = self.entries.get_mut(key) {
            *count += 1;
            return *count;
        }
        let mut count = self.entries.entry(key.clone()).or_insert(0);
        *count += 1;
        *count
    }

    /// Removes one occurrence of `key`, clamped at zero.
    ///
    /// An absent key is created at zero, so a remove without a matching add is
    /// still reported as a zero sample instead of being dropped.
    ///
    /// # Returns
    ///
    /// The count after the decrement.
    pub fn decrement(&self, key: &InventoryKey) -> u64 {
        let mut count = match self.entries.get_mut(key) {
            Some(count) => count,
            None => self.entries.entry(key.clone()).or_insert(0),
        };
        let next = count.saturating_sub(1);
        *count = next;
        next
    }

    #[cfg(test)]
    fn count(&self, key: &InventoryKey) -> Option<u64> {
        self.entries.get(key).map(|count| *count)
    }

    /// Copies all entries, sorted by key.
    ///
    /// Every key appears exactly once with a count that was current while its shard
    /// was read.
    pub fn snapshot(&self) -> Vec<InventoryEntry> {
        let mut out: Vec<InventoryEntry> = self
            .entries
            .iter()
            .map(|entry| InventoryEntry {
                key: entry.key().clone(),
                count: *entry.value(),
            })
            .collect();
        out.sort_unstable_by(|a, b| a.key.cmp(&b.key));
        out
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
