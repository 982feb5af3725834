//! Addressable batch queue: items keyed by id plus a separate order list.

use std::collections::HashMap;

use humanize_core::batch::{BatchItem, BatchItemStatus};
use humanize_core::error::CoreError;
use humanize_core::types::ItemId;

/// Items in insertion order, each reachable by id in O(1).
#[derive(Debug, Default)]
pub struct BatchQueue {
    items: HashMap<ItemId, BatchItem>,
    order: Vec<ItemId>,
}

impl BatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an item; returns its id.
    pub fn push(&mut self, item: BatchItem) -> ItemId {
        let id = item.id;
        if self.items.insert(id, item).is_none() {
            self.order.push(id);
        }
        id
    }

    pub fn get(&self, id: &ItemId) -> Option<&BatchItem> {
        self.items.get(id)
    }

    pub fn get_mut(&mut self, id: &ItemId) -> Option<&mut BatchItem> {
        self.items.get_mut(id)
    }

    pub fn contains(&self, id: &ItemId) -> bool {
        self.items.contains_key(id)
    }

    /// Remove an item, returning it if it was queued.
    pub fn remove(&mut self, id: &ItemId) -> Option<BatchItem> {
        let removed = self.items.remove(id)?;
        self.order.retain(|queued| queued != id);
        Some(removed)
    }

    /// Move one item to `next`.
    ///
    /// Returns `Ok(false)` when the id is not queued (it may have been
    /// removed while work was in flight); invalid transitions are errors.
    pub fn transition(&mut self, id: &ItemId, next: BatchItemStatus) -> Result<bool, CoreError> {
        match self.items.get_mut(id) {
            Some(item) => item.transition(next).map(|()| true),
            None => Ok(false),
        }
    }

    /// Ids of `pending` items, in queue order.
    pub fn pending_ids(&self) -> Vec<ItemId> {
        self.iter()
            .filter(|item| item.status == BatchItemStatus::Pending)
            .map(|item| item.id)
            .collect()
    }

    /// Items in queue order.
    pub fn iter(&self) -> impl Iterator<Item = &BatchItem> {
        self.order.iter().filter_map(|id| self.items.get(id))
    }

    /// Cloned items in queue order.
    pub fn snapshot(&self) -> Vec<BatchItem> {
        self.iter().cloned().collect()
    }

    /// Number of items in `status`.
    pub fn count(&self, status: BatchItemStatus) -> usize {
        self.items.values().filter(|i| i.status == status).count()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
