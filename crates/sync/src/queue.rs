//! Durable FIFO queue of not-yet-acknowledged mutations.

use std::collections::VecDeque;

use log::warn;

use parlor_core::sync::SyncQueueItem;

use crate::persist::KeyValuePersistence;

/// FIFO offline queue.
///
/// Items are appended at the tail, removed from the head after a confirmed
/// send, and reinserted only at the head: order of creation equals order
/// of transmission. The persisted form is a JSON array under a single
/// storage key, rewritten in full on every change.
#[derive(Debug)]
pub struct OfflineQueue {
    items: VecDeque<SyncQueueItem>,
    storage_key: String,
}

impl OfflineQueue {
    /// Restore the queue from persistence.
    ///
    /// A missing value yields an empty queue; an unreadable one is logged
    /// and discarded rather than blocking startup.
    pub fn load(persistence: &dyn KeyValuePersistence, storage_key: &str) -> Self {
        let items = match persistence.load(storage_key) {
            Ok(Some(raw)) => match serde_json::from_str::<VecDeque<SyncQueueItem>>(&raw) {
                Ok(items) => items,
                Err(err) => {
                    warn!("[Sync] Discarding unreadable offline queue: {}", err);
                    VecDeque::new()
                }
            },
            Ok(None) => VecDeque::new(),
            Err(err) => {
                warn!("[Sync] Failed to load offline queue: {}", err);
                VecDeque::new()
            }
        };
        Self {
            items,
            storage_key: storage_key.to_string(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn push_back(&mut self, item: SyncQueueItem) {
        self.items.push_back(item);
    }

    /// Reinsert a failed item at the head, preserving transmission order.
    pub fn push_front(&mut self, item: SyncQueueItem) {
        self.items.push_front(item);
    }

    pub fn pop_front(&mut self) -> Option<SyncQueueItem> {
        self.items.pop_front()
    }

    /// Rewrite the persisted queue in full.
    ///
    /// Failure degrades to a logged warning: the in-memory queue stays
    /// authoritative for the session, it just will not survive a reload.
    pub fn persist(&self, persistence: &dyn KeyValuePersistence) {
        let raw = match serde_json::to_string(&self.items) {
            Ok(raw) => raw,
            Err(err) => {
                warn!("[Sync] Failed to serialize offline queue: {}", err);
                return;
            }
        };
        if let Err(err) = persistence.store(&self.storage_key, &raw) {
            warn!(
                "[Sync] Failed to persist offline queue ({} items): {}",
                self.items.len(),
                err
            );
        }
    }
}
