//! In-memory retry bookkeeping for failed uploads.
//!
//! The queue only lives for the process. Dropping it loses nothing: every
//! queued entity is still `pending` in the store and the next cycle's upload
//! phase picks it up from scratch.

use std::time::Duration;

use serde::Serialize;

use crate::models::EntityId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetryQueueEntry {
    pub entity_id: EntityId,
    pub title: String,
    /// Retries performed after the initial failure
    pub attempt_count: u32,
    pub last_error: Option<String>,
}

/// Insertion-ordered queue of entities awaiting an inline retry
#[derive(Debug, Default)]
pub struct RetryQueue {
    entries: Vec<RetryQueueEntry>,
}

impl RetryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an entity; an entity already queued only has its error refreshed.
    /// Returns whether a new entry was created.
    pub fn enqueue(
        &mut self,
        entity_id: EntityId,
        title: impl Into<String>,
        error: Option<String>,
    ) -> bool {
        if let Some(entry) = self.entry_mut(&entity_id) {
            if error.is_some() {
                entry.last_error = error;
            }
            return false;
        }

        self.entries.push(RetryQueueEntry {
            entity_id,
            title: title.into(),
            attempt_count: 0,
            last_error: error,
        });
        true
    }

    pub fn get(&self, entity_id: &EntityId) -> Option<&RetryQueueEntry> {
        self.entries
            .iter()
            .find(|entry| &entry.entity_id == entity_id)
    }

    /// Count one more retry; returns the new attempt count
    pub fn record_attempt(&mut self, entity_id: &EntityId) -> Option<u32> {
        let entry = self.entry_mut(entity_id)?;
        entry.attempt_count += 1;
        Some(entry.attempt_count)
    }

    pub fn record_failure(&mut self, entity_id: &EntityId, error: impl Into<String>) {
        if let Some(entry) = self.entry_mut(entity_id) {
            entry.last_error = Some(error.into());
        }
    }

    pub fn remove(&mut self, entity_id: &EntityId) -> Option<RetryQueueEntry> {
        let index = self
            .entries
            .iter()
            .position(|entry| &entry.entity_id == entity_id)?;
        Some(self.entries.remove(index))
    }

    pub fn ids(&self) -> Vec<EntityId> {
        self.entries.iter().map(|entry| entry.entity_id).collect()
    }

    pub fn snapshot(&self) -> Vec<RetryQueueEntry> {
        self.entries.clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn entry_mut(&mut self, entity_id: &EntityId) -> Option<&mut RetryQueueEntry> {
        self.entries
            .iter_mut()
            .find(|entry| &entry.entity_id == entity_id)
    }
}

/// Delay before retry number `attempt + 1`: `base * 2^attempt`, saturating
#[must_use]
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2_u32.saturating_pow(attempt))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn enqueue_is_idempotent_per_entity() {
        let mut queue = RetryQueue::new();
        let id = EntityId::new();

        assert!(queue.enqueue(id, "Morning", Some("timeout".into())));
        assert!(!queue.enqueue(id, "Morning", Some("refused".into())));
        assert_eq!(queue.len(), 1);

        let entry = queue.get(&id).unwrap();
        assert_eq!(entry.attempt_count, 0);
        assert_eq!(entry.last_error.as_deref(), Some("refused"));
    }

    #[test]
    fn attempts_and_removal() {
        let mut queue = RetryQueue::new();
        let first = EntityId::new();
        let second = EntityId::new();
        queue.enqueue(first, "A", None);
        queue.enqueue(second, "B", None);

        assert_eq!(queue.record_attempt(&first), Some(1));
        assert_eq!(queue.record_attempt(&first), Some(2));
        queue.record_failure(&first, "still down");
        assert_eq!(queue.ids(), vec![first, second]);

        let removed = queue.remove(&first).unwrap();
        assert_eq!(removed.attempt_count, 2);
        assert_eq!(removed.last_error.as_deref(), Some("still down"));
        assert_eq!(queue.record_attempt(&first), None);
        assert_eq!(queue.snapshot().len(), 1);

        queue.clear();
        assert!(queue.is_empty());
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let base = Duration::from_millis(500);
        assert_eq!(backoff_delay(base, 0), Duration::from_millis(500));
        assert_eq!(backoff_delay(base, 1), Duration::from_secs(1));
        assert_eq!(backoff_delay(base, 3), Duration::from_secs(4));
        assert_eq!(backoff_delay(Duration::ZERO, 5), Duration::ZERO);
        assert!(backoff_delay(base, 64) >= backoff_delay(base, 31));
    }
}
