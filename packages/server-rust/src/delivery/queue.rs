//! Bounded FIFO with overflow drain, paired with a counting wakeup.
//!
//! Every push adds exactly one semaphore permit; every pop consumes one. A
//! drain on overflow removes items without removing their permits, so the
//! consumer may wake up to an empty queue. That is expected and the pop
//! simply reports nothing.

use std::collections::VecDeque;

use parking_lot::Mutex;
use tokio::sync::Semaphore;

/// Result of pushing a payload onto a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// The payload was appended behind the existing backlog.
    Queued,
    /// The backlog exceeded its bound and was discarded before the push.
    Overflowed { discarded: usize },
    /// The pipeline is stopped; the payload was dropped.
    Stopped,
}

#[derive(Debug)]
pub struct DeliveryQueue {
    items: Mutex<VecDeque<String>>,
    ready: Semaphore,
    max_len: usize,
}

impl DeliveryQueue {
    #[must_use]
    pub fn new(max_len: usize) -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            ready: Semaphore::new(0),
            max_len,
        }
    }

    /// Appends a payload, first discarding the whole backlog if it holds more
    /// than `max_len` items.
    pub fn push(&self, payload: String) -> EnqueueOutcome {
        let discarded = {
            let mut items = self.items.lock();
            let discarded = if items.len() > self.max_len {
                let n = items.len();
                items.clear();
                n
            } else {
                0
            };
            items.push_back(payload);
            discarded
        };
        self.ready.add_permits(1);

        if discarded > 0 {
            EnqueueOutcome::Overflowed { discarded }
        } else {
            EnqueueOutcome::Queued
        }
    }

    /// Waits for one wakeup and pops the oldest payload.
    ///
    /// Returns `None` when the wakeup belonged to an item that an overflow
    /// drain already discarded.
    pub async fn pop(&self) -> Option<String> {
        let permit = self.ready.acquire().await.ok()?;
        permit.forget();
        self.items.lock().pop_front()
    }

    /// Number of payloads currently waiting.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn pops_in_fifo_order() {
        let queue = DeliveryQueue::new(10);
        queue.push("a".to_string());
        queue.push("b".to_string());

        assert_eq!(queue.pop().await.as_deref(), Some("a"));
        assert_eq!(queue.pop().await.as_deref(), Some("b"));
        assert!(queue.is_empty());
    }

    #[test]
    fn holds_one_more_than_the_bound_before_draining() {
        let queue = DeliveryQueue::new(3);
        for i in 0..4 {
            assert_eq!(queue.push(i.to_string()), EnqueueOutcome::Queued);
        }
        assert_eq!(queue.len(), 4);

        assert_eq!(
            queue.push("fresh".to_string()),
            EnqueueOutcome::Overflowed { discarded: 4 }
        );
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn overflow_keeps_only_the_newest_payload() {
        let queue = DeliveryQueue::new(3);
        for i in 0..5 {
            queue.push(i.to_string());
        }
        assert_eq!(queue.pop().await.as_deref(), Some("4"));
    }

    #[tokio::test]
    async fn stale_wakeups_after_a_drain_pop_nothing() {
        let queue = DeliveryQueue::new(1);
        queue.push("a".to_string());
        queue.push("b".to_string());
        // Third push drains two items but their permits remain.
        queue.push("c".to_string());

        assert_eq!(queue.pop().await.as_deref(), Some("c"));
        assert_eq!(queue.pop().await, None);
        assert_eq!(queue.pop().await, None);
    }

    #[tokio::test]
    async fn pop_waits_for_a_push() {
        let queue = std::sync::Arc::new(DeliveryQueue::new(4));
        let waiter = {
            let queue = std::sync::Arc::clone(&queue);
            tokio::spawn(async move { queue.pop().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        queue.push("late".to_string());
        let popped = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(popped.as_deref(), Some("late"));
    }
}
