//! Priority-ordered inter-partition request queue (C6).
//!
//! Directly grounded on the teacher's `BinaryHeap`-based
//! `Scheduler`/`SchedulableTask` (earliest-deadline-first, custom
//! `Ord`), re-keyed to `(priority, timestamp)` ascending with a
//! monotonic sequence counter breaking ties FIFO — the same role the
//! teacher's `id` field plays. Async hand-off between the producing
//! and consuming tasks uses `tokio::sync::{Mutex, Notify}`, matching
//! the teacher's existing `tokio` dependency.

use gateway_core::Request;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};

/// A request plus the sequence number it was admitted with, giving the
/// priority queue a total, FIFO-stable order.
#[derive(Debug, Clone)]
struct QueuedRequest {
    request: Request,
    sequence: u64,
}

impl PartialEq for QueuedRequest {
    fn eq(&self, other: &Self) -> bool {
        self.sequence == other.sequence
    }
}

impl Eq for QueuedRequest {}

impl PartialOrd for QueuedRequest {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedRequest {
    /// `BinaryHeap` is a max-heap; reversing the comparison here makes
    /// `pop()` return the *smallest* `(priority, timestamp, sequence)`
    /// tuple first — ascending priority order, ties broken by
    /// timestamp, then admission order.
    fn cmp(&self, other: &Self) -> Ordering {
        let self_key = (self.request.priority, self.request.timestamp, self.sequence);
        let other_key = (other.request.priority, other.request.timestamp, other.sequence);
        other_key.cmp(&self_key)
    }
}

/// The named priority message queue between the interface partition
/// and the VoR partition (`/interface_partition_mq` in the original).
/// Within one partition, requests are admitted and drained in the
/// order this queue's `Ord` establishes.
#[derive(Default)]
pub struct RequestQueue {
    heap: Mutex<BinaryHeap<QueuedRequest>>,
    notify: Notify,
    next_sequence: AtomicU64,
}

impl RequestQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a request, notifying exactly one waiting consumer.
    pub async fn push(&self, request: Request) {
        let sequence = self.next_sequence.fetch_add(1, AtomicOrdering::SeqCst);
        self.heap.lock().await.push(QueuedRequest { request, sequence });
        self.notify.notify_one();
    }

    /// Pop the lowest `(priority, timestamp)` request without waiting.
    pub async fn try_pop(&self) -> Option<Request> {
        self.heap.lock().await.pop().map(|q| q.request)
    }

    pub async fn len(&self) -> usize {
        self.heap.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.heap.lock().await.is_empty()
    }

    /// Wait for at least one admission since the last notification.
    pub async fn notified(&self) {
        self.notify.notified().await;
    }
}

/// Drive the single consumer side of a [`RequestQueue`]: wait for a
/// notification, then drain everything currently queued, calling
/// `process` once per request before moving to the next one — "a
/// message is fully processed before the next is received". The
/// `running` flag is checked before each re-arm so a notification
/// arriving during shutdown does not restart the wait.
pub async fn run_consumer<F, Fut>(queue: Arc<RequestQueue>, running: Arc<AtomicBool>, mut process: F)
where
    F: FnMut(Request) -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    while running.load(AtomicOrdering::SeqCst) {
        queue.notified().await;
        if !running.load(AtomicOrdering::SeqCst) {
            break;
        }
        while let Some(request) = queue.try_pop().await {
            process(request).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn request(priority: u8, offset_secs: i64) -> Request {
        Request::new(
            "john",
            Utc::now() + Duration::seconds(offset_secs),
            vec!["bump".to_string()],
            "impact",
            "MotorSpeed_SP",
            "900",
            priority,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn pull_ordering_matches_priority_then_timestamp() {
        let queue = RequestQueue::new();
        queue.push(request(10, 0)).await;
        queue.push(request(3, 1)).await;
        queue.push(request(7, 2)).await;
        queue.push(request(3, 3)).await;

        let priorities: Vec<u8> = [
            queue.try_pop().await.unwrap().priority,
            queue.try_pop().await.unwrap().priority,
            queue.try_pop().await.unwrap().priority,
            queue.try_pop().await.unwrap().priority,
        ]
        .to_vec();

        assert_eq!(priorities, vec![3, 3, 7, 10]);
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn ties_on_priority_and_timestamp_break_fifo() {
        let queue = RequestQueue::new();
        let now = Utc::now();
        let a = Request::new("a", now, vec!["d".to_string()], "i", "p", "1", 5).unwrap();
        let b = Request::new("b", now, vec!["d".to_string()], "i", "p", "1", 5).unwrap();
        queue.push(a.clone()).await;
        queue.push(b.clone()).await;

        assert_eq!(queue.try_pop().await.unwrap().issuer_id, a.issuer_id);
        assert_eq!(queue.try_pop().await.unwrap().issuer_id, b.issuer_id);
    }
}
