//! In-memory FIFO of pending deliveries.
//!
//! Request handlers push, the single delivery worker pops. Every popped item
//! must be marked with [`DeliveryQueue::task_done`] so that [`DeliveryQueue::join`]
//! can tell when all accepted work has been processed.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Notify;
use tokio::time::{timeout_at, Instant};

use super::types::DeliveryRequest;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("delivery queue is closed for shutdown")]
    Closed,
}

/// Cloneable handle to the shared delivery queue.
#[derive(Clone, Default)]
pub struct DeliveryQueue {
    inner: Arc<QueueInner>,
}

#[derive(Default)]
struct QueueInner {
    state: Mutex<QueueState>,
    /// Wakes the consumer when an item arrives or the queue closes.
    available: Notify,
    /// Wakes `join`/`drained` waiters on pop, completion and close.
    changed: Notify,
}

#[derive(Default)]
struct QueueState {
    items: VecDeque<DeliveryRequest>,
    /// Pushed but not yet marked done.
    unfinished: usize,
    closed: bool,
}

impl DeliveryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, QueueState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a request. Never blocks; fails only once the queue is closed.
    ///
    /// Returns the queue length after the push.
    pub fn push(&self, request: DeliveryRequest) -> Result<usize, QueueError> {
        let len = {
            let mut state = self.state();
            if state.closed {
                return Err(QueueError::Closed);
            }
            state.items.push_back(request);
            state.unfinished += 1;
            state.items.len()
        };

        self.inner.available.notify_one();
        Ok(len)
    }

    /// Pop the oldest request, waiting at most `wait` for one to arrive.
    ///
    /// Returns `None` on timeout, or immediately when the queue is closed and empty.
    pub async fn pop_timeout(&self, wait: Duration) -> Option<DeliveryRequest> {
        let deadline = Instant::now() + wait;

        loop {
            let notified = self.inner.available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.state();
                if let Some(request) = state.items.pop_front() {
                    drop(state);
                    self.inner.changed.notify_waiters();
                    return Some(request);
                }
                if state.closed {
                    return None;
                }
            }

            if timeout_at(deadline, notified).await.is_err() {
                return None;
            }
        }
    }

    /// Mark one popped request as processed, whatever its outcome.
    pub fn task_done(&self) {
        {
            let mut state = self.state();
            state.unfinished = state.unfinished.saturating_sub(1);
        }
        self.inner.changed.notify_waiters();
    }

    /// Number of requests waiting to be popped.
    pub fn len(&self) -> usize {
        self.state().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of requests pushed but not yet marked done.
    pub fn unfinished(&self) -> usize {
        self.state().unfinished
    }

    /// Stop accepting new requests. Queued requests remain poppable.
    pub fn close(&self) {
        self.state().closed = true;
        self.inner.available.notify_one();
        self.inner.changed.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.state().closed
    }

    /// Wait until every pushed request has been marked done.
    pub async fn join(&self) {
        self.wait_until(|state| state.unfinished == 0).await
    }

    /// Wait until the queue is closed and nothing is left to pop.
    pub async fn drained(&self) {
        self.wait_until(|state| state.closed && state.items.is_empty())
            .await
    }

    async fn wait_until(&self, ready: impl Fn(&QueueState) -> bool) {
        loop {
            let notified = self.inner.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if ready(&self.state()) {
                return;
            }

            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(n: usize) -> DeliveryRequest {
        DeliveryRequest::new(format!("entry {}", n), None)
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let queue = DeliveryQueue::new();
        for n in 0..3 {
            queue.push(request(n)).unwrap();
        }
        assert_eq!(queue.len(), 3);

        for n in 0..3 {
            let popped = queue.pop_timeout(Duration::from_millis(10)).await.unwrap();
            assert_eq!(popped.message, format!("entry {}", n));
        }
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_pop_times_out_when_empty() {
        let queue = DeliveryQueue::new();
        let started = Instant::now();
        assert!(queue.pop_timeout(Duration::from_millis(50)).await.is_none());
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_pop_wakes_on_push() {
        let queue = DeliveryQueue::new();
        let producer = queue.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            producer.push(request(1)).unwrap();
        });

        let popped = queue.pop_timeout(Duration::from_secs(5)).await;
        assert_eq!(popped, Some(request(1)));
    }

    #[tokio::test]
    async fn test_push_after_close_fails() {
        let queue = DeliveryQueue::new();
        queue.push(request(1)).unwrap();
        queue.close();

        assert_eq!(queue.push(request(2)), Err(QueueError::Closed));
        assert!(queue.is_closed());
        // Already-queued work is still delivered
        assert_eq!(queue.pop_timeout(Duration::from_millis(10)).await, Some(request(1)));
        assert!(queue.pop_timeout(Duration::from_secs(5)).await.is_none());
    }

    #[tokio::test]
    async fn test_join_waits_for_task_done() {
        let queue = DeliveryQueue::new();
        queue.push(request(1)).unwrap();
        queue.push(request(2)).unwrap();
        assert_eq!(queue.unfinished(), 2);

        queue.pop_timeout(Duration::from_millis(10)).await.unwrap();
        queue.task_done();
        queue.pop_timeout(Duration::from_millis(10)).await.unwrap();

        let pending = tokio::time::timeout(Duration::from_millis(50), queue.join()).await;
        assert!(pending.is_err(), "join must wait for the second task_done");

        queue.task_done();
        tokio::time::timeout(Duration::from_secs(1), queue.join())
            .await
            .expect("join should complete");
        assert_eq!(queue.unfinished(), 0);
    }

    #[tokio::test]
    async fn test_drained_requires_close_and_empty() {
        let queue = DeliveryQueue::new();
        queue.push(request(1)).unwrap();

        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.drained().await })
        };

        queue.close();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        queue.pop_timeout(Duration::from_millis(10)).await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("drained should resolve")
            .unwrap();
    }
}
