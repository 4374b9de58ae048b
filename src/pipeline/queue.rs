//! Blocking handoff queue between pipeline stages
//!
//! A FIFO with a single producer and a single consumer. Consumers wait with a
//! bounded timeout so they can periodically recheck shutdown, and an explicit
//! closed state replaces sentinel values: after `close()` every push is
//! rejected and every pop reports `Closed`.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;

/// Reason a pop (or a pool borrow) returned without a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopError {
    /// Nothing arrived within the timeout. Not an error for the caller.
    Timeout,
    /// The queue was closed.
    Closed,
}

impl std::fmt::Display for PopError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PopError::Timeout => write!(f, "timed out"),
            PopError::Closed => write!(f, "closed"),
        }
    }
}

impl std::error::Error for PopError {}

/// Push on a closed queue. Hands the value back to the caller.
#[derive(Debug, PartialEq, Eq)]
pub struct PushError<T>(pub T);

impl<T> std::fmt::Display for PushError<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "push on closed queue")
    }
}

impl<T: std::fmt::Debug> std::error::Error for PushError<T> {}

struct QueueState<T> {
    items: VecDeque<T>,
    closed: bool,
}

pub struct HandoffQueue<T> {
    state: Mutex<QueueState<T>>,
    notify: Notify,
}

impl<T> Default for HandoffQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> HandoffQueue<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                closed: false,
            }),
            notify: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a value. Fails once the queue is closed.
    pub fn push(&self, value: T) -> Result<(), PushError<T>> {
        {
            let mut state = self.lock();
            if state.closed {
                return Err(PushError(value));
            }
            state.items.push_back(value);
        }
        self.notify.notify_one();
        Ok(())
    }

    /// Take the oldest value, waiting at most `timeout` for one to arrive.
    pub async fn pop(&self, timeout: Duration) -> Result<T, PopError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // register before checking so a close between check and wait is not lost
            notified.as_mut().enable();

            {
                let mut state = self.lock();
                if state.closed {
                    return Err(PopError::Closed);
                }
                if let Some(value) = state.items.pop_front() {
                    return Ok(value);
                }
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Err(PopError::Timeout);
            }
        }
    }

    /// Close the queue and wake every waiter. Idempotent.
    ///
    /// Values still queued are dropped; pooled frames return to their pool.
    pub fn close(&self) {
        let pending = {
            let mut state = self.lock();
            state.closed = true;
            std::mem::take(&mut state.items)
        };
        self.notify.notify_waiters();
        drop(pending);
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Resolves once the queue is closed.
    pub async fn closed(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_closed() {
                return;
            }
            notified.await;
        }
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_fifo_order() {
        let queue = HandoffQueue::new();
        for i in 0..5 {
            queue.push(i).unwrap();
        }
        for i in 0..5 {
            assert_eq!(queue.pop(Duration::from_millis(10)).await, Ok(i));
        }
        assert!(queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pop_times_out_when_empty() {
        let queue: HandoffQueue<u32> = HandoffQueue::new();
        assert_eq!(
            queue.pop(Duration::from_millis(50)).await,
            Err(PopError::Timeout)
        );
    }

    #[tokio::test]
    async fn test_pop_wakes_on_push() {
        let queue = Arc::new(HandoffQueue::new());
        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.pop(Duration::from_secs(5)).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.push(7u32).unwrap();
        assert_eq!(consumer.await.unwrap(), Ok(7));
    }

    #[tokio::test]
    async fn test_close_wakes_blocked_pop() {
        let queue: Arc<HandoffQueue<u32>> = Arc::new(HandoffQueue::new());
        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.pop(Duration::from_secs(60)).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.close();

        let result = tokio::time::timeout(Duration::from_secs(1), consumer)
            .await
            .expect("pop must wake on close")
            .unwrap();
        assert_eq!(result, Err(PopError::Closed));
    }

    #[tokio::test]
    async fn test_push_after_close_hands_value_back() {
        let queue = HandoffQueue::new();
        queue.close();
        queue.close();
        assert_eq!(queue.push("frame"), Err(PushError("frame")));
        assert_eq!(
            queue.pop(Duration::from_millis(10)).await,
            Err(PopError::Closed)
        );
    }

    #[tokio::test]
    async fn test_closed_resolves_after_close() {
        let queue: Arc<HandoffQueue<u8>> = Arc::new(HandoffQueue::new());
        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.closed().await })
        };
        queue.close();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("closed() must resolve")
            .unwrap();
    }
}
