//! Fixed capacity pool of reusable frames.
//!
//! # Ownership
//! - `borrow()` moves a frame out of the free set into a [`Pooled`] handle
//! - dropping the handle moves the frame back; it cannot be returned twice
//!   or touched afterwards because the handle is gone
//! - `free + in_flight == capacity` holds at every instant
//!
//! An empty pool makes the borrowing stage wait, which is how a slow consumer
//! throttles the network read instead of letting memory grow.

use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;

use super::queue::PopError;

struct PoolState<T> {
    free: Vec<T>,
    /// Handles currently alive, counted apart from `free`
    in_flight: usize,
    closed: bool,
}

struct PoolShared<T> {
    state: Mutex<PoolState<T>>,
    available: Notify,
    capacity: usize,
}

impl<T> PoolShared<T> {
    fn lock(&self) -> MutexGuard<'_, PoolState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn give_back(&self, item: T) {
        {
            let mut state = self.lock();
            state.in_flight -= 1;
            state.free.push(item);
        }
        self.available.notify_one();
    }
}

pub struct FramePool<T> {
    shared: Arc<PoolShared<T>>,
}

impl<T> Clone for FramePool<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> FramePool<T> {
    /// Pre-allocate `capacity` frames, all free.
    pub fn new<F>(capacity: usize, mut init_fn: F) -> Self
    where
        F: FnMut() -> T,
    {
        let free = (0..capacity).map(|_| init_fn()).collect();
        Self {
            shared: Arc::new(PoolShared {
                state: Mutex::new(PoolState {
                    free,
                    in_flight: 0,
                    closed: false,
                }),
                available: Notify::new(),
                capacity,
            }),
        }
    }

    /// Take a free frame, waiting at most `timeout` for one to be returned.
    pub async fn borrow(&self, timeout: Duration) -> Result<Pooled<T>, PopError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.shared.available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.shared.lock();
                if state.closed {
                    return Err(PopError::Closed);
                }
                if let Some(item) = state.free.pop() {
                    state.in_flight += 1;
                    return Ok(Pooled {
                        item: Some(item),
                        pool: Arc::clone(&self.shared),
                    });
                }
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Err(PopError::Timeout);
            }
        }
    }

    /// Refuse further borrows and wake pending borrowers immediately.
    ///
    /// Frames still in flight keep flowing back into the free set when their
    /// handles drop, so the accounting stays whole after close.
    pub fn close(&self) {
        self.shared.lock().closed = true;
        self.shared.available.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    pub fn free_count(&self) -> usize {
        self.shared.lock().free.len()
    }

    pub fn in_flight(&self) -> usize {
        self.shared.lock().in_flight
    }
}

/// A borrowed frame. Goes back to its pool when dropped.
pub struct Pooled<T> {
    item: Option<T>,
    pool: Arc<PoolShared<T>>,
}

impl<T> Deref for Pooled<T> {
    type Target = T;

    fn deref(&self) -> &T {
        // only None inside drop
        self.item.as_ref().unwrap_or_else(|| unreachable!())
    }
}

impl<T> DerefMut for Pooled<T> {
    fn deref_mut(&mut self) -> &mut T {
        self.item.as_mut().unwrap_or_else(|| unreachable!())
    }
}

impl<T> Drop for Pooled<T> {
    fn drop(&mut self) {
        if let Some(item) = self.item.take() {
            self.pool.give_back(item);
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Pooled<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Pooled").field(&**self).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_accounting<T>(pool: &FramePool<T>) {
        assert_eq!(pool.free_count() + pool.in_flight(), pool.capacity());
    }

    #[tokio::test]
    async fn test_borrow_and_return_keeps_accounting() {
        let pool = FramePool::new(3, Vec::<u8>::new);
        assert_eq!(pool.free_count(), 3);

        let a = pool.borrow(Duration::from_millis(10)).await.unwrap();
        let b = pool.borrow(Duration::from_millis(10)).await.unwrap();
        assert_eq!(pool.in_flight(), 2);
        assert_accounting(&pool);

        drop(a);
        assert_eq!(pool.in_flight(), 1);
        drop(b);
        assert_eq!(pool.free_count(), 3);
        assert_accounting(&pool);
    }

    #[tokio::test]
    async fn test_concurrent_borrowers_keep_accounting() {
        let pool = FramePool::new(4, || 0u64);
        let workers: Vec<_> = (0..8)
            .map(|n| {
                let pool = pool.clone();
                tokio::spawn(async move {
                    for _ in 0..50 {
                        let mut frame = pool.borrow(Duration::from_secs(5)).await.unwrap();
                        *frame += n;
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();

        let mut observed = 0;
        while observed < 50 {
            let in_flight = pool.in_flight();
            assert!(in_flight <= pool.capacity());
            assert_accounting(&pool);
            observed += 1;
            tokio::task::yield_now().await;
        }
        for worker in workers {
            worker.await.unwrap();
        }

        assert_eq!(pool.in_flight(), 0);
        assert_eq!(pool.free_count(), 4);
    }

    #[tokio::test]
    async fn test_forgotten_handle_stays_in_flight() {
        let pool = FramePool::new(2, || 0u32);
        let frame = pool.borrow(Duration::from_millis(10)).await.unwrap();
        std::mem::forget(frame);

        assert_eq!(pool.in_flight(), 1);
        assert_eq!(pool.free_count(), 1);
        assert_accounting(&pool);
    }

    #[tokio::test]
    async fn test_returned_frame_keeps_its_contents() {
        let pool = FramePool::new(1, Vec::<u8>::new);
        {
            let mut frame = pool.borrow(Duration::from_millis(10)).await.unwrap();
            frame.extend_from_slice(&[1, 2, 3]);
        }
        let frame = pool.borrow(Duration::from_millis(10)).await.unwrap();
        assert!(frame.capacity() >= 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_pool_times_out() {
        let pool = FramePool::new(1, || 0u32);
        let _held = pool.borrow(Duration::from_millis(10)).await.unwrap();
        let err = pool.borrow(Duration::from_millis(100)).await.unwrap_err();
        assert_eq!(err, PopError::Timeout);
        assert_accounting(&pool);
    }

    #[tokio::test]
    async fn test_borrow_waits_for_return() {
        let pool = FramePool::new(1, || 0u32);
        let held = pool.borrow(Duration::from_millis(10)).await.unwrap();

        let waiter = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.borrow(Duration::from_secs(5)).await.is_ok() })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(held);

        assert!(waiter.await.unwrap());
    }

    #[tokio::test]
    async fn test_close_wakes_borrower_and_keeps_accounting() {
        let pool = FramePool::new(1, || 0u32);
        let held = pool.borrow(Duration::from_millis(10)).await.unwrap();

        let waiter = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.borrow(Duration::from_secs(60)).await.map(|_| ()) })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        pool.close();

        let result = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("borrow must wake on close")
            .unwrap();
        assert_eq!(result, Err(PopError::Closed));

        drop(held);
        assert_eq!(pool.free_count(), 1);
        assert_accounting(&pool);
    }
}
