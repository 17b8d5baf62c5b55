use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::trace;

/// Bounds the number of file operations in flight.
///
/// Admission is optimistic: a caller that finds the pool full sleeps for the
/// configured backoff and tries again. There is no wait queue, so admission
/// order is not FIFO and a caller can in principle be overtaken indefinitely
/// under sustained load. Nothing is ever dropped; callers only wait longer.
#[derive(Debug)]
pub struct HandleThrottle {
    limit: usize,
    backoff: Duration,
    in_flight: AtomicUsize,
}

impl HandleThrottle {
    pub fn new(limit: usize, backoff: Duration) -> Arc<Self> {
        Arc::new(Self {
            limit: limit.max(1),
            backoff,
            in_flight: AtomicUsize::new(0),
        })
    }

    /// Wait for a free slot.
    pub async fn acquire(self: &Arc<Self>) -> HandleSlot {
        loop {
            if let Some(slot) = self.try_acquire() {
                return slot;
            }
            trace!(
                limit = self.limit,
                backoff_ms = self.backoff.as_millis() as u64,
                "file limit reached; backing off"
            );
            tokio::time::sleep(self.backoff).await;
        }
    }

    /// Take a slot if one is free right now.
    pub fn try_acquire(self: &Arc<Self>) -> Option<HandleSlot> {
        self.in_flight
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.limit).then_some(n + 1)
            })
            .ok()
            .map(|_| HandleSlot {
                throttle: Arc::clone(self),
            })
    }

    /// Number of slots currently held.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

/// An admitted file operation. Dropping it releases the slot exactly once.
#[derive(Debug)]
#[must_use = "the slot is released as soon as it is dropped"]
pub struct HandleSlot {
    throttle: Arc<HandleThrottle>,
}

impl Drop for HandleSlot {
    fn drop(&mut self) {
        self.throttle.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_up_to_limit() {
        let throttle = HandleThrottle::new(2, Duration::from_millis(1));
        let a = throttle.try_acquire();
        let b = throttle.try_acquire();
        assert!(a.is_some() && b.is_some());
        assert!(throttle.try_acquire().is_none());
        assert_eq!(throttle.in_flight(), 2);
    }

    #[test]
    fn dropping_slot_releases_it() {
        let throttle = HandleThrottle::new(1, Duration::from_millis(1));
        let slot = throttle.try_acquire().unwrap();
        assert!(throttle.try_acquire().is_none());
        drop(slot);
        assert_eq!(throttle.in_flight(), 0);
        assert!(throttle.try_acquire().is_some());
    }

    #[test]
    fn zero_limit_is_clamped_to_one() {
        let throttle = HandleThrottle::new(0, Duration::from_millis(1));
        assert_eq!(throttle.limit(), 1);
        assert!(throttle.try_acquire().is_some());
    }

    #[tokio::test]
    async fn acquire_waits_for_release() {
        let throttle = HandleThrottle::new(1, Duration::from_millis(2));
        let held = throttle.acquire().await;

        let waiter = {
            let throttle = Arc::clone(&throttle);
            tokio::spawn(async move {
                let _slot = throttle.acquire().await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(held);
        waiter.await.unwrap();
        assert_eq!(throttle.in_flight(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn in_flight_never_exceeds_limit() {
        let throttle = HandleThrottle::new(3, Duration::from_millis(1));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..32 {
            let throttle = Arc::clone(&throttle);
            let peak = Arc::clone(&peak);
            tasks.push(tokio::spawn(async move {
                let _slot = throttle.acquire().await;
                peak.fetch_max(throttle.in_flight(), Ordering::AcqRel);
                tokio::time::sleep(Duration::from_millis(2)).await;
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert!(peak.load(Ordering::Acquire) <= 3);
        assert_eq!(throttle.in_flight(), 0);
    }
}
