//! Monotonic clock source.
//!
//! Exposes `now()`, a `deadline()` comparator, and `sleep_until()` usable by
//! the scheduler's idle loop and the cluster's heartbeat/election timers.
//! Every observer in the process sees a strictly non-decreasing tick count.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;

/// A monotonic tick, 1ms resolution by convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct Tick(pub u64);

impl Tick {
    pub const ZERO: Tick = Tick(0);

    pub fn saturating_add(self, ticks: u64) -> Tick {
        Tick(self.0.saturating_add(ticks))
    }

    pub fn saturating_sub(self, other: Tick) -> u64 {
        self.0.saturating_sub(other.0)
    }

    pub fn has_passed(self, deadline: Tick) -> bool {
        self.0 >= deadline.0
    }
}

impl std::ops::Add<Duration> for Tick {
    type Output = Tick;
    fn add(self, rhs: Duration) -> Tick {
        Tick(self.0.saturating_add(rhs.as_millis() as u64))
    }
}

/// Collaborator interface consumed by the scheduler and cluster subsystems.
#[async_trait]
pub trait Clock: Send + Sync + 'static {
    /// Current tick. Strictly non-decreasing across all observers.
    fn now(&self) -> Tick;

    /// Compute a deadline `d` ticks from now.
    fn deadline(&self, from_now: Duration) -> Tick {
        self.now() + from_now
    }

    /// Suspend the caller until `deadline` is reached (or already past).
    async fn sleep_until(&self, deadline: Tick);
}

/// Production clock backed by a monotonic [`Instant`] epoch.
pub struct SystemClock {
    epoch: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self { epoch: Instant::now() }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> Tick {
        Tick(self.epoch.elapsed().as_millis() as u64)
    }

    async fn sleep_until(&self, deadline: Tick) {
        let now = self.now();
        if now.has_passed(deadline) {
            return;
        }
        let remaining = Duration::from_millis(deadline.saturating_sub(now));
        tokio::time::sleep(remaining).await;
    }
}

/// Manually-advanced clock for deterministic scheduler/cluster tests.
///
/// `sleep_until` returns as soon as the tick is advanced past the deadline,
/// signalled via a [`tokio::sync::Notify`] so async callers don't busy-poll.
pub struct TestClock {
    tick: AtomicU64,
    notify: tokio::sync::Notify,
}

impl TestClock {
    pub fn new() -> Self {
        Self { tick: AtomicU64::new(0), notify: tokio::sync::Notify::new() }
    }

    pub fn advance(&self, ticks: u64) {
        self.tick.fetch_add(ticks, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn set(&self, tick: Tick) {
        self.tick.store(tick.0, Ordering::SeqCst);
        self.notify.notify_waiters();
    }
}

impl Default for TestClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for TestClock {
    fn now(&self) -> Tick {
        Tick(self.tick.load(Ordering::SeqCst))
    }

    async fn sleep_until(&self, deadline: Tick) {
        loop {
            if self.now().has_passed(deadline) {
                return;
            }
            let notified = self.notify.notified();
            if self.now().has_passed(deadline) {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_is_strictly_non_decreasing_on_system_clock() {
        let clock = SystemClock::new();
        let a = clock.now();
        std::thread::sleep(Duration::from_millis(2));
        let b = clock.now();
        assert!(b >= a);
    }

    #[test]
    fn deadline_adds_duration_in_ticks() {
        let clock = TestClock::new();
        let d = clock.deadline(Duration::from_millis(50));
        assert_eq!(d, Tick(50));
    }

    #[tokio::test]
    async fn sleep_until_resolves_once_tick_advances() {
        let clock = std::sync::Arc::new(TestClock::new());
        let deadline = Tick(10);
        let waiter = {
            let clock = clock.clone();
            tokio::spawn(async move {
                clock.sleep_until(deadline).await;
            })
        };
        tokio::task::yield_now().await;
        clock.advance(10);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("sleep_until should resolve promptly")
            .unwrap();
    }

    #[test]
    fn has_passed_is_inclusive_of_the_deadline() {
        assert!(Tick(10).has_passed(Tick(10)));
        assert!(!Tick(9).has_passed(Tick(10)));
    }
}
