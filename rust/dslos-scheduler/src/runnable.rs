//! The Runnable abstraction (§4.B): the smallest unit scheduled by the
//! advanced scheduler. Conceptually a thread.

use dslos_clock::Tick;
use serde::{Deserialize, Serialize};

pub const PRIORITY_LEVELS: usize = 32;
pub const MAX_PRIORITY: u8 = (PRIORITY_LEVELS - 1) as u8;
pub const REALTIME_PRIORITY_FLOOR: u8 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RunnableId(pub u64);

/// An opaque handle a runnable can wait on; `signal`/`terminate` address it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WaitObject(pub u64);

/// Bitmask over CPU ids. Never empty for a live runnable (§4.B invariant).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffinityMask(pub u64);

impl AffinityMask {
    pub const NONE: AffinityMask = AffinityMask(0);

    pub fn all(cpu_count: u32) -> Self {
        if cpu_count >= 64 {
            AffinityMask(u64::MAX)
        } else {
            AffinityMask((1u64 << cpu_count) - 1)
        }
    }

    pub fn single(cpu: u32) -> Self {
        AffinityMask(1u64 << cpu)
    }

    pub fn contains(&self, cpu: u32) -> bool {
        cpu < 64 && (self.0 & (1u64 << cpu)) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn intersects_online(&self, online_mask: u64) -> bool {
        (self.0 & online_mask) != 0
    }
}

/// Why a runnable is Waiting, and what it's waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitInfo {
    pub object: WaitObject,
    pub deadline: Option<Tick>,
}

/// Outcome of a `wait(obj, timeout)` call (§4.B).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WaitOutcome {
    Signaled,
    TimedOut,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunnableState {
    Created,
    Ready,
    Running,
    Waiting(WaitInfo),
    Suspended,
    Terminated,
}

impl RunnableState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunnableState::Terminated)
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, RunnableState::Ready)
    }
}

/// A schedulable unit. Created with [`crate::Scheduler::create_runnable`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Runnable {
    pub id: RunnableId,
    pub state: RunnableState,
    pub base_priority: u8,
    pub effective_priority: u8,
    pub affinity: AffinityMask,
    pub last_cpu: Option<u32>,
    pub cpu_time_ms: u64,
    pub owner_pid: u64,
    /// Group this runnable's CPU time is accounted against (FairShare).
    pub group: u32,
    /// Tick at which the runnable was last enqueued Ready; used for
    /// starvation detection and average-wait-time statistics.
    pub ready_since: Option<Tick>,
    /// Tick at which it entered Waiting, when applicable.
    pub waiting_since: Option<Tick>,
    /// Additive boost from Adaptive starvation promotion, capped at +8.
    pub boost: u8,
    /// Next tick at which an accumulated boost may decay by one, while
    /// Running (§4.C Adaptive).
    pub boost_decay_after: Option<Tick>,
    /// Priority inheritance ceiling from a higher-priority waiter, if this
    /// runnable is a registered lock holder.
    pub inherited_priority_ceiling: Option<u8>,
}

impl Runnable {
    pub fn new(id: RunnableId, base_priority: u8, affinity: AffinityMask, owner_pid: u64, group: u32) -> Self {
        Self {
            id,
            state: RunnableState::Created,
            base_priority,
            effective_priority: base_priority,
            affinity,
            last_cpu: None,
            cpu_time_ms: 0,
            owner_pid,
            group,
            ready_since: None,
            waiting_since: None,
            boost: 0,
            boost_decay_after: None,
            inherited_priority_ceiling: None,
        }
    }

    pub fn is_realtime(&self) -> bool {
        self.effective_priority >= REALTIME_PRIORITY_FLOOR
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn affinity_all_masks_exactly_cpu_count_bits() {
        let mask = AffinityMask::all(4);
        assert!(mask.contains(0));
        assert!(mask.contains(3));
        assert!(!mask.contains(4));
    }

    #[test]
    fn affinity_single_contains_only_that_cpu() {
        let mask = AffinityMask::single(2);
        assert!(mask.contains(2));
        assert!(!mask.contains(1));
        assert!(!mask.contains(3));
    }

    #[test]
    fn realtime_floor_is_24() {
        let mut r = Runnable::new(RunnableId(1), 24, AffinityMask::all(1), 0, 0);
        assert!(r.is_realtime());
        r.effective_priority = 23;
        assert!(!r.is_realtime());
    }
}
