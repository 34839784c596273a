//! Scheduler-wide statistics (§4.C "Statistics"). Atomic, so readers may
//! observe a slightly inconsistent snapshot (§5).

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub struct SchedulerStats {
    total_schedules: AtomicU64,
    context_switches: AtomicU64,
    starvation_events: AtomicU64,
    load_balance_ops: AtomicU64,
    wait_ticks_accumulated: AtomicU64,
    wait_samples: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StatsSnapshot {
    pub total_schedules: u64,
    pub context_switches: u64,
    pub starvation_events: u64,
    pub load_balance_ops: u64,
    pub average_wait_ticks: f64,
}

impl SchedulerStats {
    pub fn record_schedule(&self) {
        self.total_schedules.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_context_switch(&self) {
        self.context_switches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_starvation(&self) {
        self.starvation_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_load_balance_op(&self) {
        self.load_balance_ops.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_wait(&self, ticks_waited: u64) {
        self.wait_ticks_accumulated.fetch_add(ticks_waited, Ordering::Relaxed);
        self.wait_samples.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let samples = self.wait_samples.load(Ordering::Relaxed);
        let accumulated = self.wait_ticks_accumulated.load(Ordering::Relaxed);
        StatsSnapshot {
            total_schedules: self.total_schedules.load(Ordering::Relaxed),
            context_switches: self.context_switches.load(Ordering::Relaxed),
            starvation_events: self.starvation_events.load(Ordering::Relaxed),
            load_balance_ops: self.load_balance_ops.load(Ordering::Relaxed),
            average_wait_ticks: if samples == 0 { 0.0 } else { accumulated as f64 / samples as f64 },
        }
    }
}
