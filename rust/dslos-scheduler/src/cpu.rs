//! Per-CPU scheduling state (§3 "CPU").

use std::collections::VecDeque;

use crate::runnable::{RunnableId, PRIORITY_LEVELS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CpuId(pub u32);

/// Maximum queued runnables per priority level per CPU before
/// `CapacityExceeded` (§4.C "Failures").
pub const DEFAULT_MAX_QUEUE_DEPTH: usize = 4096;

pub struct Cpu {
    pub id: CpuId,
    pub online: bool,
    pub running: Option<RunnableId>,
    /// Remaining ticks in the current runnable's quantum.
    pub quantum_remaining: u64,
    /// One FIFO ready queue per priority level (§4.C "Per-CPU queues").
    pub ready_queues: [VecDeque<RunnableId>; PRIORITY_LEVELS],
    /// EMA of recent utilization, 0..100.
    pub load: f64,
    pub temperature: f64,
    pub quiescent: bool,
    pub max_queue_depth: usize,
}

impl Cpu {
    pub fn new(id: CpuId) -> Self {
        Self {
            id,
            online: true,
            running: None,
            quantum_remaining: 0,
            ready_queues: std::array::from_fn(|_| VecDeque::new()),
            load: 0.0,
            temperature: 0.0,
            quiescent: false,
            max_queue_depth: DEFAULT_MAX_QUEUE_DEPTH,
        }
    }

    pub fn ready_len(&self) -> usize {
        self.ready_queues.iter().map(|q| q.len()).sum()
    }

    pub fn highest_nonempty_priority(&self) -> Option<u8> {
        self.ready_queues
            .iter()
            .enumerate()
            .rev()
            .find(|(_, q)| !q.is_empty())
            .map(|(p, _)| p as u8)
    }

    pub fn highest_nonempty_non_rt_priority(&self) -> Option<u8> {
        self.ready_queues
            .iter()
            .enumerate()
            .take(crate::runnable::REALTIME_PRIORITY_FLOOR as usize)
            .rev()
            .find(|(_, q)| !q.is_empty())
            .map(|(p, _)| p as u8)
    }

    /// Update the load EMA given an instantaneous busy/idle sample.
    pub fn update_load(&mut self, busy: bool, alpha: f64) {
        let sample = if busy { 100.0 } else { 0.0 };
        self.load = alpha * sample + (1.0 - alpha) * self.load;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_cpu_has_no_ready_runnables() {
        let cpu = Cpu::new(CpuId(0));
        assert_eq!(cpu.ready_len(), 0);
        assert!(cpu.highest_nonempty_priority().is_none());
    }

    #[test]
    fn load_ema_converges_toward_busy_signal() {
        let mut cpu = Cpu::new(CpuId(0));
        for _ in 0..50 {
            cpu.update_load(true, 0.3);
        }
        assert!(cpu.load > 90.0);
    }

    #[test]
    fn highest_nonempty_non_rt_priority_ignores_rt_queues() {
        use crate::runnable::RunnableId;

        let mut cpu = Cpu::new(CpuId(0));
        cpu.ready_queues[30].push_back(RunnableId(1));
        cpu.ready_queues[10].push_back(RunnableId(2));
        cpu.ready_queues[5].push_back(RunnableId(3));

        assert_eq!(cpu.highest_nonempty_priority(), Some(30));
        assert_eq!(cpu.highest_nonempty_non_rt_priority(), Some(10));
    }

    #[test]
    fn highest_nonempty_non_rt_priority_is_none_when_only_rt_queued() {
        use crate::runnable::RunnableId;

        let mut cpu = Cpu::new(CpuId(0));
        cpu.ready_queues[28].push_back(RunnableId(1));

        assert!(cpu.highest_nonempty_non_rt_priority().is_none());
    }
}
