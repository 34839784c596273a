//! Advanced Scheduler (§4.C): places runnables onto CPUs under a
//! configurable, pluggable algorithm and rebalances load across CPUs.
//!
//! This crate is the model of the scheduling *decision* logic: it owns the
//! ready queues, runnable registry, and statistics, and advances purely on
//! calls to [`Scheduler::tick`] — the platform layer (out of scope, §9) is
//! responsible for actually driving a CPU's instruction pointer via
//! `switch(from, to)` once `tick` has picked a runnable.

pub mod algorithm;
pub mod cpu;
pub mod error;
pub mod group;
pub mod runnable;
pub mod stats;

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use dslos_clock::{Clock, Tick};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace, warn};

pub use algorithm::Algorithm;
pub use cpu::{Cpu, CpuId};
pub use error::{Result, SchedulerError};
pub use group::{Group, GroupId, ROOT_GROUP};
pub use runnable::{AffinityMask, Runnable, RunnableId, RunnableState, WaitInfo, WaitObject, WaitOutcome};

#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    /// T0: base time quantum, in ticks.
    pub base_quantum_ticks: u64,
    /// H_lb: load-balancing cadence, in ticks.
    pub load_balance_interval_ticks: u64,
    /// theta: load imbalance threshold that triggers a migration.
    pub load_balance_threshold: f64,
    /// S: starvation threshold for Adaptive, in ticks. Defaults to 10*T0.
    pub starvation_threshold_ticks: u64,
    pub load_ema_alpha: f64,
}

impl SchedulerConfig {
    pub fn with_base_quantum(base_quantum_ticks: u64) -> Self {
        Self {
            base_quantum_ticks,
            load_balance_interval_ticks: 100,
            load_balance_threshold: 25.0,
            starvation_threshold_ticks: base_quantum_ticks * 10,
            load_ema_alpha: 0.3,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::with_base_quantum(10)
    }
}

struct Waiter {
    notify: tokio::sync::oneshot::Sender<WaitOutcome>,
}

/// Placement of a ready runnable, kept so `terminate`/migration can locate it
/// in O(1) instead of scanning every CPU's queues.
#[derive(Clone, Copy)]
struct QueueSlot {
    cpu: CpuId,
    priority: u8,
}

pub struct Scheduler {
    cpus: Vec<Mutex<Cpu>>,
    runnables: DashMap<RunnableId, Runnable>,
    queue_slots: DashMap<RunnableId, QueueSlot>,
    groups: DashMap<GroupId, Group>,
    algorithm: RwLock<Algorithm>,
    stats: stats::SchedulerStats,
    config: SchedulerConfig,
    clock: Arc<dyn Clock>,
    next_id: AtomicU64,
    waiters: DashMap<RunnableId, Waiter>,
    wait_objects: DashMap<WaitObject, HashSet<RunnableId>>,
    lock_holders: DashMap<WaitObject, RunnableId>,
    lb_tick_counter: AtomicU64,
}

impl Scheduler {
    pub fn new(cpu_count: u32, algorithm: Algorithm, config: SchedulerConfig, clock: Arc<dyn Clock>) -> Self {
        let cpus = (0..cpu_count).map(|i| Mutex::new(Cpu::new(CpuId(i)))).collect();
        let groups = DashMap::new();
        groups.insert(ROOT_GROUP, Group::root());
        Self {
            cpus,
            runnables: DashMap::new(),
            queue_slots: DashMap::new(),
            groups,
            algorithm: RwLock::new(algorithm),
            stats: stats::SchedulerStats::default(),
            config,
            clock,
            next_id: AtomicU64::new(1),
            waiters: DashMap::new(),
            wait_objects: DashMap::new(),
            lock_holders: DashMap::new(),
            lb_tick_counter: AtomicU64::new(0),
        }
    }

    pub fn cpu_count(&self) -> u32 {
        self.cpus.len() as u32
    }

    pub fn set_algorithm(&self, algorithm: Algorithm) {
        *self.algorithm.write() = algorithm;
    }

    pub fn algorithm(&self) -> Algorithm {
        *self.algorithm.read()
    }

    pub fn stats(&self) -> stats::StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn create_group(&self, id: GroupId, weight: u32, parent: Option<GroupId>) {
        self.groups.insert(id, Group::new(id, weight, parent));
    }

    fn online_mask(&self) -> u64 {
        self.cpus.iter().enumerate().fold(0u64, |mask, (i, cpu)| {
            if cpu.lock().online && i < 64 {
                mask | (1u64 << i)
            } else {
                mask
            }
        })
    }

    /// §4.B `create`: allocate a control block, initial state Ready.
    pub fn create_runnable(
        &self,
        priority: u8,
        affinity: AffinityMask,
        owner_pid: u64,
        group: GroupId,
    ) -> Result<RunnableId> {
        if priority > runnable::MAX_PRIORITY {
            return Err(SchedulerError::InvalidPriority(priority));
        }
        if affinity.is_empty() {
            return Err(SchedulerError::EmptyAffinity);
        }
        if !affinity.intersects_online(self.online_mask()) {
            return Err(SchedulerError::NoOnlineCpuInAffinity);
        }

        let id = RunnableId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut r = Runnable::new(id, priority, affinity, owner_pid, group.0);

        let target_cpu = self.least_loaded_permitted_cpu(affinity).ok_or(SchedulerError::NoOnlineCpuInAffinity)?;

        {
            let mut cpu = self.cpus[target_cpu.0 as usize].lock();
            if cpu.ready_queues[priority as usize].len() >= cpu.max_queue_depth {
                drop(cpu);
                self.runnables.insert(id, r);
                return Err(SchedulerError::CapacityExceeded { cpu: target_cpu.0, priority });
            }
            cpu.ready_queues[priority as usize].push_back(id);
        }

        r.state = RunnableState::Ready;
        r.ready_since = Some(self.clock.now());
        self.runnables.insert(id, r);
        self.queue_slots.insert(id, QueueSlot { cpu: target_cpu, priority });
        if let Some(mut g) = self.groups.get_mut(&GroupId(group.0)) {
            g.members.insert(id);
        }
        trace!(runnable = id.0, cpu = target_cpu.0, priority, "runnable created, ready");
        Ok(id)
    }

    fn least_loaded_permitted_cpu(&self, affinity: AffinityMask) -> Option<CpuId> {
        self.cpus
            .iter()
            .enumerate()
            .filter(|(i, cpu)| {
                let cpu = cpu.lock();
                cpu.online && affinity.contains(*i as u32)
            })
            .min_by(|(_, a), (_, b)| {
                let la = a.lock().load;
                let lb = b.lock().load;
                la.partial_cmp(&lb).unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(i, _)| CpuId(i as u32))
    }

    pub fn set_priority(&self, id: RunnableId, priority: u8) -> Result<()> {
        if priority > runnable::MAX_PRIORITY {
            return Err(SchedulerError::InvalidPriority(priority));
        }
        let mut r = self.runnables.get_mut(&id).ok_or(SchedulerError::NotFound(id))?;
        r.base_priority = priority;
        recompute_effective_priority(&mut r);
        Ok(())
    }

    /// §4.B `set_affinity`: if the new mask excludes the runnable's current
    /// CPU while Running, it is migrated before its next quantum.
    pub fn set_affinity(&self, id: RunnableId, mask: AffinityMask) -> Result<()> {
        if mask.is_empty() {
            return Err(SchedulerError::EmptyAffinity);
        }
        let mut r = self.runnables.get_mut(&id).ok_or(SchedulerError::NotFound(id))?;
        r.affinity = mask;
        let needs_migration = matches!(r.state, RunnableState::Running)
            && r.last_cpu.map(|c| !mask.contains(c)).unwrap_or(false);
        drop(r);

        if needs_migration {
            if let Some(cpu_id) = self.least_loaded_permitted_cpu(mask) {
                let mut old_cpu = self.cpus[self.runnables.get(&id).unwrap().last_cpu.unwrap() as usize].lock();
                if old_cpu.running == Some(id) {
                    old_cpu.running = None;
                }
                drop(old_cpu);

                let mut r = self.runnables.get_mut(&id).unwrap();
                r.state = RunnableState::Ready;
                r.ready_since = Some(self.clock.now());
                let priority = r.base_priority;
                drop(r);

                let mut new_cpu = self.cpus[cpu_id.0 as usize].lock();
                new_cpu.ready_queues[priority as usize].push_back(id);
                drop(new_cpu);
                self.queue_slots.insert(id, QueueSlot { cpu: cpu_id, priority });
                debug!(runnable = id.0, cpu = cpu_id.0, "migrated due to affinity change");
            }
        }
        Ok(())
    }

    pub fn register_lock_holder(&self, object: WaitObject, holder: RunnableId) {
        self.lock_holders.insert(object, holder);
    }

    pub fn release_lock(&self, object: WaitObject) {
        if let Some((_, holder)) = self.lock_holders.remove(&object) {
            if let Some(mut r) = self.runnables.get_mut(&holder) {
                r.inherited_priority_ceiling = None;
                recompute_effective_priority(&mut r);
            }
        }
    }

    /// §4.B `wait`: atomically transitions the caller to Waiting; resolves
    /// to Signaled, TimedOut, or Cancelled.
    pub async fn wait(&self, id: RunnableId, object: WaitObject, timeout: Option<Tick>) -> Result<WaitOutcome> {
        {
            let mut r = self.runnables.get_mut(&id).ok_or(SchedulerError::NotFound(id))?;
            if let Some(cpu_id) = r.last_cpu {
                let mut cpu = self.cpus[cpu_id as usize].lock();
                if cpu.running == Some(id) {
                    cpu.running = None;
                }
            }
            r.state = RunnableState::Waiting(WaitInfo { object, deadline: timeout });
            r.waiting_since = Some(self.clock.now());
        }

        self.wait_objects.entry(object).or_default().insert(id);

        let (tx, rx) = tokio::sync::oneshot::channel();
        self.waiters.insert(id, Waiter { notify: tx });

        self.apply_priority_inheritance(object);

        let outcome = match timeout {
            Some(deadline) => {
                tokio::select! {
                    result = rx => result.unwrap_or(WaitOutcome::Cancelled),
                    _ = self.clock.sleep_until(deadline) => {
                        self.resolve_wait(id, object, WaitOutcome::TimedOut, true);
                        WaitOutcome::TimedOut
                    }
                }
            }
            None => rx.await.unwrap_or(WaitOutcome::Cancelled),
        };
        Ok(outcome)
    }

    fn apply_priority_inheritance(&self, object: WaitObject) {
        let Some(holder_id) = self.lock_holders.get(&object).map(|e| *e) else { return };
        let Some(waiters) = self.wait_objects.get(&object) else { return };
        let max_waiter_priority = waiters
            .iter()
            .filter_map(|w| self.runnables.get(w).map(|r| r.effective_priority))
            .max();
        if let (Some(max_p), Some(mut holder)) = (max_waiter_priority, self.runnables.get_mut(&holder_id)) {
            let current = holder.inherited_priority_ceiling.unwrap_or(0);
            if max_p > current {
                holder.inherited_priority_ceiling = Some(max_p);
                recompute_effective_priority(&mut holder);
                debug!(holder = holder_id.0, boosted_to = holder.effective_priority, "priority inheritance applied");
            }
        }
    }

    fn resolve_wait(&self, id: RunnableId, object: WaitObject, outcome: WaitOutcome, requeue: bool) {
        if let Some(mut set) = self.wait_objects.get_mut(&object) {
            set.remove(&id);
        }
        self.waiters.remove(&id);
        if !requeue {
            return;
        }
        if let Some(mut r) = self.runnables.get_mut(&id) {
            if r.state.is_terminal() {
                return;
            }
            r.state = RunnableState::Ready;
            r.ready_since = Some(self.clock.now());
            let priority = r.base_priority;
            let affinity = r.affinity;
            drop(r);
            if let Some(cpu_id) = self.least_loaded_permitted_cpu(affinity) {
                let mut cpu = self.cpus[cpu_id.0 as usize].lock();
                cpu.ready_queues[priority as usize].push_back(id);
                drop(cpu);
                self.queue_slots.insert(id, QueueSlot { cpu: cpu_id, priority });
            }
        }
        let _ = outcome;
    }

    /// §4.B `signal`: wakes all runnables Waiting on `obj`; returns the
    /// number woken.
    pub fn signal(&self, object: WaitObject) -> usize {
        let Some((_, ids)) = self.wait_objects.remove(&object) else { return 0 };
        let mut woken = 0;
        for id in ids {
            self.resolve_wait(id, object, WaitOutcome::Signaled, true);
            if let Some((_, waiter)) = self.waiters.remove(&id) {
                let _ = waiter.notify.send(WaitOutcome::Signaled);
            }
            woken += 1;
        }
        trace!(object = object.0, woken, "signal");
        woken
    }

    /// §4.B `terminate`: marks Terminated; preempts at next scheduling
    /// point if Running; wakes waiters with Cancelled.
    pub fn terminate(&self, id: RunnableId) -> Result<()> {
        let mut r = self.runnables.get_mut(&id).ok_or(SchedulerError::NotFound(id))?;
        let prior_state = r.state;
        r.state = RunnableState::Terminated;
        let waiting_object = match prior_state {
            RunnableState::Waiting(info) => Some(info.object),
            _ => None,
        };
        let last_cpu = r.last_cpu;
        drop(r);

        match prior_state {
            RunnableState::Running => {
                if let Some(cpu_id) = last_cpu {
                    let mut cpu = self.cpus[cpu_id as usize].lock();
                    if cpu.running == Some(id) {
                        cpu.running = None;
                    }
                }
            }
            RunnableState::Ready => {
                if let Some(slot) = self.queue_slots.remove(&id) {
                    let mut cpu = self.cpus[slot.1.cpu.0 as usize].lock();
                    cpu.ready_queues[slot.1.priority as usize].retain(|r| *r != id);
                }
            }
            _ => {}
        }

        if let Some(object) = waiting_object {
            if let Some(mut set) = self.wait_objects.get_mut(&object) {
                set.remove(&id);
            }
            if let Some((_, waiter)) = self.waiters.remove(&id) {
                let _ = waiter.notify.send(WaitOutcome::Cancelled);
            }
        }

        debug!(runnable = id.0, "terminated");
        Ok(())
    }

    /// Drop a Terminated runnable's control block once its owner has
    /// released the last reference.
    pub fn reap(&self, id: RunnableId) -> Result<()> {
        let is_terminal = self
            .runnables
            .get(&id)
            .map(|r| r.state.is_terminal())
            .ok_or(SchedulerError::NotFound(id))?;
        if !is_terminal {
            return Err(SchedulerError::NotFound(id));
        }
        self.runnables.remove(&id);
        self.queue_slots.remove(&id);
        Ok(())
    }

    pub fn get(&self, id: RunnableId) -> Option<Runnable> {
        self.runnables.get(&id).map(|r| r.clone())
    }

    pub fn ready_queue_len(&self, cpu: CpuId) -> usize {
        self.cpus[cpu.0 as usize].lock().ready_len()
    }

    pub fn cpu_load(&self, cpu: CpuId) -> f64 {
        self.cpus[cpu.0 as usize].lock().load
    }

    fn compute_quantum(&self, priority: u8, algorithm: Algorithm) -> u64 {
        match algorithm {
            Algorithm::Priority | Algorithm::Adaptive => {
                let t0 = self.config.base_quantum_ticks as f64;
                let scaled = t0 * (1.0 + priority as f64 / 8.0);
                scaled.round().max(1.0) as u64
            }
            _ => self.config.base_quantum_ticks.max(1),
        }
    }

    /// One scheduling step for a single CPU: accounts the running
    /// runnable's quantum, handles RT preemption, requeues on expiry, and
    /// picks a replacement if the CPU is idle.
    fn reschedule_cpu(&self, cpu_id: CpuId, now: Tick) {
        let algorithm = self.algorithm();
        let mut cpu = self.cpus[cpu_id.0 as usize].lock();
        if !cpu.online {
            return;
        }

        // RT strictly preempts: a ready RT runnable on this CPU bumps any
        // running non-RT runnable immediately, quantum or not.
        if let Some(running_id) = cpu.running {
            let running_is_rt = self.runnables.get(&running_id).map(|r| r.is_realtime()).unwrap_or(false);
            if !running_is_rt {
                if let Some(rt_priority) = cpu.highest_nonempty_priority() {
                    if rt_priority >= runnable::REALTIME_PRIORITY_FLOOR {
                        let priority = self.runnables.get(&running_id).unwrap().base_priority;
                        cpu.ready_queues[priority as usize].push_front(running_id);
                        cpu.running = None;
                        drop(cpu);
                        if let Some(mut r) = self.runnables.get_mut(&running_id) {
                            r.state = RunnableState::Ready;
                            r.ready_since = Some(now);
                        }
                        self.queue_slots.insert(running_id, QueueSlot { cpu: cpu_id, priority });
                        self.stats.record_context_switch();
                        cpu = self.cpus[cpu_id.0 as usize].lock();
                    }
                }
            }
        }

        // Quantum accounting for whatever is (still) running.
        if let Some(running_id) = cpu.running {
            cpu.quantum_remaining = cpu.quantum_remaining.saturating_sub(1);
            if let Some(mut r) = self.runnables.get_mut(&running_id) {
                r.cpu_time_ms += 1;
                if let Some(mut g) = self.groups.get_mut(&GroupId(r.group)) {
                    g.accrue(1);
                }
            }
            if cpu.quantum_remaining == 0 {
                let priority = self.runnables.get(&running_id).map(|r| r.base_priority).unwrap_or(0);
                cpu.ready_queues[priority as usize].push_back(running_id);
                cpu.running = None;
                self.queue_slots.insert(running_id, QueueSlot { cpu: cpu_id, priority });
                if let Some(mut r) = self.runnables.get_mut(&running_id) {
                    r.state = RunnableState::Ready;
                    r.ready_since = Some(now);
                }
                self.stats.record_context_switch();
            }
        }

        if cpu.running.is_none() {
            if let Some(picked) = pick_next(&mut cpu, &self.runnables, &self.groups, algorithm) {
                self.queue_slots.remove(&picked);
                cpu.running = Some(picked);
                let priority = self.runnables.get(&picked).map(|r| r.base_priority).unwrap_or(0);
                cpu.quantum_remaining = self.compute_quantum(priority, algorithm);
                if let Some(mut r) = self.runnables.get_mut(&picked) {
                    if let Some(since) = r.ready_since.take() {
                        self.stats.record_wait(now.saturating_sub(since));
                    }
                    r.state = RunnableState::Running;
                    r.last_cpu = Some(cpu_id.0);
                }
                self.stats.record_schedule();
            }
        }

        let busy = cpu.running.is_some();
        cpu.update_load(busy, self.config.load_ema_alpha);
    }

    fn adaptive_starvation_pass(&self, now: Tick) {
        let threshold = self.config.starvation_threshold_ticks;
        for mut entry in self.runnables.iter_mut() {
            let r = entry.value_mut();
            if !r.state.is_ready() {
                continue;
            }
            if let Some(since) = r.ready_since {
                if now.saturating_sub(since) > threshold && r.boost < 8 {
                    r.boost += 1;
                    recompute_effective_priority(r);
                    self.stats.record_starvation();
                    warn!(runnable = r.id.0, effective = r.effective_priority, "starvation boost applied");
                }
            }
        }
    }

    fn decay_boosts(&self, now: Tick) {
        for mut entry in self.runnables.iter_mut() {
            let r = entry.value_mut();
            if r.boost > 0 && matches!(r.state, RunnableState::Running) {
                let due = r.boost_decay_after.unwrap_or(now);
                if now.has_passed(due) {
                    r.boost -= 1;
                    r.boost_decay_after = Some(now.saturating_add(self.config.base_quantum_ticks));
                    recompute_effective_priority(r);
                }
            }
        }
    }

    /// §4.C LoadBalancing: run every `H_lb` ticks, migrate the tail of the
    /// busiest CPU's highest non-RT ready queue to the idlest permitted CPU.
    fn load_balance(&self) {
        if self.cpus.len() < 2 {
            return;
        }
        let loads: Vec<(usize, f64, bool)> = self
            .cpus
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let c = c.lock();
                (i, c.load, c.online)
            })
            .collect();

        let Some((busiest, max_load)) = loads.iter().filter(|(_, _, online)| *online).map(|(i, l, _)| (*i, *l)).max_by(|a, b| a.1.partial_cmp(&b.1).unwrap()) else { return };
        let Some((idlest, min_load)) = loads.iter().filter(|(_, _, online)| *online).map(|(i, l, _)| (*i, *l)).min_by(|a, b| a.1.partial_cmp(&b.1).unwrap()) else { return };

        if busiest == idlest || max_load - min_load <= self.config.load_balance_threshold {
            return;
        }

        let migrated = {
            let mut busy_cpu = self.cpus[busiest].lock();
            let Some(priority) = busy_cpu.highest_nonempty_non_rt_priority() else { return };
            busy_cpu.ready_queues[priority as usize].pop_back().map(|id| (id, priority))
        };

        if let Some((runnable_id, priority)) = migrated {
            let affinity_ok = self
                .runnables
                .get(&runnable_id)
                .map(|r| r.affinity.contains(idlest as u32))
                .unwrap_or(false);
            if !affinity_ok {
                let mut busy_cpu = self.cpus[busiest].lock();
                busy_cpu.ready_queues[priority as usize].push_back(runnable_id);
                return;
            }
            let mut idle_cpu = self.cpus[idlest].lock();
            idle_cpu.ready_queues[priority as usize].push_back(runnable_id);
            drop(idle_cpu);
            self.queue_slots.insert(runnable_id, QueueSlot { cpu: CpuId(idlest as u32), priority });
            self.stats.record_load_balance_op();
            debug!(from = busiest, to = idlest, runnable = runnable_id.0, "load-balance migration");
        }
    }

    /// Advance the scheduler by one tick across every online CPU.
    pub fn tick(&self, now: Tick) {
        for i in 0..self.cpus.len() {
            self.reschedule_cpu(CpuId(i as u32), now);
        }

        if self.algorithm() == Algorithm::Adaptive {
            self.adaptive_starvation_pass(now);
            self.decay_boosts(now);
        }

        let lb_due = {
            let c = self.lb_tick_counter.fetch_add(1, Ordering::Relaxed) + 1;
            c % self.config.load_balance_interval_ticks.max(1) == 0
        };
        if lb_due && matches!(self.algorithm(), Algorithm::LoadBalancing | Algorithm::Adaptive) {
            self.load_balance();
        }
    }

    pub fn set_cpu_online(&self, cpu: CpuId, online: bool) -> Result<()> {
        let mut c = self.cpus.get(cpu.0 as usize).ok_or(SchedulerError::UnknownCpu(cpu.0))?.lock();
        c.online = online;
        if !online {
            c.quiescent = true;
        }
        Ok(())
    }
}

fn recompute_effective_priority(r: &mut Runnable) {
    let boosted = (r.base_priority as u16 + r.boost as u16).min(runnable::MAX_PRIORITY as u16) as u8;
    r.effective_priority = boosted.max(r.inherited_priority_ceiling.unwrap_or(0));
}

/// `pick(cpu)`: highest-priority non-empty queue's head, except FairShare,
/// which picks the ready runnable minimizing its group's virtual time.
fn pick_next(
    cpu: &mut Cpu,
    runnables: &DashMap<RunnableId, Runnable>,
    groups: &DashMap<GroupId, Group>,
    algorithm: Algorithm,
) -> Option<RunnableId> {
    match algorithm {
        Algorithm::FairShare => {
            let mut best: Option<(RunnableId, u8, f64)> = None;
            for (priority, queue) in cpu.ready_queues.iter().enumerate() {
                for &id in queue.iter() {
                    let v = runnables
                        .get(&id)
                        .and_then(|r| groups.get(&GroupId(r.group)).map(|g| g.virtual_time))
                        .unwrap_or(0.0);
                    let better = match &best {
                        None => true,
                        Some((best_id, _, best_v)) => v < *best_v || (v == *best_v && id.0 < best_id.0),
                    };
                    if better {
                        best = Some((id, priority as u8, v));
                    }
                }
            }
            let (id, priority, _) = best?;
            cpu.ready_queues[priority as usize].retain(|r| *r != id);
            Some(id)
        }
        _ => {
            let priority = cpu.highest_nonempty_priority()?;
            cpu.ready_queues[priority as usize].pop_front()
        }
    }
}
