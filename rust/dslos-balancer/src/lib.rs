//! Load Balancer (§4.F): per-service replica pool and request dispatch.
//!
//! Each service registered with a [`LoadBalancer`] gets its own pool of
//! `(replica_id, endpoint, weight, in_flight_count, healthy_flag)` rows.
//! `pick` never returns an unhealthy replica; unhealthy replicas stay in
//! the pool until the service manager calls [`LoadBalancer::set_replicas`]
//! to remove them (§4.F "remain in the list until E removes them").

pub mod algorithm;
pub mod error;
pub mod types;

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicI64, AtomicU32, AtomicUsize, Ordering};

use dashmap::DashMap;
use dslos_cluster::ServiceId;
use parking_lot::RwLock;
use rand::Rng;

pub use algorithm::BalancerAlgorithm;
pub use error::{BalancerError, Result};
pub use types::{ReplicaEntry, ReplicaId};

struct WrrState {
    current_weight: AtomicI64,
}

struct Pool {
    algorithm: BalancerAlgorithm,
    entries: RwLock<Vec<ReplicaEntry>>,
    in_flight: DashMap<ReplicaId, AtomicU32>,
    rr_cursor: AtomicUsize,
    wrr: DashMap<ReplicaId, WrrState>,
}

impl Pool {
    fn new(algorithm: BalancerAlgorithm) -> Self {
        Self {
            algorithm,
            entries: RwLock::new(Vec::new()),
            in_flight: DashMap::new(),
            rr_cursor: AtomicUsize::new(0),
            wrr: DashMap::new(),
        }
    }

    fn healthy(&self) -> Vec<ReplicaEntry> {
        self.entries.read().iter().filter(|e| e.healthy).cloned().collect()
    }

    fn in_flight_of(&self, id: ReplicaId) -> u32 {
        self.in_flight.get(&id).map(|c| c.load(Ordering::Relaxed)).unwrap_or(0)
    }
}

/// Registry of per-service replica pools, keyed by [`ServiceId`].
pub struct LoadBalancer {
    pools: DashMap<ServiceId, Pool>,
}

impl LoadBalancer {
    pub fn new() -> Self {
        Self { pools: DashMap::new() }
    }

    pub fn register_service(&self, service_id: ServiceId, algorithm: BalancerAlgorithm) {
        self.pools.insert(service_id, Pool::new(algorithm));
    }

    pub fn unregister_service(&self, service_id: ServiceId) {
        self.pools.remove(&service_id);
    }

    pub fn set_algorithm(&self, service_id: ServiceId, algorithm: BalancerAlgorithm) -> Result<()> {
        let mut pool = self.pools.get_mut(&service_id).ok_or(BalancerError::PoolNotFound(service_id))?;
        pool.algorithm = algorithm;
        Ok(())
    }

    /// Replace a service's full replica list. Existing `in_flight` counters
    /// and weighted-round-robin state survive for replica ids that remain;
    /// entries dropped from `replicas` are forgotten entirely.
    pub fn set_replicas(&self, service_id: ServiceId, replicas: Vec<ReplicaEntry>) -> Result<()> {
        let pool = self.pools.get(&service_id).ok_or(BalancerError::PoolNotFound(service_id))?;
        let keep: std::collections::HashSet<ReplicaId> = replicas.iter().map(|r| r.replica_id).collect();
        pool.in_flight.retain(|id, _| keep.contains(id));
        pool.wrr.retain(|id, _| keep.contains(id));
        for r in &replicas {
            pool.in_flight.entry(r.replica_id).or_insert_with(|| AtomicU32::new(0));
        }
        *pool.entries.write() = replicas;
        Ok(())
    }

    pub fn set_health(&self, service_id: ServiceId, replica_id: ReplicaId, healthy: bool) -> Result<()> {
        let pool = self.pools.get(&service_id).ok_or(BalancerError::PoolNotFound(service_id))?;
        let mut entries = pool.entries.write();
        if let Some(entry) = entries.iter_mut().find(|e| e.replica_id == replica_id) {
            entry.healthy = healthy;
            Ok(())
        } else {
            Err(BalancerError::NoHealthyReplica)
        }
    }

    /// §4.F `pick(service_id, client_key?)`: select a healthy replica per
    /// the pool's configured algorithm.
    pub fn pick(&self, service_id: ServiceId, client_key: Option<&str>) -> Result<ReplicaId> {
        let pool = self.pools.get(&service_id).ok_or(BalancerError::PoolNotFound(service_id))?;
        let healthy = pool.healthy();
        if healthy.is_empty() {
            return Err(BalancerError::NoHealthyReplica);
        }

        let chosen = match pool.algorithm {
            BalancerAlgorithm::RoundRobin => {
                let i = pool.rr_cursor.fetch_add(1, Ordering::Relaxed) % healthy.len();
                healthy[i].replica_id
            }
            BalancerAlgorithm::LeastConnections => healthy
                .iter()
                .min_by_key(|e| (pool.in_flight_of(e.replica_id), e.replica_id.0))
                .map(|e| e.replica_id)
                .expect("healthy is non-empty"),
            BalancerAlgorithm::WeightedLeastConnections => healthy
                .iter()
                .min_by(|a, b| {
                    let la = pool.in_flight_of(a.replica_id) as f64 / a.weight as f64;
                    let lb = pool.in_flight_of(b.replica_id) as f64 / b.weight as f64;
                    la.partial_cmp(&lb).unwrap_or(std::cmp::Ordering::Equal).then(a.replica_id.0.cmp(&b.replica_id.0))
                })
                .map(|e| e.replica_id)
                .expect("healthy is non-empty"),
            BalancerAlgorithm::IpHash => {
                let key = client_key.ok_or(BalancerError::ClientKeyRequired)?;
                rendezvous_pick(&healthy, key)
            }
            BalancerAlgorithm::WeightedRoundRobin => self.smooth_weighted_pick(&pool, &healthy),
            BalancerAlgorithm::Random => {
                let i = rand::thread_rng().gen_range(0..healthy.len());
                healthy[i].replica_id
            }
        };

        pool.in_flight.entry(chosen).or_insert_with(|| AtomicU32::new(0)).fetch_add(1, Ordering::Relaxed);
        Ok(chosen)
    }

    /// Classic nginx smooth-weighted round-robin: every entry's
    /// `current_weight` grows by its static weight each pick; the entry
    /// with the highest `current_weight` is chosen and then discounted by
    /// the sum of all weights, keeping selection frequency proportional to
    /// weight without bursty runs of the same replica.
    fn smooth_weighted_pick(&self, pool: &Pool, healthy: &[ReplicaEntry]) -> ReplicaId {
        let total_weight: i64 = healthy.iter().map(|e| e.weight as i64).sum();
        let mut best: Option<(ReplicaId, i64)> = None;
        for e in healthy {
            let state = pool.wrr.entry(e.replica_id).or_insert_with(|| WrrState { current_weight: AtomicI64::new(0) });
            let updated = state.current_weight.fetch_add(e.weight as i64, Ordering::Relaxed) + e.weight as i64;
            if best.map(|(_, w)| updated > w).unwrap_or(true) {
                best = Some((e.replica_id, updated));
            }
        }
        let (winner, _) = best.expect("healthy is non-empty");
        if let Some(state) = pool.wrr.get(&winner) {
            state.current_weight.fetch_sub(total_weight, Ordering::Relaxed);
        }
        winner
    }

    /// §4.F `release(replica_id)`: decrement `in_flight_count`.
    pub fn release(&self, service_id: ServiceId, replica_id: ReplicaId) {
        if let Some(pool) = self.pools.get(&service_id) {
            if let Some(counter) = pool.in_flight.get(&replica_id) {
                let _ = counter.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |c| Some(c.saturating_sub(1)));
            }
        }
    }

    pub fn in_flight(&self, service_id: ServiceId, replica_id: ReplicaId) -> u32 {
        self.pools.get(&service_id).map(|p| p.in_flight_of(replica_id)).unwrap_or(0)
    }
}

impl Default for LoadBalancer {
    fn default() -> Self {
        Self::new()
    }
}

/// Rendezvous (highest-random-weight) hashing: the winner for a given
/// `client_key` only changes for clients whose previous winner left the
/// healthy set, unlike `hash(key) mod N` which remaps most clients on any
/// membership change.
fn rendezvous_pick(healthy: &[ReplicaEntry], client_key: &str) -> ReplicaId {
    healthy
        .iter()
        .max_by_key(|e| {
            let mut hasher = DefaultHasher::new();
            client_key.hash(&mut hasher);
            e.replica_id.hash(&mut hasher);
            hasher.finish()
        })
        .map(|e| e.replica_id)
        .expect("healthy is non-empty")
}
