//! Service Manager (§4.E): service lifecycle, placement, health probing,
//! rolling updates, and failover re-placement on top of a cluster's node
//! registry and each node's local scheduler.
//!
//! A `ServiceManager` is expected to run on the cluster leader; mutating
//! calls are gated on [`dslos_cluster::ClusterNode::check_quorum_for_write`]
//! the same way cluster metadata writes are, since a service is itself a
//! piece of replicated cluster metadata. The per-node [`Scheduler`] handles
//! are registered separately from the cluster's node registry: in a real
//! deployment they would be reached over `Transport` (§6, out of scope
//! here); in-process callers register the handle directly via
//! [`ServiceManager::register_node_scheduler`].

pub mod error;
pub mod placement;
pub mod types;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use dslos_clock::{Clock, Tick};
use dslos_cluster::{ClusterError, ClusterNode, NodeId, Resources};
use dslos_scheduler::{AffinityMask, Scheduler, ROOT_GROUP};
use tracing::{debug, info, warn};

pub use error::{Result, ServiceError};
pub use types::{
    HealthCheckSpec, Replica, ReplicaHealth, ReplicaId, Service, ServiceInfo, ServiceSpec, ServiceState, UpdateStrategy,
};

/// Priority assigned to replica runnables: below the real-time floor,
/// above the scheduler's default so a placed service is scheduled promptly.
const REPLICA_PRIORITY: u8 = 12;

pub struct ServiceManager {
    cluster: Arc<ClusterNode>,
    schedulers: DashMap<NodeId, Arc<Scheduler>>,
    services: DashMap<dslos_cluster::ServiceId, Service>,
    replicas: DashMap<ReplicaId, Replica>,
    next_service_id: AtomicU64,
    next_replica_id: AtomicU64,
    clock: Arc<dyn Clock>,
}

impl ServiceManager {
    pub fn new(cluster: Arc<ClusterNode>, clock: Arc<dyn Clock>) -> Self {
        Self {
            cluster,
            schedulers: DashMap::new(),
            services: DashMap::new(),
            replicas: DashMap::new(),
            next_service_id: AtomicU64::new(1),
            next_replica_id: AtomicU64::new(1),
            clock,
        }
    }

    /// Register the in-process handle for a node's local scheduler, so
    /// this manager can place/terminate runnables on it directly.
    pub fn register_node_scheduler(&self, node_id: NodeId, scheduler: Arc<Scheduler>) {
        self.schedulers.insert(node_id, scheduler);
    }

    fn require_leader(&self) -> Result<()> {
        self.cluster.check_quorum_for_write().map_err(|e| match e {
            ClusterError::NotLeader(hint) => ServiceError::NotLeader(hint),
            ClusterError::QuorumLost => ServiceError::Timeout,
            _ => ServiceError::Timeout,
        })
    }

    pub fn create_service(&self, cluster_id: dslos_cluster::ClusterId, spec: ServiceSpec) -> Result<dslos_cluster::ServiceId> {
        spec.validate().map_err(ServiceError::InvalidSpec)?;

        let online = self.cluster.online_nodes_snapshot();
        let fits_any_node = online.iter().any(|n| spec.resource_request.fits_within(n.capacity));
        if !fits_any_node {
            return Err(ServiceError::InsufficientResources);
        }

        let id = dslos_cluster::ServiceId(self.next_service_id.fetch_add(1, Ordering::Relaxed));
        let service = Service {
            id,
            cluster_id,
            spec,
            state: ServiceState::Created,
            replicas: Vec::new(),
            spec_generation: 0,
            pending_spec: None,
        };
        self.services.insert(id, service);
        self.cluster.register_service(id);
        info!(service = id.0, "service created");
        Ok(id)
    }

    /// Place `target_replicas` according to the service's current spec;
    /// transitions `Created`/`Error` -> `Starting`, or `Error` if fewer than
    /// `min_replicas` could be placed (already-placed replicas are torn
    /// down in that case).
    pub fn start_service(&self, id: dslos_cluster::ServiceId) -> Result<()> {
        self.require_leader()?;

        let (spec, generation) = {
            let mut svc = self.services.get_mut(&id).ok_or(ServiceError::NotFound(id))?;
            if !matches!(svc.state, ServiceState::Created | ServiceState::Error) {
                return Err(ServiceError::Conflict(svc.state));
            }
            svc.state = ServiceState::Starting;
            (svc.spec.clone(), svc.spec_generation)
        };

        let mut placed = Vec::new();
        for _ in 0..spec.target_replicas {
            match self.place_replica(id, &spec, generation) {
                Ok(replica_id) => placed.push(replica_id),
                Err(_) => break,
            }
        }

        if (placed.len() as u32) < spec.min_replicas {
            for rid in placed {
                self.destroy_replica(rid);
            }
            let mut svc = self.services.get_mut(&id).ok_or(ServiceError::NotFound(id))?;
            svc.state = ServiceState::Error;
            warn!(service = id.0, "start_service could not place min_replicas");
            return Err(ServiceError::InsufficientResources);
        }

        let mut svc = self.services.get_mut(&id).ok_or(ServiceError::NotFound(id))?;
        svc.replicas.extend(placed);
        Ok(())
    }

    /// Try each ranked candidate node in turn, skipping any without a
    /// registered scheduler handle, until one accepts the reservation.
    fn place_replica(&self, service_id: dslos_cluster::ServiceId, spec: &ServiceSpec, generation: u64) -> Result<ReplicaId> {
        let online = self.cluster.online_nodes_snapshot();
        let replicas_per_node = self.replica_counts_by_node(service_id);
        let ranked = placement::rank_candidates(&online, spec, &replicas_per_node);

        for node in ranked {
            let Some(scheduler) = self.schedulers.get(&node.id).map(|e| e.value().clone()) else {
                continue;
            };
            if self.cluster.reserve(node.id, spec.resource_request).is_err() {
                continue;
            }

            let affinity = AffinityMask::all(scheduler.cpu_count());
            let runnable = match scheduler.create_runnable(REPLICA_PRIORITY, affinity, service_id.0, ROOT_GROUP) {
                Ok(r) => r,
                Err(_) => {
                    self.cluster.release(node.id, spec.resource_request);
                    continue;
                }
            };

            let replica_id = ReplicaId(self.next_replica_id.fetch_add(1, Ordering::Relaxed));
            let replica = Replica {
                id: replica_id,
                service_id,
                node_id: node.id,
                runnable_ids: vec![runnable],
                health: ReplicaHealth::Starting,
                last_probe: None,
                consecutive_failures: 0,
                spec_generation: generation,
            };
            self.replicas.insert(replica_id, replica);
            debug!(service = service_id.0, replica = replica_id.0, node = node.id.0, "replica placed");
            return Ok(replica_id);
        }

        Err(ServiceError::InsufficientResources)
    }

    fn replica_counts_by_node(&self, service_id: dslos_cluster::ServiceId) -> std::collections::HashMap<NodeId, u32> {
        let mut counts = std::collections::HashMap::new();
        for entry in self.replicas.iter() {
            let r = entry.value();
            if r.service_id == service_id {
                *counts.entry(r.node_id).or_insert(0) += 1;
            }
        }
        counts
    }

    /// Release capacity, terminate runnables, and drop the registry entry
    /// for a replica. Leaves the owning service's `replicas` list to the
    /// caller (most callers already hold `svc` and update it themselves;
    /// this also retains it here so standalone callers stay consistent).
    fn destroy_replica(&self, replica_id: ReplicaId) {
        let Some((_, replica)) = self.replicas.remove(&replica_id) else {
            return;
        };
        if let Some(svc) = self.services.get(&replica.service_id) {
            self.cluster.release(replica.node_id, svc.spec.resource_request);
        }
        if let Some(scheduler) = self.schedulers.get(&replica.node_id) {
            for runnable in &replica.runnable_ids {
                let _ = scheduler.terminate(*runnable);
            }
        }
        if let Some(mut svc) = self.services.get_mut(&replica.service_id) {
            svc.replicas.retain(|r| *r != replica_id);
        }
    }

    fn healthy_count(&self, service_id: dslos_cluster::ServiceId) -> u32 {
        self.replicas
            .iter()
            .filter(|e| e.value().service_id == service_id && e.value().health == ReplicaHealth::Healthy)
            .count() as u32
    }

    fn maybe_transition_to_running(&self, service_id: dslos_cluster::ServiceId) {
        let Some(mut svc) = self.services.get_mut(&service_id) else { return };
        if !matches!(svc.state, ServiceState::Starting | ServiceState::Scaling) {
            return;
        }
        let total = svc.replicas.len() as u32;
        if total == 0 || total != svc.spec.target_replicas {
            return;
        }
        if self.healthy_count(service_id) == total {
            svc.state = ServiceState::Running;
        }
    }

    /// Report a health probe result for a replica. Crosses the
    /// `Unhealthy` (3 consecutive failures) and `Gone` (6 consecutive
    /// failures) thresholds; a transition to `Gone` triggers immediate
    /// re-placement.
    pub fn record_probe_result(&self, replica_id: ReplicaId, healthy: bool) -> Result<()> {
        let now = self.clock.now();
        let (service_id, became_gone) = {
            let mut r = self.replicas.get_mut(&replica_id).ok_or(ServiceError::ReplicaNotFound(replica_id))?;
            let was_gone = r.health == ReplicaHealth::Gone;
            r.record_probe(healthy, now);
            (r.service_id, !was_gone && r.health == ReplicaHealth::Gone)
        };

        self.maybe_transition_to_running(service_id);
        if became_gone {
            warn!(replica = replica_id.0, "replica marked Gone after repeated probe failures, re-placing");
            self.reposition_replica(replica_id, service_id);
        }
        Ok(())
    }

    /// Remove a replica (if still registered) and attempt to place its
    /// replacement at the service's current generation. On placement
    /// failure the service becomes `Degraded`; if that drops the service
    /// below `min_replicas` it becomes `Error` instead.
    fn reposition_replica(&self, replica_id: ReplicaId, service_id: dslos_cluster::ServiceId) {
        let Some((spec, generation)) = self.services.get(&service_id).map(|s| (s.spec.clone(), s.spec_generation)) else {
            return;
        };

        self.destroy_replica(replica_id);

        match self.place_replica(service_id, &spec, generation) {
            Ok(new_id) => {
                if let Some(mut svc) = self.services.get_mut(&service_id) {
                    svc.replicas.push(new_id);
                }
            }
            Err(_) => {
                if let Some(mut svc) = self.services.get_mut(&service_id) {
                    if !matches!(svc.state, ServiceState::Error) {
                        svc.state = ServiceState::Degraded;
                    }
                }
            }
        }

        let healthy = self.healthy_count(service_id);
        if let Some(mut svc) = self.services.get_mut(&service_id) {
            if healthy < svc.spec.min_replicas {
                svc.state = ServiceState::Error;
            }
        }
    }

    /// React to nodes the cluster layer has newly classified as `Failed`
    /// (the `Vec<NodeId>` returned from `ClusterNode::tick`): every replica
    /// on that node is marked `Gone` and re-placed.
    pub fn handle_node_failed(&self, node_id: NodeId) {
        let affected: Vec<(dslos_cluster::ServiceId, ReplicaId)> = self
            .replicas
            .iter()
            .filter(|e| e.value().node_id == node_id)
            .map(|e| (e.value().service_id, e.value().id))
            .collect();

        for (service_id, replica_id) in affected {
            if let Some(mut r) = self.replicas.get_mut(&replica_id) {
                r.health = ReplicaHealth::Gone;
            }
            self.reposition_replica(replica_id, service_id);
        }
    }

    /// Resize toward `target` replicas. A no-op if already at `target`
    /// (idempotent). Forbidden (returns `Conflict`) when
    /// `min_replicas == max_replicas`, since the service then has no valid
    /// scale range.
    pub fn scale_service(&self, id: dslos_cluster::ServiceId, target: u32) -> Result<()> {
        self.require_leader()?;

        let (spec, generation, current) = {
            let svc = self.services.get(&id).ok_or(ServiceError::NotFound(id))?;
            (svc.spec.clone(), svc.spec_generation, svc.replicas.clone())
        };

        if target == current.len() as u32 {
            return Ok(());
        }
        if spec.min_replicas == spec.max_replicas {
            let svc = self.services.get(&id).ok_or(ServiceError::NotFound(id))?;
            return Err(ServiceError::Conflict(svc.state));
        }
        if target < spec.min_replicas || target > spec.max_replicas {
            return Err(ServiceError::InvalidSpec("target out of [min_replicas, max_replicas]".into()));
        }

        {
            let mut svc = self.services.get_mut(&id).ok_or(ServiceError::NotFound(id))?;
            svc.state = ServiceState::Scaling;
            svc.spec.target_replicas = target;
        }

        if target > current.len() as u32 {
            for _ in current.len() as u32..target {
                match self.place_replica(id, &spec, generation) {
                    Ok(rid) => {
                        if let Some(mut svc) = self.services.get_mut(&id) {
                            svc.replicas.push(rid);
                        }
                    }
                    Err(e) => return Err(e),
                }
            }
        } else {
            let victims = self.rank_scale_down_victims(&current, (current.len() as u32 - target) as usize);
            for victim in victims {
                self.destroy_replica(victim);
            }
        }

        self.maybe_transition_to_running(id);
        Ok(())
    }

    /// Unhealthy first, then the most-utilized node (least free capacity
    /// left), then the newest replica (highest id) as the final tiebreak.
    fn rank_scale_down_victims(&self, current: &[ReplicaId], count: usize) -> Vec<ReplicaId> {
        let mut candidates: Vec<Replica> = current.iter().filter_map(|id| self.replicas.get(id).map(|r| r.clone())).collect();

        candidates.sort_by(|a, b| {
            let unhealthy_a = a.health != ReplicaHealth::Healthy;
            let unhealthy_b = b.health != ReplicaHealth::Healthy;
            let node_a = self.cluster.get_node(a.node_id);
            let node_b = self.cluster.get_node(b.node_id);
            let free_a = node_a.map(|n| n.free_capacity().cpu_count).unwrap_or(0);
            let free_b = node_b.map(|n| n.free_capacity().cpu_count).unwrap_or(0);

            unhealthy_b
                .cmp(&unhealthy_a)
                .then_with(|| free_a.cmp(&free_b))
                .then_with(|| b.id.0.cmp(&a.id.0))
        });

        candidates.into_iter().take(count).map(|r| r.id).collect()
    }

    /// Begin or continue an update toward `new_spec`, one rolling step per
    /// call. `Recreate` tears every replica down and re-places the full
    /// target in a single call; `RollingUpdate` surges or drains one
    /// replica at a time, honoring `max_surge`/`max_unavailable`, and must
    /// be called repeatedly until the service returns to `Running`.
    pub fn update_service(&self, id: dslos_cluster::ServiceId, new_spec: ServiceSpec) -> Result<()> {
        self.require_leader()?;
        new_spec.validate().map_err(ServiceError::InvalidSpec)?;

        let already_updating = {
            let svc = self.services.get(&id).ok_or(ServiceError::NotFound(id))?;
            svc.state == ServiceState::Updating
        };

        if !already_updating {
            let mut svc = self.services.get_mut(&id).ok_or(ServiceError::NotFound(id))?;
            if !matches!(svc.state, ServiceState::Running | ServiceState::Error) {
                return Err(ServiceError::Conflict(svc.state));
            }
            svc.pending_spec = Some(new_spec.clone());
            svc.state = ServiceState::Updating;
        }

        let strategy = new_spec.update_strategy;
        match strategy {
            UpdateStrategy::Recreate => self.recreate_step(id),
            UpdateStrategy::RollingUpdate { max_surge, max_unavailable } => self.rolling_step(id, max_surge, max_unavailable),
        }
    }

    fn recreate_step(&self, id: dslos_cluster::ServiceId) -> Result<()> {
        let (old_replicas, new_spec) = {
            let svc = self.services.get(&id).ok_or(ServiceError::NotFound(id))?;
            (svc.replicas.clone(), svc.pending_spec.clone().expect("recreate_step without pending_spec"))
        };

        for rid in old_replicas {
            self.destroy_replica(rid);
        }

        let generation = {
            let mut svc = self.services.get_mut(&id).ok_or(ServiceError::NotFound(id))?;
            svc.spec = new_spec.clone();
            svc.spec_generation += 1;
            svc.pending_spec = None;
            svc.spec_generation
        };

        let mut placed = Vec::new();
        for _ in 0..new_spec.target_replicas {
            if let Ok(rid) = self.place_replica(id, &new_spec, generation) {
                placed.push(rid);
            }
        }

        let mut svc = self.services.get_mut(&id).ok_or(ServiceError::NotFound(id))?;
        svc.replicas = placed;
        svc.state = if (svc.replicas.len() as u32) >= svc.spec.min_replicas {
            ServiceState::Starting
        } else {
            ServiceState::Error
        };
        Ok(())
    }

    fn rolling_step(&self, id: dslos_cluster::ServiceId, max_surge: u32, max_unavailable: u32) -> Result<()> {
        let (current_ids, new_spec, target_generation) = {
            let svc = self.services.get(&id).ok_or(ServiceError::NotFound(id))?;
            let new_spec = svc.pending_spec.clone().expect("rolling_step without pending_spec");
            (svc.replicas.clone(), new_spec, svc.spec_generation + 1)
        };

        let current: Vec<Replica> = current_ids.iter().filter_map(|rid| self.replicas.get(rid).map(|r| r.clone())).collect();
        let old_gen: Vec<&Replica> = current.iter().filter(|r| r.spec_generation != target_generation).collect();
        let overall_healthy = self.healthy_count(id);
        let target = new_spec.target_replicas;

        if !old_gen.is_empty() && current.len() as u32 < target + max_surge {
            let rid = self.place_replica(id, &new_spec, target_generation)?;
            if let Some(mut svc) = self.services.get_mut(&id) {
                svc.replicas.push(rid);
            }
        } else if !old_gen.is_empty() && overall_healthy >= target.saturating_sub(max_unavailable) {
            let victim = old_gen[0].id;
            self.destroy_replica(victim);
        }

        let remaining_old = {
            let svc = self.services.get(&id).ok_or(ServiceError::NotFound(id))?;
            svc.replicas
                .iter()
                .filter(|rid| self.replicas.get(rid).map(|r| r.spec_generation != target_generation).unwrap_or(false))
                .count()
        };

        if remaining_old == 0 {
            let mut svc = self.services.get_mut(&id).ok_or(ServiceError::NotFound(id))?;
            svc.spec = new_spec;
            svc.spec_generation = target_generation;
            svc.pending_spec = None;
            svc.state = ServiceState::Running;
        }
        Ok(())
    }

    /// Stop a service: tear down every replica and release their
    /// reservations. `force` skips nothing extra today (there is no
    /// modeled in-flight request to drain) but is kept as a distinct
    /// parameter since a real `Runnable`-level drain would observe it.
    pub fn stop_service(&self, id: dslos_cluster::ServiceId, force: bool) -> Result<()> {
        self.require_leader()?;
        let _ = force;

        let replicas = {
            let mut svc = self.services.get_mut(&id).ok_or(ServiceError::NotFound(id))?;
            if svc.state == ServiceState::Stopped {
                return Ok(());
            }
            svc.state = ServiceState::Stopping;
            svc.replicas.clone()
        };

        for rid in replicas {
            self.destroy_replica(rid);
        }

        let mut svc = self.services.get_mut(&id).ok_or(ServiceError::NotFound(id))?;
        svc.state = ServiceState::Stopped;
        Ok(())
    }

    pub fn get_service_info(&self, id: dslos_cluster::ServiceId) -> Result<ServiceInfo> {
        let svc = self.services.get(&id).ok_or(ServiceError::NotFound(id))?;
        let replicas = svc.replicas.iter().filter_map(|rid| self.replicas.get(rid).map(|r| r.clone())).collect();
        Ok(ServiceInfo { id: svc.id, cluster_id: svc.cluster_id, spec: svc.spec.clone(), state: svc.state, replicas })
    }

    pub fn get_replica(&self, id: ReplicaId) -> Option<Replica> {
        self.replicas.get(&id).map(|r| r.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dslos_clock::TestClock;
    use dslos_cluster::{ClusterConfig, ClusterId, Endpoint, NodeType};
    use dslos_scheduler::{Algorithm, SchedulerConfig};

    fn harness() -> (Arc<ClusterNode>, Arc<ServiceManager>, NodeId) {
        let clock: Arc<dyn Clock> = Arc::new(TestClock::new());
        let cluster = Arc::new(ClusterNode::new(
            NodeId(1),
            ClusterId(1),
            "n1",
            ClusterConfig::new(8, 1, 10),
            clock.clone(),
        ));
        cluster.start_election(Tick(0));

        let node_id = cluster
            .join("worker-1", Endpoint::new("10.0.0.1", 9000), NodeType::Worker, 0, Resources { cpu_count: 4, memory_mb: 8192, storage_mb: 100_000 })
            .unwrap();

        let manager = Arc::new(ServiceManager::new(cluster.clone(), clock.clone()));
        let scheduler = Arc::new(Scheduler::new(2, Algorithm::Priority, SchedulerConfig::default(), clock));
        manager.register_node_scheduler(node_id, scheduler);
        (cluster, manager, node_id)
    }

    fn spec(min: u32, max: u32, target: u32) -> ServiceSpec {
        ServiceSpec {
            name: "web".into(),
            service_type: "stateless".into(),
            image: "web:latest".into(),
            command: vec![],
            env: Default::default(),
            resource_request: Resources { cpu_count: 1, memory_mb: 512, storage_mb: 0 },
            resource_limits: Resources::default(),
            health_check: Default::default(),
            min_replicas: min,
            max_replicas: max,
            target_replicas: target,
            update_strategy: UpdateStrategy::Recreate,
            required_capabilities: 0,
        }
    }

    #[test]
    fn start_service_places_target_replicas_and_becomes_starting() {
        let (_, manager, _) = harness();
        let id = manager.create_service(ClusterId(1), spec(1, 3, 2)).unwrap();
        manager.start_service(id).unwrap();
        let info = manager.get_service_info(id).unwrap();
        assert_eq!(info.replicas.len(), 2);
        assert_eq!(info.state, ServiceState::Starting);
    }

    #[test]
    fn service_becomes_running_once_all_replicas_report_healthy() {
        let (_, manager, _) = harness();
        let id = manager.create_service(ClusterId(1), spec(1, 3, 2)).unwrap();
        manager.start_service(id).unwrap();
        let replicas = manager.get_service_info(id).unwrap().replicas;
        for r in &replicas {
            manager.record_probe_result(r.id, true).unwrap();
        }
        assert_eq!(manager.get_service_info(id).unwrap().state, ServiceState::Running);
    }

    #[test]
    fn replica_marked_gone_after_six_failed_probes_is_replaced() {
        let (_, manager, _) = harness();
        let id = manager.create_service(ClusterId(1), spec(1, 1, 1)).unwrap();
        manager.start_service(id).unwrap();
        let original = manager.get_service_info(id).unwrap().replicas[0].id;

        for _ in 0..6 {
            manager.record_probe_result(original, false).unwrap();
        }

        let info = manager.get_service_info(id).unwrap();
        assert_eq!(info.replicas.len(), 1);
        assert_ne!(info.replicas[0].id, original, "gone replica should have been replaced");
    }

    #[test]
    fn scale_service_is_a_no_op_at_current_target() {
        let (_, manager, _) = harness();
        let id = manager.create_service(ClusterId(1), spec(1, 4, 2)).unwrap();
        manager.start_service(id).unwrap();
        manager.scale_service(id, 2).unwrap();
        assert_eq!(manager.get_service_info(id).unwrap().replicas.len(), 2);
    }

    #[test]
    fn scale_service_forbidden_when_min_equals_max() {
        let (_, manager, _) = harness();
        let id = manager.create_service(ClusterId(1), spec(2, 2, 2)).unwrap();
        manager.start_service(id).unwrap();
        let result = manager.scale_service(id, 3);
        assert!(matches!(result, Err(ServiceError::Conflict(_))));
    }

    #[test]
    fn stop_service_tears_down_all_replicas() {
        let (_, manager, _) = harness();
        let id = manager.create_service(ClusterId(1), spec(1, 2, 2)).unwrap();
        manager.start_service(id).unwrap();
        manager.stop_service(id, false).unwrap();
        let info = manager.get_service_info(id).unwrap();
        assert!(info.replicas.is_empty());
        assert_eq!(info.state, ServiceState::Stopped);
    }

    #[test]
    fn rolling_update_converges_to_new_generation_without_dropping_below_min_unavailable() {
        let (_, manager, _) = harness();
        let id = manager.create_service(ClusterId(1), spec(1, 2, 2)).unwrap();
        manager.start_service(id).unwrap();
        for r in manager.get_service_info(id).unwrap().replicas {
            manager.record_probe_result(r.id, true).unwrap();
        }
        assert_eq!(manager.get_service_info(id).unwrap().state, ServiceState::Running);

        let mut new_spec = spec(1, 2, 2);
        new_spec.image = "web:v2".into();
        new_spec.update_strategy = UpdateStrategy::RollingUpdate { max_surge: 1, max_unavailable: 0 };

        loop {
            manager.update_service(id, new_spec.clone()).unwrap();
            for r in manager.get_service_info(id).unwrap().replicas {
                manager.record_probe_result(r.id, true).unwrap();
            }
            if manager.get_service_info(id).unwrap().state == ServiceState::Running {
                break;
            }
        }

        let info = manager.get_service_info(id).unwrap();
        assert_eq!(info.spec.image, "web:v2");
        assert_eq!(info.replicas.len(), 2);
    }

    #[test]
    fn create_service_rejects_request_too_large_for_any_node() {
        let (_, manager, _) = harness();
        let mut huge = spec(1, 1, 1);
        huge.resource_request = Resources { cpu_count: 99, memory_mb: 1, storage_mb: 0 };
        let result = manager.create_service(ClusterId(1), huge);
        assert_eq!(result, Err(ServiceError::InsufficientResources));
    }

    #[test]
    fn handle_node_failed_reposition_is_noop_when_no_other_node_available() {
        let (cluster, manager, node_id) = harness();
        let id = manager.create_service(ClusterId(1), spec(1, 1, 1)).unwrap();
        manager.start_service(id).unwrap();
        cluster.leave(node_id).unwrap();
        manager.handle_node_failed(node_id);
        let info = manager.get_service_info(id).unwrap();
        assert_eq!(info.state, ServiceState::Error);
        assert!(info.replicas.is_empty());
    }
}
