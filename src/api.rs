//! Operator API: the single entry point wiring `dslos-cluster`,
//! `dslos-service`, `dslos-balancer`, and a per-node `dslos-scheduler`
//! together behind one facade consumed by both the CLI and its own tests.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use dslos_balancer::{BalancerAlgorithm, LoadBalancer, ReplicaEntry};
use dslos_clock::Clock;
use dslos_cluster::{ClusterConfig, ClusterId, ClusterInfo, ClusterNode, Endpoint, NodeId, NodeType, Resources, ServiceId};
use dslos_scheduler::{Algorithm as SchedulerAlgorithm, Scheduler, SchedulerConfig};
use dslos_service::{ReplicaHealth, ServiceInfo, ServiceManager, ServiceSpec};
use dslos_wire::ClusterCheckpoint;
use tracing::{info, warn};

use crate::config::DslosConfig;
use crate::error::{DslosError, Result};

/// Parameters a node supplies on `join_cluster`; the external interface in
/// spec.md lists `(cluster_id, node_endpoint) -> node_id`, but the node
/// data model (§3 "Node") requires its type/capabilities/capacity up
/// front, so this API takes them as explicit fields rather than inventing
/// placeholder defaults silently.
#[derive(Debug, Clone)]
pub struct NodeJoinRequest {
    pub name: String,
    pub endpoint: Endpoint,
    pub node_type: NodeType,
    pub capabilities: u64,
    pub capacity: Resources,
    pub cpu_count: u32,
}

struct ClusterContext {
    description: String,
    cluster: Arc<ClusterNode>,
    services: Arc<ServiceManager>,
    balancer: Arc<LoadBalancer>,
    schedulers: DashMap<NodeId, Arc<Scheduler>>,
}

/// Facade over one process's clusters. A process can host more than one
/// cluster (useful for tests); each cluster owns its own node registry,
/// service manager, and replica pool.
pub struct OperatorApi {
    config: DslosConfig,
    clock: Arc<dyn Clock>,
    clusters: DashMap<ClusterId, ClusterContext>,
    service_index: DashMap<ServiceId, ClusterId>,
    next_cluster_id: AtomicU64,
}

impl OperatorApi {
    pub fn new(config: DslosConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            clusters: DashMap::new(),
            service_index: DashMap::new(),
            next_cluster_id: AtomicU64::new(1),
        }
    }

    fn context(&self, cluster_id: ClusterId) -> Result<dashmap::mapref::one::Ref<'_, ClusterId, ClusterContext>> {
        self.clusters.get(&cluster_id).ok_or(DslosError::ClusterNotFound(cluster_id))
    }

    fn cluster_of_service(&self, service_id: ServiceId) -> Result<ClusterId> {
        self.service_index.get(&service_id).map(|e| *e.value()).ok_or(DslosError::ServiceNotIndexed(service_id))
    }

    /// Bootstraps a new cluster and its founding coordinator node. The
    /// coordinator immediately joins its own registry under `NodeId(1)`,
    /// matching `ClusterNode`'s own-identity/first-join-id convention.
    pub fn create_cluster(
        &self,
        name: impl Into<String>,
        description: impl Into<String>,
        coordinator_endpoint: Endpoint,
        config: Option<ClusterConfig>,
    ) -> Result<ClusterId> {
        let cluster_id = ClusterId(self.next_cluster_id.fetch_add(1, Ordering::Relaxed));
        let cfg = config.unwrap_or_else(|| self.default_cluster_config());
        let name = name.into();

        let cluster = Arc::new(ClusterNode::new(NodeId(1), cluster_id, name.clone(), cfg, self.clock.clone()));
        cluster.join(
            name.clone(),
            coordinator_endpoint,
            NodeType::Coordinator,
            u64::MAX,
            Resources { cpu_count: 0, memory_mb: 0, storage_mb: 0 },
        )?;

        let services = Arc::new(ServiceManager::new(cluster.clone(), self.clock.clone()));
        let balancer = Arc::new(LoadBalancer::new());

        self.clusters.insert(
            cluster_id,
            ClusterContext { description: description.into(), cluster, services, balancer, schedulers: DashMap::new() },
        );
        info!(cluster = cluster_id.0, "cluster created");
        Ok(cluster_id)
    }

    fn default_cluster_config(&self) -> ClusterConfig {
        let c = &self.config.cluster;
        ClusterConfig {
            max_nodes: c.max_nodes,
            replication_factor: c.replication_factor,
            consistency_level: c.consistency_level,
            heartbeat_interval: c.heartbeat_interval,
            failover_timeout: c.failover_timeout,
            quorum_override: c.quorum_override,
        }
    }

    /// Joins a node, provisions its local scheduler, and registers the
    /// scheduler handle with both the service manager (for placement) and
    /// this API (for tick-driving).
    pub fn join_cluster(&self, cluster_id: ClusterId, request: NodeJoinRequest) -> Result<NodeId> {
        let ctx = self.context(cluster_id)?;
        let node_id = ctx.cluster.join(request.name, request.endpoint, request.node_type, request.capabilities, request.capacity)?;

        let scheduler_config = SchedulerConfig::with_base_quantum(self.config.scheduler.base_quantum_ms);
        let scheduler = Arc::new(Scheduler::new(request.cpu_count, SchedulerAlgorithm::default(), scheduler_config, self.clock.clone()));
        ctx.services.register_node_scheduler(node_id, scheduler.clone());
        ctx.schedulers.insert(node_id, scheduler);

        Ok(node_id)
    }

    pub fn leave_cluster(&self, cluster_id: ClusterId, node_id: NodeId) -> Result<()> {
        let ctx = self.context(cluster_id)?;
        ctx.cluster.leave(node_id)?;
        ctx.schedulers.remove(&node_id);
        Ok(())
    }

    /// Switches a service's load-balancing algorithm (§4.F); the registry
    /// entry created by `create_service` defaults to `RoundRobin`.
    pub fn set_balancer_algorithm(&self, service_id: ServiceId, algorithm: BalancerAlgorithm) -> Result<()> {
        let cluster_id = self.cluster_of_service(service_id)?;
        self.context(cluster_id)?.balancer.set_algorithm(service_id, algorithm)?;
        Ok(())
    }

    pub fn create_service(&self, cluster_id: ClusterId, spec: ServiceSpec) -> Result<ServiceId> {
        let ctx = self.context(cluster_id)?;
        let service_id = ctx.services.create_service(cluster_id, spec)?;
        self.service_index.insert(service_id, cluster_id);
        ctx.balancer.register_service(service_id, BalancerAlgorithm::RoundRobin);
        Ok(service_id)
    }

    pub fn start_service(&self, service_id: ServiceId) -> Result<()> {
        let cluster_id = self.cluster_of_service(service_id)?;
        let ctx = self.context(cluster_id)?;
        ctx.services.start_service(service_id)?;
        self.sync_balancer_pool(&ctx, service_id)?;
        Ok(())
    }

    pub fn stop_service(&self, service_id: ServiceId, force: bool) -> Result<()> {
        let cluster_id = self.cluster_of_service(service_id)?;
        let ctx = self.context(cluster_id)?;
        ctx.services.stop_service(service_id, force)?;
        self.sync_balancer_pool(&ctx, service_id)?;
        Ok(())
    }

    pub fn scale_service(&self, service_id: ServiceId, target: u32) -> Result<()> {
        let cluster_id = self.cluster_of_service(service_id)?;
        let ctx = self.context(cluster_id)?;
        ctx.services.scale_service(service_id, target)?;
        self.sync_balancer_pool(&ctx, service_id)?;
        Ok(())
    }

    pub fn update_service(&self, service_id: ServiceId, new_spec: ServiceSpec) -> Result<()> {
        let cluster_id = self.cluster_of_service(service_id)?;
        let ctx = self.context(cluster_id)?;
        ctx.services.update_service(service_id, new_spec)?;
        self.sync_balancer_pool(&ctx, service_id)?;
        Ok(())
    }

    pub fn get_cluster_info(&self, cluster_id: ClusterId) -> Result<ClusterInfo> {
        Ok(self.context(cluster_id)?.cluster.info())
    }

    /// Free-text description passed to `create_cluster`; `ClusterInfo`
    /// itself carries no such field, since it mirrors spec.md's `Cluster`
    /// record exactly.
    pub fn cluster_description(&self, cluster_id: ClusterId) -> Result<String> {
        Ok(self.context(cluster_id)?.description.clone())
    }

    pub fn get_service_info(&self, service_id: ServiceId) -> Result<ServiceInfo> {
        let cluster_id = self.cluster_of_service(service_id)?;
        Ok(self.context(cluster_id)?.services.get_service_info(service_id)?)
    }

    /// Picks a replica endpoint for `service_id` (§4.F `pick`). The
    /// in-flight count is incremented on return; callers finish a request
    /// by calling [`OperatorApi::release_replica`].
    pub fn pick_replica(&self, service_id: ServiceId, client_key: Option<&str>) -> Result<Endpoint> {
        let cluster_id = self.cluster_of_service(service_id)?;
        let ctx = self.context(cluster_id)?;
        let replica_id = ctx.balancer.pick(service_id, client_key)?;
        let replica = ctx
            .services
            .get_replica(dslos_service::ReplicaId(replica_id.0))
            .ok_or_else(|| DslosError::Config(format!("picked replica {replica_id:?} has no service-manager record")))?;
        let node = ctx.cluster.get_node(replica.node_id).ok_or(dslos_cluster::ClusterError::NotFound(replica.node_id))?;
        Ok(node.endpoint)
    }

    pub fn release_replica(&self, service_id: ServiceId, replica_id: dslos_balancer::ReplicaId) -> Result<()> {
        let cluster_id = self.cluster_of_service(service_id)?;
        self.context(cluster_id)?.balancer.release(service_id, replica_id);
        Ok(())
    }

    /// Mirrors a service's current replica set into its load-balancer
    /// pool: endpoint resolved from the owning node, health flag carried
    /// over from the replica's probe state. Runs after every service
    /// mutation so `pick_replica` never serves a stale replica list.
    fn sync_balancer_pool(&self, ctx: &ClusterContext, service_id: ServiceId) -> Result<()> {
        let info = ctx.services.get_service_info(service_id)?;
        let mut entries = Vec::with_capacity(info.replicas.len());
        for replica in &info.replicas {
            let Some(node) = ctx.cluster.get_node(replica.node_id) else { continue };
            let mut entry = ReplicaEntry::new(dslos_balancer::ReplicaId(replica.id.0), node.endpoint, 1);
            entry.healthy = replica.health == ReplicaHealth::Healthy;
            entries.push(entry);
        }
        ctx.balancer.set_replicas(service_id, entries)?;
        Ok(())
    }

    /// Reports a health probe result for a replica and keeps the balancer
    /// pool's health flags in sync with the service manager's view.
    pub fn record_probe_result(&self, service_id: ServiceId, replica_id: dslos_service::ReplicaId, healthy: bool) -> Result<()> {
        let cluster_id = self.cluster_of_service(service_id)?;
        let ctx = self.context(cluster_id)?;
        ctx.services.record_probe_result(replica_id, healthy)?;
        ctx.balancer.set_health(service_id, dslos_balancer::ReplicaId(replica_id.0), healthy)?;
        Ok(())
    }

    /// Drives one tick across every hosted cluster: cluster membership
    /// (failure detection or election timeout), the resulting failover
    /// reposition pass, and each online node's local scheduler.
    pub fn tick_all(&self) {
        let now = self.clock.now();
        for entry in self.clusters.iter() {
            let ctx = entry.value();
            let failed = ctx.cluster.tick(now);
            for node_id in failed {
                warn!(cluster = entry.key().0, node = node_id.0, "node failed, triggering reposition");
                ctx.services.handle_node_failed(node_id);
            }
            for scheduler in ctx.schedulers.iter() {
                scheduler.value().tick(now);
            }
        }
    }

    /// Writes one checkpoint file per cluster this node currently leads,
    /// named `<checkpoint_path>/cluster-<id>.json` (§6 "one file per
    /// cluster"). Called on the `checkpoint_interval_ticks` cadence and on
    /// every metadata commit by the caller driving the tick loop.
    pub async fn checkpoint_all(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.config.checkpoint_path).await.map_err(dslos_wire::WireError::from)?;
        for entry in self.clusters.iter() {
            let ctx = entry.value();
            if !ctx.cluster.is_leader() {
                continue;
            }
            let info = ctx.cluster.info();
            let service_specs = info
                .services
                .iter()
                .filter_map(|id| ctx.services.get_service_info(*id).ok().map(|s| (*id, s.spec)))
                .collect();
            let replica_assignments = info
                .services
                .iter()
                .filter_map(|id| {
                    ctx.services.get_service_info(*id).ok().map(|s| {
                        let assignments = s
                            .replicas
                            .iter()
                            .map(|r| dslos_wire::ReplicaAssignment { replica_id: r.id, node_id: r.node_id })
                            .collect();
                        (*id, assignments)
                    })
                })
                .collect();

            let checkpoint = ClusterCheckpoint {
                cluster_id: info.id,
                config: info.config,
                term: info.term,
                nodes: info.nodes,
                service_specs,
                replica_assignments,
            };
            let path: PathBuf = self.config.checkpoint_path.join(format!("cluster-{}.json", info.id.0));
            checkpoint.save_atomic(&path).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use dslos_clock::TestClock;
    use dslos_service::{HealthCheckSpec, UpdateStrategy};

    use super::*;

    fn sample_spec(name: &str) -> ServiceSpec {
        ServiceSpec {
            name: name.into(),
            service_type: "web".into(),
            image: "example/web:latest".into(),
            command: vec![],
            env: HashMap::new(),
            resource_request: Resources { cpu_count: 1, memory_mb: 128, storage_mb: 0 },
            resource_limits: Resources { cpu_count: 2, memory_mb: 256, storage_mb: 0 },
            health_check: HealthCheckSpec::default(),
            min_replicas: 1,
            max_replicas: 3,
            target_replicas: 2,
            update_strategy: UpdateStrategy::Recreate,
            required_capabilities: 0,
        }
    }

    fn api() -> OperatorApi {
        OperatorApi::new(DslosConfig::default(), Arc::new(TestClock::new()))
    }

    #[test]
    fn single_node_service_reaches_running_and_is_pickable() {
        let api = api();
        let cluster_id = api.create_cluster("c1", "test cluster", Endpoint::new("coordinator", 9000), None).unwrap();
        api.join_cluster(
            cluster_id,
            NodeJoinRequest {
                name: "w1".into(),
                endpoint: Endpoint::new("w1", 9001),
                node_type: NodeType::Worker,
                capabilities: 0,
                capacity: Resources { cpu_count: 8, memory_mb: 16_384, storage_mb: 0 },
                cpu_count: 4,
            },
        )
        .unwrap();

        let service_id = api.create_service(cluster_id, sample_spec("web")).unwrap();
        api.start_service(service_id).unwrap();

        let info = api.get_service_info(service_id).unwrap();
        assert_eq!(info.state, dslos_service::ServiceState::Starting);
        assert_eq!(info.replicas.len(), 2);
        for replica in &info.replicas {
            api.record_probe_result(service_id, replica.id, true).unwrap();
        }
        assert_eq!(api.get_service_info(service_id).unwrap().state, dslos_service::ServiceState::Running);

        let endpoint = api.pick_replica(service_id, None).unwrap();
        assert_eq!(endpoint, Endpoint::new("w1", 9001));
    }

    #[test]
    fn unindexed_service_id_is_reported_not_found() {
        let api = api();
        let err = api.get_service_info(ServiceId(999)).unwrap_err();
        assert!(matches!(err, DslosError::ServiceNotIndexed(_)));
    }

    #[test]
    fn tick_all_marks_a_silent_node_failed_and_reposts_its_replicas() {
        let clock = Arc::new(TestClock::new());
        let api = OperatorApi::new(DslosConfig::default(), clock.clone());
        let cluster_id = api.create_cluster("c1", "d", Endpoint::new("coordinator", 9000), None).unwrap();
        let w1 = api
            .join_cluster(
                cluster_id,
                NodeJoinRequest {
                    name: "w1".into(),
                    endpoint: Endpoint::new("w1", 9001),
                    node_type: NodeType::Worker,
                    capabilities: 0,
                    capacity: Resources { cpu_count: 8, memory_mb: 16_384, storage_mb: 0 },
                    cpu_count: 4,
                },
            )
            .unwrap();
        api.join_cluster(
            cluster_id,
            NodeJoinRequest {
                name: "w2".into(),
                endpoint: Endpoint::new("w2", 9002),
                node_type: NodeType::Worker,
                capabilities: 0,
                capacity: Resources { cpu_count: 8, memory_mb: 16_384, storage_mb: 0 },
                cpu_count: 4,
            },
        )
        .unwrap();

        let service_id = api.create_service(cluster_id, sample_spec("web")).unwrap();
        api.start_service(service_id).unwrap();

        // w1 never refreshes its heartbeat; advance well past failover_timeout.
        clock.advance(DslosConfig::default().cluster.failover_timeout + 1);
        api.tick_all();

        let info = api.get_cluster_info(cluster_id).unwrap();
        let w1_node = info.nodes.iter().find(|n| n.id == w1).expect("w1 stays in the registry once failed");
        assert_eq!(w1_node.state, dslos_cluster::NodeState::Error);
    }
}
