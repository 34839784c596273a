//! Service data model (§3 "Service", "Replica").

use std::collections::HashMap;

use dslos_clock::Tick;
use dslos_cluster::{ClusterId, NodeId, Resources, ServiceId};
use dslos_scheduler::RunnableId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReplicaId(pub u64);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheckSpec {
    pub command: Option<String>,
    pub endpoint: Option<String>,
    pub interval_ticks: u64,
}

impl Default for HealthCheckSpec {
    fn default() -> Self {
        Self { command: None, endpoint: None, interval_ticks: 1_000 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateStrategy {
    Recreate,
    RollingUpdate { max_surge: u32, max_unavailable: u32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceSpec {
    pub name: String,
    pub service_type: String,
    pub image: String,
    pub command: Vec<String>,
    pub env: HashMap<String, String>,
    pub resource_request: Resources,
    pub resource_limits: Resources,
    pub health_check: HealthCheckSpec,
    pub min_replicas: u32,
    pub max_replicas: u32,
    pub target_replicas: u32,
    pub update_strategy: UpdateStrategy,
    /// Capabilities a placement node should match; bitwise overlap with
    /// `Node::capabilities` ranks placement candidates (§4.E step 1).
    pub required_capabilities: u64,
}

impl ServiceSpec {
    pub fn validate(&self) -> Result<(), String> {
        if self.min_replicas > self.max_replicas {
            return Err("min_replicas exceeds max_replicas".into());
        }
        if self.target_replicas < self.min_replicas || self.target_replicas > self.max_replicas {
            return Err("target_replicas out of [min_replicas, max_replicas]".into());
        }
        if self.name.is_empty() {
            return Err("name must not be empty".into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceState {
    Created,
    Starting,
    Running,
    Stopping,
    Stopped,
    Error,
    Updating,
    Scaling,
    /// Service-local state distinct from cluster `Degraded`: a failover
    /// re-placement could not be satisfied, but the service has not yet
    /// dropped below `min_replicas`.
    Degraded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplicaHealth {
    Starting,
    Healthy,
    Unhealthy,
    Gone,
}

pub const UNHEALTHY_AFTER_FAILURES: u32 = 3;
pub const GONE_AFTER_FAILURES: u32 = 6;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Replica {
    pub id: ReplicaId,
    pub service_id: ServiceId,
    pub node_id: NodeId,
    pub runnable_ids: Vec<RunnableId>,
    pub health: ReplicaHealth,
    pub last_probe: Option<Tick>,
    pub consecutive_failures: u32,
    /// Which `update_service` generation of the spec this replica was
    /// placed under; used to tell old from new replicas mid-rollout.
    pub spec_generation: u64,
}

impl Replica {
    pub fn record_probe(&mut self, healthy: bool, now: Tick) {
        self.last_probe = Some(now);
        if healthy {
            self.consecutive_failures = 0;
            if self.health != ReplicaHealth::Gone {
                self.health = ReplicaHealth::Healthy;
            }
        } else {
            self.consecutive_failures += 1;
            if self.consecutive_failures >= GONE_AFTER_FAILURES {
                self.health = ReplicaHealth::Gone;
            } else if self.consecutive_failures >= UNHEALTHY_AFTER_FAILURES {
                self.health = ReplicaHealth::Unhealthy;
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub id: ServiceId,
    pub cluster_id: ClusterId,
    pub spec: ServiceSpec,
    pub state: ServiceState,
    pub replicas: Vec<ReplicaId>,
    pub spec_generation: u64,
    /// Target spec while `state == Updating`; cleared once the rollout
    /// reaches the new generation.
    pub pending_spec: Option<ServiceSpec>,
}

/// Read-only view returned by `ServiceManager::get_service_info`, with
/// replica ids expanded into their full records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub id: ServiceId,
    pub cluster_id: ClusterId,
    pub spec: ServiceSpec,
    pub state: ServiceState,
    pub replicas: Vec<Replica>,
}
