//! Node registry data model (§3 "Node", §4.D "Node registry").

use dslos_clock::Tick;
use serde::{Deserialize, Serialize};

use crate::config::ClusterConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint(pub String);

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Endpoint(format!("{}:{}", host.into(), port))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeType {
    Worker,
    Master,
    Coordinator,
    Gateway,
    Storage,
    Compute,
    Network,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeState {
    Offline,
    Joining,
    Online,
    Busy,
    Maintenance,
    Draining,
    Leaving,
    Error,
}

impl NodeState {
    pub fn is_online(&self) -> bool {
        matches!(self, NodeState::Online | NodeState::Busy)
    }
}

/// Resource capacity or allocation triple (§3 "Node": resource capacity,
/// current allocation).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Resources {
    pub cpu_count: u32,
    pub memory_mb: u64,
    pub storage_mb: u64,
}

impl Resources {
    pub fn fits_within(&self, capacity: Resources) -> bool {
        self.cpu_count <= capacity.cpu_count && self.memory_mb <= capacity.memory_mb && self.storage_mb <= capacity.storage_mb
    }

    pub fn saturating_sub(&self, other: Resources) -> Resources {
        Resources {
            cpu_count: self.cpu_count.saturating_sub(other.cpu_count),
            memory_mb: self.memory_mb.saturating_sub(other.memory_mb),
            storage_mb: self.storage_mb.saturating_sub(other.storage_mb),
        }
    }

    pub fn add(&self, other: Resources) -> Resources {
        Resources {
            cpu_count: self.cpu_count + other.cpu_count,
            memory_mb: self.memory_mb + other.memory_mb,
            storage_mb: self.storage_mb + other.storage_mb,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub endpoint: Endpoint,
    pub node_type: NodeType,
    pub capabilities: u64,
    pub capacity: Resources,
    pub allocated: Resources,
    pub state: NodeState,
    pub last_heartbeat: Tick,
    /// Consecutive leader ticks this node has spent Suspected or Failed;
    /// reset to 0 by `record_heartbeat`.
    pub missed_heartbeats: u32,
    pub health_score: u8,
    pub master: bool,
}

impl Node {
    pub fn new(id: NodeId, name: impl Into<String>, endpoint: Endpoint, node_type: NodeType, capabilities: u64, capacity: Resources, now: Tick) -> Self {
        Self {
            id,
            name: name.into(),
            endpoint,
            node_type,
            capabilities,
            capacity,
            allocated: Resources::default(),
            state: NodeState::Joining,
            last_heartbeat: now,
            missed_heartbeats: 0,
            health_score: 100,
            master: false,
        }
    }

    pub fn free_capacity(&self) -> Resources {
        self.capacity.saturating_sub(self.allocated)
    }
}

/// Derived classification from heartbeat recency (§4.D), kept separate
/// from `NodeState` since Suspected/Failed are transient judgments, not
/// states a node actually occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipStatus {
    Healthy,
    Suspected,
    Failed,
}

pub fn classify_node(node: &Node, config: &ClusterConfig, now: Tick) -> MembershipStatus {
    let elapsed = now.saturating_sub(node.last_heartbeat);
    if elapsed > config.failover_timeout {
        MembershipStatus::Failed
    } else if elapsed > config.suspected_after() {
        MembershipStatus::Suspected
    } else {
        MembershipStatus::Healthy
    }
}
