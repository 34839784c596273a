//! Cluster-level identity and configuration (§3 "Cluster").

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClusterId(pub u64);

/// Shared with `dslos-service`, which owns no cluster state of its own —
/// the cluster tracks which service ids belong to it (§3 ownership summary).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ServiceId(pub u64);

/// Declared but intentionally inert: accepted, stored, and surfaced via
/// `get_cluster_info`, without changing write-acknowledgement behavior.
/// See DESIGN.md ("Consistency level L").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsistencyLevel {
    One,
    Quorum,
    All,
}

impl Default for ConsistencyLevel {
    fn default() -> Self {
        ConsistencyLevel::Quorum
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub max_nodes: u32,
    pub replication_factor: u32,
    pub consistency_level: ConsistencyLevel,
    /// H, in ticks.
    pub heartbeat_interval: u64,
    /// F, in ticks; must be >= 3*heartbeat_interval.
    pub failover_timeout: u64,
    /// Overrides the computed `floor(N/2)+1` quorum when set.
    pub quorum_override: Option<u32>,
}

impl ClusterConfig {
    pub fn new(max_nodes: u32, replication_factor: u32, heartbeat_interval: u64) -> Self {
        Self {
            max_nodes,
            replication_factor,
            consistency_level: ConsistencyLevel::default(),
            heartbeat_interval,
            failover_timeout: heartbeat_interval * 3,
            quorum_override: None,
        }
    }

    pub fn suspected_after(&self) -> u64 {
        self.heartbeat_interval * 2
    }

    pub fn election_timeout_range(&self) -> (u64, u64) {
        (self.heartbeat_interval * 2, self.heartbeat_interval * 4)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClusterState {
    Initializing,
    Active,
    Degraded,
    Maintenance,
    Terminated,
}
