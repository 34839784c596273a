//! Replica-pool entries (§3 "Replica", §4.F table).

use dslos_cluster::Endpoint;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReplicaId(pub u64);

/// One row of §4.F's `(replica_id, endpoint, weight, in_flight_count,
/// healthy_flag)` table. `in_flight` is tracked separately as an atomic
/// counter (§5 "Replica `in_flight_count`") rather than stored here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicaEntry {
    pub replica_id: ReplicaId,
    pub endpoint: Endpoint,
    pub weight: u32,
    pub healthy: bool,
}

impl ReplicaEntry {
    pub fn new(replica_id: ReplicaId, endpoint: Endpoint, weight: u32) -> Self {
        Self { replica_id, endpoint, weight: weight.max(1), healthy: true }
    }
}
