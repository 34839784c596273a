//! Leader checkpoint (§6 "Persisted state layout"): one JSON file per
//! cluster containing config, node roster, service specs, replica
//! assignments, and the current term, rewritten atomically (write-tmp +
//! rename) every `F/2` ticks and on every metadata commit.

use std::path::Path;

use dslos_cluster::{ClusterConfig, ClusterId, Node, NodeId, ServiceId};
use dslos_service::{ReplicaId, ServiceSpec};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReplicaAssignment {
    pub replica_id: ReplicaId,
    pub node_id: NodeId,
}

/// `service_specs`/`replica_assignments` are kept as association lists
/// rather than maps keyed by [`ServiceId`]: `serde_json` requires map keys
/// to serialize as strings, which a newtype-around-`u64` does not do by
/// default.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClusterCheckpoint {
    pub cluster_id: ClusterId,
    pub config: ClusterConfig,
    pub term: u64,
    pub nodes: Vec<Node>,
    pub service_specs: Vec<(ServiceId, ServiceSpec)>,
    pub replica_assignments: Vec<(ServiceId, Vec<ReplicaAssignment>)>,
}

impl ClusterCheckpoint {
    /// Write-tmp-then-rename so a crash mid-write never leaves a partially
    /// written checkpoint file in place of a valid one.
    pub async fn save_atomic(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self)?;
        let tmp_path = path.with_extension("tmp");
        {
            let mut file = tokio::fs::File::create(&tmp_path).await?;
            file.write_all(&json).await?;
            file.flush().await?;
            file.sync_all().await?;
        }
        tokio::fs::rename(&tmp_path, path).await?;
        Ok(())
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dslos_cluster::{Endpoint, NodeState, NodeType, Resources};

    fn sample() -> ClusterCheckpoint {
        let mut nodes = Vec::new();
        let mut node = Node::new(NodeId(1), "n1", Endpoint::new("h", 1), NodeType::Worker, 0, Resources { cpu_count: 4, memory_mb: 8192, storage_mb: 1000 }, dslos_clock::Tick(0));
        node.state = NodeState::Online;
        nodes.push(node);

        ClusterCheckpoint {
            cluster_id: ClusterId(1),
            config: ClusterConfig::new(8, 1, 100),
            term: 3,
            nodes,
            service_specs: Vec::new(),
            replica_assignments: Vec::new(),
        }
    }

    #[tokio::test]
    async fn writing_then_reading_a_checkpoint_yields_identical_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cluster-1.json");
        let checkpoint = sample();

        checkpoint.save_atomic(&path).await.unwrap();
        let loaded = ClusterCheckpoint::load(&path).await.unwrap();

        assert_eq!(loaded, checkpoint);
    }

    #[tokio::test]
    async fn save_atomic_leaves_no_tmp_file_behind_on_success() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cluster-1.json");
        sample().save_atomic(&path).await.unwrap();
        assert!(!path.with_extension("tmp").exists());
        assert!(path.exists());
    }
}
