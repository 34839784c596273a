use thiserror::Error;

use crate::node::NodeId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClusterError {
    #[error("cluster has reached its configured node limit")]
    ClusterFull,

    #[error("cluster not found")]
    ClusterNotFound,

    #[error("endpoint is already a member of the cluster")]
    AlreadyMember,

    #[error("node {0:?} not found")]
    NotFound(NodeId),

    #[error("not the leader of the current term")]
    NotLeader(Option<NodeId>),

    #[error("quorum lost, cluster is degraded")]
    QuorumLost,

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

pub type Result<T> = std::result::Result<T, ClusterError>;
