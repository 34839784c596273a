use dslos_cluster::NodeId;
use thiserror::Error;

use crate::types::{ReplicaId, ServiceState};
use dslos_cluster::ServiceId;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ServiceError {
    #[error("invalid service spec: {0}")]
    InvalidSpec(String),

    #[error("insufficient resources to satisfy the request")]
    InsufficientResources,

    #[error("service {0:?} not found")]
    NotFound(ServiceId),

    #[error("replica {0:?} not found")]
    ReplicaNotFound(ReplicaId),

    #[error("not the leader of the current term")]
    NotLeader(Option<NodeId>),

    #[error("conflicting state {0:?}")]
    Conflict(ServiceState),

    #[error("operation timed out")]
    Timeout,
}

pub type Result<T> = std::result::Result<T, ServiceError>;
