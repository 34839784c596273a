//! Top-level error aggregation: per-crate error enums rolled into one
//! type via `#[from]`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DslosError {
    #[error("scheduler error: {0}")]
    Scheduler(#[from] dslos_scheduler::SchedulerError),

    #[error("cluster error: {0}")]
    Cluster(#[from] dslos_cluster::ClusterError),

    #[error("service error: {0}")]
    Service(#[from] dslos_service::ServiceError),

    #[error("load balancer error: {0}")]
    Balancer(#[from] dslos_balancer::BalancerError),

    #[error("wire error: {0}")]
    Wire(#[from] dslos_wire::WireError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("cluster {0:?} not found")]
    ClusterNotFound(dslos_cluster::ClusterId),

    #[error("service {0:?} is not registered with any known cluster")]
    ServiceNotIndexed(dslos_cluster::ServiceId),
}

pub type Result<T> = std::result::Result<T, DslosError>;

/// Maps a [`DslosError`] onto the CLI exit codes (§6): 0 success, 1 invalid
/// args, 2 not-leader, 3 quorum-lost, 4 timeout, 5 internal.
impl DslosError {
    pub fn exit_code(&self) -> i32 {
        match self {
            DslosError::Cluster(dslos_cluster::ClusterError::NotLeader(_))
            | DslosError::Service(dslos_service::ServiceError::NotLeader(_)) => 2,
            DslosError::Cluster(dslos_cluster::ClusterError::QuorumLost) => 3,
            DslosError::Service(dslos_service::ServiceError::Timeout) => 4,
            DslosError::Cluster(dslos_cluster::ClusterError::InvalidParameter(_))
            | DslosError::Service(dslos_service::ServiceError::InvalidSpec(_))
            | DslosError::Config(_) => 1,
            _ => 5,
        }
    }
}
