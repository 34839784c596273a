use dslos_cluster::ServiceId;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BalancerError {
    #[error("service {0:?} has no registered replica pool")]
    PoolNotFound(ServiceId),

    #[error("no healthy replica available")]
    NoHealthyReplica,

    #[error("IpHash requires a client_key")]
    ClientKeyRequired,
}

pub type Result<T> = std::result::Result<T, BalancerError>;
