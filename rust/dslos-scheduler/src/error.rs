use thiserror::Error;

use crate::runnable::RunnableId;

/// Errors the scheduler surfaces to callers. Scheduler operations otherwise
/// cannot fail.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("ready queue at capacity for cpu {cpu}, priority {priority}")]
    CapacityExceeded { cpu: u32, priority: u8 },

    #[error("runnable {0:?} not found")]
    NotFound(RunnableId),

    #[error("priority {0} out of range [0,31]")]
    InvalidPriority(u8),

    #[error("affinity mask is empty")]
    EmptyAffinity,

    #[error("affinity mask names no online cpu")]
    NoOnlineCpuInAffinity,

    #[error("cpu {0} is unknown")]
    UnknownCpu(u32),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
