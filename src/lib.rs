//! DslOS distributed core: Advanced Scheduler + Distributed Cluster &
//! Service Manager, wired together behind one operator-facing facade.
//!
//! Subsystems live in their own workspace crates (`dslos-clock`,
//! `dslos-scheduler`, `dslos-cluster`, `dslos-service`, `dslos-balancer`,
//! `dslos-wire`); this crate only assembles them.

pub mod api;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod telemetry;

pub use api::{NodeJoinRequest, OperatorApi};
pub use config::DslosConfig;
pub use error::{DslosError, Result};

pub use dslos_clock::{Clock, SystemClock, Tick};
