//! Wire framing, message kinds, and leader checkpoint persistence (§6).
//!
//! This crate owns only the encodings: the `Transport` collaborator that
//! actually moves frames between nodes, and the `Storage` collaborator
//! DslsFS would back a checkpoint with, are out of scope (§6) and left to
//! the caller to supply.

pub mod checkpoint;
pub mod error;
pub mod message;

pub use checkpoint::{ClusterCheckpoint, ReplicaAssignment};
pub use error::{Result, WireError};
pub use message::{
    read_frame, write_frame, Frame, HealthProbeResultMsg, HeartbeatMsg, LeaderMsg, MessageKind, MetadataAckMsg,
    MetadataProposeMsg, Message, ReplicaPlaceMsg, ReplicaStatusMsg, VoteMsg,
};
