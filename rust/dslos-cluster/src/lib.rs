//! Cluster Membership (§4.D): node registry, heartbeat-based failure
//! detection, and bounded-fairness leader election.
//!
//! Each process runs one [`ClusterNode`], mirroring its own view of the
//! cluster the way a Raft participant tracks its own term and role; the
//! `Transport` collaborator (§6, out of scope here) is responsible for
//! actually delivering `Vote`/`Leader`/heartbeat messages between nodes.

pub mod config;
pub mod error;
pub mod node;

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use dslos_clock::{Clock, Tick};
use parking_lot::RwLock;
use rand::Rng;
use tracing::{info, warn};

pub use config::{ClusterConfig, ClusterId, ClusterState, ConsistencyLevel, ServiceId};
pub use error::{ClusterError, Result};
pub use node::{classify_node, Endpoint, MembershipStatus, Node, NodeId, NodeState, NodeType, Resources};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Follower,
    Candidate,
    Leader,
}

#[derive(Debug, Clone)]
pub struct ClusterInfo {
    pub id: ClusterId,
    pub name: String,
    pub config: ClusterConfig,
    pub state: ClusterState,
    pub role: Role,
    pub term: u64,
    pub leader: Option<NodeId>,
    pub nodes: Vec<Node>,
    pub services: Vec<ServiceId>,
}

pub struct ClusterNode {
    pub id: NodeId,
    pub cluster_id: ClusterId,
    name: RwLock<String>,
    config: RwLock<ClusterConfig>,
    state: RwLock<ClusterState>,
    role: RwLock<Role>,
    term: AtomicU64,
    voted_for: RwLock<Option<(u64, NodeId)>>,
    votes_received: DashMap<u64, HashSet<NodeId>>,
    leader: RwLock<Option<NodeId>>,
    nodes: DashMap<NodeId, Node>,
    endpoint_index: DashMap<Endpoint, NodeId>,
    services: DashMap<ServiceId, ()>,
    next_node_id: AtomicU64,
    clock: Arc<dyn Clock>,
    election_deadline: RwLock<Tick>,
}

impl ClusterNode {
    pub fn new(id: NodeId, cluster_id: ClusterId, name: impl Into<String>, config: ClusterConfig, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        Self {
            id,
            cluster_id,
            name: RwLock::new(name.into()),
            config: RwLock::new(config),
            state: RwLock::new(ClusterState::Initializing),
            role: RwLock::new(Role::Follower),
            term: AtomicU64::new(0),
            voted_for: RwLock::new(None),
            votes_received: DashMap::new(),
            leader: RwLock::new(None),
            nodes: DashMap::new(),
            endpoint_index: DashMap::new(),
            services: DashMap::new(),
            next_node_id: AtomicU64::new(1),
            clock,
            election_deadline: RwLock::new(now),
        }
    }

    pub fn config(&self) -> ClusterConfig {
        *self.config.read()
    }

    pub fn state(&self) -> ClusterState {
        *self.state.read()
    }

    pub fn role(&self) -> Role {
        *self.role.read()
    }

    pub fn term(&self) -> u64 {
        self.term.load(Ordering::SeqCst)
    }

    pub fn leader(&self) -> Option<NodeId> {
        *self.leader.read()
    }

    pub fn is_leader(&self) -> bool {
        matches!(self.role(), Role::Leader)
    }

    /// Q = floor(N/2) + 1 over currently registered nodes, unless
    /// overridden in `CLUSTER_CONFIG` (§4.D "Quorum rule").
    pub fn quorum(&self) -> u32 {
        let cfg = self.config.read();
        cfg.quorum_override.unwrap_or_else(|| (self.nodes.len() as u32) / 2 + 1).max(1)
    }

    pub fn online_count(&self) -> usize {
        self.nodes.iter().filter(|e| e.value().state.is_online()).count()
    }

    fn reset_election_deadline(&self, now: Tick) {
        let (lo, hi) = self.config.read().election_timeout_range();
        let timeout = if hi > lo { rand::thread_rng().gen_range(lo..=hi) } else { lo };
        *self.election_deadline.write() = now.saturating_add(timeout);
    }

    /// §4.D `join`: registers a new node under a fresh id.
    pub fn join(&self, name: impl Into<String>, endpoint: Endpoint, node_type: NodeType, capabilities: u64, capacity: Resources) -> Result<NodeId> {
        let cfg = self.config.read();
        if self.nodes.len() as u32 >= cfg.max_nodes {
            return Err(ClusterError::ClusterFull);
        }
        drop(cfg);
        if self.endpoint_index.contains_key(&endpoint) {
            return Err(ClusterError::AlreadyMember);
        }

        let node_id = NodeId(self.next_node_id.fetch_add(1, Ordering::Relaxed));
        let now = self.clock.now();
        let mut node = Node::new(node_id, name, endpoint.clone(), node_type, capabilities, capacity, now);
        node.state = NodeState::Online;

        self.nodes.insert(node_id, node);
        self.endpoint_index.insert(endpoint, node_id);

        if matches!(self.state(), ClusterState::Initializing) && self.online_count() as u32 >= self.quorum() && self.leader().is_none() {
            self.start_election(now);
        }

        info!(node = node_id.0, cluster = self.cluster_id.0, "node joined");
        Ok(node_id)
    }

    /// §4.D node removal: `leave()` or reaping after failure.
    pub fn leave(&self, node_id: NodeId) -> Result<()> {
        let (_, node) = self.nodes.remove(&node_id).ok_or(ClusterError::NotFound(node_id))?;
        self.endpoint_index.remove(&node.endpoint);
        if self.leader() == Some(node_id) {
            *self.leader.write() = None;
        }
        info!(node = node_id.0, "node left");
        Ok(())
    }

    /// Idempotent: duplicate heartbeats advance `last_heartbeat` to the max
    /// observed timestamp and never inflate `missed_heartbeats`.
    pub fn record_heartbeat(&self, node_id: NodeId, sent_at: Tick) {
        if let Some(mut node) = self.nodes.get_mut(&node_id) {
            if sent_at > node.last_heartbeat {
                node.last_heartbeat = sent_at;
            }
            node.missed_heartbeats = 0;
            if node.state == NodeState::Error {
                node.state = NodeState::Online;
            }
        }
    }

    pub fn membership_status(&self, node_id: NodeId, now: Tick) -> Option<MembershipStatus> {
        self.nodes.get(&node_id).map(|n| classify_node(&n, &self.config.read(), now))
    }

    /// Leader-only: marks newly-Failed nodes (§4.D) and returns their ids
    /// so the service manager can react (failover, §4.E).
    fn detect_failures(&self, now: Tick) -> Vec<NodeId> {
        let cfg = self.config.read();
        let mut failed = Vec::new();
        for mut entry in self.nodes.iter_mut() {
            let node = entry.value_mut();
            if node.master {
                continue;
            }
            match classify_node(node, &cfg, now) {
                MembershipStatus::Failed => {
                    node.missed_heartbeats = node.missed_heartbeats.saturating_add(1);
                    if node.state != NodeState::Error {
                        node.state = NodeState::Error;
                        warn!(node = node.id.0, missed = node.missed_heartbeats, "node failed (no heartbeat within failover_timeout)");
                        failed.push(node.id);
                    }
                }
                MembershipStatus::Suspected => {
                    node.missed_heartbeats = node.missed_heartbeats.saturating_add(1);
                    warn!(node = node.id.0, missed = node.missed_heartbeats, "node suspected (no heartbeat within 2*heartbeat_interval)");
                }
                MembershipStatus::Healthy => {}
            }
        }
        failed
    }

    /// §4.D bounded-fairness election: begin candidacy for a new term.
    pub fn start_election(&self, now: Tick) {
        let term = self.term.fetch_add(1, Ordering::SeqCst) + 1;
        *self.role.write() = Role::Candidate;
        *self.voted_for.write() = Some((term, self.id));
        let mut voters = HashSet::new();
        voters.insert(self.id);
        self.votes_received.insert(term, voters);
        *self.leader.write() = None;
        self.reset_election_deadline(now);
        info!(term, node = self.id.0, "starting election");

        if self.quorum() <= 1 {
            self.become_leader(term);
        }
    }

    /// §4.D `Vote(term, candidate_id)` handler. Ties within a term are
    /// broken by lowest node id.
    pub fn request_vote(&self, term: u64, candidate: NodeId, now: Tick) -> bool {
        let current = self.term.load(Ordering::SeqCst);
        if term < current {
            return false;
        }
        if term > current {
            self.term.store(term, Ordering::SeqCst);
            *self.role.write() = Role::Follower;
            *self.voted_for.write() = None;
            *self.leader.write() = None;
        }
        self.reset_election_deadline(now);

        let mut voted = self.voted_for.write();
        match *voted {
            None => {
                *voted = Some((term, candidate));
                true
            }
            Some((t, c)) if t < term => {
                *voted = Some((term, candidate));
                true
            }
            Some((t, c)) if t == term => {
                if c == candidate {
                    true
                } else if candidate.0 < c.0 {
                    *voted = Some((term, candidate));
                    true
                } else {
                    false
                }
            }
            _ => false,
        }
    }

    /// Record a vote grant from `voter` for `term`; becomes leader once Q
    /// votes are collected.
    pub fn record_vote_grant(&self, term: u64, voter: NodeId) -> bool {
        if self.term.load(Ordering::SeqCst) != term || !matches!(self.role(), Role::Candidate) {
            return false;
        }
        let mut entry = self.votes_received.entry(term).or_default();
        entry.insert(voter);
        let count = entry.len() as u32;
        drop(entry);
        if count >= self.quorum() {
            self.become_leader(term);
            true
        } else {
            false
        }
    }

    fn become_leader(&self, term: u64) {
        *self.role.write() = Role::Leader;
        *self.leader.write() = Some(self.id);
        if let Some(mut n) = self.nodes.get_mut(&self.id) {
            n.master = true;
        }
        if matches!(self.state(), ClusterState::Initializing | ClusterState::Degraded) {
            *self.state.write() = ClusterState::Active;
        }
        info!(term, node = self.id.0, "became leader");
    }

    /// `Leader(term, id)` handler: losers adopt the announced leader.
    pub fn receive_leader(&self, term: u64, leader_id: NodeId, now: Tick) -> bool {
        let current = self.term.load(Ordering::SeqCst);
        if term < current {
            return false;
        }
        self.term.store(term, Ordering::SeqCst);
        *self.role.write() = Role::Follower;
        *self.leader.write() = Some(leader_id);
        if let Some(mut n) = self.nodes.get_mut(&self.id) {
            n.master = leader_id == self.id;
        }
        self.reset_election_deadline(now);
        true
    }

    pub fn step_down(&self) {
        *self.role.write() = Role::Follower;
        *self.leader.write() = None;
        if let Some(mut n) = self.nodes.get_mut(&self.id) {
            n.master = false;
        }
    }

    fn election_due(&self, now: Tick) -> bool {
        !matches!(self.role(), Role::Leader) && self.leader().is_none() && now.has_passed(*self.election_deadline.read())
    }

    /// Split-brain defense (§4.D): metadata writes require leadership and
    /// quorum reachability.
    pub fn check_quorum_for_write(&self) -> Result<()> {
        if !self.is_leader() {
            return Err(ClusterError::NotLeader(self.leader()));
        }
        if self.online_count() as u32 >= self.quorum() {
            Ok(())
        } else {
            *self.state.write() = ClusterState::Degraded;
            Err(ClusterError::QuorumLost)
        }
    }

    /// Drive failure detection (if leader) or election timeout (if not),
    /// once per caller-defined tick. Returns newly-Failed node ids.
    pub fn tick(&self, now: Tick) -> Vec<NodeId> {
        if self.is_leader() {
            let failed = self.detect_failures(now);
            if self.online_count() as u32 >= self.quorum() {
                if matches!(self.state(), ClusterState::Degraded) {
                    *self.state.write() = ClusterState::Active;
                }
            } else {
                *self.state.write() = ClusterState::Degraded;
            }
            failed
        } else {
            if self.election_due(now) {
                self.start_election(now);
            }
            Vec::new()
        }
    }

    /// Reserve resources against a node's current allocation (§3 Node
    /// "current allocation"); used by the service manager during
    /// placement. Fails if the node is unknown or lacks free capacity.
    pub fn reserve(&self, node_id: NodeId, amount: Resources) -> Result<()> {
        let mut node = self.nodes.get_mut(&node_id).ok_or(ClusterError::NotFound(node_id))?;
        if !amount.fits_within(node.free_capacity()) {
            return Err(ClusterError::InvalidParameter("insufficient free capacity".into()));
        }
        node.allocated = node.allocated.add(amount);
        Ok(())
    }

    pub fn release(&self, node_id: NodeId, amount: Resources) {
        if let Some(mut node) = self.nodes.get_mut(&node_id) {
            node.allocated = node.allocated.saturating_sub(amount);
        }
    }

    pub fn online_nodes_snapshot(&self) -> Vec<Node> {
        self.nodes.iter().filter(|e| e.value().state.is_online()).map(|e| e.value().clone()).collect()
    }

    pub fn register_service(&self, service_id: ServiceId) {
        self.services.insert(service_id, ());
    }

    pub fn unregister_service(&self, service_id: ServiceId) {
        self.services.remove(&service_id);
    }

    pub fn get_node(&self, node_id: NodeId) -> Option<Node> {
        self.nodes.get(&node_id).map(|n| n.clone())
    }

    pub fn nodes_snapshot(&self) -> Vec<Node> {
        self.nodes.iter().map(|e| e.value().clone()).collect()
    }

    pub fn info(&self) -> ClusterInfo {
        ClusterInfo {
            id: self.cluster_id,
            name: self.name.read().clone(),
            config: self.config(),
            state: self.state(),
            role: self.role(),
            term: self.term(),
            leader: self.leader(),
            nodes: self.nodes_snapshot(),
            services: self.services.iter().map(|e| *e.key()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dslos_clock::TestClock;

    fn node(id: u64, cfg: ClusterConfig) -> ClusterNode {
        ClusterNode::new(NodeId(id), ClusterId(1), format!("n{id}"), cfg, Arc::new(TestClock::new()))
    }

    fn cap() -> Resources {
        Resources { cpu_count: 4, memory_mb: 4096, storage_mb: 20_000 }
    }

    #[test]
    fn single_node_cluster_becomes_leader_immediately() {
        let cfg = ClusterConfig::new(1, 1, 100);
        let n1 = node(1, cfg);
        n1.join("n1", Endpoint::new("127.0.0.1", 9001), NodeType::Worker, 0, cap()).unwrap();
        assert!(n1.is_leader());
        assert_eq!(n1.quorum(), 1);
    }

    #[test]
    fn join_rejects_duplicate_endpoint() {
        let cfg = ClusterConfig::new(5, 1, 100);
        let n1 = node(1, cfg);
        let ep = Endpoint::new("127.0.0.1", 9001);
        n1.join("a", ep.clone(), NodeType::Worker, 0, cap()).unwrap();
        let result = n1.join("b", ep, NodeType::Worker, 0, cap());
        assert_eq!(result, Err(ClusterError::AlreadyMember));
    }

    #[test]
    fn join_rejects_beyond_max_nodes() {
        let cfg = ClusterConfig::new(1, 1, 100);
        let n1 = node(1, cfg);
        n1.join("a", Endpoint::new("h", 1), NodeType::Worker, 0, cap()).unwrap();
        let result = n1.join("b", Endpoint::new("h", 2), NodeType::Worker, 0, cap());
        assert_eq!(result, Err(ClusterError::ClusterFull));
    }

    #[test]
    fn quorum_write_fails_when_not_leader() {
        let cfg = ClusterConfig::new(5, 1, 100);
        let n1 = node(1, cfg);
        assert_eq!(n1.check_quorum_for_write(), Err(ClusterError::NotLeader(None)));
    }

    #[test]
    fn vote_is_granted_once_per_term_with_lowest_id_tiebreak() {
        let cfg = ClusterConfig::new(5, 1, 100);
        let n1 = node(5, cfg);
        let now = Tick(0);
        assert!(n1.request_vote(1, NodeId(7), now));
        // Same term, higher-id requester should not overturn the vote.
        assert!(!n1.request_vote(1, NodeId(9), now));
        // Same term, lower-id requester overturns by bounded-fairness tiebreak.
        assert!(n1.request_vote(1, NodeId(2), now));
    }

    #[test]
    fn quorum_of_votes_elects_a_leader() {
        let cfg = ClusterConfig::new(5, 1, 100);
        let candidate = node(1, cfg);
        candidate.join("a", Endpoint::new("h", 1), NodeType::Worker, 0, cap()).unwrap();
        candidate.join("b", Endpoint::new("h", 2), NodeType::Worker, 0, cap()).unwrap();
        candidate.join("c", Endpoint::new("h", 3), NodeType::Worker, 0, cap()).unwrap();
        candidate.start_election(Tick(0));
        assert_eq!(candidate.quorum(), 2);
        assert!(!candidate.is_leader());
        assert!(candidate.record_vote_grant(candidate.term(), NodeId(2)));
        assert!(candidate.is_leader());
    }

    #[test]
    fn heartbeat_is_idempotent_and_advances_to_max_timestamp() {
        let cfg = ClusterConfig::new(5, 1, 100);
        let leader = node(1, cfg);
        let id = leader.join("a", Endpoint::new("h", 1), NodeType::Worker, 0, cap()).unwrap();
        leader.record_heartbeat(id, Tick(50));
        leader.record_heartbeat(id, Tick(10));
        leader.record_heartbeat(id, Tick(50));
        assert_eq!(leader.get_node(id).unwrap().last_heartbeat, Tick(50));
        assert_eq!(leader.get_node(id).unwrap().missed_heartbeats, 0);
    }

    #[test]
    fn node_without_heartbeat_is_marked_failed_after_failover_timeout() {
        let cfg = ClusterConfig::new(5, 1, 10);
        let leader = node(1, cfg);
        leader.join("leader", Endpoint::new("h", 0), NodeType::Worker, 0, cap()).unwrap();
        let worker = leader.join("w", Endpoint::new("h", 1), NodeType::Worker, 0, cap()).unwrap();
        leader.start_election(Tick(0));
        leader.record_vote_grant(leader.term(), worker);
        assert!(leader.is_leader());

        assert_eq!(leader.membership_status(worker, Tick(5)), Some(MembershipStatus::Healthy));
        assert_eq!(leader.membership_status(worker, Tick(25)), Some(MembershipStatus::Suspected));
        assert_eq!(leader.membership_status(worker, Tick(35)), Some(MembershipStatus::Failed));

        let failed = leader.tick(Tick(35));
        assert_eq!(failed, vec![worker]);
        assert_eq!(leader.get_node(worker).unwrap().state, NodeState::Error);
    }

    #[test]
    fn missed_heartbeats_counts_suspected_and_failed_ticks_then_resets() {
        let cfg = ClusterConfig::new(5, 1, 10);
        let leader = node(1, cfg);
        leader.join("leader", Endpoint::new("h", 0), NodeType::Worker, 0, cap()).unwrap();
        let worker = leader.join("w", Endpoint::new("h", 1), NodeType::Worker, 0, cap()).unwrap();
        leader.start_election(Tick(0));
        leader.record_vote_grant(leader.term(), worker);
        assert!(leader.is_leader());

        leader.tick(Tick(25));
        assert_eq!(leader.get_node(worker).unwrap().missed_heartbeats, 1);
        leader.tick(Tick(35));
        assert_eq!(leader.get_node(worker).unwrap().missed_heartbeats, 2);

        leader.record_heartbeat(worker, Tick(35));
        assert_eq!(leader.get_node(worker).unwrap().missed_heartbeats, 0);
    }

    #[test]
    fn losing_quorum_transitions_cluster_to_degraded() {
        let cfg = ClusterConfig::new(5, 1, 10);
        let leader = node(1, cfg);
        leader.join("leader", Endpoint::new("h", 0), NodeType::Worker, 0, cap()).unwrap();
        let w1 = leader.join("w1", Endpoint::new("h", 1), NodeType::Worker, 0, cap()).unwrap();
        let w2 = leader.join("w2", Endpoint::new("h", 2), NodeType::Worker, 0, cap()).unwrap();
        leader.start_election(Tick(0));
        assert_eq!(leader.quorum(), 2);
        leader.record_vote_grant(leader.term(), w1);
        assert!(leader.is_leader());

        leader.leave(w1).unwrap();
        leader.leave(w2).unwrap();
        leader.tick(Tick(1));
        assert_eq!(leader.state(), ClusterState::Degraded);
    }
}
