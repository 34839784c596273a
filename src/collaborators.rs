//! Collaborator traits (§6): `Transport` and `Storage` are out of scope for
//! this core and are defined here only as the seams production adapters
//! plug into. `Clock` is `dslos_clock::Clock`, re-exported at the crate
//! root. In-memory test doubles are provided for wiring `OperatorApi` in
//! tests without a real network or disk.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use dslos_cluster::Endpoint;
use dslos_wire::Frame;

/// Moves framed bytes between nodes. A production implementation would
/// hold a `tokio::net::TcpStream` per peer; `InMemoryTransport` instead
/// loops frames back through a shared map, for tests that exercise the
/// wire encoding without a socket.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, to: &Endpoint, frame: Frame) -> std::io::Result<()>;
    async fn recv(&self, from: &Endpoint) -> std::io::Result<Option<Frame>>;
}

/// Persists bytes keyed by a logical name (a checkpoint file, a WAL
/// segment). `dslos_wire::ClusterCheckpoint` already implements its own
/// write-tmp-then-rename directly against `tokio::fs`; this trait exists
/// for callers that want to swap in a non-filesystem backend (DslsFS,
/// object storage) without touching the checkpoint format.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> std::io::Result<()>;
    async fn get(&self, key: &str) -> std::io::Result<Option<Vec<u8>>>;
}

/// Probes a replica's liveness out-of-band (HTTP health check, process
/// signal, command exit code). Results feed `ServiceManager::record_probe_result`.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn probe(&self, endpoint: &Endpoint) -> bool;
}

/// Loops frames back through a shared per-endpoint queue; every `send` to
/// an endpoint is immediately available to a subsequent `recv` from that
/// same endpoint.
#[derive(Default)]
pub struct InMemoryTransport {
    queues: DashMap<Endpoint, Vec<Frame>>,
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn send(&self, to: &Endpoint, frame: Frame) -> std::io::Result<()> {
        self.queues.entry(to.clone()).or_default().push(frame);
        Ok(())
    }

    async fn recv(&self, from: &Endpoint) -> std::io::Result<Option<Frame>> {
        Ok(self.queues.get_mut(from).and_then(|mut q| if q.is_empty() { None } else { Some(q.remove(0)) }))
    }
}

#[derive(Default)]
pub struct InMemoryStorage {
    entries: DashMap<String, Vec<u8>>,
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> std::io::Result<()> {
        self.entries.insert(key.to_string(), bytes);
        Ok(())
    }

    async fn get(&self, key: &str) -> std::io::Result<Option<Vec<u8>>> {
        Ok(self.entries.get(key).map(|v| v.clone()))
    }
}

/// Always reports healthy; a reasonable default for a cluster with no
/// real probe backend wired in yet.
pub struct AlwaysHealthyProbe;

#[async_trait]
impl HealthProbe for AlwaysHealthyProbe {
    async fn probe(&self, _endpoint: &Endpoint) -> bool {
        true
    }
}

/// Reports health per-endpoint from a table the test sets up, for
/// exercising failover/degradation paths deterministically.
#[derive(Default)]
pub struct ScriptedProbe {
    health: DashMap<Endpoint, bool>,
}

impl ScriptedProbe {
    pub fn set(&self, endpoint: Endpoint, healthy: bool) {
        self.health.insert(endpoint, healthy);
    }
}

#[async_trait]
impl HealthProbe for ScriptedProbe {
    async fn probe(&self, endpoint: &Endpoint) -> bool {
        self.health.get(endpoint).map(|v| *v).unwrap_or(true)
    }
}

pub type SharedTransport = Arc<dyn Transport>;
pub type SharedStorage = Arc<dyn Storage>;
pub type SharedHealthProbe = Arc<dyn HealthProbe>;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_transport_loops_frames_back() {
        let transport = InMemoryTransport::default();
        let ep = Endpoint::new("h", 1);
        let frame = Frame { kind: 0, payload: vec![1, 2, 3] };

        transport.send(&ep, frame).await.unwrap();
        let received = transport.recv(&ep).await.unwrap();
        assert!(received.is_some());
        assert!(transport.recv(&ep).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn scripted_probe_reports_configured_health() {
        let probe = ScriptedProbe::default();
        let ep = Endpoint::new("h", 1);
        probe.set(ep.clone(), false);
        assert!(!probe.probe(&ep).await);
    }
}
