//! Placement policy (§4.E step 1-2): bin-pack by resource request, spread
//! by failure domain (node).

use std::collections::HashMap;

use dslos_cluster::{Node, NodeId};

use crate::types::ServiceSpec;

/// Rank Online nodes by `(capability match desc, free_cpu desc, free_mem
/// desc, existing_replicas_of_this_service asc)` and keep only those with
/// enough free capacity for the request.
pub fn rank_candidates(nodes: &[Node], spec: &ServiceSpec, replicas_per_node: &HashMap<NodeId, u32>) -> Vec<Node> {
    let mut candidates: Vec<Node> = nodes
        .iter()
        .filter(|n| spec.resource_request.fits_within(n.free_capacity()))
        .cloned()
        .collect();

    candidates.sort_by(|a, b| {
        let match_a = (a.capabilities & spec.required_capabilities).count_ones();
        let match_b = (b.capabilities & spec.required_capabilities).count_ones();
        match_b
            .cmp(&match_a)
            .then_with(|| b.free_capacity().cpu_count.cmp(&a.free_capacity().cpu_count))
            .then_with(|| b.free_capacity().memory_mb.cmp(&a.free_capacity().memory_mb))
            .then_with(|| {
                let ra = replicas_per_node.get(&a.id).copied().unwrap_or(0);
                let rb = replicas_per_node.get(&b.id).copied().unwrap_or(0);
                ra.cmp(&rb)
            })
    });
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use dslos_cluster::{Endpoint, NodeState, NodeType, Resources};
    use std::collections::HashMap;

    fn node(id: u64, free_cpu: u32) -> Node {
        Node {
            id: NodeId(id),
            name: format!("n{id}"),
            endpoint: Endpoint::new("h", id as u16),
            node_type: NodeType::Worker,
            capabilities: 0,
            capacity: Resources { cpu_count: free_cpu, memory_mb: 8192, storage_mb: 100_000 },
            allocated: Resources::default(),
            state: NodeState::Online,
            last_heartbeat: dslos_clock::Tick(0),
            missed_heartbeats: 0,
            health_score: 100,
            master: false,
        }
    }

    fn spec() -> ServiceSpec {
        ServiceSpec {
            name: "s".into(),
            service_type: "stateless".into(),
            image: "img".into(),
            command: vec![],
            env: Default::default(),
            resource_request: Resources { cpu_count: 1, memory_mb: 1024, storage_mb: 0 },
            resource_limits: Resources::default(),
            health_check: Default::default(),
            min_replicas: 1,
            max_replicas: 4,
            target_replicas: 2,
            update_strategy: crate::types::UpdateStrategy::Recreate,
            required_capabilities: 0,
        }
    }

    #[test]
    fn prefers_node_with_more_free_capacity() {
        let nodes = vec![node(1, 2), node(2, 8)];
        let ranked = rank_candidates(&nodes, &spec(), &HashMap::new());
        assert_eq!(ranked[0].id, NodeId(2));
    }

    #[test]
    fn excludes_nodes_without_enough_free_capacity() {
        let nodes = vec![node(1, 0)];
        let ranked = rank_candidates(&nodes, &spec(), &HashMap::new());
        assert!(ranked.is_empty());
    }

    #[test]
    fn spreads_by_existing_replica_count_when_otherwise_tied() {
        let nodes = vec![node(1, 4), node(2, 4)];
        let mut existing = HashMap::new();
        existing.insert(NodeId(1), 2);
        let ranked = rank_candidates(&nodes, &spec(), &existing);
        assert_eq!(ranked[0].id, NodeId(2));
    }
}
