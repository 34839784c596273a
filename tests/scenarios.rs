//! End-to-end scenarios (spec.md §8) exercised through the wired
//! `OperatorApi`, covering paths no single subsystem crate's own test
//! suite reaches on its own: cluster + service + scheduler + balancer
//! glued together the way a real deployment would use them.

use std::collections::HashMap;
use std::sync::Arc;

use dslos::api::{NodeJoinRequest, OperatorApi};
use dslos::config::DslosConfig;
use dslos_balancer::BalancerAlgorithm;
use dslos_clock::TestClock;
use dslos_cluster::{ClusterId, Endpoint, NodeType, Resources};
use dslos_service::{HealthCheckSpec, ReplicaHealth, ServiceSpec, ServiceState, UpdateStrategy};

fn sample_spec(name: &str, target: u32, strategy: UpdateStrategy) -> ServiceSpec {
    ServiceSpec {
        name: name.into(),
        service_type: "web".into(),
        image: "example/web:v1".into(),
        command: vec![],
        env: HashMap::new(),
        resource_request: Resources { cpu_count: 1, memory_mb: 64, storage_mb: 0 },
        resource_limits: Resources { cpu_count: 1, memory_mb: 128, storage_mb: 0 },
        health_check: HealthCheckSpec::default(),
        min_replicas: 1,
        max_replicas: 4,
        target_replicas: target,
        update_strategy: strategy,
        required_capabilities: 0,
    }
}

fn two_node_cluster() -> (Arc<OperatorApi>, ClusterId) {
    let api = Arc::new(OperatorApi::new(DslosConfig::default(), Arc::new(TestClock::new())));
    let cluster_id = api.create_cluster("c", "scenario cluster", Endpoint::new("coordinator", 9000), None).unwrap();
    for i in 0..2u16 {
        api.join_cluster(
            cluster_id,
            NodeJoinRequest {
                name: format!("w{i}"),
                endpoint: Endpoint::new("w", 9001 + i),
                node_type: NodeType::Worker,
                capabilities: 0,
                capacity: Resources { cpu_count: 8, memory_mb: 8_192, storage_mb: 0 },
                cpu_count: 4,
            },
        )
        .unwrap();
    }
    (api, cluster_id)
}

/// Scenario 1: a single-node service reaches `Running` and is pickable.
#[test]
fn single_node_service_reaches_running_and_is_pickable() {
    let api = Arc::new(OperatorApi::new(DslosConfig::default(), Arc::new(TestClock::new())));
    let cluster_id = api.create_cluster("solo", "one node", Endpoint::new("coordinator", 9000), None).unwrap();
    api.join_cluster(
        cluster_id,
        NodeJoinRequest {
            name: "only".into(),
            endpoint: Endpoint::new("only", 9001),
            node_type: NodeType::Worker,
            capabilities: 0,
            capacity: Resources { cpu_count: 4, memory_mb: 4_096, storage_mb: 0 },
            cpu_count: 4,
        },
    )
    .unwrap();

    let service_id = api.create_service(cluster_id, sample_spec("solo-web", 1, UpdateStrategy::Recreate)).unwrap();
    api.start_service(service_id).unwrap();

    let info = api.get_service_info(service_id).unwrap();
    assert_eq!(info.state, ServiceState::Starting);

    for replica in &info.replicas {
        api.record_probe_result(service_id, replica.id, true).unwrap();
    }
    assert_eq!(api.get_service_info(service_id).unwrap().state, ServiceState::Running);

    let endpoint = api.pick_replica(service_id, None).unwrap();
    assert_eq!(endpoint, Endpoint::new("only", 9001));
}

/// Scenario 2: a rolling update converges once new-generation replicas
/// report healthy, and old-generation replicas are fully retired.
#[test]
fn rolling_update_converges_once_new_replicas_report_healthy() {
    let (api, cluster_id) = two_node_cluster();
    let strategy = UpdateStrategy::RollingUpdate { max_surge: 1, max_unavailable: 0 };
    let service_id = api.create_service(cluster_id, sample_spec("web", 2, strategy)).unwrap();
    api.start_service(service_id).unwrap();

    for replica in &api.get_service_info(service_id).unwrap().replicas {
        api.record_probe_result(service_id, replica.id, true).unwrap();
    }
    assert_eq!(api.get_service_info(service_id).unwrap().state, ServiceState::Running);

    let mut new_spec = sample_spec("web", 2, strategy);
    new_spec.image = "example/web:v2".into();

    for _ in 0..12 {
        let info = api.get_service_info(service_id).unwrap();
        if info.state == ServiceState::Running && info.spec.image == "example/web:v2" {
            break;
        }
        api.update_service(service_id, new_spec.clone()).unwrap();
        for replica in &api.get_service_info(service_id).unwrap().replicas {
            if replica.health != ReplicaHealth::Healthy {
                api.record_probe_result(service_id, replica.id, true).unwrap();
            }
        }
    }

    let info = api.get_service_info(service_id).unwrap();
    assert_eq!(info.state, ServiceState::Running);
    assert_eq!(info.spec.image, "example/web:v2");
    let first_generation = info.replicas[0].spec_generation;
    assert!(info.replicas.iter().all(|r| r.spec_generation == first_generation), "rollout must retire every old-generation replica");
}

/// Scenario 4: LeastConnections spreads picks within the required
/// fairness bound (±5%, here trivially exact for two equal-capacity
/// replicas with no releases between picks).
#[test]
fn least_connections_distributes_picks_within_fairness_bound() {
    let (api, cluster_id) = two_node_cluster();
    let service_id = api.create_service(cluster_id, sample_spec("lb", 2, UpdateStrategy::Recreate)).unwrap();
    api.start_service(service_id).unwrap();
    for replica in &api.get_service_info(service_id).unwrap().replicas {
        api.record_probe_result(service_id, replica.id, true).unwrap();
    }
    api.set_balancer_algorithm(service_id, BalancerAlgorithm::LeastConnections).unwrap();

    let mut counts: HashMap<Endpoint, u32> = HashMap::new();
    for _ in 0..20 {
        let endpoint = api.pick_replica(service_id, None).unwrap();
        *counts.entry(endpoint).or_insert(0) += 1;
    }

    assert_eq!(counts.len(), 2, "both replica endpoints must have been picked");
    for count in counts.values() {
        let deviation = (*count as f64 - 10.0).abs() / 10.0;
        assert!(deviation <= 0.05, "pick distribution {counts:?} exceeds the ±5% fairness bound");
    }
}

/// A silently-failed node is detected on the next tick and its replicas
/// are repositioned rather than left stranded.
#[test]
fn node_failure_triggers_reposition_via_tick_all() {
    let clock = Arc::new(TestClock::new());
    let api = Arc::new(OperatorApi::new(DslosConfig::default(), clock.clone()));
    let cluster_id = api.create_cluster("c", "d", Endpoint::new("coordinator", 9000), None).unwrap();
    let failing_node = api
        .join_cluster(
            cluster_id,
            NodeJoinRequest {
                name: "doomed".into(),
                endpoint: Endpoint::new("doomed", 9001),
                node_type: NodeType::Worker,
                capabilities: 0,
                capacity: Resources { cpu_count: 4, memory_mb: 4_096, storage_mb: 0 },
                cpu_count: 4,
            },
        )
        .unwrap();
    api.join_cluster(
        cluster_id,
        NodeJoinRequest {
            name: "spare".into(),
            endpoint: Endpoint::new("spare", 9002),
            node_type: NodeType::Worker,
            capabilities: 0,
            capacity: Resources { cpu_count: 4, memory_mb: 4_096, storage_mb: 0 },
            cpu_count: 4,
        },
    )
    .unwrap();

    let service_id = api.create_service(cluster_id, sample_spec("web", 1, UpdateStrategy::Recreate)).unwrap();
    api.start_service(service_id).unwrap();

    clock.advance(DslosConfig::default().cluster.failover_timeout + 1);
    api.tick_all();

    let info = api.get_cluster_info(cluster_id).unwrap();
    let doomed = info.nodes.iter().find(|n| n.id == failing_node).expect("failed node stays in the registry");
    assert_eq!(doomed.state, dslos_cluster::NodeState::Error);
}
