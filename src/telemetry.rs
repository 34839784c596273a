//! Ambient telemetry: `tracing_subscriber` init plus `prometheus`
//! counters/gauges gathered on demand.

use tracing_subscriber::EnvFilter;

use crate::config::DslosConfig;

/// Installs the global tracing subscriber. Call once at process start;
/// a second call is a no-op rather than a panic, since tests may init
/// more than one `DslosConfig`-driven component in the same process.
pub fn init(config: &DslosConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    let result = if config.log_format == "json" {
        subscriber.json().try_init()
    } else {
        subscriber.try_init()
    };
    if let Err(e) = result {
        tracing::debug!(error = %e, "tracing subscriber already installed");
    }
}

pub mod metrics {
    //! Scheduler/cluster/service/balancer statistics exported as
    //! `prometheus` gauges/counters (§4.C "Statistics", membership vote
    //! counts, service transition counts, LB pick counts), gathered on
    //! demand rather than pushed.

    use prometheus::{Encoder, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};

    pub struct Metrics {
        registry: Registry,
        pub scheduler_context_switches: IntCounterVec,
        pub scheduler_ready_queue_len: IntGaugeVec,
        pub cluster_votes_received: IntCounterVec,
        pub cluster_online_nodes: IntGaugeVec,
        pub service_state_transitions: IntCounterVec,
        pub balancer_picks: IntCounterVec,
    }

    impl Metrics {
        pub fn new() -> Self {
            let registry = Registry::new();

            let scheduler_context_switches = IntCounterVec::new(
                Opts::new("dslos_scheduler_context_switches_total", "context switches performed per cpu"),
                &["cpu"],
            )
            .expect("static metric descriptor");
            let scheduler_ready_queue_len = IntGaugeVec::new(
                Opts::new("dslos_scheduler_ready_queue_len", "current ready queue length per cpu"),
                &["cpu"],
            )
            .expect("static metric descriptor");
            let cluster_votes_received = IntCounterVec::new(
                Opts::new("dslos_cluster_votes_received_total", "election votes received"),
                &["cluster_id"],
            )
            .expect("static metric descriptor");
            let cluster_online_nodes = IntGaugeVec::new(
                Opts::new("dslos_cluster_online_nodes", "currently online node count"),
                &["cluster_id"],
            )
            .expect("static metric descriptor");
            let service_state_transitions = IntCounterVec::new(
                Opts::new("dslos_service_state_transitions_total", "service lifecycle state transitions"),
                &["service_id", "to_state"],
            )
            .expect("static metric descriptor");
            let balancer_picks = IntCounterVec::new(
                Opts::new("dslos_balancer_picks_total", "replica picks served per service"),
                &["service_id"],
            )
            .expect("static metric descriptor");

            registry.register(Box::new(scheduler_context_switches.clone())).expect("unique metric name");
            registry.register(Box::new(scheduler_ready_queue_len.clone())).expect("unique metric name");
            registry.register(Box::new(cluster_votes_received.clone())).expect("unique metric name");
            registry.register(Box::new(cluster_online_nodes.clone())).expect("unique metric name");
            registry.register(Box::new(service_state_transitions.clone())).expect("unique metric name");
            registry.register(Box::new(balancer_picks.clone())).expect("unique metric name");

            Self {
                registry,
                scheduler_context_switches,
                scheduler_ready_queue_len,
                cluster_votes_received,
                cluster_online_nodes,
                service_state_transitions,
                balancer_picks,
            }
        }

        /// Renders the current registry in Prometheus text exposition format.
        pub fn gather(&self) -> String {
            let encoder = TextEncoder::new();
            let families = self.registry.gather();
            let mut buf = Vec::new();
            encoder.encode(&families, &mut buf).expect("text encoding never fails for valid metric families");
            String::from_utf8(buf).expect("prometheus text encoder emits valid utf-8")
        }
    }

    impl Default for Metrics {
        fn default() -> Self {
            Self::new()
        }
    }

}
