//! `dslos` operator CLI: a clap-derived, noun-verb command surface over
//! [`dslos::api::OperatorApi`].
//!
//! Exit codes: 0 success, 1 invalid args, 2 not-leader, 3 quorum-lost, 4
//! timeout, 5 internal.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use dslos::api::{NodeJoinRequest, OperatorApi};
use dslos::config::DslosConfig;
use dslos::telemetry::{self, metrics::Metrics};
use dslos_cluster::{Endpoint, NodeType, Resources};
use dslos_service::ServiceSpec;
use tracing::info;

#[derive(Parser)]
#[command(name = "dslos")]
#[command(about = "DslOS distributed scheduling and service orchestration core")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (TOML); falls back to `./dslos.toml` if unset.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single-process cluster: one coordinator plus `--workers`
    /// worker nodes, ticking until `--ticks` elapses (or forever if unset).
    Serve {
        #[arg(long, default_value_t = 2)]
        workers: u32,
        /// Number of scheduler/cluster ticks to run; omit to run until Ctrl-C.
        #[arg(long)]
        ticks: Option<u64>,
        #[arg(long, default_value_t = 1)]
        tick_interval_ms: u64,
    },

    /// Validate a service spec file (JSON) against §4.E's invariants
    /// without needing a running cluster.
    ValidateSpec {
        #[arg(long)]
        file: PathBuf,
    },

    /// Print the fully resolved configuration (defaults + file + env) as JSON.
    ShowConfig,

    /// Print an empty Prometheus exposition snapshot, to confirm metric
    /// names wire up without a running cluster.
    Metrics,
}

fn print_error_and_exit(message: impl std::fmt::Display, code: i32) -> ! {
    eprintln!("error: {message}");
    std::process::exit(code);
}

fn exit_on_dslos_error(e: dslos::DslosError) -> ! {
    let code = e.exit_code();
    print_error_and_exit(e, code);
}

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    let config = match DslosConfig::load(cli.config.as_ref()) {
        Ok(c) => c,
        Err(e) => print_error_and_exit(e, 1),
    };
    telemetry::init(&config);

    match cli.command {
        Commands::Serve { workers, ticks, tick_interval_ms } => run_serve(config, workers, ticks, tick_interval_ms).await,
        Commands::ValidateSpec { file } => run_validate_spec(&file),
        Commands::ShowConfig => run_show_config(&config),
        Commands::Metrics => run_metrics(),
    }
}

async fn run_serve(config: DslosConfig, workers: u32, ticks: Option<u64>, tick_interval_ms: u64) {
    let clock = Arc::new(dslos_clock::SystemClock::new());
    let api = Arc::new(OperatorApi::new(config.clone(), clock));

    let coordinator_endpoint = Endpoint(config.bind_endpoint.clone());
    let cluster_id = match api.create_cluster("primary", "single-process demo cluster", coordinator_endpoint, None) {
        Ok(id) => id,
        Err(e) => exit_on_dslos_error(e),
    };
    info!(cluster = cluster_id.0, "cluster bootstrapped");

    for i in 0..workers {
        let request = NodeJoinRequest {
            name: format!("worker-{i}"),
            endpoint: Endpoint::new("127.0.0.1", 9100 + i as u16),
            node_type: NodeType::Worker,
            capabilities: 0,
            capacity: Resources { cpu_count: 8, memory_mb: 16_384, storage_mb: 102_400 },
            cpu_count: 8,
        };
        if let Err(e) = api.join_cluster(cluster_id, request) {
            exit_on_dslos_error(e);
        }
    }
    info!(workers, "workers joined");

    let mut interval = tokio::time::interval(Duration::from_millis(tick_interval_ms));
    let mut elapsed: u64 = 0;
    loop {
        tokio::select! {
            _ = interval.tick() => {
                api.tick_all();
                elapsed += 1;
                if elapsed % config.checkpoint_interval_ticks.max(1) == 0 {
                    if let Err(e) = api.checkpoint_all().await {
                        tracing::error!(error = %e, "checkpoint failed");
                    }
                }
                if let Some(limit) = ticks {
                    if elapsed >= limit {
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c(), if ticks.is_none() => {
                info!("received ctrl-c, shutting down");
                break;
            }
        }
    }

    if let Err(e) = api.checkpoint_all().await {
        tracing::error!(error = %e, "final checkpoint failed");
    }
}

fn run_validate_spec(file: &PathBuf) {
    let contents = match std::fs::read_to_string(file) {
        Ok(c) => c,
        Err(e) => print_error_and_exit(format!("reading {}: {e}", file.display()), 1),
    };
    let spec: ServiceSpec = match serde_json::from_str(&contents) {
        Ok(s) => s,
        Err(e) => print_error_and_exit(format!("parsing {}: {e}", file.display()), 1),
    };
    match spec.validate() {
        Ok(()) => println!("spec is valid"),
        Err(e) => print_error_and_exit(e, 1),
    }
}

fn run_show_config(config: &DslosConfig) {
    match serde_json::to_string_pretty(config) {
        Ok(json) => println!("{json}"),
        Err(e) => print_error_and_exit(e, 5),
    }
}

fn run_metrics() {
    let metrics = Metrics::new();
    print!("{}", metrics.gather());
}
