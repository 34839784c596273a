//! Ambient configuration: a TOML file layered with `DSLOS_`-prefixed
//! environment overrides via the `config` crate.

use std::path::PathBuf;

use config::{Config, Environment, File};
use dslos_cluster::ConsistencyLevel;
use serde::{Deserialize, Serialize};

use crate::error::{DslosError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterDefaults {
    pub max_nodes: u32,
    pub replication_factor: u32,
    pub consistency_level: ConsistencyLevel,
    /// H, in ticks.
    pub heartbeat_interval: u64,
    /// F, in ticks.
    pub failover_timeout: u64,
    pub quorum_override: Option<u32>,
}

impl Default for ClusterDefaults {
    fn default() -> Self {
        Self {
            max_nodes: 64,
            replication_factor: 1,
            consistency_level: ConsistencyLevel::default(),
            heartbeat_interval: 100,
            failover_timeout: 300,
            quorum_override: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerDefaults {
    pub base_quantum_ms: u64,
    pub load_balance_interval_ms: u64,
    pub starvation_threshold_ticks: u64,
}

impl Default for SchedulerDefaults {
    fn default() -> Self {
        Self { base_quantum_ms: 10, load_balance_interval_ms: 100, starvation_threshold_ticks: 500 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DslosConfig {
    pub cluster: ClusterDefaults,
    pub scheduler: SchedulerDefaults,
    pub checkpoint_path: PathBuf,
    pub checkpoint_interval_ticks: u64,
    pub bind_endpoint: String,
    pub log_level: String,
    /// `human` or `json`.
    pub log_format: String,
}

impl Default for DslosConfig {
    fn default() -> Self {
        Self {
            cluster: ClusterDefaults::default(),
            scheduler: SchedulerDefaults::default(),
            checkpoint_path: PathBuf::from("./dslos-checkpoints"),
            checkpoint_interval_ticks: 150,
            bind_endpoint: "0.0.0.0:7420".into(),
            log_level: "info".into(),
            log_format: "human".into(),
        }
    }
}

impl DslosConfig {
    /// Loads defaults, then an optional TOML file, then `DSLOS_*`
    /// environment variables, in that order of increasing precedence.
    pub fn load(config_file: Option<&PathBuf>) -> Result<Self> {
        let defaults = Self::default();
        let mut builder = Config::builder()
            .set_default("cluster.max_nodes", defaults.cluster.max_nodes as i64)
            .map_err(config_err)?
            .set_default("cluster.replication_factor", defaults.cluster.replication_factor as i64)
            .map_err(config_err)?
            .set_default("cluster.heartbeat_interval", defaults.cluster.heartbeat_interval as i64)
            .map_err(config_err)?
            .set_default("cluster.failover_timeout", defaults.cluster.failover_timeout as i64)
            .map_err(config_err)?
            .set_default("scheduler.base_quantum_ms", defaults.scheduler.base_quantum_ms as i64)
            .map_err(config_err)?
            .set_default("scheduler.load_balance_interval_ms", defaults.scheduler.load_balance_interval_ms as i64)
            .map_err(config_err)?
            .set_default("scheduler.starvation_threshold_ticks", defaults.scheduler.starvation_threshold_ticks as i64)
            .map_err(config_err)?
            .set_default("checkpoint_path", defaults.checkpoint_path.to_string_lossy().to_string())
            .map_err(config_err)?
            .set_default("checkpoint_interval_ticks", defaults.checkpoint_interval_ticks as i64)
            .map_err(config_err)?
            .set_default("bind_endpoint", defaults.bind_endpoint.clone())
            .map_err(config_err)?
            .set_default("log_level", defaults.log_level.clone())
            .map_err(config_err)?
            .set_default("log_format", defaults.log_format.clone())
            .map_err(config_err)?;

        if let Some(path) = config_file {
            builder = builder.add_source(File::from(path.as_path()).required(false));
        } else {
            builder = builder.add_source(File::with_name("dslos").required(false));
        }

        builder = builder.add_source(Environment::with_prefix("DSLOS").separator("__"));

        let built = builder.build().map_err(config_err)?;
        built.try_deserialize().map_err(config_err)
    }
}

fn config_err(e: config::ConfigError) -> DslosError {
    DslosError::Config(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_values() {
        let cfg = DslosConfig::default();
        assert_eq!(cfg.cluster.max_nodes, 64);
        assert_eq!(cfg.scheduler.base_quantum_ms, 10);
        assert_eq!(cfg.bind_endpoint, "0.0.0.0:7420");
    }

    #[test]
    fn load_with_no_file_falls_back_to_defaults() {
        let cfg = DslosConfig::load(None).expect("defaults alone must build");
        assert_eq!(cfg.cluster.heartbeat_interval, 100);
    }
}
