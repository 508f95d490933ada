//! Configuration management for the cluster harness.
//!
//! Provides hierarchical configuration loading with priority:
//! 1. Default values (hardcoded)
//! 2. Optional scenario config file
//! 3. Environment variables (highest priority)

mod cluster;
mod monitoring;
mod retry;
mod security;
pub use cluster::*;
pub use monitoring::*;
pub use retry::*;
pub use security::*;

#[cfg(test)]
mod config_test;

//---
use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;

use crate::Result;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    /// Cluster shape: shard count, replica-set size, router count
    #[serde(default)]
    pub cluster: ClusterSpec,
    /// Metrics endpoint settings
    #[serde(default)]
    pub monitoring: MonitoringConfig,
    /// Poll policies for convergence checks and lifecycle waits
    #[serde(default)]
    pub retry: RetryPolicies,
    /// Authentication and TLS material
    #[serde(default)]
    pub security: SecurityConfig,
}

impl Settings {
    /// Load configuration with priority:
    /// 1. Hardcoded defaults (every field has one)
    /// 2. Scenario config file, when given
    /// 3. Environment variables (highest priority)
    ///
    /// # Arguments
    /// * `scenario_path` - Optional path to a scenario-specific config file
    pub fn load(scenario_path: Option<&str>) -> Result<Self> {
        let mut config = Config::builder();

        if let Some(path) = scenario_path {
            config = config.add_source(File::with_name(path).required(true));
        }

        config = config.add_source(
            Environment::with_prefix("SHARDKIT")
                .separator("__")
                .ignore_empty(true)
                .try_parsing(true),
        );

        let settings: Settings = config.build()?.try_deserialize()?;
        settings.cluster.validate()?;
        Ok(settings)
    }
}
