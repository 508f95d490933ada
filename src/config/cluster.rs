use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Result;

/// Shape of the cluster a scenario asks the topology manager to build.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ClusterSpec {
    /// Number of shards (each a replica set)
    #[serde(default = "default_shards")]
    pub shards: usize,

    /// Replica-set members per shard
    #[serde(default = "default_replicas_per_shard")]
    pub replicas_per_shard: usize,

    /// Router instances fronting the cluster
    #[serde(default = "default_routers")]
    pub routers: usize,

    /// Shard names are `<prefix><ordinal>`, e.g. `shard0`
    #[serde(default = "default_shard_name_prefix")]
    pub shard_name_prefix: String,

    /// First listen port; 0 means pick ephemeral ports per node
    #[serde(default)]
    pub base_port: u16,
}

impl Default for ClusterSpec {
    fn default() -> Self {
        Self {
            shards: default_shards(),
            replicas_per_shard: default_replicas_per_shard(),
            routers: default_routers(),
            shard_name_prefix: default_shard_name_prefix(),
            base_port: 0,
        }
    }
}

impl ClusterSpec {
    /// Validates the cluster shape
    /// # Errors
    /// Returns a `ConfigError` if any rule is violated
    pub fn validate(&self) -> Result<()> {
        if self.shards == 0 {
            return Err(ConfigError::Message("cluster must declare at least one shard".into()).into());
        }
        if self.replicas_per_shard == 0 {
            return Err(ConfigError::Message("each shard needs at least one replica member".into()).into());
        }
        if self.routers == 0 {
            return Err(ConfigError::Message("cluster must declare at least one router".into()).into());
        }
        if self.shard_name_prefix.is_empty() {
            return Err(ConfigError::Message("shard_name_prefix cannot be empty".into()).into());
        }
        Ok(())
    }

    /// Declared shard names, in order. The first one is the deterministic
    /// primary-shard tie-break for newly enabled databases.
    pub fn shard_names(&self) -> Vec<String> {
        (0..self.shards).map(|i| format!("{}{}", self.shard_name_prefix, i)).collect()
    }
}

fn default_shards() -> usize {
    2
}
fn default_replicas_per_shard() -> usize {
    1
}
fn default_routers() -> usize {
    1
}
fn default_shard_name_prefix() -> String {
    "shard".to_string()
}
