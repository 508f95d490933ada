use std::collections::HashSet;
use std::sync::Arc;

use tracing::error;
use tracing::info;

use super::ClusterTopology;
use super::ShardDescriptor;
use crate::clock::LogicalClock;
use crate::store::ShardStore;
use crate::store::ShardingCatalog;
use crate::NodeOptions;
use crate::NodeRole;
use crate::NodeSupervisor;
use crate::Result;
use crate::Settings;
use crate::TopologyError;

/// Assembles supervised nodes into a logical cluster.
pub struct TopologyManager {
    supervisor: Arc<NodeSupervisor>,
    settings: Settings,
}

impl TopologyManager {
    pub fn new(settings: Settings) -> Self {
        let supervisor = Arc::new(NodeSupervisor::new(settings.retry.startup, settings.retry.shutdown));
        Self { supervisor, settings }
    }

    pub fn supervisor(&self) -> &Arc<NodeSupervisor> {
        &self.supervisor
    }

    /// Builds the cluster described by the settings: one config server,
    /// `shards` replica sets of `replicas_per_shard` members, and `routers`
    /// router instances.
    ///
    /// Node/process errors are fatal to the scenario: any startup failure
    /// tears down every node started so far before returning.
    pub async fn build_cluster(&self) -> Result<ClusterTopology> {
        self.settings.cluster.validate()?;

        match self.try_build().await {
            Ok(topology) => Ok(topology),
            Err(e) => {
                error!("cluster build failed, cleaning up started nodes: {:?}", e);
                self.supervisor.shutdown_all().await;
                Err(e)
            }
        }
    }

    async fn try_build(&self) -> Result<ClusterTopology> {
        let spec = &self.settings.cluster;
        let shard_names = spec.shard_names();

        let mut seen = HashSet::new();
        for name in &shard_names {
            if !seen.insert(name.clone()) {
                return Err(TopologyError::DuplicateShardName(name.clone()).into());
            }
        }

        let clock = Arc::new(LogicalClock::new());
        let catalog = Arc::new(ShardingCatalog::new());
        let mut next_port = spec.base_port;

        let mut take_port = || {
            if next_port == 0 {
                0
            } else {
                let port = next_port;
                next_port += 1;
                port
            }
        };

        let base_options = NodeOptions::from_security(&self.settings.security);

        let config_server = self
            .supervisor
            .start(
                NodeRole::ConfigServer,
                NodeOptions {
                    port: take_port(),
                    ..base_options.clone()
                },
                Arc::new(ShardStore::new()),
                clock.clone(),
            )
            .await?;

        let mut shards = Vec::with_capacity(spec.shards);
        for name in &shard_names {
            // replica-set members share the shard's store
            let store = Arc::new(ShardStore::new());
            let mut members = Vec::with_capacity(spec.replicas_per_shard);
            for _ in 0..spec.replicas_per_shard {
                let member = self
                    .supervisor
                    .start(
                        NodeRole::Shard,
                        NodeOptions {
                            port: take_port(),
                            replica_set: Some(name.clone()),
                            ..base_options.clone()
                        },
                        store.clone(),
                        clock.clone(),
                    )
                    .await?;
                members.push(member);
            }
            shards.push(ShardDescriptor {
                name: name.clone(),
                members,
            });
        }

        let mut routers = Vec::with_capacity(spec.routers);
        for _ in 0..spec.routers {
            let router = self
                .supervisor
                .start(
                    NodeRole::Router,
                    NodeOptions {
                        port: take_port(),
                        ..base_options.clone()
                    },
                    Arc::new(ShardStore::new()),
                    clock.clone(),
                )
                .await?;
            routers.push(router);
        }

        info!(
            "cluster ready: {} shard(s) x {} member(s), {} router(s)",
            spec.shards, spec.replicas_per_shard, spec.routers
        );

        Ok(ClusterTopology {
            shards,
            config_server,
            routers,
            catalog,
            clock,
            supervisor: self.supervisor.clone(),
        })
    }
}
