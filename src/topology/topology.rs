use std::sync::Arc;

use crate::clock::LogicalClock;
use crate::store::ShardStore;
use crate::store::ShardingCatalog;
use crate::NodeHandle;
use crate::NodeSupervisor;
use crate::Result;
use crate::TopologyError;

/// One shard: a named replica set. All members share the shard's store;
/// `members[0]` is the replica-set primary.
pub struct ShardDescriptor {
    pub name: String,
    pub members: Vec<Arc<NodeHandle>>,
}

impl ShardDescriptor {
    pub fn primary(&self) -> &Arc<NodeHandle> {
        &self.members[0]
    }

    pub fn store(&self) -> &Arc<ShardStore> {
        self.members[0].store()
    }
}

/// An assembled cluster. Immutable after construction; only explicit
/// migration operations (through the dispatcher) change where data lives.
pub struct ClusterTopology {
    pub(crate) shards: Vec<ShardDescriptor>,
    pub(crate) config_server: Arc<NodeHandle>,
    pub(crate) routers: Vec<Arc<NodeHandle>>,
    pub(crate) catalog: Arc<ShardingCatalog>,
    pub(crate) clock: Arc<LogicalClock>,
    pub(crate) supervisor: Arc<NodeSupervisor>,
}

impl ClusterTopology {
    pub fn shards(&self) -> &[ShardDescriptor] {
        &self.shards
    }

    pub fn shard(
        &self,
        name: &str,
    ) -> Result<&ShardDescriptor> {
        self.shards
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| TopologyError::UnknownShard(name.to_string()).into())
    }

    pub fn router(
        &self,
        index: usize,
    ) -> Result<&Arc<NodeHandle>> {
        self.routers.get(index).ok_or_else(|| TopologyError::UnknownRouter(index).into())
    }

    pub fn replica(
        &self,
        shard: &str,
        member: usize,
    ) -> Result<&Arc<NodeHandle>> {
        let descriptor = self.shard(shard)?;
        descriptor.members.get(member).ok_or_else(|| {
            TopologyError::UnknownReplica {
                shard: shard.to_string(),
                member,
            }
            .into()
        })
    }

    pub fn config_server(&self) -> &Arc<NodeHandle> {
        &self.config_server
    }

    pub fn catalog(&self) -> &Arc<ShardingCatalog> {
        &self.catalog
    }

    pub fn clock(&self) -> &Arc<LogicalClock> {
        &self.clock
    }

    /// Designates a primary shard for `db`. Deterministic tie-break: the
    /// first shard in declared order, unless `primary_override` names one.
    pub fn enable_sharding_for_database(
        &self,
        db: &str,
        primary_override: Option<&str>,
    ) -> Result<String> {
        let primary = match primary_override {
            Some(name) => self.shard(name)?.name.clone(),
            None => self.shards[0].name.clone(),
        };
        Ok(self.catalog.enable_sharding(db, &primary))
    }

    /// Any shard other than `excluding`; migration scenarios use this to
    /// find a chunk destination.
    pub fn pick_other_shard(
        &self,
        excluding: &str,
    ) -> Result<&ShardDescriptor> {
        self.shards.iter().find(|s| s.name != excluding).ok_or_else(|| {
            TopologyError::NoAlternateShard {
                excluding: excluding.to_string(),
            }
            .into()
        })
    }

    /// The shard owning unsharded collections of `db`. Falls back to the
    /// first declared shard when the database was never explicitly enabled.
    pub fn primary_shard_for(
        &self,
        db: &str,
    ) -> Result<&ShardDescriptor> {
        match self.catalog.database_primary(db) {
            Some(name) => self.shard(&name),
            None => Ok(&self.shards[0]),
        }
    }

    pub async fn stop_node(
        &self,
        node: &Arc<NodeHandle>,
    ) -> Result<()> {
        self.supervisor.stop(node).await
    }

    /// Tears the whole cluster down.
    pub async fn stop(&self) {
        self.supervisor.shutdown_all().await;
    }
}
