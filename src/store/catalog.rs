use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use dashmap::DashMap;
use serde::Deserialize;
use serde::Serialize;

use super::FieldValue;
use super::KeyBound;

/// A contiguous shard-key range assigned to exactly one shard at a time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub min: KeyBound,
    pub max: KeyBound,
    pub shard: String,
}

impl Chunk {
    pub fn contains(
        &self,
        value: &FieldValue,
    ) -> bool {
        self.min.contains(&self.max, value)
    }
}

/// Routing metadata for one sharded collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardedCollection {
    pub shard_key: String,
    pub unique: bool,
    pub chunks: Vec<Chunk>,
}

impl ShardedCollection {
    pub fn owning_shard(
        &self,
        value: &FieldValue,
    ) -> Option<&str> {
        self.chunks.iter().find(|c| c.contains(value)).map(|c| c.shard.as_str())
    }

    /// Shards currently holding at least one chunk, in first-seen order.
    pub fn chunk_holding_shards(&self) -> Vec<String> {
        let mut shards: Vec<String> = Vec::new();
        for chunk in &self.chunks {
            if !shards.contains(&chunk.shard) {
                shards.push(chunk.shard.clone());
            }
        }
        shards
    }
}

/// Cluster metadata owned by the config server: database primaries and the
/// chunk-to-shard mapping. Routers read it only through epoch-checked
/// snapshots, so every mutation bumps the epoch.
#[derive(Debug, Default)]
pub struct ShardingCatalog {
    database_primaries: DashMap<String, String>,
    sharded: DashMap<String, ShardedCollection>,
    epoch: AtomicU64,
}

impl ShardingCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    fn bump_epoch(&self) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
    }

    /// Designates `primary_shard` for a newly enabled database. Enabling an
    /// already-enabled database keeps the existing designation.
    pub fn enable_sharding(
        &self,
        db: &str,
        primary_shard: &str,
    ) -> String {
        let entry = self
            .database_primaries
            .entry(db.to_string())
            .or_insert_with(|| primary_shard.to_string());
        let primary = entry.value().clone();
        drop(entry);
        self.bump_epoch();
        primary
    }

    pub fn database_primary(
        &self,
        db: &str,
    ) -> Option<String> {
        self.database_primaries.get(db).map(|p| p.value().clone())
    }

    pub fn sharding_enabled(
        &self,
        db: &str,
    ) -> bool {
        self.database_primaries.contains_key(db)
    }

    pub fn is_sharded(
        &self,
        namespace: &str,
    ) -> bool {
        self.sharded.contains_key(namespace)
    }

    /// Registers a sharded collection with one chunk spanning the whole
    /// shard-key domain, owned by the database's primary shard.
    pub fn shard_collection(
        &self,
        namespace: &str,
        shard_key: &str,
        unique: bool,
        primary_shard: &str,
    ) {
        self.sharded.insert(
            namespace.to_string(),
            ShardedCollection {
                shard_key: shard_key.to_string(),
                unique,
                chunks: vec![Chunk {
                    min: KeyBound::Min,
                    max: KeyBound::Max,
                    shard: primary_shard.to_string(),
                }],
            },
        );
        self.bump_epoch();
    }

    pub fn collection(
        &self,
        namespace: &str,
    ) -> Option<ShardedCollection> {
        self.sharded.get(namespace).map(|c| c.value().clone())
    }

    /// Splits the chunk containing `middle` at `middle`. Fails when the
    /// namespace is unsharded or `middle` is already a chunk boundary.
    pub fn split(
        &self,
        namespace: &str,
        middle: &FieldValue,
    ) -> std::result::Result<(), String> {
        let mut entry = self
            .sharded
            .get_mut(namespace)
            .ok_or_else(|| format!("{} is not sharded", namespace))?;

        let split_at = KeyBound::Value(middle.clone());
        let position = entry
            .chunks
            .iter()
            .position(|c| c.contains(middle))
            .ok_or_else(|| format!("no chunk of {} contains split point {}", namespace, middle))?;

        if entry.chunks[position].min == split_at {
            return Err(format!("split point {} is already a chunk boundary", middle));
        }

        let upper = Chunk {
            min: split_at.clone(),
            max: entry.chunks[position].max.clone(),
            shard: entry.chunks[position].shard.clone(),
        };
        entry.chunks[position].max = split_at;
        entry.chunks.insert(position + 1, upper);
        drop(entry);
        self.bump_epoch();
        Ok(())
    }

    /// Reassigns the chunk containing `find` to shard `to`, returning the
    /// moved chunk's previous owner and bounds so the dispatcher can migrate
    /// documents and indexes.
    pub fn move_chunk(
        &self,
        namespace: &str,
        find: &FieldValue,
        to: &str,
    ) -> std::result::Result<Chunk, String> {
        let mut entry = self
            .sharded
            .get_mut(namespace)
            .ok_or_else(|| format!("{} is not sharded", namespace))?;

        let position = entry
            .chunks
            .iter()
            .position(|c| c.contains(find))
            .ok_or_else(|| format!("no chunk of {} contains {}", namespace, find))?;

        let moved = entry.chunks[position].clone();
        if moved.shard == to {
            return Err(format!("chunk of {} already owned by {}", namespace, to));
        }
        entry.chunks[position].shard = to.to_string();
        drop(entry);
        self.bump_epoch();
        Ok(moved)
    }

    /// Snapshot of all sharded namespaces, for router cache rebuilds.
    pub fn routing_snapshot(&self) -> Vec<(String, ShardedCollection)> {
        self.sharded.iter().map(|e| (e.key().clone(), e.value().clone())).collect()
    }
}
