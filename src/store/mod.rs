//! Simulated data plane.
//!
//! Each shard replica set shares one [`ShardStore`] (intra-shard replication
//! is treated as instantaneous); the config server owns the
//! [`ShardingCatalog`] with database primaries and chunk maps. Routers only
//! ever see the catalog through an invalidatable snapshot.

mod catalog;
mod collection;
mod shard_store;
mod value;

pub use catalog::*;
pub use collection::*;
pub use shard_store::*;
pub use value::*;

#[cfg(test)]
mod catalog_test;

/// Splits `db.collection` into its database and collection parts. The
/// collection part may itself contain dots (`test.system.blah`).
pub fn split_namespace(namespace: &str) -> (&str, &str) {
    match namespace.split_once('.') {
        Some((db, coll)) => (db, coll),
        None => (namespace, ""),
    }
}
