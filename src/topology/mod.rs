//! Cluster topology assembly.
//!
//! Turns a [`ClusterSpec`](crate::ClusterSpec) into a set of supervised
//! nodes wired into a logical cluster: named shards (each a replica set),
//! one config server owning the sharding catalog, and router instances.

mod manager;
mod topology;

pub use manager::*;
pub use topology::*;

#[cfg(test)]
mod topology_test;
