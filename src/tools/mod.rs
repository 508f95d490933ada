//! Offline tooling against shard stores.

mod dump;

pub use dump::*;

#[cfg(test)]
mod dump_test;
