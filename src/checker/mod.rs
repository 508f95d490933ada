//! Metadata and invariant checking.
//!
//! Three concerns live here: the `shardCollection` pre-condition validator,
//! the cross-shard index convergence poll, and timing-metadata verification.
//! Checkers never mutate cluster state; they read stores and the catalog and
//! report violations through [`CheckError`](crate::CheckError).

mod clock_check;
mod propagation;
mod shard_key;

pub use clock_check::*;
pub use propagation::*;
pub use shard_key::*;
