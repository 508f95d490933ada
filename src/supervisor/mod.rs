//! Node process supervision.
//!
//! Launches and stops simulated server nodes, tracks their handles and
//! endpoints, and keeps a process-wide registry so every node started by a
//! scenario can be torn down even if the scenario aborts before calling
//! `stop`.

mod node;
mod supervisor;

pub use node::*;
pub use supervisor::*;

#[cfg(test)]
mod node_test;
#[cfg(test)]
mod supervisor_test;
