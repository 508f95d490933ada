//! Harness Error Hierarchy
//!
//! Defines the error types for the sharded-cluster test harness, categorized
//! by layer: process supervision, cluster topology, invariant checking and
//! authentication.
//!
//! Command-level failures are deliberately *not* part of this hierarchy: a
//! rejected command is reported as a structured `ok:false` response carrying
//! a reason string and timing metadata, so scenario code can assert on it.

use std::time::Duration;

use config::ConfigError;
use tokio::task::JoinError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Infrastructure-level failures (process supervision, I/O, serialization)
    #[error(transparent)]
    System(#[from] SystemError),

    /// Harness configuration validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Cluster topology and invariant-check failures
    #[error(transparent)]
    Cluster(#[from] ClusterError),

    /// Authentication state machine failures
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Unrecoverable failures requiring scenario termination
    #[error("Fatal error: {0}")]
    Fatal(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SystemError {
    // Process supervision layer
    #[error(transparent)]
    Supervisor(#[from] SupervisorError),

    // Host I/O
    #[error(transparent)]
    Io(#[from] std::io::Error),

    // Serialization
    #[error("Serialization error")]
    Serialization(#[from] SerializationError),

    #[error("General harness error: {0}")]
    GeneralHarness(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    /// Node failed to launch
    #[error(transparent)]
    Startup(#[from] StartupError),

    /// Node did not exit within the graceful shutdown bound
    #[error("Node {node_id} did not stop within {timeout:?}, escalated to forced termination")]
    ShutdownTimeout { node_id: u32, timeout: Duration },

    /// Operation addressed a node that has already been stopped
    #[error("Node {0} is stopped")]
    NodeStopped(u32),

    /// Background node task failed
    #[error("Node task failed: {0}")]
    TaskFailed(#[from] JoinError),
}

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// Requested listen port could not be bound
    #[error("Port unavailable at {endpoint}: {source}")]
    PortUnavailable {
        endpoint: String,
        source: std::io::Error,
    },

    /// Startup options failed validation
    #[error("Invalid startup options: {0}")]
    InvalidOptions(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    /// Topology construction and lookup failures
    #[error(transparent)]
    Topology(#[from] TopologyError),

    /// Post-condition invariant check failures
    #[error(transparent)]
    Check(#[from] CheckError),
}

#[derive(Debug, thiserror::Error)]
pub enum TopologyError {
    /// `pick_other_shard` found no alternative
    #[error("No shard other than {excluding} exists in the topology")]
    NoAlternateShard { excluding: String },

    /// Shard names must be unique within a topology
    #[error("Duplicate shard name {0} in cluster spec")]
    DuplicateShardName(String),

    /// Lookup of a shard name that is not part of the topology
    #[error("Unknown shard {0}")]
    UnknownShard(String),

    /// Lookup of a replica index outside the shard's member list
    #[error("Shard {shard} has no replica member {member}")]
    UnknownReplica { shard: String, member: usize },

    /// Lookup of a router index outside the topology
    #[error("No router instance {0} in the topology")]
    UnknownRouter(usize),
}

#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    /// Index sets did not converge across chunk-holding shards in time
    #[error("Index propagation for {namespace} did not converge within {waited:?}")]
    PropagationTimeout { namespace: String, waited: Duration },

    /// A polled node stopped while a convergence poll was outstanding
    #[error("Node {node_id} stopped while polling {namespace} for convergence")]
    NodeStoppedDuringPoll { node_id: u32, namespace: String },

    /// `shardCollection` pre-condition violations
    #[error(transparent)]
    ShardKey(#[from] ShardKeyViolation),

    /// Response advertised an operation time ahead of its cluster time
    #[error("operationTime {operation_time} exceeds clusterTime {cluster_time} in one response")]
    ClockRegression {
        operation_time: String,
        cluster_time: String,
    },
}

/// The five rejection reasons for `shardCollection`, evaluated in this
/// declaration order (first violation wins).
#[derive(Debug, thiserror::Error)]
pub enum ShardKeyViolation {
    #[error("Cannot shard reserved namespace {0}")]
    SystemNamespace(String),

    #[error("Cannot shard capped collection {0}")]
    CappedCollection(String),

    #[error("Existing unique index {index} of {namespace} is not prefixed by the shard key")]
    IncompatibleUniqueIndex { namespace: String, index: String },

    #[error("Non-empty collection {0} has no supporting index on the shard key")]
    MissingSupportingIndex(String),

    #[error("Non-empty collection {0} contains documents with a missing or null shard-key field")]
    NullShardKeyValue(String),
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Subject collides with the server's own identity or an inter-node identity
    #[error("Cannot create user {0}: principal reserved for cluster membership")]
    ReservedPrincipal(String),

    /// Operation requires a prior successful authentication
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Password mechanisms require an explicit user name
    #[error("Mechanism {0} requires an explicit user name")]
    MissingUserName(&'static str),

    /// Authentication attempted against a principal that does not exist
    #[error("No such user {0}")]
    NoSuchUser(String),

    /// User creation for an already-existing principal
    #[error("User {0} already exists")]
    DuplicateUser(String),

    /// Certificate mechanism selected on a connection without a client certificate
    #[error("Connection presented no client certificate")]
    NoClientCertificate,

    /// Session lookup for a connection the dispatcher never opened
    #[error("Unknown connection {0}")]
    UnknownConnection(String),
}

// Serialization is classified separately (it crosses layer boundaries)
#[derive(Debug, thiserror::Error)]
pub enum SerializationError {
    #[error("Bincode serialization failed: {0}")]
    Bincode(#[from] bincode::Error),
}

// ============== Conversion Implementations ============== //
impl From<SupervisorError> for Error {
    fn from(e: SupervisorError) -> Self {
        Error::System(SystemError::Supervisor(e))
    }
}

impl From<StartupError> for Error {
    fn from(e: StartupError) -> Self {
        Error::System(SystemError::Supervisor(SupervisorError::Startup(e)))
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::System(SystemError::Io(e))
    }
}

impl From<SerializationError> for Error {
    fn from(e: SerializationError) -> Self {
        Error::System(SystemError::Serialization(e))
    }
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::System(SystemError::Serialization(SerializationError::Bincode(e)))
    }
}

// ===== Cluster error conversions =====

impl From<TopologyError> for Error {
    fn from(e: TopologyError) -> Self {
        Error::Cluster(ClusterError::Topology(e))
    }
}

impl From<CheckError> for Error {
    fn from(e: CheckError) -> Self {
        Error::Cluster(ClusterError::Check(e))
    }
}

impl From<ShardKeyViolation> for Error {
    fn from(e: ShardKeyViolation) -> Self {
        Error::Cluster(ClusterError::Check(CheckError::ShardKey(e)))
    }
}

impl From<JoinError> for Error {
    fn from(err: JoinError) -> Self {
        SupervisorError::TaskFailed(err).into()
    }
}
