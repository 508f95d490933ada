use std::collections::VecDeque;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::Mutex;
use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::clock::ClusterTime;
use crate::clock::LogicalClock;
use crate::constants::GLOBAL_LOG_CAPACITY;
use crate::store::ShardStore;
use crate::SecurityConfig;
use crate::StartupError;

/// Which cluster tier a node belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRole {
    ConfigServer,
    Shard,
    Router,
}

impl fmt::Display for NodeRole {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            NodeRole::ConfigServer => write!(f, "config"),
            NodeRole::Shard => write!(f, "shard"),
            NodeRole::Router => write!(f, "router"),
        }
    }
}

/// Node lifecycle. Transitions are one-way: Starting → Ready → Stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Starting,
    Ready,
    Stopped,
}

/// TLS material handed to a node at startup. The harness only carries the
/// paths; certificate parsing belongs to the real server.
#[derive(Debug, Clone)]
pub struct TlsMaterial {
    pub server_certificate_path: String,
    pub certificate_authority_root_path: String,
}

/// Startup options for a single node.
#[derive(Debug, Clone, Default)]
pub struct NodeOptions {
    /// Listen port; 0 picks an ephemeral one
    pub port: u16,

    /// Enables the per-connection authentication state machine
    pub auth_enabled: bool,

    /// TLS material, when the cluster runs with transport security
    pub tls: Option<TlsMaterial>,

    /// Shared internal-cluster key file for inter-node authentication
    pub cluster_key_file: Option<String>,

    /// Replica set this node belongs to (shard members only)
    pub replica_set: Option<String>,

    /// Test hook: simulate a process that ignores the termination request
    pub hang_on_shutdown: bool,
}

impl NodeOptions {
    pub fn from_security(security: &SecurityConfig) -> Self {
        let tls = security.enable_tls.then(|| TlsMaterial {
            server_certificate_path: security.server_certificate_path.clone(),
            certificate_authority_root_path: security.certificate_authority_root_path.clone(),
        });
        Self {
            auth_enabled: security.auth_enabled,
            tls,
            cluster_key_file: security.cluster_key_file.clone(),
            ..Default::default()
        }
    }

    /// Validates startup options before any resource is claimed.
    pub fn validate(&self) -> std::result::Result<(), StartupError> {
        if let Some(tls) = &self.tls {
            if tls.server_certificate_path.is_empty() {
                return Err(StartupError::InvalidOptions(
                    "TLS enabled but server certificate path is empty".to_string(),
                ));
            }
            if tls.certificate_authority_root_path.is_empty() {
                return Err(StartupError::InvalidOptions(
                    "TLS enabled but CA certificate path is empty".to_string(),
                ));
            }
        }
        if let Some(key_file) = &self.cluster_key_file {
            if key_file.is_empty() {
                return Err(StartupError::InvalidOptions("cluster key file path is empty".to_string()));
            }
        }
        Ok(())
    }
}

/// Handle to one supervised node. Owned exclusively by the supervisor;
/// everything else holds non-owning `Arc` references.
pub struct NodeHandle {
    pub id: u32,
    pub role: NodeRole,
    pub endpoint: SocketAddr,
    pub options: NodeOptions,

    /// Replica-set members of one shard share a store
    pub(crate) store: Arc<ShardStore>,
    /// All nodes of one cluster share the logical clock
    pub(crate) clock: Arc<LogicalClock>,

    state: RwLock<NodeState>,
    last_applied: Mutex<ClusterTime>,
    log: Mutex<VecDeque<String>>,
    cancel: CancellationToken,
    pub(crate) port_guard: Mutex<Option<std::net::TcpListener>>,
    pub(crate) task: Mutex<Option<JoinHandle<()>>>,
}

impl NodeHandle {
    pub(crate) fn new(
        id: u32,
        role: NodeRole,
        endpoint: SocketAddr,
        options: NodeOptions,
        store: Arc<ShardStore>,
        clock: Arc<LogicalClock>,
        port_guard: std::net::TcpListener,
    ) -> Self {
        Self {
            id,
            role,
            endpoint,
            options,
            store,
            clock,
            state: RwLock::new(NodeState::Starting),
            last_applied: Mutex::new(ClusterTime::default()),
            log: Mutex::new(VecDeque::with_capacity(64)),
            cancel: CancellationToken::new(),
            port_guard: Mutex::new(Some(port_guard)),
            task: Mutex::new(None),
        }
    }

    pub fn state(&self) -> NodeState {
        *self.state.read()
    }

    pub(crate) fn set_state(
        &self,
        state: NodeState,
    ) {
        *self.state.write() = state;
    }

    pub fn is_ready(&self) -> bool {
        self.state() == NodeState::Ready
    }

    pub fn is_stopped(&self) -> bool {
        self.state() == NodeState::Stopped
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn store(&self) -> &Arc<ShardStore> {
        &self.store
    }

    pub fn last_applied(&self) -> ClusterTime {
        *self.last_applied.lock()
    }

    pub(crate) fn set_last_applied(
        &self,
        time: ClusterTime,
    ) {
        let mut last = self.last_applied.lock();
        if time > *last {
            *last = time;
        }
    }

    /// Appends a line to the node's in-memory server log (`getLog` source).
    pub(crate) fn append_log(
        &self,
        line: String,
    ) {
        let mut log = self.log.lock();
        if log.len() == GLOBAL_LOG_CAPACITY {
            log.pop_front();
        }
        log.push_back(line);
    }

    pub fn log_lines(&self) -> Vec<String> {
        self.log.lock().iter().cloned().collect()
    }
}

impl fmt::Debug for NodeHandle {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("NodeHandle")
            .field("id", &self.id)
            .field("role", &self.role)
            .field("endpoint", &self.endpoint)
            .field("state", &self.state())
            .finish()
    }
}
