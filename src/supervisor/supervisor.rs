use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use dashmap::DashMap;
use futures::future::join_all;
use lazy_static::lazy_static;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tracing::info;
use tracing::warn;

use super::NodeHandle;
use super::NodeOptions;
use super::NodeRole;
use super::NodeState;
use crate::clock::LogicalClock;
use crate::metrics;
use crate::store::ShardStore;
use crate::utils::net;
use crate::PollPolicy;
use crate::Result;
use crate::StartupError;
use crate::SupervisorError;

lazy_static! {
    /// Process-wide registry of live nodes, so a scenario abort can still
    /// tear down everything that was started.
    pub(crate) static ref LIVE_NODES: DashMap<u32, Arc<NodeHandle>> = DashMap::new();
}

static NEXT_NODE_ID: AtomicU32 = AtomicU32::new(1);

/// Launches and stops simulated nodes. The supervisor owns every handle it
/// creates; callers get non-owning `Arc` references.
pub struct NodeSupervisor {
    startup: PollPolicy,
    shutdown: PollPolicy,
    nodes: DashMap<u32, Arc<NodeHandle>>,
}

impl NodeSupervisor {
    pub fn new(
        startup: PollPolicy,
        shutdown: PollPolicy,
    ) -> Self {
        Self {
            startup,
            shutdown,
            nodes: DashMap::new(),
        }
    }

    /// Launches a node and waits until it reports ready.
    ///
    /// Fails with `StartupError::PortUnavailable` when the requested port
    /// cannot be bound, or `StartupError::InvalidOptions` when the options
    /// fail validation. The handle is registered process-wide before the
    /// caller sees it.
    pub async fn start(
        &self,
        role: NodeRole,
        options: NodeOptions,
        store: Arc<ShardStore>,
        clock: Arc<LogicalClock>,
    ) -> Result<Arc<NodeHandle>> {
        options.validate().map_err(SupervisorError::Startup)?;

        let (port_guard, endpoint) = if options.port == 0 {
            net::bind_ephemeral().map_err(SupervisorError::Startup)?
        } else {
            net::bind_endpoint(options.port).map_err(SupervisorError::Startup)?
        };

        let id = NEXT_NODE_ID.fetch_add(1, Ordering::SeqCst);
        let node = Arc::new(NodeHandle::new(id, role, endpoint, options, store, clock, port_guard));

        let (ready_tx, ready_rx) = oneshot::channel::<()>();
        let run_node = node.clone();
        let task = tokio::spawn(async move {
            run_node.set_state(NodeState::Ready);
            run_node.append_log(format!("node {} ({}) listening on {}", run_node.id, run_node.role, run_node.endpoint));
            let _ = ready_tx.send(());

            run_node.cancellation_token().cancelled().await;
            if run_node.options.hang_on_shutdown {
                // Simulated wedged process: never acknowledge termination.
                std::future::pending::<()>().await;
            }
            run_node.set_state(NodeState::Stopped);
        });
        *node.task.lock() = Some(task);

        if timeout(self.startup.timeout(), ready_rx).await.is_err() {
            node.cancellation_token().cancel();
            return Err(StartupError::InvalidOptions(format!("node {} never reported ready", id)).into());
        }

        metrics::NODE_START_TOTAL.with_label_values(&[role.to_string().as_str()]).inc();
        info!("started {} node {} on {}", role, id, endpoint);

        self.nodes.insert(id, node.clone());
        LIVE_NODES.insert(id, node.clone());
        Ok(node)
    }

    /// Terminates a node gracefully, escalating to forced termination when
    /// it does not exit within the shutdown bound.
    ///
    /// Idempotent: stopping an already-stopped node is a no-op.
    pub async fn stop(
        &self,
        node: &Arc<NodeHandle>,
    ) -> Result<()> {
        if node.is_stopped() {
            // Already wound down (possibly by a process-wide cancellation);
            // just make sure it is deregistered.
            self.unregister(node);
            return Ok(());
        }

        node.cancellation_token().cancel();

        // A concurrent stop already took the task; let it finish the job.
        let mut task = match node.task.lock().take() {
            Some(task) => task,
            None => return Ok(()),
        };

        let result = timeout(self.shutdown.timeout(), &mut task).await;
        if result.is_err() {
            task.abort();
        }
        self.unregister(node);

        match result {
            Ok(joined) => {
                joined?;
                metrics::NODE_STOP_TOTAL.with_label_values(&["graceful"]).inc();
                info!("stopped node {}", node.id);
                Ok(())
            }
            Err(_) => {
                // Escalate: the simulated process ignored the termination
                // request within the bound.
                metrics::NODE_STOP_TOTAL.with_label_values(&["forced"]).inc();
                warn!("node {} exceeded shutdown bound, terminating forcefully", node.id);
                node.set_state(NodeState::Stopped);
                Err(SupervisorError::ShutdownTimeout {
                    node_id: node.id,
                    timeout: self.shutdown.timeout(),
                }
                .into())
            }
        }
    }

    fn unregister(
        &self,
        node: &Arc<NodeHandle>,
    ) {
        node.set_state(NodeState::Stopped);
        node.port_guard.lock().take();
        self.nodes.remove(&node.id);
        LIVE_NODES.remove(&node.id);
    }

    /// Stops every node this supervisor still tracks. Used for scenario
    /// cleanup; shutdown timeouts are logged, not propagated, so one wedged
    /// node cannot leak the rest.
    pub async fn shutdown_all(&self) {
        let nodes: Vec<Arc<NodeHandle>> = self.nodes.iter().map(|e| e.value().clone()).collect();
        let stops = nodes.iter().map(|n| self.stop(n));
        for (node, result) in nodes.iter().zip(join_all(stops).await) {
            if let Err(e) = result {
                warn!("cleanup of node {} failed: {:?}", node.id, e);
            }
        }
    }

    pub fn live_count(&self) -> usize {
        self.nodes.len()
    }
}

/// Last-resort cleanup hook: cancels every node registered process-wide,
/// regardless of which supervisor started it.
pub fn cancel_all_registered() {
    for entry in LIVE_NODES.iter() {
        entry.value().cancellation_token().cancel();
    }
}
