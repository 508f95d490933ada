use std::sync::Arc;

use serial_test::serial;

use crate::clock::LogicalClock;
use crate::store::ShardStore;
use crate::Error;
use crate::NodeOptions;
use crate::NodeRole;
use crate::NodeSupervisor;
use crate::PollPolicy;
use crate::SupervisorError;
use crate::SystemError;

fn supervisor() -> NodeSupervisor {
    NodeSupervisor::new(
        PollPolicy {
            interval_ms: 10,
            timeout_ms: 2_000,
        },
        PollPolicy {
            interval_ms: 10,
            timeout_ms: 200,
        },
    )
}

async fn start_shard(
    supervisor: &NodeSupervisor,
    options: NodeOptions,
) -> crate::Result<Arc<crate::NodeHandle>> {
    supervisor
        .start(NodeRole::Shard, options, Arc::new(ShardStore::new()), Arc::new(LogicalClock::new()))
        .await
}

/// Case 1: start reaches Ready and stop is graceful
#[tokio::test]
#[serial]
async fn test_start_and_stop_lifecycle() {
    let supervisor = supervisor();
    let node = start_shard(&supervisor, NodeOptions::default()).await.expect("start should succeed");

    assert!(node.is_ready());
    assert!(node.endpoint.ip().is_loopback());
    assert_eq!(1, supervisor.live_count());

    supervisor.stop(&node).await.expect("graceful stop");
    assert!(node.is_stopped());
    assert_eq!(0, supervisor.live_count());
}

/// Case 2: a taken port fails startup with PortUnavailable
#[tokio::test]
#[serial]
async fn test_start_fails_on_taken_port() {
    let supervisor = supervisor();
    let first = start_shard(&supervisor, NodeOptions::default()).await.expect("start should succeed");

    let options = NodeOptions {
        port: first.endpoint.port(),
        ..Default::default()
    };
    let second = start_shard(&supervisor, options).await;
    assert!(second.is_err());

    supervisor.stop(&first).await.expect("graceful stop");
}

/// Case 3: invalid options are rejected before any port is claimed
#[tokio::test]
#[serial]
async fn test_start_rejects_invalid_options() {
    let supervisor = supervisor();
    let options = NodeOptions {
        cluster_key_file: Some(String::new()),
        ..Default::default()
    };
    assert!(start_shard(&supervisor, options).await.is_err());
    assert_eq!(0, supervisor.live_count());
}

/// Case 4: second stop on the same handle is a no-op, not an error
#[tokio::test]
#[serial]
async fn test_stop_is_idempotent() {
    let supervisor = supervisor();
    let node = start_shard(&supervisor, NodeOptions::default()).await.expect("start should succeed");

    supervisor.stop(&node).await.expect("first stop");
    supervisor.stop(&node).await.expect("second stop is a no-op");
}

/// Case 5: a wedged node escalates to forced termination
#[tokio::test]
#[serial]
async fn test_stop_escalates_on_shutdown_timeout() {
    let supervisor = supervisor();
    let options = NodeOptions {
        hang_on_shutdown: true,
        ..Default::default()
    };
    let node = start_shard(&supervisor, options).await.expect("start should succeed");

    let r = supervisor.stop(&node).await;
    match r {
        Err(Error::System(SystemError::Supervisor(SupervisorError::ShutdownTimeout { node_id, .. }))) => {
            assert_eq!(node.id, node_id);
        }
        other => panic!("expected ShutdownTimeout, got {:?}", other),
    }
    // the handle still ends up stopped and unregistered
    assert!(node.is_stopped());
    assert_eq!(0, supervisor.live_count());
}

/// Case 6: shutdown_all cleans every tracked node
#[tokio::test]
#[serial]
async fn test_shutdown_all_stops_every_node() {
    let supervisor = supervisor();
    for _ in 0..3 {
        start_shard(&supervisor, NodeOptions::default()).await.expect("start should succeed");
    }
    assert_eq!(3, supervisor.live_count());

    supervisor.shutdown_all().await;
    assert_eq!(0, supervisor.live_count());
}

/// Case 7: process-wide cancellation winds down every registered node even
/// when the owner never calls stop
#[tokio::test]
#[serial]
async fn test_cancel_all_registered_stops_started_nodes() {
    let supervisor = supervisor();
    let first = start_shard(&supervisor, NodeOptions::default()).await.expect("start should succeed");
    let second = start_shard(&supervisor, NodeOptions::default()).await.expect("start should succeed");

    crate::cancel_all_registered();

    for node in [&first, &second] {
        let mut waited_ms = 0;
        while !node.is_stopped() && waited_ms < 2_000 {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            waited_ms += 10;
        }
        assert!(node.is_stopped());
    }

    // stop on an already wound-down node still deregisters it
    supervisor.shutdown_all().await;
    assert_eq!(0, supervisor.live_count());
}
