
use commons::count_of;
use commons::dispatch;
use commons::dispatch_ok;
use commons::insert_num;
use commons::shard_on_num;
use commons::start_cluster;
use serial_test::serial;
use shardkit::verify_timing;
use shardkit::ClusterTime;
use shardkit::CommandBody;
use shardkit::CommandRequest;
use shardkit::CommandTarget;
use shardkit::ConnectionOrigin;
use shardkit::ResponseBody;
use shardkit::SecurityConfig;

/// Case 1: successful and rejected responses both carry timing metadata
/// respecting operationTime <= clusterTime
#[tokio::test]
#[serial]
async fn test_all_responses_carry_valid_timing() {
    let (topology, dispatcher) = start_cluster(SecurityConfig::default()).await;
    let connection = dispatcher.connect(ConnectionOrigin::loopback_plain());
    shard_on_num(&dispatcher, &connection, "test.timed", false).await;

    let ok = dispatch_ok(&dispatcher, &connection, insert_num("test.timed", 1)).await;
    verify_timing(&ok.timing).expect("ok response timing");

    let rejected = dispatch(
        &dispatcher,
        &connection,
        CommandBody::Unknown {
            name: "notACommand".into(),
        },
    )
    .await;
    assert!(!rejected.ok);
    verify_timing(&rejected.timing).expect("rejected response timing");

    topology.stop().await;
}

/// Case 2: cluster time is monotonically increasing across a command
/// sequence on one connection
#[tokio::test]
#[serial]
async fn test_cluster_time_monotonic_across_commands() {
    let (topology, dispatcher) = start_cluster(SecurityConfig::default()).await;
    let connection = dispatcher.connect(ConnectionOrigin::loopback_plain());
    shard_on_num(&dispatcher, &connection, "test.mono", false).await;

    let mut previous = None;
    for num in 1..=5 {
        let response = dispatch_ok(&dispatcher, &connection, insert_num("test.mono", num)).await;
        verify_timing(&response.timing).unwrap();
        if let Some(previous) = previous {
            assert!(response.timing.cluster_time > previous);
        }
        previous = Some(response.timing.cluster_time);
    }

    let count = dispatch_ok(&dispatcher, &connection, count_of("test.mono")).await;
    assert!(count.timing.cluster_time > previous.unwrap());

    topology.stop().await;
}

/// Case 3: replSetGetStatus reports an applied optime that never runs ahead
/// of the response's cluster time, and it advances after a write lands on
/// the shard
#[tokio::test]
#[serial]
async fn test_repl_set_status_applied_op_time() {
    let (topology, dispatcher) = start_cluster(SecurityConfig::default()).await;
    let connection = dispatcher.connect(ConnectionOrigin::loopback_plain());

    let status = |target: CommandTarget| {
        dispatcher.run(&connection, CommandRequest::new(CommandBody::ReplSetGetStatus, target))
    };

    let before = status(CommandTarget::Shard("shard0".into())).await.unwrap();
    assert!(before.ok);
    let applied_before = match before.body {
        ResponseBody::ReplSetStatus { applied_op_time, .. } => applied_op_time,
        ref other => panic!("unexpected body {:?}", other),
    };
    assert!(applied_before <= before.timing.cluster_time);

    shard_on_num(&dispatcher, &connection, "test.applied", false).await;
    dispatch_ok(&dispatcher, &connection, insert_num("test.applied", 1)).await;

    let after = status(CommandTarget::Shard("shard0".into())).await.unwrap();
    let applied_after = match after.body {
        ResponseBody::ReplSetStatus { applied_op_time, .. } => applied_op_time,
        ref other => panic!("unexpected body {:?}", other),
    };
    assert!(applied_after > applied_before);
    assert!(applied_after <= after.timing.cluster_time);

    topology.stop().await;
}

/// Case 4: a ping carrying a gossiped cluster time succeeds and pulls the
/// cluster clock forward to at least that time
#[tokio::test]
#[serial]
async fn test_ping_gossips_cluster_time() {
    let (topology, dispatcher) = start_cluster(SecurityConfig::default()).await;
    let connection = dispatcher.connect(ConnectionOrigin::loopback_plain());

    let before = dispatch_ok(&dispatcher, &connection, CommandBody::Ping).await;
    let gossiped = ClusterTime::new(before.timing.cluster_time.secs + 600, 1);

    let response = dispatcher
        .run(
            &connection,
            CommandRequest::new(CommandBody::Ping, CommandTarget::Router(0)).with_cluster_time(gossiped),
        )
        .await
        .unwrap();
    assert!(response.ok);
    assert!(response.timing.cluster_time > gossiped);
    verify_timing(&response.timing).unwrap();

    // later commands keep advancing from the merged time
    let next = dispatch_ok(&dispatcher, &connection, CommandBody::Ping).await;
    assert!(next.timing.cluster_time > response.timing.cluster_time);

    topology.stop().await;
}

/// Case 5: timing metadata is stamped on every node role, not just routers
#[tokio::test]
#[serial]
async fn test_timing_on_every_node_role() {
    let (topology, dispatcher) = start_cluster(SecurityConfig::default()).await;
    let connection = dispatcher.connect(ConnectionOrigin::loopback_plain());

    for target in [
        CommandTarget::Router(0),
        CommandTarget::Shard("shard0".into()),
        CommandTarget::Replica {
            shard: "shard1".into(),
            member: 0,
        },
        CommandTarget::ConfigServer,
    ] {
        let response = dispatcher
            .run(&connection, CommandRequest::new(CommandBody::Ping, target))
            .await
            .unwrap();
        assert!(response.ok);
        verify_timing(&response.timing).unwrap();
    }

    topology.stop().await;
}
