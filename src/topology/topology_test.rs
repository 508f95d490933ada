use serial_test::serial;

use crate::ClusterSpec;
use crate::Error;
use crate::Settings;
use crate::TopologyError;
use crate::TopologyManager;

fn settings_with(spec: ClusterSpec) -> Settings {
    Settings {
        cluster: spec,
        ..Default::default()
    }
}

/// Case 1: default spec builds 2 shards, 1 router, 1 config server
#[tokio::test]
#[serial]
async fn test_build_cluster_default_shape() {
    let manager = TopologyManager::new(settings_with(ClusterSpec::default()));
    let topology = manager.build_cluster().await.expect("cluster should build");

    assert_eq!(2, topology.shards().len());
    assert_eq!("shard0", topology.shards()[0].name);
    assert!(topology.router(0).is_ok());
    assert!(topology.router(1).is_err());
    assert!(topology.config_server().is_ready());

    topology.stop().await;
}

/// Case 2: replica-set members of one shard share a store
#[tokio::test]
#[serial]
async fn test_replica_members_share_shard_store() {
    let manager = TopologyManager::new(settings_with(ClusterSpec {
        shards: 1,
        replicas_per_shard: 3,
        ..Default::default()
    }));
    let topology = manager.build_cluster().await.expect("cluster should build");

    let shard = topology.shard("shard0").expect("shard0 exists");
    assert_eq!(3, shard.members.len());
    shard.store().insert_document("test.foo", crate::store::doc([("a", 1i64)]));
    for member in &shard.members {
        assert_eq!(1, member.store().count("test.foo"));
    }

    topology.stop().await;
}

/// Case 3: primary designation defaults to the first declared shard and
/// honors an explicit override
#[tokio::test]
#[serial]
async fn test_enable_sharding_primary_designation() {
    let manager = TopologyManager::new(settings_with(ClusterSpec::default()));
    let topology = manager.build_cluster().await.expect("cluster should build");

    assert_eq!("shard0", topology.enable_sharding_for_database("test", None).unwrap());
    assert_eq!("shard1", topology.enable_sharding_for_database("other", Some("shard1")).unwrap());
    assert!(topology.enable_sharding_for_database("bad", Some("shard9")).is_err());

    topology.stop().await;
}

/// Case 4: pick_other_shard fails on a single-shard cluster
#[tokio::test]
#[serial]
async fn test_pick_other_shard() {
    let manager = TopologyManager::new(settings_with(ClusterSpec {
        shards: 1,
        ..Default::default()
    }));
    let topology = manager.build_cluster().await.expect("cluster should build");

    match topology.pick_other_shard("shard0") {
        Err(Error::Cluster(crate::ClusterError::Topology(TopologyError::NoAlternateShard { excluding }))) => {
            assert_eq!("shard0", excluding);
        }
        other => panic!("expected NoAlternateShard, got {:?}", other.map(|s| s.name.clone())),
    }

    topology.stop().await;
}

/// Case 5: a startup failure mid-build tears down already-started nodes
#[tokio::test]
#[serial]
async fn test_build_failure_cleans_up_started_nodes() {
    // claim a port so the second shard member cannot bind it
    let (guard, addr) = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        (listener, addr)
    };

    let manager = TopologyManager::new(settings_with(ClusterSpec {
        shards: 2,
        base_port: addr.port().saturating_sub(2),
        ..Default::default()
    }));

    // the sequential port walk reaches the claimed port within the first
    // three nodes, so the build must fail and leave nothing registered
    assert!(manager.build_cluster().await.is_err());
    assert_eq!(0, manager.supervisor().live_count());
    drop(guard);
}
