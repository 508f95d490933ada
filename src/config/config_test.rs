use serial_test::serial;

use crate::ClusterSpec;
use crate::Settings;

#[test]
#[serial]
fn test_load_defaults_without_file() {
    let settings = Settings::load(None).expect("defaults should load");
    assert_eq!(2, settings.cluster.shards);
    assert_eq!(1, settings.cluster.replicas_per_shard);
    assert_eq!(1, settings.cluster.routers);
    assert!(!settings.security.auth_enabled);
    assert_eq!(1_000, settings.retry.propagation.interval_ms);
    assert_eq!(60_000, settings.retry.propagation.timeout_ms);
}

#[test]
#[serial]
fn test_env_overlay_wins_over_defaults() {
    temp_env::with_vars(
        [
            ("SHARDKIT__CLUSTER__SHARDS", Some("3")),
            ("SHARDKIT__SECURITY__AUTH_ENABLED", Some("true")),
        ],
        || {
            let settings = Settings::load(None).expect("env overlay should load");
            assert_eq!(3, settings.cluster.shards);
            assert!(settings.security.auth_enabled);
        },
    );
}

#[test]
#[serial]
fn test_env_overlay_rejects_zero_shards() {
    temp_env::with_var("SHARDKIT__CLUSTER__SHARDS", Some("0"), || {
        assert!(Settings::load(None).is_err());
    });
}

#[test]
fn test_cluster_spec_validation_rules() {
    let mut spec = ClusterSpec::default();
    assert!(spec.validate().is_ok());

    spec.routers = 0;
    assert!(spec.validate().is_err());

    spec.routers = 1;
    spec.replicas_per_shard = 0;
    assert!(spec.validate().is_err());
}

#[test]
fn test_shard_names_are_ordered_and_unique() {
    let spec = ClusterSpec {
        shards: 3,
        ..Default::default()
    };
    assert_eq!(vec!["shard0", "shard1", "shard2"], spec.shard_names());
}
