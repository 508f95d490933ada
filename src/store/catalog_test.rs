use crate::store::FieldValue;
use crate::store::KeyBound;
use crate::store::ShardingCatalog;

fn catalog_with_sharded_foo() -> ShardingCatalog {
    let catalog = ShardingCatalog::new();
    catalog.enable_sharding("test", "shard0");
    catalog.shard_collection("test.foo", "num", false, "shard0");
    catalog
}

#[test]
fn test_enable_sharding_keeps_first_primary() {
    let catalog = ShardingCatalog::new();
    assert_eq!("shard1", catalog.enable_sharding("test", "shard1"));
    // a second enable does not re-designate
    assert_eq!("shard1", catalog.enable_sharding("test", "shard0"));
    assert_eq!(Some("shard1".to_string()), catalog.database_primary("test"));
}

#[test]
fn test_shard_collection_starts_with_one_full_range_chunk() {
    let catalog = catalog_with_sharded_foo();
    let coll = catalog.collection("test.foo").unwrap();
    assert_eq!(1, coll.chunks.len());
    assert_eq!(KeyBound::Min, coll.chunks[0].min);
    assert_eq!(KeyBound::Max, coll.chunks[0].max);
    assert_eq!("shard0", coll.chunks[0].shard);
}

#[test]
fn test_split_divides_owning_chunk() {
    let catalog = catalog_with_sharded_foo();
    catalog.split("test.foo", &FieldValue::Int(10)).unwrap();

    let coll = catalog.collection("test.foo").unwrap();
    assert_eq!(2, coll.chunks.len());
    assert_eq!(Some("shard0"), coll.owning_shard(&FieldValue::Int(5)));
    assert_eq!(Some("shard0"), coll.owning_shard(&FieldValue::Int(15)));

    // splitting on an existing boundary is rejected
    assert!(catalog.split("test.foo", &FieldValue::Int(10)).is_err());
}

#[test]
fn test_move_chunk_reassigns_ownership() {
    let catalog = catalog_with_sharded_foo();
    catalog.split("test.foo", &FieldValue::Int(10)).unwrap();

    let moved = catalog.move_chunk("test.foo", &FieldValue::Int(20), "shard1").unwrap();
    assert_eq!("shard0", moved.shard);

    let coll = catalog.collection("test.foo").unwrap();
    assert_eq!(Some("shard1"), coll.owning_shard(&FieldValue::Int(20)));
    assert_eq!(Some("shard0"), coll.owning_shard(&FieldValue::Int(5)));
    assert_eq!(vec!["shard0".to_string(), "shard1".to_string()], coll.chunk_holding_shards());

    // moving to the current owner is rejected
    assert!(catalog.move_chunk("test.foo", &FieldValue::Int(20), "shard1").is_err());
}

#[test]
fn test_epoch_bumps_on_every_mutation() {
    let catalog = ShardingCatalog::new();
    let e0 = catalog.epoch();
    catalog.enable_sharding("test", "shard0");
    let e1 = catalog.epoch();
    catalog.shard_collection("test.foo", "num", false, "shard0");
    let e2 = catalog.epoch();
    catalog.split("test.foo", &FieldValue::Int(10)).unwrap();
    let e3 = catalog.epoch();
    assert!(e0 < e1 && e1 < e2 && e2 < e3);
}

#[test]
fn test_split_unsharded_namespace_is_rejected() {
    let catalog = ShardingCatalog::new();
    assert!(catalog.split("test.nope", &FieldValue::Int(1)).is_err());
    assert!(catalog.move_chunk("test.nope", &FieldValue::Int(1), "shard1").is_err());
}
