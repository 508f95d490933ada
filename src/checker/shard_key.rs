use crate::constants::RESERVED_DATABASES;
use crate::constants::SYSTEM_COLLECTION_PREFIX;
use crate::store::split_namespace;
use crate::store::ShardStore;
use crate::ShardKeyViolation;

/// Validates that `namespace` may be sharded on `shard_key` given the
/// current collection state on the database's primary shard.
///
/// Checks run in a fixed order and the first violation wins:
/// 1. reserved or system namespace
/// 2. capped collection
/// 3. existing unique index not prefixed by the shard key
/// 4. non-empty collection without a supporting index on the key
/// 5. non-empty collection holding missing or null shard-key values
///
/// A namespace with no collection yet passes every check; the collection is
/// created at shard time.
pub fn validate_shardable(
    store: &ShardStore,
    namespace: &str,
    shard_key: &str,
) -> std::result::Result<(), ShardKeyViolation> {
    let (db, collection_name) = split_namespace(namespace);
    if RESERVED_DATABASES.contains(&db) || collection_name.starts_with(SYSTEM_COLLECTION_PREFIX) {
        return Err(ShardKeyViolation::SystemNamespace(namespace.to_string()));
    }

    let Some(verdict) = store.read_collection(namespace, |collection| {
        if collection.capped {
            return Err(ShardKeyViolation::CappedCollection(namespace.to_string()));
        }

        if let Some(index) = collection.incompatible_unique_indexes(shard_key).first() {
            return Err(ShardKeyViolation::IncompatibleUniqueIndex {
                namespace: namespace.to_string(),
                index: index.name(),
            });
        }

        if !collection.documents.is_empty() {
            if !collection.has_index_on(shard_key) {
                return Err(ShardKeyViolation::MissingSupportingIndex(namespace.to_string()));
            }
            if collection.has_null_values_for(shard_key) {
                return Err(ShardKeyViolation::NullShardKeyValue(namespace.to_string()));
            }
        }

        Ok(())
    }) else {
        return Ok(());
    };
    verdict
}
