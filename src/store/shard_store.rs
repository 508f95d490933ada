use std::collections::BTreeSet;

use dashmap::DashMap;

use super::split_namespace;
use super::CollectionState;
use super::Document;
use super::FieldValue;
use super::IndexSpec;

/// The data a shard replica set holds. One store is shared by all members of
/// the replica set; the harness treats intra-shard replication as
/// instantaneous.
#[derive(Debug, Default)]
pub struct ShardStore {
    collections: DashMap<String, CollectionState>,
}

impl ShardStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_collection(
        &self,
        namespace: &str,
    ) -> bool {
        self.collections.contains_key(namespace)
    }

    pub fn create_collection(
        &self,
        namespace: &str,
        capped: bool,
    ) {
        self.collections.entry(namespace.to_string()).or_insert_with(|| CollectionState {
            capped,
            ..Default::default()
        });
    }

    /// Runs `f` against the collection, creating it on first touch.
    pub fn with_collection<R>(
        &self,
        namespace: &str,
        f: impl FnOnce(&mut CollectionState) -> R,
    ) -> R {
        let mut entry = self.collections.entry(namespace.to_string()).or_default();
        f(entry.value_mut())
    }

    /// Runs `f` against the collection if it exists.
    pub fn read_collection<R>(
        &self,
        namespace: &str,
        f: impl FnOnce(&CollectionState) -> R,
    ) -> Option<R> {
        self.collections.get(namespace).map(|c| f(c.value()))
    }

    pub fn insert_document(
        &self,
        namespace: &str,
        document: Document,
    ) {
        self.with_collection(namespace, |c| c.documents.push(document));
    }

    pub fn count(
        &self,
        namespace: &str,
    ) -> u64 {
        self.read_collection(namespace, |c| c.documents.len() as u64).unwrap_or(0)
    }

    pub fn find_all(
        &self,
        namespace: &str,
    ) -> Vec<Document> {
        self.read_collection(namespace, |c| c.documents.clone()).unwrap_or_default()
    }

    pub fn index_signature(
        &self,
        namespace: &str,
    ) -> Vec<(String, bool)> {
        self.read_collection(namespace, |c| c.index_signature()).unwrap_or_default()
    }

    /// Drains documents whose `field` value lies in `[min, max)` bounds
    /// according to `in_range`, returning them for hand-off to another shard.
    pub fn extract_documents(
        &self,
        namespace: &str,
        field: &str,
        in_range: impl Fn(&FieldValue) -> bool,
    ) -> Vec<Document> {
        self.with_collection(namespace, |c| {
            let (moved, kept): (Vec<Document>, Vec<Document>) = c
                .documents
                .drain(..)
                .partition(|d| in_range(&CollectionState::field_value(d, field)));
            c.documents = kept;
            moved
        })
    }

    /// Copies the full index set of `namespace` into this store, creating the
    /// collection if needed. Used when a chunk lands on a shard that has not
    /// hosted the collection before.
    pub fn adopt_indexes(
        &self,
        namespace: &str,
        indexes: &[IndexSpec],
    ) {
        self.with_collection(namespace, |c| {
            for index in indexes {
                c.ensure_index(index.clone());
            }
        });
    }

    /// All namespaces present in this store, sorted.
    pub fn namespaces(&self) -> Vec<String> {
        let mut namespaces: Vec<String> = self.collections.iter().map(|e| e.key().clone()).collect();
        namespaces.sort();
        namespaces
    }

    /// Database names present in this store, derived from namespaces.
    pub fn database_names(&self) -> BTreeSet<String> {
        self.collections
            .iter()
            .map(|entry| split_namespace(entry.key()).0.to_string())
            .collect()
    }

    /// Rough payload size, good enough for `listDatabases` totals.
    pub fn approximate_size(&self) -> u64 {
        self.collections.iter().map(|c| c.value().documents.len() as u64 * 64).sum()
    }
}
