use serde::Deserialize;
use serde::Serialize;

use super::Document;
use super::FieldValue;

/// An index declaration: ordered key fields plus the uniqueness flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub keys: Vec<String>,
    pub unique: bool,
}

impl IndexSpec {
    pub fn new<I, K>(
        keys: I,
        unique: bool,
    ) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
            unique,
        }
    }

    /// Index name in the conventional form: `num_1` for a single key,
    /// `num_1_other_1` for a compound one.
    pub fn name(&self) -> String {
        self.keys
            .iter()
            .map(|k| format!("{}_1", k))
            .collect::<Vec<_>>()
            .join("_")
    }

    /// Whether `field` is the leading key, i.e. the shard key is a prefix of
    /// this index.
    pub fn prefixed_by(
        &self,
        field: &str,
    ) -> bool {
        self.keys.first().map(|k| k == field).unwrap_or(false)
    }
}

/// One collection's state inside a shard store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectionState {
    pub documents: Vec<Document>,
    pub indexes: Vec<IndexSpec>,
    pub capped: bool,
}

impl CollectionState {
    /// Adds the index if no index with the same name exists yet.
    pub fn ensure_index(
        &mut self,
        index: IndexSpec,
    ) {
        if !self.indexes.iter().any(|i| i.name() == index.name()) {
            self.indexes.push(index);
        }
    }

    pub fn drop_index(
        &mut self,
        name: &str,
    ) -> bool {
        let before = self.indexes.len();
        self.indexes.retain(|i| i.name() != name);
        self.indexes.len() != before
    }

    pub fn has_index_on(
        &self,
        field: &str,
    ) -> bool {
        self.indexes.iter().any(|i| i.prefixed_by(field))
    }

    /// Unique indexes whose leading key is *not* `field`; these make the
    /// collection unshardable on `field`.
    pub fn incompatible_unique_indexes(
        &self,
        field: &str,
    ) -> Vec<&IndexSpec> {
        self.indexes.iter().filter(|i| i.unique && !i.prefixed_by(field)).collect()
    }

    pub fn field_value(
        doc: &Document,
        field: &str,
    ) -> FieldValue {
        doc.get(field).cloned().unwrap_or(FieldValue::Null)
    }

    /// Whether any existing document lacks the field or carries null in it.
    pub fn has_null_values_for(
        &self,
        field: &str,
    ) -> bool {
        self.documents.iter().any(|d| Self::field_value(d, field).is_null())
    }

    pub fn contains_key_value(
        &self,
        field: &str,
        value: &FieldValue,
    ) -> bool {
        self.documents.iter().any(|d| &Self::field_value(d, field) == value)
    }

    /// Sorted (name, unique) pairs, used for cross-shard index comparison.
    pub fn index_signature(&self) -> Vec<(String, bool)> {
        let mut sig: Vec<(String, bool)> = self.indexes.iter().map(|i| (i.name(), i.unique)).collect();
        sig.sort();
        sig
    }
}
