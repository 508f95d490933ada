use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// A single document field value. The domain is totally ordered so chunk
/// ranges and unique-key comparisons are well defined.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            FieldValue::Null => write!(f, "null"),
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Int(i) => write!(f, "{}", i),
            FieldValue::Str(s) => write!(f, "\"{}\"", s),
        }
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Int(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Str(v.to_string())
    }
}

/// Documents are flat field maps; nested documents are out of scope for the
/// harness.
pub type Document = BTreeMap<String, FieldValue>;

/// Convenience constructor for scenario code.
pub fn doc<I, K, V>(fields: I) -> Document
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<FieldValue>,
{
    fields.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
}

/// A chunk range endpoint. `Min`/`Max` are the open-ended sentinels of the
/// shard-key domain.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum KeyBound {
    Min,
    Value(FieldValue),
    Max,
}

impl KeyBound {
    /// Whether `value` falls into `[self, upper)`.
    pub fn contains(
        &self,
        upper: &KeyBound,
        value: &FieldValue,
    ) -> bool {
        let lower_ok = match self {
            KeyBound::Min => true,
            KeyBound::Value(v) => value >= v,
            KeyBound::Max => false,
        };
        let upper_ok = match upper {
            KeyBound::Min => false,
            KeyBound::Value(v) => value < v,
            KeyBound::Max => true,
        };
        lower_ok && upper_ok
    }
}
