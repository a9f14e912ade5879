use std::collections::BTreeMap;

use serde::{de::IgnoredAny, Deserialize};
use serde_json::value::RawValue;

use crate::Value;

/// Top-level fields shared by every `/db/*` response. `results` is kept as
/// raw JSON so its shape can be sniffed afterwards.
#[derive(Debug, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub results: Option<Box<RawValue>>,
    #[serde(default)]
    pub time: f64,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub raft_index: u64,
}

#[derive(Debug, Deserialize)]
pub struct ExecuteRecord {
    #[serde(default)]
    pub last_insert_id: Option<i64>,
    #[serde(default)]
    pub rows_affected: Option<i64>,
    #[serde(default)]
    pub time: f64,
    #[serde(default)]
    pub error: Option<String>,
}

/// One element of a columnar `results` array.
#[derive(Debug, Deserialize)]
pub struct ColumnarRecord {
    #[serde(default)]
    pub columns: Option<Vec<String>>,
    #[serde(default)]
    pub types: Option<Vec<String>>,
    #[serde(default)]
    pub values: Option<Vec<Vec<Value>>>,
    #[serde(default)]
    pub last_insert_id: Option<i64>,
    #[serde(default)]
    pub rows_affected: Option<i64>,
    #[serde(default)]
    pub time: f64,
    #[serde(default)]
    pub error: Option<String>,
    /// Only present in associative output.
    #[serde(default)]
    pub rows: Option<IgnoredAny>,
}

/// One element of an associative `results` array.
#[derive(Debug, Deserialize)]
pub struct AssocRecord {
    #[serde(default)]
    pub types: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub rows: Option<Vec<BTreeMap<String, Value>>>,
    #[serde(default)]
    pub last_insert_id: Option<i64>,
    #[serde(default)]
    pub rows_affected: Option<i64>,
    #[serde(default)]
    pub time: f64,
    #[serde(default)]
    pub error: Option<String>,
    /// Only present in columnar output.
    #[serde(default)]
    pub columns: Option<IgnoredAny>,
    #[serde(default)]
    pub values: Option<IgnoredAny>,
}
