use std::collections::BTreeMap;

use crate::{RqliteError, Value};

/// First statement-level error found in a decoded response.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResponseError {
    /// Index of the failing statement, `None` for a whole-response error.
    pub index: Option<usize>,
    pub message: String,
}

impl From<ResponseError> for RqliteError {
    fn from(err: ResponseError) -> Self {
        match err.index {
            Some(index) => RqliteError::Statement {
                index,
                message: err.message,
            },
            None => RqliteError::Response {
                message: err.message,
            },
        }
    }
}

fn first_error<'a>(
    top_level: Option<&'a str>,
    per_statement: impl IntoIterator<Item = Option<&'a str>>,
) -> Option<ResponseError> {
    if let Some(message) = top_level {
        return Some(ResponseError {
            index: None,
            message: message.to_owned(),
        });
    }
    per_statement
        .into_iter()
        .enumerate()
        .find_map(|(index, error)| {
            error.map(|message| ResponseError {
                index: Some(index),
                message: message.to_owned(),
            })
        })
}

/// Outcome of one write statement.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExecuteResult {
    pub last_insert_id: i64,
    pub rows_affected: i64,
    /// Seconds spent executing, present when timings were requested.
    pub time: f64,
    pub error: Option<String>,
}

/// Decoded body of `/db/execute`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExecuteResponse {
    pub results: Vec<ExecuteResult>,
    pub time: f64,
    pub error: Option<String>,
    /// Set when the writes were queued.
    pub sequence_number: i64,
    pub raft_index: u64,
}

impl ExecuteResponse {
    /// Returns the whole-response error, or else the first statement error.
    pub fn has_error(&self) -> Option<ResponseError> {
        first_error(
            self.error.as_deref(),
            self.results.iter().map(|result| result.error.as_deref()),
        )
    }
}

/// Columnar query result: column names, declared types and value rows.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub types: Vec<String>,
    pub values: Vec<Vec<Value>>,
    /// Set by writes that also return rows, e.g. `INSERT ... RETURNING`.
    pub last_insert_id: i64,
    pub rows_affected: i64,
    pub time: f64,
    pub error: Option<String>,
}

/// Associative query result: declared types by name and rows as maps.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryResultAssoc {
    pub types: BTreeMap<String, String>,
    pub rows: Vec<BTreeMap<String, Value>>,
    pub last_insert_id: i64,
    pub rows_affected: i64,
    pub time: f64,
    pub error: Option<String>,
}

/// Per-statement query results in whichever shape the node returned.
#[derive(Clone, Debug, PartialEq)]
pub enum QueryResults {
    Columnar(Vec<QueryResult>),
    Associative(Vec<QueryResultAssoc>),
}

impl QueryResults {
    pub fn len(&self) -> usize {
        match self {
            Self::Columnar(results) => results.len(),
            Self::Associative(results) => results.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn columnar(&self) -> Option<&[QueryResult]> {
        match self {
            Self::Columnar(results) => Some(results),
            Self::Associative(_) => None,
        }
    }

    pub fn associative(&self) -> Option<&[QueryResultAssoc]> {
        match self {
            Self::Associative(results) => Some(results),
            Self::Columnar(_) => None,
        }
    }

    fn errors(&self) -> Vec<Option<&str>> {
        match self {
            Self::Columnar(results) => results.iter().map(|r| r.error.as_deref()).collect(),
            Self::Associative(results) => results.iter().map(|r| r.error.as_deref()).collect(),
        }
    }
}

impl Default for QueryResults {
    fn default() -> Self {
        Self::Columnar(Vec::new())
    }
}

/// Decoded body of `/db/query`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryResponse {
    pub results: QueryResults,
    pub time: f64,
    pub error: Option<String>,
    pub raft_index: u64,
}

impl QueryResponse {
    pub fn has_error(&self) -> Option<ResponseError> {
        first_error(self.error.as_deref(), self.results.errors())
    }
}

/// One statement's outcome in a columnar `/db/request` response.
#[derive(Clone, Debug, PartialEq)]
pub enum RequestResult {
    Execute(ExecuteResult),
    Query(QueryResult),
}

/// One statement's outcome in an associative `/db/request` response.
#[derive(Clone, Debug, PartialEq)]
pub enum RequestResultAssoc {
    Execute(ExecuteResult),
    Query(QueryResultAssoc),
}

impl RequestResult {
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Execute(result) => result.error.as_deref(),
            Self::Query(result) => result.error.as_deref(),
        }
    }
}

impl RequestResultAssoc {
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Execute(result) => result.error.as_deref(),
            Self::Query(result) => result.error.as_deref(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum RequestResults {
    Columnar(Vec<RequestResult>),
    Associative(Vec<RequestResultAssoc>),
}

impl RequestResults {
    pub fn len(&self) -> usize {
        match self {
            Self::Columnar(results) => results.len(),
            Self::Associative(results) => results.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn columnar(&self) -> Option<&[RequestResult]> {
        match self {
            Self::Columnar(results) => Some(results),
            Self::Associative(_) => None,
        }
    }

    pub fn associative(&self) -> Option<&[RequestResultAssoc]> {
        match self {
            Self::Associative(results) => Some(results),
            Self::Columnar(_) => None,
        }
    }

    fn errors(&self) -> Vec<Option<&str>> {
        match self {
            Self::Columnar(results) => results.iter().map(RequestResult::error).collect(),
            Self::Associative(results) => {
                results.iter().map(RequestResultAssoc::error).collect()
            }
        }
    }
}

impl Default for RequestResults {
    fn default() -> Self {
        Self::Columnar(Vec::new())
    }
}

/// Decoded body of `/db/request`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RequestResponse {
    pub results: RequestResults,
    pub time: f64,
    pub error: Option<String>,
    pub raft_index: u64,
}

impl RequestResponse {
    pub fn has_error(&self) -> Option<ResponseError> {
        first_error(self.error.as_deref(), self.results.errors())
    }
}
