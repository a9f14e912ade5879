//! `rqlite-http` is an async HTTP client for [rqlite](https://rqlite.io).
//!
//! The crate wraps the node's HTTP API with typed methods:
//! - [`RqliteClient::execute`], [`RqliteClient::query`], [`RqliteClient::request`]
//! - [`RqliteClient::backup`], [`RqliteClient::load`], [`RqliteClient::boot`]
//! - [`RqliteClient::status`], [`RqliteClient::nodes`], [`RqliteClient::ready`] and friends
//!
//! Requests go to the node chosen by a [`Selector`]: a [`FixedSelector`] for a
//! single node, or a [`PooledSelector`] that spreads load over a cluster and
//! re-admits failed nodes once a health check passes.

mod client;
mod decode;
mod error;
mod options;
mod selector;
mod statement;
pub mod transport;
mod types;
pub mod url_values;
mod value;
mod wire;

pub use client::{Backup, RqliteClient, VERSION_HEADER};
pub use error::RqliteError;
pub use options::{
    BackupOptions, ClientOptions, ConsistencyLevel, ExecuteOptions, LoadOptions, NodeOptions,
    QueryOptions, ReadyOptions, RequestOptions,
};
pub use selector::{FixedSelector, HealthCheck, HealthCheckFuture, PooledSelector, Selector};
pub use statement::{Params, Statement};
pub use types::{
    ExecuteResponse, ExecuteResult, QueryResponse, QueryResult, QueryResultAssoc, QueryResults,
    RequestResponse, RequestResult, RequestResultAssoc, RequestResults, ResponseError,
};
pub use value::Value;

pub use reqwest::Url;
pub use tokio_util::sync::CancellationToken;

pub type Result<T> = std::result::Result<T, RqliteError>;
