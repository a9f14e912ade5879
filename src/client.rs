use std::{
    fmt,
    io::{self, Cursor},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, PoisonError, RwLock,
    },
};

use bytes::Bytes;
use futures_util::TryStreamExt;
use reqwest::{header, Method, StatusCode, Url};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::{
    io::{ReaderStream, StreamReader},
    sync::CancellationToken,
};

use crate::{
    decode::decode_response,
    statement::encode_statements,
    transport,
    url_values::{make_url_values, UrlValues},
    BackupOptions, ClientOptions, ExecuteOptions, ExecuteResponse, FixedSelector, LoadOptions,
    NodeOptions, Params, QueryOptions, QueryResponse, ReadyOptions, RequestOptions,
    RequestResponse, ResponseError, Result, RqliteError, Selector, Statement,
};

const EXECUTE_PATH: &str = "/db/execute";
const QUERY_PATH: &str = "/db/query";
const REQUEST_PATH: &str = "/db/request";
const BACKUP_PATH: &str = "/db/backup";
const LOAD_PATH: &str = "/db/load";
const BOOT_PATH: &str = "/boot";
const STATUS_PATH: &str = "/status";
const EXPVAR_PATH: &str = "/debug/vars";
const NODES_PATH: &str = "/nodes";
const READY_PATH: &str = "/readyz";
const REMOVE_PATH: &str = "/remove";

/// Response header carrying the node's software version.
pub const VERSION_HEADER: &str = "X-RQLITE-VERSION";

/// First bytes of every SQLite database file.
const SQLITE_HEADER: &[u8] = b"SQLite format";

const OCTET_STREAM: &str = "application/octet-stream";
const TEXT_PLAIN: &str = "text/plain";
const APPLICATION_JSON: &str = "application/json";

#[derive(Clone)]
struct Credentials {
    username: String,
    password: String,
}

enum RequestBody {
    Empty,
    Json(Vec<u8>),
    Stream {
        content_type: &'static str,
        body: reqwest::Body,
    },
}

/// A completed 2xx exchange with its body fully read.
struct Exchange {
    headers: header::HeaderMap,
    body: Bytes,
}

/// HTTP client for an rqlite node or cluster.
///
/// Every operation takes a [`CancellationToken`]; cancelling it aborts the
/// in-flight exchange and the call returns [`RqliteError::Cancelled`].
/// The client is `Send + Sync` and meant to be shared (e.g. behind an `Arc`).
pub struct RqliteClient {
    selector: Arc<dyn Selector>,
    http: reqwest::Client,
    options: ClientOptions,
    promote_errors: AtomicBool,
    credentials: RwLock<Option<Credentials>>,
}

impl fmt::Debug for RqliteClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let has_credentials = self.credentials().is_some();
        f.debug_struct("RqliteClient")
            .field(
                "basic_auth",
                &if has_credentials { "<redacted>" } else { "<none>" },
            )
            .field("promote_errors", &self.promote_errors.load(Ordering::Relaxed))
            .field("options", &self.options)
            .finish()
    }
}

impl RqliteClient {
    /// Creates a client that always talks to the node at `address`.
    pub fn new(address: &str) -> Result<Self> {
        Self::with_selector(Arc::new(FixedSelector::new(address)?))
    }

    /// Creates a client that asks `selector` for the target of every request.
    ///
    /// The transport is [`transport::default_http_client`], which gives up
    /// on an exchange after [`transport::DEFAULT_TIMEOUT`].
    pub fn with_selector(selector: Arc<dyn Selector>) -> Result<Self> {
        Ok(Self {
            selector,
            http: transport::default_http_client()?,
            options: ClientOptions::default(),
            promote_errors: AtomicBool::new(false),
            credentials: RwLock::new(None),
        })
    }

    /// Creates a client from environment variables.
    ///
    /// Reads:
    /// - `RQLITE_HTTP_URL`: node address, e.g. `http://localhost:4001`
    /// - `RQLITE_HTTP_USER` / `RQLITE_HTTP_PASSWORD`: optional basic auth
    pub fn from_env() -> std::result::Result<Self, String> {
        let url = std::env::var("RQLITE_HTTP_URL")
            .map_err(|_| "missing RQLITE_HTTP_URL environment variable".to_owned())?;
        if url.trim().is_empty() {
            return Err("RQLITE_HTTP_URL is set but empty".to_owned());
        }
        let client = Self::new(url.trim()).map_err(|err| err.to_string())?;
        if let Ok(username) = std::env::var("RQLITE_HTTP_USER") {
            let password = std::env::var("RQLITE_HTTP_PASSWORD").unwrap_or_default();
            client.set_basic_auth(username, password);
        }
        Ok(client)
    }

    /// Replaces the transport, e.g. with one from [`crate::transport`].
    ///
    /// The transport's own timeout policy stays in charge unless
    /// [`ClientOptions::timeout`] is set.
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    /// Applies client options such as the per-request timeout.
    pub fn with_options(mut self, opts: ClientOptions) -> Self {
        self.options = opts;
        self
    }

    /// Sets basic-auth credentials for all later requests.
    ///
    /// Passing two empty strings disables basic auth.
    pub fn set_basic_auth(&self, username: impl Into<String>, password: impl Into<String>) {
        let username = username.into();
        let password = password.into();
        let credentials = (!username.is_empty() || !password.is_empty()).then_some(Credentials {
            username,
            password,
        });
        *self
            .credentials
            .write()
            .unwrap_or_else(PoisonError::into_inner) = credentials;
    }

    /// Turns statement-level errors into call-level errors.
    ///
    /// Off by default: a 2xx response is returned as-is and callers inspect
    /// `has_error()` on it. When on, the first statement error is returned as
    /// [`RqliteError::Statement`] (or [`RqliteError::Response`]).
    pub fn promote_errors(&self, enabled: bool) {
        self.promote_errors.store(enabled, Ordering::Relaxed);
    }

    /// Runs write statements through `/db/execute`.
    pub async fn execute(
        &self,
        cancel: &CancellationToken,
        statements: &[Statement],
        options: Option<&ExecuteOptions>,
    ) -> Result<ExecuteResponse> {
        let promote = self.promote_errors.load(Ordering::Relaxed);
        let exchange = self
            .post_statements(cancel, EXECUTE_PATH, statements, options)
            .await?;
        let response: ExecuteResponse = decode_response(&exchange.body)?;
        promote_error(promote, response.has_error())?;
        Ok(response)
    }

    /// Runs one write statement with positional or named parameters.
    pub async fn execute_single<P: Into<Params>>(
        &self,
        cancel: &CancellationToken,
        sql: &str,
        params: P,
    ) -> Result<ExecuteResponse> {
        self.execute(cancel, &[Statement::new(sql, params)], None)
            .await
    }

    /// Runs read statements through `/db/query`.
    pub async fn query(
        &self,
        cancel: &CancellationToken,
        statements: &[Statement],
        options: Option<&QueryOptions>,
    ) -> Result<QueryResponse> {
        let promote = self.promote_errors.load(Ordering::Relaxed);
        let exchange = self
            .post_statements(cancel, QUERY_PATH, statements, options)
            .await?;
        let response: QueryResponse = decode_response(&exchange.body)?;
        promote_error(promote, response.has_error())?;
        Ok(response)
    }

    /// Runs one read statement with positional or named parameters.
    pub async fn query_single<P: Into<Params>>(
        &self,
        cancel: &CancellationToken,
        sql: &str,
        params: P,
    ) -> Result<QueryResponse> {
        self.query(cancel, &[Statement::new(sql, params)], None)
            .await
    }

    /// Runs a mix of reads and writes through `/db/request`.
    pub async fn request(
        &self,
        cancel: &CancellationToken,
        statements: &[Statement],
        options: Option<&RequestOptions>,
    ) -> Result<RequestResponse> {
        let promote = self.promote_errors.load(Ordering::Relaxed);
        let exchange = self
            .post_statements(cancel, REQUEST_PATH, statements, options)
            .await?;
        let response: RequestResponse = decode_response(&exchange.body)?;
        promote_error(promote, response.has_error())?;
        Ok(response)
    }

    /// Runs one read or write statement with positional or named parameters.
    pub async fn request_single<P: Into<Params>>(
        &self,
        cancel: &CancellationToken,
        sql: &str,
        params: P,
    ) -> Result<RequestResponse> {
        self.request(cancel, &[Statement::new(sql, params)], None)
            .await
    }

    /// Requests a copy of the database.
    ///
    /// The returned [`Backup`] owns the open response; dropping it closes the
    /// connection.
    pub async fn backup(
        &self,
        cancel: &CancellationToken,
        options: Option<&BackupOptions>,
    ) -> Result<Backup> {
        let query = make_url_values(options);
        let response = self
            .send(cancel, Method::GET, BACKUP_PATH, &query, RequestBody::Empty)
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = read_body(cancel, response).await?;
            return Err(http_error(status, &body));
        }
        Ok(Backup {
            response,
            cancel: cancel.clone(),
        })
    }

    /// Streams a SQLite database file or a SQL text dump into the node.
    ///
    /// Input starting with the SQLite file signature is sent as
    /// `application/octet-stream`, anything else as `text/plain`.
    pub async fn load<R>(
        &self,
        cancel: &CancellationToken,
        mut reader: R,
        options: Option<&LoadOptions>,
    ) -> Result<()>
    where
        R: AsyncRead + Send + Sync + Unpin + 'static,
    {
        let query = make_url_values(options);

        let mut prefix = Vec::with_capacity(SQLITE_HEADER.len());
        let mut head = (&mut reader).take(SQLITE_HEADER.len() as u64);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RqliteError::Cancelled),
            read = head.read_to_end(&mut prefix) => {
                read?;
            }
        }
        if prefix.is_empty() {
            return Err(RqliteError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "load input is empty",
            )));
        }

        let content_type = if prefix == SQLITE_HEADER {
            OCTET_STREAM
        } else {
            TEXT_PLAIN
        };
        let stream = ReaderStream::new(Cursor::new(prefix).chain(reader));
        let body = RequestBody::Stream {
            content_type,
            body: reqwest::Body::wrap_stream(stream),
        };
        self.round_trip(cancel, Method::POST, LOAD_PATH, &query, body)
            .await?;
        Ok(())
    }

    /// Initializes a single-node system from a raw SQLite database file.
    pub async fn boot<R>(&self, cancel: &CancellationToken, reader: R) -> Result<()>
    where
        R: AsyncRead + Send + Sync + Unpin + 'static,
    {
        let body = RequestBody::Stream {
            content_type: OCTET_STREAM,
            body: reqwest::Body::wrap_stream(ReaderStream::new(reader)),
        };
        self.round_trip(cancel, Method::POST, BOOT_PATH, &[], body)
            .await?;
        Ok(())
    }

    /// Removes the node with ID `id` from the cluster.
    pub async fn remove_node(&self, cancel: &CancellationToken, id: &str) -> Result<()> {
        let body = serde_json::to_vec(&serde_json::json!({ "id": id }))
            .map_err(|err| RqliteError::Encode(err.to_string()))?;
        self.round_trip(
            cancel,
            Method::DELETE,
            REMOVE_PATH,
            &[],
            RequestBody::Json(body),
        )
        .await?;
        Ok(())
    }

    /// Returns the node's status document exactly as sent.
    pub async fn status(&self, cancel: &CancellationToken) -> Result<Bytes> {
        self.get_raw(cancel, STATUS_PATH, &[]).await
    }

    /// Returns the node's diagnostic variables from `/debug/vars` exactly as sent.
    pub async fn expvar(&self, cancel: &CancellationToken) -> Result<Bytes> {
        self.get_raw(cancel, EXPVAR_PATH, &[]).await
    }

    /// Returns the cluster's node list exactly as sent.
    pub async fn nodes(
        &self,
        cancel: &CancellationToken,
        options: Option<&NodeOptions>,
    ) -> Result<Bytes> {
        self.get_raw(cancel, NODES_PATH, &make_url_values(options))
            .await
    }

    /// Returns the raw body of the node's readiness check.
    pub async fn ready(
        &self,
        cancel: &CancellationToken,
        options: Option<&ReadyOptions>,
    ) -> Result<Bytes> {
        self.get_raw(cancel, READY_PATH, &make_url_values(options))
            .await
    }

    /// Returns the version reported by the node, or `"unknown"`.
    pub async fn version(&self, cancel: &CancellationToken) -> Result<String> {
        let exchange = self
            .round_trip(cancel, Method::GET, STATUS_PATH, &[], RequestBody::Empty)
            .await?;
        let version = exchange
            .headers
            .get(VERSION_HEADER)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
            .unwrap_or("unknown");
        Ok(version.to_owned())
    }

    async fn post_statements<O: UrlValues>(
        &self,
        cancel: &CancellationToken,
        path: &str,
        statements: &[Statement],
        options: Option<&O>,
    ) -> Result<Exchange> {
        let body = encode_statements(statements)?;
        let query = make_url_values(options);
        self.round_trip(cancel, Method::POST, path, &query, RequestBody::Json(body))
            .await
    }

    async fn get_raw(
        &self,
        cancel: &CancellationToken,
        path: &str,
        query: &[(String, String)],
    ) -> Result<Bytes> {
        let exchange = self
            .round_trip(cancel, Method::GET, path, query, RequestBody::Empty)
            .await?;
        Ok(exchange.body)
    }

    /// Sends a request and reads the whole body; non-2xx is an error.
    async fn round_trip(
        &self,
        cancel: &CancellationToken,
        method: Method,
        path: &str,
        query: &[(String, String)],
        body: RequestBody,
    ) -> Result<Exchange> {
        let response = self.send(cancel, method, path, query, body).await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = read_body(cancel, response).await?;
        if !status.is_success() {
            return Err(http_error(status, &body));
        }
        Ok(Exchange { headers, body })
    }

    async fn send(
        &self,
        cancel: &CancellationToken,
        method: Method,
        path: &str,
        query: &[(String, String)],
        body: RequestBody,
    ) -> Result<reqwest::Response> {
        let url = endpoint_url(self.selector.next()?, path, query);

        #[cfg(feature = "tracing")]
        tracing::debug!(method = %method, url = %url, "sending rqlite request");

        let mut request = self.http.request(method, url);
        if let Some(timeout) = self.options.timeout {
            request = request.timeout(timeout);
        }
        if let Some(credentials) = self.credentials() {
            request = request.basic_auth(credentials.username, Some(credentials.password));
        }
        request = match body {
            RequestBody::Empty => request,
            RequestBody::Json(body) => request
                .header(header::CONTENT_TYPE, APPLICATION_JSON)
                .body(body),
            RequestBody::Stream { content_type, body } => {
                request.header(header::CONTENT_TYPE, content_type).body(body)
            }
        };

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RqliteError::Cancelled),
            response = request.send() => response?,
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(status = response.status().as_u16(), "rqlite response received");

        Ok(response)
    }

    fn credentials(&self) -> Option<Credentials> {
        self.credentials
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

fn promote_error(enabled: bool, error: Option<ResponseError>) -> Result<()> {
    match error {
        Some(error) if enabled => Err(error.into()),
        _ => Ok(()),
    }
}

fn http_error(status: StatusCode, body: &[u8]) -> RqliteError {
    RqliteError::Http {
        status: status.as_u16(),
        body: String::from_utf8_lossy(body).into_owned(),
    }
}

async fn read_body(cancel: &CancellationToken, response: reqwest::Response) -> Result<Bytes> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(RqliteError::Cancelled),
        body = response.bytes() => Ok(body?),
    }
}

/// Appends `path` to the base URL's path and `query` to its query string.
fn endpoint_url(mut base: Url, path: &str, query: &[(String, String)]) -> Url {
    let joined = format!("{}{}", base.path().trim_end_matches('/'), path);
    base.set_path(&joined);
    if !query.is_empty() {
        base.query_pairs_mut().extend_pairs(query);
    }
    base
}

/// A database backup streamed from the node.
///
/// Dropping it closes the underlying connection.
#[derive(Debug)]
pub struct Backup {
    response: reqwest::Response,
    cancel: CancellationToken,
}

impl Backup {
    /// Returns the next chunk of the backup, or `None` at the end.
    pub async fn chunk(&mut self) -> Result<Option<Bytes>> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(RqliteError::Cancelled),
            chunk = self.response.chunk() => Ok(chunk?),
        }
    }

    /// Reads the remaining backup into memory.
    pub async fn bytes(self) -> Result<Bytes> {
        read_body(&self.cancel, self.response).await
    }

    /// Copies the remaining backup into `writer`, returning the byte count.
    pub async fn copy_to<W>(mut self, writer: &mut W) -> Result<u64>
    where
        W: AsyncWrite + Unpin,
    {
        let mut written = 0u64;
        while let Some(chunk) = self.chunk().await? {
            writer.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        writer.flush().await?;
        Ok(written)
    }

    /// Converts the backup into an [`AsyncRead`].
    ///
    /// The reader does not observe the cancellation token; drop it to abort.
    pub fn into_reader(self) -> impl AsyncRead + Send + Unpin {
        StreamReader::new(Box::pin(self.response.bytes_stream().map_err(io::Error::other)))
    }
}
