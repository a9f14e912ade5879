/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum RqliteError {
    /// An endpoint address could not be parsed as a URL.
    #[error("invalid address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },
    /// A pooled selector was built from an empty address list.
    #[error("no addresses provided")]
    NoAddresses,
    /// The same address appears more than once in a pooled selector.
    #[error("duplicate address provided: {0}")]
    DuplicateAddress(String),
    /// A pooled selector was given a zero health-check interval.
    #[error("health-check interval must be non-zero")]
    InvalidInterval,
    /// A pooled selector was built outside a Tokio runtime.
    #[error("no tokio runtime available: {0}")]
    NoRuntime(String),
    /// Every endpoint known to the selector is currently marked bad.
    #[error("no endpoints available")]
    NoEndpointsAvailable,
    /// Network or request execution error from `reqwest`.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// The caller's cancellation token fired before the exchange completed.
    #[error("request cancelled")]
    Cancelled,
    /// Reading a caller-supplied stream or local file failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Non-success HTTP status code with raw response body.
    #[error("http error {status}: {body}")]
    Http { status: u16, body: String },
    /// A request body could not be serialized.
    #[error("encode error: {0}")]
    Encode(String),
    /// Response body or statement element did not have the expected shape.
    #[error("decode error: {0}")]
    Decode(String),
    /// Statement-level error promoted to a call-level error.
    #[error("statement {index}: {message}")]
    Statement {
        /// Position of the failing statement in the submitted batch.
        index: usize,
        /// Error text reported by the node.
        message: String,
    },
    /// Whole-response error promoted to a call-level error.
    #[error("response error: {message}")]
    Response { message: String },
}

impl From<serde_json::Error> for RqliteError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}
