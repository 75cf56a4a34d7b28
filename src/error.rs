use thiserror::Error;

/// Errors from the shared key/value store (revocation entries and rate counters).
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The store could not be reached or the connection could not be established
    #[error("Store connection error: {0}")]
    Connection(String),

    /// A command was sent but failed
    #[error("Store command error: {0}")]
    Command(String),
}

/// Reasons a request is rejected by the authentication gate.
///
/// Each variant is an absorbing `Rejected` state of the gate; see
/// [`crate::auth::AuthGate`] for the order in which they are checked.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// No credential header on the request
    #[error("Missing API key")]
    MissingCredential,

    /// Credential is malformed, has a bad signature or lacks required claims
    #[error("Invalid API key")]
    InvalidCredential,

    /// Credential is well-formed but revoked or unknown
    #[error("API key is revoked or unknown")]
    Unauthorized,

    /// The per-minute request budget for this credential is exhausted
    #[error("Rate limit exceeded")]
    RateLimited,

    /// The rate-limit store failed while counting this request
    #[error("Rate limit store unavailable")]
    StoreUnavailable,
}

/// Rejections from the remote image fetch collaborator.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// Upstream answered with something other than 200
    #[error("Resource at {url} returned status code {status}")]
    UpstreamStatus { url: String, status: u16 },

    /// Upstream did not announce a usable, non-zero content length
    #[error("Unable to fetch resource at {url}")]
    MissingContentLength { url: String },

    /// Announced content length is over the configured limit
    #[error("Resource at {url} too large ({size} bytes, limit {limit})")]
    TooLarge { url: String, size: u64, limit: u64 },

    /// Upstream sent more bytes than it announced or than the limit allows
    #[error("Resource at {url} sent more data than announced")]
    BodyOverflow { url: String },

    /// Connection, TLS or timeout failure while talking to upstream
    #[error("Failed to fetch resource at {url}: {message}")]
    Transport { url: String, message: String },
}

/// Errors raised by an image engine.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// The engine does not expose an operation with this name
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    /// The arguments have the right shape but the engine cannot use them
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Generation or encoding failed
    #[error("Generation failed: {0}")]
    Generation(String),
}

/// Per-request dispatch errors.
#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    /// No registered operation has this name
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    /// Wrong number of `texts` values for a text operation
    #[error("Expected array of length {expected}, got array of length {actual}")]
    ArityMismatch { expected: usize, actual: usize },

    /// Paste operation called without a `url` parameter
    #[error("Missing required query parameter 'url'")]
    MissingUrl,

    /// The `url` parameter is not an absolute http(s) URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The remote image was rejected
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The engine rejected the request or failed
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Fatal errors while building the operation registry at startup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Parameter list matches neither the paste nor the text shape
    #[error("Couldn't understand parameter types for operation '{0}'")]
    UnclassifiableOperation(String),

    /// Two operations share a route name
    #[error("Operation '{0}' is declared more than once")]
    DuplicateOperation(String),

    /// The name cannot be used as a route segment
    #[error("Operation name '{0}' is not a valid route segment")]
    InvalidOperationName(String),
}
