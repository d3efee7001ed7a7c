use thiserror::Error;

/// Error taxonomy for the client transport.
///
/// All of these are scoped to a single call attempt; none is fatal to the
/// process. The retrying invoker treats every variant as "attempt failed,
/// consult the retry budget". `Timeout` deserves care from callers: it means
/// the request was sent and *may* have been processed remotely, while
/// `SendRequest` means it was not.
#[derive(Error, Debug)]
pub enum LoomError {
    #[error("no available service for {0}")]
    NoRoute(String),

    #[error("connect to {addr} failed: {reason}")]
    Connect { addr: String, reason: String },

    #[error("connection table lock not acquired within {0}ms")]
    LockTimeout(u64),

    #[error("send request to {addr} failed: {reason}")]
    SendRequest { addr: String, reason: String },

    #[error("no response from {addr} within {timeout_ms}ms")]
    Timeout { addr: String, timeout_ms: u64 },

    #[error("too many in-flight async requests: {0}")]
    TooManyRequests(String),

    #[error("remote call failed with code {code}: {message}")]
    Application { code: i32, message: String },

    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, LoomError>;
