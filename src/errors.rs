use thiserror::Error;

/// SQL state reported alongside connection-level HTTP failures.
pub const SQLSTATE_CONNECTION_FAILURE: &str = "08006";

#[derive(Debug, Error)]
pub enum Error {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("operation deadline exceeded")]
    Timeout,

    #[error("operation cancelled")]
    Cancelled,

    #[error("failed to decode server response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("malformed server response: {0}")]
    MalformedResponse(String),

    /// The server answered `success=false` with a numeric error code.
    #[error("server error {code}: {message}")]
    Server { code: i32, message: String },

    #[error("failed to post query: HTTP {status}, URL {url}")]
    FailedToPostQuery { status: u16, url: String },

    #[error("failed to renew session: HTTP {status}, URL {url}")]
    FailedToRenewSession { status: u16, url: String },

    #[error("failed to close session: HTTP {status}, URL {url}")]
    FailedToCloseSession { status: u16, url: String },

    #[error("failed to cancel query: HTTP {status}, URL {url}")]
    FailedToCancelQuery { status: u16, url: String },
}

impl Error {
    /// True when the operation was terminated by the caller's deadline or
    /// cancellation rather than by the server.
    pub fn is_terminated_by_caller(&self) -> bool {
        matches!(self, Error::Timeout | Error::Cancelled)
    }

    /// SQL state associated with this error, if any.
    pub fn sql_state(&self) -> Option<&'static str> {
        match self {
            Error::FailedToPostQuery { .. }
            | Error::FailedToRenewSession { .. }
            | Error::FailedToCloseSession { .. }
            | Error::FailedToCancelQuery { .. } => Some(SQLSTATE_CONNECTION_FAILURE),
            _ => None,
        }
    }
}
