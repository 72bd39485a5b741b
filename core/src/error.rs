//! Error types shared by the session manager and the todo client.
//!
//! # Design
//! Server-derived variants carry a human-readable `message` and display as
//! exactly that message, so a view can surface the error without further
//! formatting. The message is the server's `detail` field when the response
//! carries one, otherwise the operation's default (e.g. "Login failed").

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced an HTTP response (connection refused,
    /// DNS failure, timeout).
    #[error("network failure: {0}")]
    Network(String),

    /// The server returned 401: bad credentials or a rejected token.
    #[error("{message}")]
    AuthRejected { message: String },

    /// The server returned 400 or 422.
    #[error("{message}")]
    ValidationFailed { message: String },

    /// The server returned 404, or the record is missing or owned by
    /// another user.
    #[error("{message}")]
    NotFound { message: String },

    /// The server returned a 5xx status.
    #[error("{message}")]
    ServerError { status: u16, message: String },

    /// Any other non-2xx status.
    #[error("{message}")]
    HttpError { status: u16, message: String },

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    DeserializationError(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    SerializationError(String),

    /// An authenticated request was attempted without a session token.
    #[error("not authenticated")]
    NotAuthenticated,

    /// The request scope was cancelled before a response arrived.
    #[error("request cancelled")]
    Cancelled,

    /// Durable token storage could not be read or written.
    #[error("token storage failed: {0}")]
    Storage(String),
}

impl ApiError {
    /// True when the server rejected the caller's credentials or token.
    pub fn is_auth_rejected(&self) -> bool {
        matches!(self, ApiError::AuthRejected { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound { .. })
    }

    /// HTTP status behind a server-derived error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::AuthRejected { .. } => Some(401),
            ApiError::NotFound { .. } => Some(404),
            ApiError::ServerError { status, .. } | ApiError::HttpError { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }
}

impl From<std::io::Error> for ApiError {
    fn from(e: std::io::Error) -> Self {
        ApiError::Storage(e.to_string())
    }
}
