//! Error handling for the SSE client.

use std::time::Duration;

use thiserror::Error;

use crate::types::ErrorKind;

/// Boxed error used at the transport boundary.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The main result type used throughout the crate.
pub type SseResult<T> = Result<T, SseError>;

/// Error type for all SSE client operations.
#[derive(Error, Debug)]
pub enum SseError {
    /// HTTP client errors (wraps reqwest::Error)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The transport could not establish a connection
    #[error("Connection failed: {message}")]
    Connect {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// Timeout errors
    #[error("Operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// Non-success HTTP status
    #[error("Unexpected HTTP status: {status}")]
    InvalidStatus { status: http::StatusCode },

    /// Response is not an event stream
    #[error("Invalid content type: {content_type} (expected text/event-stream)")]
    InvalidContentType { content_type: String },

    /// Reading the response body failed
    #[error("Stream read error at line {line}: {message}")]
    StreamRead { line: u64, message: String },

    /// The response body could not be decoded
    #[error("Stream decode error at line {line}: {message}")]
    StreamDecode { line: u64, message: String },

    /// A subscriber panicked while handling a notification
    #[error("Event handler panicked: {message}")]
    HandlerPanicked { message: String },

    /// A connection is already active on this client
    #[error("Already connected")]
    AlreadyConnected,

    /// The URL could not be parsed
    #[error("Invalid URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    /// The reconnect attempt limit was reached
    #[error("Maximum reconnect attempts ({max_attempts}) reached")]
    AttemptsExhausted { max_attempts: u32 },

    /// The operation is not valid in the current state
    #[error("Invalid operation: {message}")]
    InvalidOperation { message: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl SseError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a connection error with an optional source.
    pub fn connect(message: impl Into<String>, source: Option<BoxError>) -> Self {
        Self::Connect {
            message: message.into(),
            source,
        }
    }

    /// Create a timeout error.
    pub fn timeout(duration: Duration) -> Self {
        Self::Timeout { duration }
    }

    /// Create an invalid-status error.
    pub fn invalid_status(status: http::StatusCode) -> Self {
        Self::InvalidStatus { status }
    }

    /// Create an invalid content-type error.
    pub fn invalid_content_type(content_type: impl Into<String>) -> Self {
        Self::InvalidContentType {
            content_type: content_type.into(),
        }
    }

    /// Create a stream read error.
    pub fn stream_read(line: u64, message: impl Into<String>) -> Self {
        Self::StreamRead {
            line,
            message: message.into(),
        }
    }

    /// Create a stream decode error.
    pub fn stream_decode(line: u64, message: impl Into<String>) -> Self {
        Self::StreamDecode {
            line,
            message: message.into(),
        }
    }

    /// Create an invalid-URL error.
    pub fn invalid_url(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create an invalid-operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Returns `true` for errors that mean the request did not complete in
    /// time rather than failed outright.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Http(e) => e.is_timeout(),
            _ => false,
        }
    }

    /// Classification reported with error notifications.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Http(e) if e.is_timeout() => ErrorKind::Timeout,
            Self::Http(_)
            | Self::Connect { .. }
            | Self::AlreadyConnected
            | Self::AttemptsExhausted { .. } => ErrorKind::ConnectionError,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::InvalidStatus { .. } | Self::InvalidUrl { .. } => ErrorKind::InvalidUrl,
            Self::InvalidContentType { .. } => ErrorKind::InvalidResponse,
            Self::StreamRead { .. } => ErrorKind::StreamReadError,
            Self::StreamDecode { .. } => ErrorKind::StreamError,
            Self::HandlerPanicked { .. } => ErrorKind::DataParseError,
            Self::InvalidOperation { .. } | Self::Config { .. } => ErrorKind::UnknownError,
        }
    }
}
