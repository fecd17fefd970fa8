//! Notification payload types shared by the connection driver and the
//! dispatcher.

use std::{fmt, sync::Arc, time::Duration};

use crate::error::SseError;

/// Why a single connection attempt ended.
///
/// Exactly one reason is produced per attempt and delivered with the
/// disconnect notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum DisconnectReason {
    /// No outcome was recorded.
    #[default]
    Unknown,
    /// The caller cancelled the connection.
    Cancelled,
    /// The transport could not reach the server.
    ConnectionFailed,
    /// The server did not answer before the connect timeout.
    Timeout,
    /// The server answered with a non-success status.
    ServerError,
    /// The response was not `text/event-stream`.
    InvalidContentType,
    /// The server closed the stream.
    StreamEnded,
    /// The stream failed mid-read.
    UnexpectedError,
}

impl DisconnectReason {
    /// Returns `true` if the caller initiated the stop.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unknown => "Unknown",
            Self::Cancelled => "Cancelled",
            Self::ConnectionFailed => "ConnectionFailed",
            Self::Timeout => "Timeout",
            Self::ServerError => "ServerError",
            Self::InvalidContentType => "InvalidContentType",
            Self::StreamEnded => "StreamEnded",
            Self::UnexpectedError => "UnexpectedError",
        };
        f.write_str(name)
    }
}

/// Classification of a reported failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Connecting failed, a connection is already active, or the reconnect
    /// limit was reached.
    ConnectionError,
    /// The URL was rejected (unparseable, or the server answered non-2xx).
    InvalidUrl,
    /// The response was not an event stream.
    InvalidResponse,
    /// The server did not answer in time.
    Timeout,
    /// The body could not be decoded.
    StreamError,
    /// Reading the body failed.
    StreamReadError,
    /// A message handler failed.
    DataParseError,
    /// Anything else.
    UnknownError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ConnectionError => "ConnectionError",
            Self::InvalidUrl => "InvalidUrl",
            Self::InvalidResponse => "InvalidResponse",
            Self::Timeout => "Timeout",
            Self::StreamError => "StreamError",
            Self::StreamReadError => "StreamReadError",
            Self::DataParseError => "DataParseError",
            Self::UnknownError => "UnknownError",
        };
        f.write_str(name)
    }
}

/// Payload of an error notification.
#[derive(Clone, Debug)]
pub struct ErrorEvent {
    /// What kind of fault occurred.
    pub kind: ErrorKind,
    /// Human-readable description.
    pub message: String,
    /// Underlying error, if any.
    pub cause: Option<Arc<SseError>>,
}

impl ErrorEvent {
    /// Create an error notification without a cause.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            cause: None,
        }
    }

    /// Attach the underlying error.
    #[must_use]
    pub fn with_cause(mut self, cause: SseError) -> Self {
        self.cause = Some(Arc::new(cause));
        self
    }
}

impl fmt::Display for ErrorEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)?;
        if let Some(cause) = &self.cause {
            write!(f, ": {cause}")?;
        }
        Ok(())
    }
}

/// Payload of a reconnecting notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReconnectInfo {
    /// 1-based attempt number since the last successful connection.
    pub attempt: u32,
    /// Configured attempt limit (`0` = unlimited).
    pub max_attempts: u32,
    /// Time the driver waits before this attempt.
    pub delay: Duration,
}
