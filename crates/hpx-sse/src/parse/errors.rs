//! Error types used by the SSE parser.

use core::{
    fmt::{Display, Formatter},
    str::Utf8Error,
};

/// Errors produced by [`EventStream`](super::event_stream::EventStream).
///
/// Every variant records the 1-based number of the line being read when the
/// fault occurred.
#[derive(Debug, PartialEq)]
pub enum EventStreamError<E> {
    /// Something went wrong with the underlying stream.
    Transport {
        /// Line being read when the source failed.
        line: u64,
        /// Error returned by the source.
        source: E,
    },
    /// The line contained invalid UTF-8.
    Utf8 {
        /// Offending line.
        line: u64,
        /// Decoding error.
        source: Utf8Error,
    },
}

impl<E> EventStreamError<E> {
    /// Line number at which the stream failed.
    pub fn line(&self) -> u64 {
        match self {
            Self::Transport { line, .. } | Self::Utf8 { line, .. } => *line,
        }
    }

    /// Returns `true` if the underlying source failed.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}

impl<E> Display for EventStreamError<E>
where
    E: Display,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Transport { line, source } => {
                write!(f, "stream read error at line {line}: {source}")
            }
            Self::Utf8 { line, source } => write!(f, "invalid UTF-8 at line {line}: {source}"),
        }
    }
}

impl<E> core::error::Error for EventStreamError<E>
where
    E: core::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::Transport { source, .. } => Some(source),
            Self::Utf8 { source, .. } => Some(source),
        }
    }
}
