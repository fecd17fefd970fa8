//! SSE wire-format parsing.
//!
//! This module contains a self-contained Server-Sent Events parser based on the
//! [HTML Living Standard](https://html.spec.whatwg.org/multipage/server-sent-events.html).
//! [`FrameParser`] applies the per-line field rules to decoded lines;
//! [`EventStream`] drives it from a stream of byte chunks.

pub(crate) mod constants;
pub(crate) mod errors;
pub mod event;
pub mod event_stream;
pub(crate) mod parser;

pub use constants::DEFAULT_EVENT_TYPE;
pub use errors::EventStreamError;
pub use event::{Event, Frame};
pub use event_stream::EventStream;
pub use parser::{FrameParser, parse_lines};
