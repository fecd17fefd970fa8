//! [`Stream`] that converts a stream of
//! [`Bytes`](bytes::Bytes) chunks into [`Frame`]s.

use core::{
    pin::Pin,
    task::{Context, Poll, ready},
};

use bytes::{Buf, BufMut, BytesMut};
use futures_core::Stream;

use super::{
    constants::{BOM, CR, LF},
    errors::EventStreamError,
    event::Frame,
    parser::{FrameParser, find_eol},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EventStreamState {
    /// Waiting for enough bytes to rule a BOM in or out.
    NotStarted,
    Started,
    /// Source exhausted; remaining complete lines are still drained.
    Ended,
    /// An error was yielded; nothing more is produced.
    Failed,
}

pin_project_lite::pin_project! {
    /// A [`Stream`] that converts a stream of byte chunks into parsed SSE
    /// [`Frame`]s.
    ///
    /// Handles BOM detection, line-ending normalisation (LF / CR / CRLF),
    /// per-line UTF-8 validation and line counting. The first error ends the
    /// stream. A record left without its terminating blank line when the
    /// source ends is discarded.
    #[project = EventStreamProjection]
    #[derive(Debug)]
    pub struct EventStream<S> {
        #[pin]
        stream: S,
        buffer: BytesMut,
        parser: FrameParser,
        state: EventStreamState,
        line: u64,
    }
}

impl<S> EventStream<S> {
    /// Create a new [`EventStream`] from an underlying byte stream.
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            buffer: BytesMut::new(),
            parser: FrameParser::new(),
            state: EventStreamState::NotStarted,
            line: 0,
        }
    }

    /// Number of complete lines consumed so far.
    pub fn lines_read(&self) -> u64 {
        self.line
    }
}

// ---------------------------------------------------------------------------
// BOM helper
// ---------------------------------------------------------------------------

/// `Some(true)` once `buf` starts with a BOM, `Some(false)` once it cannot,
/// `None` while `buf` is a strict prefix of one.
fn bom_prefix(buf: &[u8]) -> Option<bool> {
    let n = buf.len().min(BOM.len());
    if buf[..n] != BOM[..n] {
        Some(false)
    } else if n == BOM.len() {
        Some(true)
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// Parsing helper
// ---------------------------------------------------------------------------

fn next_frame<E>(
    buffer: &mut BytesMut,
    parser: &mut FrameParser,
    line: &mut u64,
) -> Result<Option<Frame>, EventStreamError<E>> {
    while let Some((line_end, rem_start)) = find_eol(buffer) {
        let raw = buffer.split_to(line_end);
        buffer.advance(rem_start - line_end);
        *line += 1;

        let text = str::from_utf8(&raw).map_err(|source| EventStreamError::Utf8 {
            line: *line,
            source,
        })?;

        if let Some(frame) = parser.push_line(text) {
            return Ok(Some(frame));
        }
    }
    Ok(None)
}

// ---------------------------------------------------------------------------
// Stream implementation
// ---------------------------------------------------------------------------

impl<S, E, B> Stream for EventStream<S>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
{
    type Item = Result<Frame, EventStreamError<E>>;

    fn poll_next(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<<Self as Stream>::Item>> {
        let mut this = self.project();

        loop {
            match *this.state {
                EventStreamState::Failed => return Poll::Ready(None),
                EventStreamState::NotStarted => {}
                EventStreamState::Started | EventStreamState::Ended => {
                    match next_frame(this.buffer, this.parser, this.line) {
                        Ok(Some(frame)) => return Poll::Ready(Some(Ok(frame))),
                        Ok(None) => {}
                        Err(e) => {
                            *this.state = EventStreamState::Failed;
                            this.buffer.clear();
                            return Poll::Ready(Some(Err(e)));
                        }
                    }
                    if *this.state == EventStreamState::Ended {
                        this.parser.reset();
                        return Poll::Ready(None);
                    }
                }
            }

            let new_bytes = match ready!(this.stream.as_mut().poll_next(cx)) {
                Some(Ok(o)) => o,
                Some(Err(source)) => {
                    *this.state = EventStreamState::Failed;
                    this.buffer.clear();
                    return Poll::Ready(Some(Err(EventStreamError::Transport {
                        line: *this.line + 1,
                        source,
                    })));
                }
                None => {
                    *this.state = EventStreamState::Ended;
                    // The parser waits to see if a line is CR LF or just CR;
                    // once the stream ends we know a trailing CR is standalone.
                    if this.buffer.last() == Some(&CR) {
                        this.buffer.put_u8(LF);
                    }
                    continue;
                }
            };

            let new_bytes = new_bytes.as_ref();
            if new_bytes.is_empty() {
                continue;
            }

            this.buffer.extend_from_slice(new_bytes);

            // BOM detection on the very first chunk(s).
            if *this.state == EventStreamState::NotStarted {
                match bom_prefix(this.buffer) {
                    Some(true) => {
                        *this.state = EventStreamState::Started;
                        this.buffer.advance(BOM.len());
                    }
                    Some(false) => *this.state = EventStreamState::Started,
                    None => continue,
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
